//! End-to-end driver tests over a scripted in-memory transport.

use core::cell::Cell;
use core::sync::atomic::{AtomicBool, Ordering};
use std::collections::VecDeque;

use omron_2jcie_bu::{
    checksum, AccelerationSample, Bu01, Config, Error, LedRule, MemoryDataType, ProtocolError,
    RecordSink, Register, SensorSample, TransportError, Transport, VibrationInformation, WallClock,
    Delay, HEADER, PAGE_BLOCK_LEN, PAGE_SAMPLES_OFFSET, SAMPLES_PER_PAGE, SAMPLE_LEN,
};

/// In-memory serial port: every command frame written pops the next scripted
/// response into the receive buffer.
#[derive(Default)]
struct MockPort {
    responses: VecDeque<Vec<u8>>,
    rx: Vec<u8>,
    written: Vec<Vec<u8>>,
    /// Caps how many bytes a single `read` hands back, to exercise
    /// reassembly across chunk boundaries.
    read_limit: Option<usize>,
    /// Simulates losing the port: once the script runs out, polling the
    /// receive side fails instead of staying silent.
    fail_when_exhausted: bool,
}

impl MockPort {
    fn scripted(responses: Vec<Vec<u8>>) -> Self {
        MockPort {
            responses: responses.into(),
            ..Default::default()
        }
    }
}

impl embedded_io_async::ErrorType for MockPort {
    type Error = embedded_io_async::ErrorKind;
}

impl embedded_io_async::Read for MockPort {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let n = self
            .read_limit
            .unwrap_or(usize::MAX)
            .min(buf.len())
            .min(self.rx.len());
        buf[..n].copy_from_slice(&self.rx[..n]);
        self.rx.drain(..n);
        Ok(n)
    }
}

impl embedded_io_async::Write for MockPort {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.written.push(buf.to_vec());
        if let Some(response) = self.responses.pop_front() {
            self.rx.extend_from_slice(&response);
        }
        Ok(buf.len())
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl Transport for MockPort {
    async fn bytes_available(&mut self) -> Result<usize, Self::Error> {
        if self.fail_when_exhausted && self.rx.is_empty() && self.responses.is_empty() {
            return Err(embedded_io_async::ErrorKind::Other);
        }
        Ok(self.rx.len())
    }

    async fn clear_input(&mut self) -> Result<(), Self::Error> {
        self.rx.clear();
        Ok(())
    }

    async fn clear_output(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

struct NoDelay;

impl Delay for NoDelay {
    async fn delay_ms(&mut self, _ms: u32) {}
}

/// Advances by one second per reading, like a wall clock sampled once per
/// monitor tick.
struct TickClock(Cell<u64>);

impl TickClock {
    fn new() -> Self {
        TickClock(Cell::new(0))
    }
}

impl WallClock for TickClock {
    fn now(&self) -> u64 {
        let t = self.0.get() + 1000;
        self.0.set(t);
        t
    }
}

fn driver(port: MockPort) -> Bu01<MockPort, NoDelay, TickClock> {
    Bu01::new(port, NoDelay, TickClock::new(), Config::default())
}

/// Builds one response frame with the given status, echoed address and data.
fn response(status: u8, address: u16, data: &[u8]) -> Vec<u8> {
    let mut out = HEADER.to_vec();
    out.extend_from_slice(&((3 + data.len() + 2) as u16).to_le_bytes());
    out.push(status);
    out.extend_from_slice(&address.to_le_bytes());
    out.extend_from_slice(data);
    let crc = checksum(&out);
    out.extend_from_slice(&crc.to_le_bytes());
    out
}

/// 49-byte `LatestDataLong` payload with a fixed environment reading and the
/// given vibration information byte.
fn latest_payload(vibration: u8) -> Vec<u8> {
    let mut data = vec![0u8; 49];
    data[0] = 42;
    data[1..3].copy_from_slice(&2500i16.to_le_bytes());
    data[3..5].copy_from_slice(&5000u16.to_le_bytes());
    data[7..11].copy_from_slice(&1_000_000u32.to_le_bytes());
    data[21] = vibration;
    data
}

fn latest_response(vibration: u8) -> Vec<u8> {
    response(
        0x01,
        Register::LatestDataLong.address(),
        &latest_payload(vibration),
    )
}

fn counter_response(counter: u64) -> Vec<u8> {
    response(
        0x01,
        Register::TimeCounter.address(),
        &counter.to_le_bytes(),
    )
}

fn header_response(end_page: u16, data_timecounter: u64) -> Vec<u8> {
    let mut data = vec![0u8; 14];
    data[0..2].copy_from_slice(&end_page.to_le_bytes());
    data[6..14].copy_from_slice(&data_timecounter.to_le_bytes());
    response(0x01, Register::AccelMemoryHeader.address(), &data)
}

/// One valid 237-byte memory page block whose samples all carry the given
/// raw axis values.
fn page_block(raw: [i16; 3]) -> Vec<u8> {
    let mut block = vec![0u8; PAGE_BLOCK_LEN];
    block[..2].copy_from_slice(&HEADER);
    block[2..4].copy_from_slice(&((PAGE_BLOCK_LEN - 4) as u16).to_le_bytes());
    block[4] = 0x01;
    for k in 0..SAMPLES_PER_PAGE {
        let at = PAGE_SAMPLES_OFFSET + k * SAMPLE_LEN;
        for (axis, &value) in raw.iter().enumerate() {
            block[at + axis * 2..at + axis * 2 + 2].copy_from_slice(&value.to_le_bytes());
        }
    }
    let crc = checksum(&block[..PAGE_BLOCK_LEN - 2]);
    block[PAGE_BLOCK_LEN - 2..].copy_from_slice(&crc.to_le_bytes());
    block
}

#[tokio::test]
async fn latest_data_round_trip() {
    let port = MockPort::scripted(vec![latest_response(0)]);
    let mut driver = driver(port);

    let sample = driver.latest_data().await.unwrap();
    assert_eq!(sample.sequence_number, 42);
    assert_eq!(sample.time_measured, 1000);
    assert!((sample.temperature - 25.0).abs() < 1e-3);
    assert!((sample.relative_humidity - 50.0).abs() < 1e-3);
    assert_eq!(sample.vibration_information, VibrationInformation::None);

    // Exactly one command frame went out, addressed to the latest-data
    // register.
    let port = driver.release();
    assert_eq!(port.written.len(), 1);
    let frame = &port.written[0];
    assert_eq!(&frame[..2], &HEADER);
    assert_eq!(frame[4], 0x01);
    assert_eq!(
        u16::from_le_bytes([frame[5], frame[6]]),
        Register::LatestDataLong.address()
    );
}

#[tokio::test]
async fn chunked_delivery_reassembles() {
    let mut port = MockPort::scripted(vec![latest_response(0)]);
    port.read_limit = Some(3);
    let mut driver = driver(port);

    let sample = driver.latest_data().await.unwrap();
    assert_eq!(sample.sequence_number, 42);
}

#[tokio::test]
async fn silence_times_out() {
    let port = MockPort::scripted(vec![]);
    let mut driver = driver(port);

    let error = driver.latest_data().await.unwrap_err();
    assert_eq!(error, Error::Transport(TransportError::Timeout));
}

#[tokio::test]
async fn error_status_surfaces_as_protocol_error() {
    let port = MockPort::scripted(vec![response(0x82, Register::TimeCounter.address(), &[])]);
    let mut driver = driver(port);

    let error = driver.time_counter().await.unwrap_err();
    assert_eq!(error, Error::Protocol(ProtocolError { code: 0x82 }));
}

#[tokio::test]
async fn write_to_read_only_register_is_refused_locally() {
    let port = MockPort::scripted(vec![]);
    let mut driver = driver(port);

    let error = driver
        .write_register(Register::TimeCounter, &[0; 8])
        .await
        .unwrap_err();
    assert_eq!(error, Error::Protocol(ProtocolError { code: 0x82 }));
    // Nothing reached the wire.
    assert!(driver.release().written.is_empty());
}

#[tokio::test]
async fn set_led_sends_rule_and_color() {
    let argument = [0x01, 0x00, 0xFF, 0x20, 0x00];
    let port = MockPort::scripted(vec![response(
        0x02,
        Register::LedControl.address(),
        &argument,
    )]);
    let mut driver = driver(port);

    driver.set_led(LedRule::On, (0xFF, 0x20, 0x00)).await.unwrap();
    let frame = driver.release().written.remove(0);
    assert_eq!(frame[4], 0x02);
    assert_eq!(&frame[7..12], &argument);
}

#[tokio::test]
async fn clock_setup_seeds_cold_device() {
    // Counter never started and the storage interval at its 300 s default:
    // both must be written.
    let port = MockPort::scripted(vec![
        response(0x01, Register::TimeSetting.address(), &0u64.to_le_bytes()),
        response(0x02, Register::TimeSetting.address(), &1u64.to_le_bytes()),
        response(0x01, Register::StorageInterval.address(), &300u16.to_le_bytes()),
        response(0x02, Register::StorageInterval.address(), &3600u16.to_le_bytes()),
    ]);
    let mut driver = driver(port);

    let counter = driver.ensure_clock_started().await.unwrap();
    assert_eq!(counter, 1);

    let written = driver.release().written;
    assert_eq!(written.len(), 4);
    // Second frame seeds the counter with 1.
    assert_eq!(written[1][4], 0x02);
    assert_eq!(
        u16::from_le_bytes([written[1][5], written[1][6]]),
        Register::TimeSetting.address()
    );
    assert_eq!(&written[1][7..15], &1u64.to_le_bytes());
    // Fourth frame raises the interval to 3600 s.
    assert_eq!(written[3][4], 0x02);
    assert_eq!(
        u16::from_le_bytes([written[3][5], written[3][6]]),
        Register::StorageInterval.address()
    );
    assert_eq!(&written[3][7..9], &3600u16.to_le_bytes());
}

#[tokio::test]
async fn clock_setup_leaves_running_device_alone() {
    let port = MockPort::scripted(vec![
        response(0x01, Register::TimeSetting.address(), &86_400u64.to_le_bytes()),
        response(0x01, Register::StorageInterval.address(), &3600u16.to_le_bytes()),
    ]);
    let mut driver = driver(port);

    let counter = driver.ensure_clock_started().await.unwrap();
    assert_eq!(counter, 86_400);

    // Two reads, no writes.
    let written = driver.release().written;
    assert_eq!(written.len(), 2);
    assert!(written.iter().all(|frame| frame[4] == 0x01));
}

#[tokio::test]
async fn memory_extraction_reconstructs_the_series() {
    let mut dump = page_block([10, 20, 30]);
    dump.extend_from_slice(&page_block([-10, 0, 5]));

    let port = MockPort::scripted(vec![
        counter_response(500),
        header_response(2, 498),
        dump,
    ]);
    let mut driver = driver(port);

    let current = driver.time_counter().await.unwrap();
    let header = driver
        .acceleration_memory_header(MemoryDataType::Earthquake, 1)
        .await
        .unwrap();
    assert_eq!(current, 500);
    assert_eq!(header.end_page, 2);
    assert_eq!(header.data_timecounter, 498);

    let raw = driver
        .acceleration_memory_data(MemoryDataType::Earthquake, 1, 1, header.end_page)
        .await
        .unwrap();
    let series =
        omron_2jcie_bu::decode_acceleration_series(&raw, header.end_page, 7_000).unwrap();
    assert_eq!(series.len(), 2 * SAMPLES_PER_PAGE);
    assert_eq!(series[0].timestamp, 7_000);
    assert!((series[0].x - 1.0).abs() < 1e-3);
    assert!((series[SAMPLES_PER_PAGE].x + 1.0).abs() < 1e-3);
    assert_eq!(
        series[SAMPLES_PER_PAGE].timestamp,
        7_000 + (SAMPLES_PER_PAGE as u64) * 10
    );
}

#[tokio::test]
async fn paged_read_error_frame_surfaces_without_timeout() {
    // A rejected memory read answers with one short error frame, far
    // smaller than the expected page run.
    let port = MockPort::scripted(vec![response(
        0x85,
        Register::AccelMemoryData.address(),
        &[],
    )]);
    let mut driver = driver(port);

    let error = driver
        .acceleration_memory_data(MemoryDataType::Vibration, 1, 1, 4)
        .await
        .unwrap_err();
    assert_eq!(error, Error::Protocol(ProtocolError { code: 0x85 }));
}

struct CaptureSink<'a> {
    stop: &'a AtomicBool,
    stop_after: usize,
    environment: Vec<SensorSample>,
    batches: Vec<Vec<AccelerationSample>>,
}

impl RecordSink for CaptureSink<'_> {
    fn environment(&mut self, sample: &SensorSample) {
        self.environment.push(*sample);
        if self.environment.len() >= self.stop_after {
            self.stop.store(true, Ordering::Relaxed);
        }
    }

    fn acceleration(&mut self, series: &[AccelerationSample]) {
        self.batches.push(series.to_vec());
    }
}

#[tokio::test]
async fn monitor_captures_a_vibration_event() {
    let mut dump = page_block([10, 20, 30]);
    dump.extend_from_slice(&page_block([10, 20, 30]));

    // Six sampling ticks; the event opens on the third and closes on the
    // fifth, which triggers counter/header/data exchanges mid-stream.
    let port = MockPort::scripted(vec![
        latest_response(0),
        latest_response(0),
        latest_response(1),
        counter_response(100),
        latest_response(1),
        latest_response(0),
        counter_response(103),
        header_response(2, 101),
        dump,
        latest_response(0),
    ]);
    let mut driver = driver(port);

    let stop = AtomicBool::new(false);
    let mut sink = CaptureSink {
        stop: &stop,
        stop_after: 6,
        environment: Vec::new(),
        batches: Vec::new(),
    };
    driver.monitor(&mut sink, &stop).await.unwrap();

    assert_eq!(sink.environment.len(), 6);
    assert_eq!(
        sink.environment[2].vibration_information,
        VibrationInformation::Vibration
    );

    // One acceleration batch, both pages, anchored at the wall-clock time
    // of the sample that opened the event (third tick).
    assert_eq!(sink.batches.len(), 1);
    let batch = &sink.batches[0];
    assert_eq!(batch.len(), 2 * SAMPLES_PER_PAGE);
    assert_eq!(batch[0].timestamp, 3000);
    assert!((batch[0].z - 3.0).abs() < 1e-3);

    // Every scripted response was consumed.
    assert!(driver.release().responses.is_empty());
}

#[tokio::test]
async fn monitor_skips_event_without_recorded_memory() {
    let port = MockPort::scripted(vec![
        latest_response(2),
        counter_response(100),
        latest_response(0),
        counter_response(101),
        header_response(0, 0),
    ]);
    let mut driver = driver(port);

    let stop = AtomicBool::new(false);
    let mut sink = CaptureSink {
        stop: &stop,
        stop_after: 2,
        environment: Vec::new(),
        batches: Vec::new(),
    };
    driver.monitor(&mut sink, &stop).await.unwrap();

    assert_eq!(sink.environment.len(), 2);
    assert!(sink.batches.is_empty());
}

#[tokio::test]
async fn monitor_stops_when_transport_is_lost_during_extraction() {
    // The port dies right as the closed event's extraction begins; the
    // loop must surface the loss instead of retrying into a dead handle.
    let mut port = MockPort::scripted(vec![
        latest_response(1),
        counter_response(100),
        latest_response(0),
    ]);
    port.fail_when_exhausted = true;
    let mut driver = driver(port);

    let stop = AtomicBool::new(false);
    let mut sink = CaptureSink {
        stop: &stop,
        stop_after: 100,
        environment: Vec::new(),
        batches: Vec::new(),
    };
    let error = driver.monitor(&mut sink, &stop).await.unwrap_err();
    assert_eq!(error, Error::Transport(TransportError::IoFailure));
    assert_eq!(sink.environment.len(), 2);
    assert!(sink.batches.is_empty());
}

#[tokio::test]
async fn monitor_retries_after_a_bad_tick() {
    // Second tick answers with a device error; the loop logs it and keeps
    // sampling.
    let port = MockPort::scripted(vec![
        latest_response(0),
        response(0x81, Register::LatestDataLong.address(), &[]),
        latest_response(0),
    ]);
    let mut driver = driver(port);

    let stop = AtomicBool::new(false);
    let mut sink = CaptureSink {
        stop: &stop,
        stop_after: 2,
        environment: Vec::new(),
        batches: Vec::new(),
    };
    driver.monitor(&mut sink, &stop).await.unwrap();

    assert_eq!(sink.environment.len(), 2);
}
