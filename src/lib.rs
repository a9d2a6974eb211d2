#![cfg_attr(not(any(test, feature = "std")), no_std)]

extern crate alloc;

use alloc::vec::Vec;

use embedded_io_async::{Read, Write};
use log::debug;

mod config;
pub use config::*;

mod constants;
pub use constants::*;

mod decode;
pub use decode::*;

mod error;
pub use error::*;

mod frame;
pub use frame::*;

mod monitor;
pub use monitor::*;

mod registers;
pub use registers::*;

mod time;
pub use time::*;

mod transport;
pub use transport::*;

/// Represents an OMRON 2JCIE-BU01 environmental sensor attached over its
/// serial command protocol.
///
/// This struct provides methods to interact with the sensor: reading the
/// latest environmental and seismic measurements, configuring the LED and
/// acceleration logger, and retrieving recorded acceleration memory after a
/// vibration or earthquake event.
///
/// # Type Parameters
///
/// * `Serial`: The byte channel to the device. It must implement
///   [`Transport`].
/// * `D`: Cooperative delay used between receive polls and sampling ticks.
/// * `C`: Wall-clock source used to timestamp decoded samples.
pub struct Bu01<Serial, D, C> {
    serial: Serial,
    delay: D,
    clock: C,
    config: Config,
}

impl<S, D, C> Bu01<S, D, C>
where
    S: Transport,
    D: Delay,
    C: WallClock,
{
    /// Creates a new `Bu01` driver instance.
    ///
    /// # Arguments
    ///
    /// * `serial`: The transport for communication with the sensor.
    /// * `delay`: Delay source for receive polling and sampling ticks.
    /// * `clock`: Wall-clock source for sample timestamps.
    /// * `config`: Protocol timing configuration.
    pub fn new(serial: S, delay: D, clock: C, config: Config) -> Self {
        Self {
            serial,
            delay,
            clock,
            config,
        }
    }

    /// Releases the underlying transport so its owner can close it.
    pub fn release(self) -> S {
        self.serial
    }

    pub(crate) async fn tick_sleep(&mut self) {
        self.delay.delay_ms(self.config.tick_interval_ms).await;
    }

    /// Reads a register and returns the validated response.
    ///
    /// Most callers want the typed wrappers below; this is the escape hatch
    /// for registers the driver does not model.
    pub async fn read_register(
        &mut self,
        register: Register,
        argument: &[u8],
    ) -> Result<Response, Error> {
        self.request(register, Opcode::Read, argument).await
    }

    /// Writes a register and returns the validated response (the device
    /// echoes the value actually stored).
    pub async fn write_register(
        &mut self,
        register: Register,
        argument: &[u8],
    ) -> Result<Response, Error> {
        if register.read_only() {
            log::error!("rejected write to read-only register {register:?}");
            // Same code the device answers such writes with, surfaced
            // without putting the frame on the wire.
            return Err(ProtocolError { code: 0x82 }.into());
        }
        self.request(register, Opcode::Write, argument).await
    }

    /// Reads the latest environmental + seismic measurement, timestamped
    /// with the driver's wall clock.
    pub async fn latest_data(&mut self) -> Result<SensorSample, Error> {
        let response = self.read_register(Register::LatestDataLong, &[]).await?;
        Ok(decode_latest(response.data(), self.clock.now())?)
    }

    /// Reads the latest measurement together with its raw flag bitmasks.
    pub async fn latest_data_with_flags(&mut self) -> Result<SensorSampleWithFlags, Error> {
        let response = self.read_register(Register::LatestDataLong, &[]).await?;
        Ok(decode_latest_with_flags(response.data(), self.clock.now())?)
    }

    /// Reads the latest one-shot acceleration values, in gal.
    pub async fn latest_acceleration(&mut self) -> Result<LatestAcceleration, Error> {
        let response = self
            .read_register(Register::LatestAcceleration, &[])
            .await?;
        Ok(decode_latest_acceleration(response.data())?)
    }

    /// Reads the installation orientation of the sensor body (1..=6).
    pub async fn mounting_orientation(&mut self) -> Result<u8, Error> {
        let response = self
            .read_register(Register::MountingOrientation, &[])
            .await?;
        Ok(decode_orientation(response.data())?)
    }

    /// Sets the LED lighting rule and color.
    pub async fn set_led(&mut self, rule: LedRule, color: (u8, u8, u8)) -> Result<(), Error> {
        debug!("setting LED rule {:?}, color {:?}", rule, color);
        let argument = led_argument(rule, color);
        self.write_register(Register::LedControl, &argument).await?;
        Ok(())
    }

    /// Queries the current operating mode.
    pub async fn mode(&mut self) -> Result<SensorMode, Error> {
        let response = self.read_register(Register::ModeChange, &[]).await?;
        match response.data().first() {
            Some(0x01) => Ok(SensorMode::AccelerationLogger),
            Some(_) => Ok(SensorMode::Normal),
            None => Err(DecodeError::PayloadTooShort.into()),
        }
    }

    /// Switches between normal mode and acceleration logger mode.
    pub async fn set_mode(&mut self, mode: SensorMode) -> Result<(), Error> {
        debug!("changing mode to {:?}", mode);
        self.write_register(Register::ModeChange, &[mode as u8])
            .await?;
        Ok(())
    }

    /// Starts or stops flash logging of acceleration samples.
    ///
    /// # Arguments
    ///
    /// * `run`: `true` to start logging, `false` to stop.
    /// * `odr`: Output data rate of the logger.
    /// * `start_page`, `end_page`: Flash page range, both inclusive.
    pub async fn accel_logger_control(
        &mut self,
        run: bool,
        odr: OdrSetting,
        start_page: u16,
        end_page: u16,
    ) -> Result<(), Error> {
        debug!(
            "logger control: run={} odr={:?} pages {}..={}",
            run, odr, start_page, end_page
        );
        let argument = logger_control_argument(run, odr, start_page, end_page);
        self.write_register(Register::AccelLoggerControl, &argument)
            .await?;
        Ok(())
    }

    /// Reads the acceleration logger status bytes. The layout is
    /// device-internal, so they are returned unparsed.
    pub async fn accel_logger_status(&mut self) -> Result<Vec<u8>, Error> {
        let response = self.read_register(Register::AccelLoggerStatus, &[]).await?;
        Ok(response.data().to_vec())
    }

    /// Reads the BLE advertising configuration.
    pub async fn advertise_setting(&mut self) -> Result<AdvertiseSetting, Error> {
        let response = self.read_register(Register::AdvertiseSetting, &[]).await?;
        Ok(decode_advertise_setting(response.data())?)
    }

    /// Writes the BLE advertising configuration.
    pub async fn set_advertise_setting(&mut self, setting: AdvertiseSetting) -> Result<(), Error> {
        let interval = setting.interval.to_le_bytes();
        let argument = [interval[0], interval[1], setting.mode];
        self.write_register(Register::AdvertiseSetting, &argument)
            .await?;
        Ok(())
    }

    /// Reads the monotonic device time counter, in device ticks.
    pub async fn time_counter(&mut self) -> Result<u64, Error> {
        let response = self.read_register(Register::TimeCounter, &[]).await?;
        Ok(decode_counter(response.data())?)
    }

    /// Reads the time setting register. Zero means the device counter has
    /// never been started.
    pub async fn time_setting(&mut self) -> Result<u64, Error> {
        let response = self.read_register(Register::TimeSetting, &[]).await?;
        Ok(decode_counter(response.data())?)
    }

    /// Seeds the device time counter and returns the value the device
    /// stored.
    pub async fn set_time_setting(&mut self, counter: u64) -> Result<u64, Error> {
        let response = self
            .write_register(Register::TimeSetting, &counter.to_le_bytes())
            .await?;
        Ok(decode_counter(response.data())?)
    }

    /// Reads the flash storage interval for environmental records, seconds.
    pub async fn storage_interval(&mut self) -> Result<u16, Error> {
        let response = self.read_register(Register::StorageInterval, &[]).await?;
        Ok(decode_interval(response.data())?)
    }

    /// Sets the flash storage interval and returns the stored value.
    pub async fn set_storage_interval(&mut self, seconds: u16) -> Result<u16, Error> {
        let response = self
            .write_register(Register::StorageInterval, &seconds.to_le_bytes())
            .await?;
        Ok(decode_interval(response.data())?)
    }

    /// Prepares the device for acceleration memory use.
    ///
    /// Acceleration events are only recorded while the device time counter
    /// runs, and frequent environmental flash writes compete with event
    /// recording. A stopped counter is therefore seeded with 1, and a
    /// storage interval below one hour is raised to 3600 s.
    ///
    /// # Returns
    ///
    /// The running counter value.
    pub async fn ensure_clock_started(&mut self) -> Result<u64, Error> {
        let mut counter = self.time_setting().await?;
        if counter == 0 {
            counter = self.set_time_setting(1).await?;
            debug!("device time counter started, now {}", counter);
        }
        let interval = self.storage_interval().await?;
        if interval < 3600 {
            let stored = self.set_storage_interval(3600).await?;
            debug!("storage interval raised from {} s to {} s", interval, stored);
        }
        Ok(counter)
    }

    /// Reads the header of one recorded acceleration memory slot.
    ///
    /// # Arguments
    ///
    /// * `data_type`: Earthquake or vibration memory.
    /// * `index`: Memory slot, 1 (latest) ..= 10 (oldest).
    pub async fn acceleration_memory_header(
        &mut self,
        data_type: MemoryDataType,
        index: u8,
    ) -> Result<MemoryHeader, Error> {
        let argument = memory_header_argument(data_type, index);
        let response = self
            .read_register(Register::AccelMemoryHeader, &argument)
            .await?;
        Ok(decode_memory_header(response.data())?)
    }

    /// Reads a page range of one recorded acceleration memory slot.
    ///
    /// The device answers with one concatenated frame per page; the raw
    /// dump is returned for [`decode_acceleration_series`] to pick apart,
    /// after the first page frame and its acknowledgement have been checked.
    pub async fn acceleration_memory_data(
        &mut self,
        data_type: MemoryDataType,
        index: u8,
        start_page: u16,
        end_page: u16,
    ) -> Result<Vec<u8>, Error> {
        let argument = memory_data_argument(data_type, index, start_page, end_page);
        let pages = usize::from(end_page.saturating_sub(start_page)) + 1;
        let command = Command::new(Opcode::Read, Register::AccelMemoryData.address(), &argument);
        let dump = self.exchange(command, Some(pages * PAGE_BLOCK_LEN)).await?;

        validate_frame(&dump)?;
        let status = dump[PAYLOAD_OFFSET];
        if !Register::AccelMemoryData.status_family().is_success(status) {
            log::error!("error response for paged memory read: 0x{:02X}", status);
            return Err(ProtocolError { code: status }.into());
        }
        Ok(dump)
    }

    // Sends one command and validates the single response frame against the
    // register's status family.
    async fn request(
        &mut self,
        register: Register,
        opcode: Opcode,
        argument: &[u8],
    ) -> Result<Response, Error> {
        let command = Command::new(opcode, register.address(), argument);
        let bytes = self.exchange(command, None).await?;
        let response = Response::decode(bytes)?;

        let status = response.status();
        if !register.status_family().is_success(status) {
            log::error!(
                "error response for {:?}: {:02X?}",
                register,
                response.as_bytes()
            );
            return Err(ProtocolError { code: status }.into());
        }
        Ok(response)
    }

    // One request/response exchange: send the encoded command, then poll
    // the transport and accumulate chunks until the response is complete.
    // Responses size themselves from their length field unless the caller
    // knows the total up front (paged memory dumps).
    async fn exchange(
        &mut self,
        command: Command<'_>,
        expected_len: Option<usize>,
    ) -> Result<Vec<u8>, Error> {
        let frame = command.encode()?;
        debug!("executing command: {:02X?}", &frame[..]);
        self.serial.write_all(&frame).await.map_err(|e| {
            log::error!("serial write failed: {:?}", e);
            TransportError::IoFailure
        })?;
        self.serial
            .flush()
            .await
            .map_err(|_| TransportError::IoFailure)?;

        let mut reassembler = match expected_len {
            Some(total) => Reassembler::with_expected_len(total),
            None => Reassembler::new(),
        };
        let mut empty_polls = 0;
        let mut chunk = [0u8; 256];
        loop {
            let available = self
                .serial
                .bytes_available()
                .await
                .map_err(|_| TransportError::IoFailure)?;
            if available == 0 {
                // Only quiet polls count toward the timeout; a trickling
                // response resets nothing but also keeps this at bay.
                empty_polls += 1;
                if empty_polls >= self.config.poll_attempts {
                    log::error!(
                        "serial timeout: {} bytes accumulated after {} empty polls",
                        reassembler.len(),
                        empty_polls
                    );
                    return Err(TransportError::Timeout.into());
                }
                self.delay.delay_ms(self.config.poll_interval_ms).await;
                continue;
            }

            let want = available.min(chunk.len());
            let read = self.serial.read(&mut chunk[..want]).await.map_err(|e| {
                log::error!("serial read failed: {:?}", e);
                TransportError::IoFailure
            })?;
            if read == 0 {
                log::error!("transport closed mid-response");
                return Err(TransportError::IoFailure.into());
            }
            if reassembler.push(&chunk[..read]) {
                break;
            }
        }

        // Residue from an over-long response would desynchronize the next
        // exchange; drop it while the link is quiet.
        self.serial
            .clear_input()
            .await
            .map_err(|_| TransportError::IoFailure)?;
        self.serial
            .clear_output()
            .await
            .map_err(|_| TransportError::IoFailure)?;

        let bytes = reassembler.into_bytes();
        debug!("received {} response bytes", bytes.len());
        Ok(bytes)
    }
}
