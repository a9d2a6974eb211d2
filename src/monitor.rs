//! Vibration/earthquake event correlation.
//!
//! The device raises `vibration_information` while it detects motion and
//! records the acceleration waveform into paged flash memory. This module
//! tracks those onsets and resolutions across sampling ticks, and when an
//! event resolves it correlates the device's monotonic time counter with
//! wall-clock time and reconstructs the recorded 100 Hz series.

use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, Ordering};

use log::{debug, warn};

use crate::decode::{
    decode_acceleration_series, AccelerationSample, SensorSample, VibrationInformation,
};
use crate::error::{Error, TransportError};
use crate::registers::MemoryDataType;
use crate::time::{Delay, Timestamp, WallClock};
use crate::transport::Transport;
use crate::Bu01;

/// Memory slot holding the most recent event (1 = latest, 10 = oldest).
const LATEST_MEMORY_INDEX: u8 = 1;

/// Assumed device time counter resolution: one tick per second. The device
/// documentation never states this; treat event durations derived from it
/// as approximate until verified against hardware.
const TICK_MS: u64 = 1000;

/// Consumer of decoded records: one environmental sample per sampling tick,
/// one acceleration batch per extracted event.
pub trait RecordSink {
    fn environment(&mut self, sample: &SensorSample);
    fn acceleration(&mut self, series: &[AccelerationSample]);
}

/// What kind of event an open window tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Vibration,
    Earthquake,
}

impl EventKind {
    /// Which acceleration memory the device records this kind into.
    pub fn data_type(self) -> MemoryDataType {
        match self {
            EventKind::Vibration => MemoryDataType::Vibration,
            EventKind::Earthquake => MemoryDataType::Earthquake,
        }
    }
}

fn kind_of(info: VibrationInformation) -> Option<EventKind> {
    match info {
        VibrationInformation::None => None,
        VibrationInformation::Vibration => Some(EventKind::Vibration),
        VibrationInformation::Earthquake => Some(EventKind::Earthquake),
    }
}

/// One vibration/earthquake detection interval.
///
/// Opened when `vibration_information` leaves `None`, closed when it
/// returns there. Held only while the event is being tracked and extracted,
/// then discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventWindow {
    pub kind: EventKind,
    /// Wall-clock time of the sample that opened the window.
    pub start_time: Timestamp,
    /// Device time counter at onset, in device ticks.
    pub start_device_counter: u64,
    /// Device time counter at resolution; zero until the window closes.
    pub end_device_counter: u64,
}

/// Edge produced by one observation of `vibration_information`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventEdge {
    Opened(EventKind),
    Closed(EventWindow),
}

/// Tracks vibration onset and resolution across sampling ticks.
///
/// All cross-tick state lives in this object; observing the same scripted
/// sequence always yields the same edges.
#[derive(Debug, Default)]
pub struct VibrationMonitor {
    open: Option<EventWindow>,
}

impl VibrationMonitor {
    pub fn new() -> Self {
        VibrationMonitor { open: None }
    }

    /// Feeds one observed `vibration_information` value.
    ///
    /// Returns `Opened` on the `None` -> event transition and `Closed` with
    /// the finished window on the way back. A change of kind while a window
    /// is open does not produce an edge; the window keeps the kind it was
    /// opened with.
    pub fn observe(&mut self, info: VibrationInformation, now: Timestamp) -> Option<EventEdge> {
        match kind_of(info) {
            Some(kind) if self.open.is_none() => {
                self.open = Some(EventWindow {
                    kind,
                    start_time: now,
                    start_device_counter: 0,
                    end_device_counter: 0,
                });
                Some(EventEdge::Opened(kind))
            }
            Some(_) => None,
            None => self.open.take().map(EventEdge::Closed),
        }
    }

    /// Records the device time counter fetched at onset.
    pub fn record_start_counter(&mut self, counter: u64) {
        if let Some(window) = self.open.as_mut() {
            window.start_device_counter = counter;
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }
}

/// A fully extracted event: the closed window, its correlated end time and
/// the reconstructed acceleration series.
#[derive(Debug, Clone, PartialEq)]
pub struct EventCapture {
    pub window: EventWindow,
    /// Wall-clock end of the event, derived from device counter deltas.
    pub end_time: Timestamp,
    pub samples: Vec<AccelerationSample>,
}

fn abort_reason(error: &Error) -> &'static str {
    match error {
        Error::Frame(_) => "response frame invalid",
        Error::Transport(TransportError::Timeout) => "transport timeout",
        Error::Transport(TransportError::IoFailure) => "transport failure",
        Error::Protocol(_) => "device error response",
        Error::Decode(_) => "memory dump undecodable",
        Error::ExtractionAborted(reason) => reason,
    }
}

impl<S, D, C> Bu01<S, D, C>
where
    S: Transport,
    D: Delay,
    C: WallClock,
{
    /// Retrieves the acceleration series recorded for a closed event.
    ///
    /// Returns `Ok(None)` when the device holds no memory for the event
    /// (header time counter of zero); that is a normal outcome, not an
    /// error. Any failure along the way aborts the whole extraction; the
    /// event is lost and is not retried here. A transport I/O failure is
    /// surfaced as such, not wrapped, so callers can tear the session down.
    pub async fn extract_event(
        &mut self,
        window: EventWindow,
    ) -> Result<Option<EventCapture>, Error> {
        match self.try_extract(window).await {
            Ok(capture) => Ok(capture),
            Err(error @ Error::Transport(TransportError::IoFailure)) => {
                log::error!("event capture aborted, transport lost: {error}");
                Err(error)
            }
            Err(error) => {
                log::error!("event capture aborted: {error}");
                Err(Error::ExtractionAborted(abort_reason(&error)))
            }
        }
    }

    async fn try_extract(&mut self, mut window: EventWindow) -> Result<Option<EventCapture>, Error> {
        let current = self.time_counter().await?;
        let header = self
            .acceleration_memory_header(window.kind.data_type(), LATEST_MEMORY_INDEX)
            .await?;
        if header.data_timecounter == 0 {
            debug!("{:?} event left no recorded memory", window.kind);
            return Ok(None);
        }
        window.end_device_counter = current;

        // Device ticks are applied as offsets against the wall clock
        // captured at onset; see TICK_MS.
        let elapsed_ticks = current.saturating_sub(header.data_timecounter);
        let end_time = window.start_time + elapsed_ticks * TICK_MS;
        debug!(
            "extracting {:?} event: counter {} -> {}, {} pages",
            window.kind, header.data_timecounter, current, header.end_page
        );

        let dump = self
            .acceleration_memory_data(
                window.kind.data_type(),
                LATEST_MEMORY_INDEX,
                1,
                header.end_page,
            )
            .await?;
        let samples = decode_acceleration_series(&dump, header.end_page, window.start_time)?;
        Ok(Some(EventCapture {
            window,
            end_time,
            samples,
        }))
    }

    /// Samples the sensor until `stop` is raised, handing every reading to
    /// `sink` and extracting the recorded acceleration series whenever a
    /// vibration or earthquake event resolves.
    ///
    /// One request/response exchange per tick, strictly serialized; the
    /// stop flag is checked between cycles, never mid-frame. Timeouts and
    /// device errors on a tick are logged and retried on the next tick; a
    /// transport I/O failure means the handle is gone and propagates out.
    pub async fn monitor<K: RecordSink>(
        &mut self,
        sink: &mut K,
        stop: &AtomicBool,
    ) -> Result<(), Error> {
        let mut machine = VibrationMonitor::new();
        while !stop.load(Ordering::Relaxed) {
            match self.latest_data().await {
                Ok(sample) => {
                    sink.environment(&sample);
                    self.handle_edge(
                        &mut machine,
                        sample.vibration_information,
                        sample.time_measured,
                        sink,
                    )
                    .await?;
                }
                Err(error @ Error::Transport(TransportError::IoFailure)) => return Err(error),
                Err(error) => warn!("sampling tick failed: {error}"),
            }
            self.tick_sleep().await;
        }
        Ok(())
    }

    async fn handle_edge<K: RecordSink>(
        &mut self,
        machine: &mut VibrationMonitor,
        info: VibrationInformation,
        now: Timestamp,
        sink: &mut K,
    ) -> Result<(), Error> {
        match machine.observe(info, now) {
            Some(EventEdge::Opened(kind)) => {
                debug!("{kind:?} event detected");
                match self.time_counter().await {
                    Ok(counter) => machine.record_start_counter(counter),
                    Err(error @ Error::Transport(TransportError::IoFailure)) => return Err(error),
                    Err(error) => warn!("time counter unavailable at onset: {error}"),
                }
            }
            Some(EventEdge::Closed(window)) => match self.extract_event(window).await {
                Ok(Some(capture)) => {
                    debug!(
                        "{:?} event captured: {} samples, ended at {}",
                        capture.window.kind,
                        capture.samples.len(),
                        capture.end_time
                    );
                    sink.acceleration(&capture.samples);
                }
                Ok(None) => {}
                Err(error @ Error::Transport(TransportError::IoFailure)) => return Err(error),
                Err(error) => warn!("missed capture: {error}"),
            },
            None => {}
        }
        Ok(())
    }
}
