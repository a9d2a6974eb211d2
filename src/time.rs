//! Clock and delay abstractions.
//!
//! The driver never reads a clock or sleeps directly: both come in through
//! these traits so the monitor loop can run against a hardware timer, an OS
//! clock, or a scripted clock in tests.

/// Wall-clock timestamp in milliseconds since the Unix epoch.
pub type Timestamp = u64;

/// Source of wall-clock time.
pub trait WallClock {
    /// Current wall-clock time in milliseconds since the Unix epoch.
    fn now(&self) -> Timestamp;
}

/// Cooperative sleep between polls and sampling ticks.
pub trait Delay {
    async fn delay_ms(&mut self, ms: u32);
}

/// Wall clock backed by the OS.
#[cfg(feature = "std")]
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[cfg(feature = "std")]
impl WallClock for SystemClock {
    fn now(&self) -> Timestamp {
        use std::time::{SystemTime, UNIX_EPOCH};

        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as Timestamp
    }
}

/// Delay that blocks the current thread.
///
/// The protocol is strictly request/response on a single logical thread, so
/// a blocking sleep is the intended behavior when driving a serial port from
/// an OS process.
#[cfg(feature = "std")]
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadDelay;

#[cfg(feature = "std")]
impl Delay for ThreadDelay {
    async fn delay_ms(&mut self, ms: u32) {
        std::thread::sleep(std::time::Duration::from_millis(u64::from(ms)));
    }
}
