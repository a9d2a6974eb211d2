/// Timing configuration for the 2JCIE-BU01 driver.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Config {
    /// Sleep between polls of the receive side while a response is pending,
    /// in milliseconds.
    pub poll_interval_ms: u32,
    /// Number of consecutive empty polls after which a response is declared
    /// timed out. Polls that deliver bytes do not count.
    pub poll_attempts: u32,
    /// Sleep between monitor loop iterations, in milliseconds.
    pub tick_interval_ms: u32,
}

impl Config {
    /// Creates a new `Config` instance.
    pub fn new(poll_interval_ms: u32, poll_attempts: u32, tick_interval_ms: u32) -> Config {
        Config {
            poll_interval_ms,
            poll_attempts,
            tick_interval_ms,
        }
    }

    /// Sets the receive poll interval in milliseconds.
    pub fn poll_interval_ms(mut self, ms: u32) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    /// Sets the number of empty polls tolerated before a timeout.
    pub fn poll_attempts(mut self, attempts: u32) -> Self {
        self.poll_attempts = attempts;
        self
    }

    /// Sets the monitor loop tick interval in milliseconds.
    pub fn tick_interval_ms(mut self, ms: u32) -> Self {
        self.tick_interval_ms = ms;
        self
    }
}

/// Provides default timings observed against the device: 10 polls of 100 ms
/// each before timing out, and a 1 s sampling tick.
impl Default for Config {
    fn default() -> Config {
        Config {
            poll_interval_ms: 100,
            poll_attempts: 10,
            tick_interval_ms: 1000,
        }
    }
}
