//! Tunables for a [`crate::link::StationLink`].

use std::time::Duration;

/// Whether the transport can read and write at the same time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DuplexMode {
    /// Reads and writes proceed independently.
    #[default]
    Full,
    /// A read in progress excludes a write and vice versa.
    Half,
}

/// Configuration for the link engine.
///
/// # Default Values
/// - `io_timeout`: 1 second
/// - `wait_timeout`: 3 seconds
/// - `retry_count`: 3 attempts
/// - `retry_delay`: 100 milliseconds
/// - `max_inbound_frames`: 1000
/// - `duplex`: [`DuplexMode::Full`]
/// - `dedup_capacity`: 1000 entries
/// - `dedup_ttl`: 300 milliseconds
/// - `ack_queue_capacity`: 64
/// - `suppress_echo`: enabled
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LinkConfig {
    /// Bound on a single read window or write.
    pub io_timeout: Duration,
    /// How long one attempt waits for its response.
    pub wait_timeout: Duration,
    /// Attempts made per call, the first included.
    pub retry_count: u32,
    /// Pause between attempts.
    pub retry_delay: Duration,
    /// Capacity of the inbound delivery queue.
    pub max_inbound_frames: usize,
    pub duplex: DuplexMode,
    /// Entries kept by each duplicate window.
    pub dedup_capacity: usize,
    /// How long a frame is remembered for duplicate and echo detection.
    pub dedup_ttl: Duration,
    /// Acknowledgements buffered for the writer task.
    pub ack_queue_capacity: usize,
    /// Ignore inbound copies of frames this link just wrote.
    pub suppress_echo: bool,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            io_timeout: Duration::from_secs(1),
            wait_timeout: Duration::from_secs(3),
            retry_count: 3,
            retry_delay: Duration::from_millis(100),
            max_inbound_frames: 1000,
            duplex: DuplexMode::Full,
            dedup_capacity: 1000,
            dedup_ttl: Duration::from_millis(300),
            ack_queue_capacity: 64,
            suppress_echo: true,
        }
    }
}

impl LinkConfig {
    #[must_use]
    pub fn with_io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_retry_count(mut self, attempts: u32) -> Self {
        self.retry_count = attempts;
        self
    }

    #[must_use]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    #[must_use]
    pub fn with_max_inbound_frames(mut self, capacity: usize) -> Self {
        self.max_inbound_frames = capacity;
        self
    }

    #[must_use]
    pub fn with_duplex(mut self, duplex: DuplexMode) -> Self {
        self.duplex = duplex;
        self
    }

    #[must_use]
    pub fn with_dedup_window(mut self, capacity: usize, ttl: Duration) -> Self {
        self.dedup_capacity = capacity;
        self.dedup_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_ack_queue_capacity(mut self, capacity: usize) -> Self {
        self.ack_queue_capacity = capacity;
        self
    }

    #[must_use]
    pub fn with_echo_suppression(mut self, enabled: bool) -> Self {
        self.suppress_echo = enabled;
        self
    }

    /// Clamp values that would stall the link.
    ///
    /// Counts and capacities become at least one and timeouts at least one
    /// millisecond.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    ///
    /// use station_link::link::LinkConfig;
    ///
    /// let cfg = LinkConfig::default()
    ///     .with_retry_count(0)
    ///     .with_wait_timeout(Duration::ZERO)
    ///     .normalized();
    /// assert_eq!(cfg.retry_count, 1);
    /// assert_eq!(cfg.wait_timeout, Duration::from_millis(1));
    /// ```
    #[must_use]
    pub fn normalized(mut self) -> Self {
        let floor = Duration::from_millis(1);
        self.io_timeout = self.io_timeout.max(floor);
        self.wait_timeout = self.wait_timeout.max(floor);
        self.retry_count = self.retry_count.max(1);
        self.max_inbound_frames = self.max_inbound_frames.max(1);
        self.dedup_capacity = self.dedup_capacity.max(1);
        self.ack_queue_capacity = self.ack_queue_capacity.max(1);
        self
    }
}

/// Physical serial port the link is opened on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SerialSettings {
    /// Platform port name such as `/dev/ttyUSB0` or `COM3`.
    pub port: String,
    pub baud_rate: u32,
}

impl SerialSettings {
    /// Baud rate used by the transceiver firmware.
    pub const DEFAULT_BAUD_RATE: u32 = 115_200;

    #[must_use]
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            baud_rate: Self::DEFAULT_BAUD_RATE,
        }
    }

    #[must_use]
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }
}
