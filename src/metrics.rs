//! Metric helpers for `station_link`.
//!
//! This module defines metric names and simple helper functions wrapping the
//! [`metrics`](https://docs.rs/metrics) crate. Without the `metrics` feature
//! every helper compiles to nothing.

#[cfg(feature = "metrics")]
use metrics::counter;

/// Name of the counter tracking frames written or read.
pub const FRAMES_TOTAL: &str = "station_link_frames_total";
/// Name of the counter tracking inbound frames dropped as duplicates.
pub const DUPLICATES_TOTAL: &str = "station_link_duplicates_total";
/// Name of the counter tracking discarded malformed frames.
pub const MALFORMED_TOTAL: &str = "station_link_malformed_frames_total";
/// Name of the counter tracking requests refused by the badge status guard.
pub const REJECTIONS_TOTAL: &str = "station_link_rejections_total";
/// Name of the counter tracking send retries.
pub const RETRIES_TOTAL: &str = "station_link_retries_total";
/// Name of the counter tracking transport faults.
pub const FAULTS_TOTAL: &str = "station_link_faults_total";

/// Direction of a frame relative to the base station.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Frames read from the badge.
    Inbound,
    /// Frames written to the badge.
    Outbound,
}

impl Direction {
    /// Label value used for this direction.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
        }
    }
}

/// Record a frame of `kind` in the given direction.
#[cfg_attr(not(feature = "metrics"), expect(unused_variables, reason = "metrics disabled"))]
pub fn inc_frames(direction: Direction, kind: &'static str) {
    #[cfg(feature = "metrics")]
    counter!(FRAMES_TOTAL, "direction" => direction.as_str(), "kind" => kind).increment(1);
}

/// Record an inbound frame suppressed as a duplicate or an echo.
#[cfg_attr(not(feature = "metrics"), expect(unused_variables, reason = "metrics disabled"))]
pub fn inc_duplicates(source: &'static str) {
    #[cfg(feature = "metrics")]
    counter!(DUPLICATES_TOTAL, "source" => source).increment(1);
}

/// Record a malformed frame discarded by the read loop.
#[cfg_attr(not(feature = "metrics"), expect(unused_variables, reason = "metrics disabled"))]
pub fn inc_malformed(error_type: &'static str) {
    #[cfg(feature = "metrics")]
    counter!(MALFORMED_TOTAL, "error_type" => error_type).increment(1);
}

/// Record a request refused locally.
#[cfg_attr(not(feature = "metrics"), expect(unused_variables, reason = "metrics disabled"))]
pub fn inc_rejections(kind: &'static str) {
    #[cfg(feature = "metrics")]
    counter!(REJECTIONS_TOTAL, "kind" => kind).increment(1);
}

/// Record one retried send attempt.
pub fn inc_retries() {
    #[cfg(feature = "metrics")]
    counter!(RETRIES_TOTAL).increment(1);
}

/// Record a transport fault.
pub fn inc_faults() {
    #[cfg(feature = "metrics")]
    counter!(FAULTS_TOTAL).increment(1);
}
