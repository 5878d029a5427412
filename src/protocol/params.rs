//! Connection parameters and the renegotiation policy.
//!
//! Intervals and supervision timeouts are in controller units
//! (1.25 ms and 10 ms respectively).

use std::ops::RangeInclusive;

/// A set of LE connection parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionParams {
    /// Minimum connection interval.
    pub interval_min: u16,
    /// Maximum connection interval.
    pub interval_max: u16,
    /// Peripheral latency (connection events the peer may skip).
    pub latency: u16,
    /// Supervision timeout.
    pub supervision_timeout: u16,
}

impl ConnectionParams {
    /// Parameters requested when a link is first opened.
    pub const PREFERRED: Self = Self {
        interval_min: 12,
        interval_max: 12,
        latency: 0,
        supervision_timeout: 51,
    };
}

impl Default for ConnectionParams {
    fn default() -> Self {
        Self::PREFERRED
    }
}

/// Bounds a peer's renegotiation request must satisfy.
///
/// A rejected request leaves the existing connection untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamPolicy {
    /// Accepted connection interval range.
    pub interval: RangeInclusive<u16>,
    /// Highest accepted latency.
    pub max_latency: u16,
    /// Highest accepted supervision timeout.
    pub max_supervision_timeout: u16,
}

impl Default for ParamPolicy {
    fn default() -> Self {
        Self {
            interval: 24..=40,
            max_latency: 2,
            max_supervision_timeout: 100,
        }
    }
}

impl ParamPolicy {
    /// Returns true if a renegotiation request should be accepted.
    #[must_use]
    pub fn accepts(&self, params: &ConnectionParams) -> bool {
        params.interval_min >= *self.interval.start()
            && params.interval_max <= *self.interval.end()
            && params.latency <= self.max_latency
            && params.supervision_timeout <= self.max_supervision_timeout
    }
}
