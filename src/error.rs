//! Error types for the lighthouse library.

use thiserror::Error;

/// The main error type for lighthouse operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Bluetooth stack error.
    #[error("bluetooth error: {0}")]
    Bluetooth(#[from] btleplug::Error),

    /// No Bluetooth adapter is available on this host.
    #[error("no bluetooth adapter found")]
    NoAdapter,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Identity index outside the configured registry.
    #[error("invalid target: index {index} is out of range (have {count} identities)")]
    InvalidTarget { index: usize, count: usize },

    /// A dispatch cycle is already in flight.
    #[error("a command is already in progress")]
    AlreadyBusy,

    /// The scan window closed without finding a single base station.
    #[error("no base stations found")]
    NoDevicesFound,

    /// At least one discovered base station did not accept the command.
    #[error("command failed on {failed} of {total} base stations")]
    DispatchFailed { failed: usize, total: usize },

    /// A required request parameter is missing.
    #[error("missing parameter: {name}")]
    MissingParameter { name: &'static str },

    /// A request parameter could not be parsed.
    #[error("invalid value {value:?} for parameter {name}")]
    InvalidParameter { name: &'static str, value: String },

    /// Invalid base station identifier.
    #[error("invalid identifier {value:?}: {reason}")]
    InvalidIdentifier { value: String, reason: String },

    /// Invalid link-layer address.
    #[error("invalid address {value:?}")]
    InvalidAddress { value: String },

    /// Invalid configuration.
    #[error("configuration error: {message}")]
    Config { message: String },

    /// Operation timed out.
    #[error("timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Channel receive error.
    #[error("channel closed")]
    ChannelClosed,
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::Config {
            message: err.to_string(),
        }
    }
}

impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Self::Config {
            message: err.to_string(),
        }
    }
}

/// Per-device failures.
///
/// These never abort a dispatch cycle. They are recorded in the device's
/// outcome and the cycle moves on to the next base station.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    /// All connection attempts failed.
    #[error("connection failed after {attempts} attempt(s)")]
    ConnectFailed { attempts: u32 },

    /// No free link slot for a new connection.
    #[error("link capacity of {capacity} saturated")]
    CapacitySaturated { capacity: usize },

    /// The generation-specific GATT service is missing.
    #[error("service not found")]
    ServiceNotFound,

    /// The power characteristic is missing from the service.
    #[error("characteristic not found")]
    CharacteristicNotFound,

    /// The power characteristic does not accept writes.
    #[error("characteristic not writable")]
    CharacteristicNotWritable,

    /// The write was rejected, failed or timed out.
    #[error("write failed: {reason}")]
    WriteFailed { reason: String },
}

/// Result type alias for lighthouse operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Converts a duration to whole milliseconds for error reporting.
pub(crate) fn millis(duration: std::time::Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
