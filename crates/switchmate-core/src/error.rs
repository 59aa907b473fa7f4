//! Error types for switchmate-core.
//!
//! This module defines all error types that can occur when driving a
//! Switchmate over Bluetooth Low Energy.
//!
//! # Error Taxonomy
//!
//! The driver never aborts on an error. Every failure degrades to a fault
//! flag on the affected characteristic and the aggregate warning, and the
//! next external trigger (poll tick, reconnect, user command) is the retry.
//!
//! | Error Type | Class | Recovered by |
//! |------------|-------|--------------|
//! | [`Error::NotConnected`] | link | the BLE stack reconnecting |
//! | [`Error::Bluetooth`] | link / operation | next poll or reconnect |
//! | [`Error::CharacteristicNotFound`] | discovery | a later discovery pass |
//! | [`Error::SubmitFailed`] | operation | next poll tick or command |
//! | [`Error::Timeout`] | operation | next poll tick or command |
//! | [`Error::InvalidData`] | operation | next poll tick |
//! | [`Error::DeviceNotFound`] | link | device in range, next reconnect |
//! | [`Error::InvalidConfig`] | setup | fix configuration and restart |

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur when driving a Switchmate.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Bluetooth Low Energy error.
    #[error("Bluetooth error: {0}")]
    Bluetooth(#[from] btleplug::Error),

    /// Device not found during scan or connection.
    #[error("Device not found: {0}")]
    DeviceNotFound(DeviceNotFoundReason),

    /// Operation attempted while the link is not established.
    #[error("Not connected to device")]
    NotConnected,

    /// Required BLE characteristic not found on device.
    #[error("Characteristic not found: {uuid} (searched in {service_count} services)")]
    CharacteristicNotFound {
        /// The UUID that was not found.
        uuid: String,
        /// Number of services that were searched.
        service_count: usize,
    },

    /// The BLE stack refused to accept a request.
    #[error("Failed to submit {operation}: {reason}")]
    SubmitFailed {
        /// The operation that was refused.
        operation: String,
        /// Why it was refused.
        reason: String,
    },

    /// Failed to parse data received from device.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Operation timed out.
    #[error("Operation '{operation}' timed out after {duration:?}")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// The timeout duration.
        duration: Duration,
    },

    /// Operation was cancelled, or the driver has shut down.
    #[error("Operation cancelled")]
    Cancelled,

    /// I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Reason why a device was not found.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new reasons
/// in future versions without breaking downstream code.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum DeviceNotFoundReason {
    /// Device with specified name/address not found.
    NotFound { identifier: String },
    /// No Bluetooth adapter available.
    NoAdapter,
}

impl std::fmt::Display for DeviceNotFoundReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { identifier } => write!(f, "device '{}' not found", identifier),
            Self::NoAdapter => write!(f, "no Bluetooth adapter available"),
        }
    }
}

impl Error {
    /// Create a device not found error for a specific identifier.
    pub fn device_not_found(identifier: impl Into<String>) -> Self {
        Self::DeviceNotFound(DeviceNotFoundReason::NotFound {
            identifier: identifier.into(),
        })
    }

    /// Create a timeout error with operation context.
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a characteristic not found error.
    pub fn characteristic_not_found(uuid: impl Into<String>, service_count: usize) -> Self {
        Self::CharacteristicNotFound {
            uuid: uuid.into(),
            service_count,
        }
    }

    /// Create a submission failure.
    pub fn submit_failed(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SubmitFailed {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Create a configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }
}

impl From<switchmate_types::ParseError> for Error {
    fn from(err: switchmate_types::ParseError) -> Self {
        Error::InvalidData(err.to_string())
    }
}

/// Result type alias using switchmate-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::device_not_found("Switchmate 1A2B");
        assert!(err.to_string().contains("Switchmate 1A2B"));

        let err = Error::NotConnected;
        assert_eq!(err.to_string(), "Not connected to device");

        let err = Error::characteristic_not_found("a22b0090", 3);
        assert!(err.to_string().contains("a22b0090"));
        assert!(err.to_string().contains("3 services"));

        let err = Error::submit_failed("read", "stack busy");
        assert_eq!(err.to_string(), "Failed to submit read: stack busy");

        let err = Error::timeout("write state", Duration::from_secs(5));
        assert!(err.to_string().contains("write state"));
        assert!(err.to_string().contains("5s"));
    }

    #[test]
    fn test_device_not_found_reasons() {
        let err = Error::DeviceNotFound(DeviceNotFoundReason::NoAdapter);
        assert!(err.to_string().contains("no Bluetooth adapter"));
    }

    #[test]
    fn test_parse_error_conversion() {
        let err: Error = switchmate_types::ParseError::Empty.into();
        assert!(matches!(err, Error::InvalidData(_)));
    }

    #[test]
    fn test_btleplug_error_conversion() {
        fn _assert_from_impl<T: From<btleplug::Error>>() {}
        _assert_from_impl::<Error>();
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
