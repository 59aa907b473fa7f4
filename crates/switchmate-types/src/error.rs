//! Error types for data parsing in switchmate-types.

use thiserror::Error;

/// Errors that can occur when decoding Switchmate characteristic values.
///
/// This error type is platform-agnostic and does not include
/// BLE-specific errors (those belong in switchmate-core).
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// The characteristic value carried no bytes.
    #[error("Empty characteristic value")]
    Empty,
}

/// Result type alias using switchmate-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display() {
        assert_eq!(ParseError::Empty.to_string(), "Empty characteristic value");
    }
}
