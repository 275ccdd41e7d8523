//! Error types for TSPV
//!
//! This module defines all error types used throughout the library.
//! None of them are fatal to the processor: decode failures are logged and
//! the offending packet is dropped.

use thiserror::Error;

/// Result type alias for TSPV operations
pub type Result<T> = std::result::Result<T, TspvError>;

/// Main error type for TSPV operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TspvError {
    /// Decoding error
    #[error("Decoding error: {0}")]
    Decode(#[from] DecodeError),

    /// Processor error
    #[error("Processor error: {0}")]
    Processor(#[from] ProcessorError),
}

/// Reasons a raw buffer could not be decoded into a packet
///
/// The display strings are the reasons carried by [`Packet::Invalid`]
/// and reported to the packet logger.
///
/// [`Packet::Invalid`]: crate::protocol::Packet::Invalid
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// No buffer was supplied at all
    #[error("packet missing")]
    MissingPacket,

    /// Buffer length differs from the configured packet length
    #[error("invalid length {actual} should be {expected}")]
    LengthMismatch { actual: usize, expected: usize },
}

/// Errors raised by the run loop and its push channel
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessorError {
    /// The receiving side of the push channel is gone
    #[error("Push channel disconnected")]
    Disconnected,

    /// The processor thread could not be started
    #[error("Failed to spawn processor thread: {0}")]
    Spawn(String),

    /// The processor thread panicked before it could be joined
    #[error("Processor thread panicked")]
    WorkerPanicked,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DecodeError::LengthMismatch {
            actual: 19,
            expected: 20,
        };
        assert_eq!(err.to_string(), "invalid length 19 should be 20");
        assert_eq!(DecodeError::MissingPacket.to_string(), "packet missing");
    }

    #[test]
    fn test_error_conversion() {
        let tspv_err: TspvError = DecodeError::MissingPacket.into();
        assert!(matches!(tspv_err, TspvError::Decode(_)));

        let tspv_err: TspvError = ProcessorError::Disconnected.into();
        let msg = format!("{}", tspv_err);
        assert!(msg.contains("disconnected"));
    }
}
