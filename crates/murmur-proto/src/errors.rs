//! Protocol error types.

use thiserror::Error;

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors produced while encoding or decoding wire messages.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Encoded message exceeds [`crate::MAX_EVENT_SIZE`].
    #[error("event too large: {size} bytes (max {max})")]
    EventTooLarge {
        /// Actual size in bytes
        size: usize,
        /// Maximum allowed size
        max: usize,
    },

    /// CBOR serialization failed
    #[error("CBOR encode failed: {0}")]
    CborEncode(String),

    /// CBOR deserialization failed (truncated, corrupt, or unknown variant)
    #[error("CBOR decode failed: {0}")]
    CborDecode(String),
}
