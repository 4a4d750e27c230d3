//! Error types for session operations.
//!
//! Only local, synchronous rejections live here. Connection loss is never an
//! error returned to a caller: it surfaces as
//! [`crate::ConnectionStatus::Disconnected`].

use thiserror::Error;

/// Errors returned by [`crate::Session`] actions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Input was empty after trimming whitespace.
    #[error("{field} must not be empty")]
    Validation {
        /// Which input was rejected ("username" or "message").
        field: &'static str,
    },

    /// `connect` called while connecting or connected.
    #[error("session already active")]
    AlreadyActive,

    /// `connect` called with a different name than the session identity.
    #[error("session identity is already {current:?}")]
    IdentityLocked {
        /// Identity fixed at the first connect.
        current: String,
    },

    /// Action requires an established connection.
    #[error("not connected")]
    NotConnected,

    /// The runtime driving the session has shut down.
    #[error("session runtime closed")]
    RuntimeClosed,
}

impl SessionError {
    /// Returns true if the caller supplied invalid input.
    ///
    /// Validation failures never reach the transport and never mutate state.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}
