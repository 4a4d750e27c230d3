//! Side effects requested by the session.
//!
//! This module defines [`SessionAction`], the instructions produced by
//! [`crate::Session`] for the driver to execute against the gateway and view.

use murmur_proto::ClientCommand;

/// Actions produced by the Session state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Open the transport and join as `username`.
    Connect {
        /// Trimmed session identity.
        username: String,
    },

    /// Transmit a command to the server.
    Send(ClientCommand),

    /// Close the transport.
    Disconnect {
        /// Why the session is closing the connection.
        reason: String,
    },

    /// Observable state changed; republish the snapshot.
    Render,
}
