//! Gateway trait for abstracting the realtime transport.
//!
//! The [`Gateway`] trait decouples the runtime from any specific transport.
//! A WebSocket client, a long-poll loop, or an in-process simulation all
//! satisfy it, while the generic [`crate::Runtime`] handles orchestration.

use std::future::Future;

use murmur_core::GatewayEvent;
use murmur_proto::{ClientCommand, ProtocolError};
use thiserror::Error;

/// Realtime transport capability.
///
/// # Contract
///
/// - `connect` resolves once the transport is up and the join for `username`
///   has been sent. The runtime treats `Ok` as the connected lifecycle event.
/// - `send` is fire-and-forget: `Ok` means handed to the transport, not
///   delivered.
/// - `recv` yields inbound events one at a time and returns `None` once the
///   connection is gone. It MUST be cancel-safe: the runtime polls it inside
///   `select!` and may drop the future before completion.
pub trait Gateway: Send {
    /// Transport-specific error type.
    type Error: std::error::Error + Send + 'static;

    /// Open the transport and join the room as `username`.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    fn connect(&mut self, username: &str) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Transmit a command to the server.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection is closed or the send fails.
    fn send(&mut self, command: ClientCommand)
    -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Next inbound event. `None` if the connection is closed.
    fn recv(&mut self) -> impl Future<Output = Option<GatewayEvent>> + Send;

    /// Close the transport. Must be safe to call when already closed.
    fn disconnect(&mut self) -> impl Future<Output = ()> + Send;
}

/// Errors from the bundled gateways.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The underlying channel or connection is closed.
    #[error("gateway closed")]
    Closed,

    /// A command could not be encoded.
    #[error("encode failed: {0}")]
    Encode(#[from] ProtocolError),

    /// The server refused the connection.
    #[error("connection refused: {0}")]
    Refused(String),
}
