//! Inbound events delivered by the connection gateway.

use murmur_proto::ServerEvent;

/// One inbound event from the gateway.
///
/// Lifecycle transitions come from the transport itself; everything else is a
/// decoded server push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayEvent {
    /// Transport connection established and the join was sent.
    Connected,

    /// Connection attempt failed or an established connection dropped.
    Disconnected {
        /// Human-readable cause, if known.
        reason: Option<String>,
    },

    /// Server push.
    Server(ServerEvent),
}

impl From<ServerEvent> for GatewayEvent {
    fn from(event: ServerEvent) -> Self {
        Self::Server(event)
    }
}
