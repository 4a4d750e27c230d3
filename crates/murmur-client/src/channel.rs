//! Gateway over a pair of byte channels.
//!
//! Adapts any transport task that moves encoded frames through
//! `tokio::sync::mpsc` channels: a socket reader/writer pair, a bridge to a
//! browser WebSocket, or an in-process test server. Encoding and decoding of
//! [`ClientCommand`] and [`ServerEvent`] happen here.

use std::future::Future;

use murmur_core::GatewayEvent;
use murmur_proto::{ClientCommand, ServerEvent};
use tokio::sync::mpsc;

use crate::{Gateway, GatewayError};

/// One established transport connection as a channel pair.
#[derive(Debug)]
pub struct ChannelLink {
    /// Encoded commands towards the server.
    pub to_server: mpsc::Sender<Vec<u8>>,
    /// Encoded events from the server. Closing it ends the connection.
    pub from_server: mpsc::Receiver<Vec<u8>>,
}

/// Opens a fresh [`ChannelLink`] for every connection attempt.
///
/// Implemented for any `FnMut() -> impl Future<Output = Result<ChannelLink,
/// GatewayError>>`, so a closure that dials the server is enough.
pub trait Connector: Send {
    /// Establish a new connection.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Refused`] if the server rejects the attempt,
    /// or any other gateway error if the transport cannot be opened.
    fn open(&mut self) -> impl Future<Output = Result<ChannelLink, GatewayError>> + Send;
}

impl<F, Fut> Connector for F
where
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = Result<ChannelLink, GatewayError>> + Send,
{
    fn open(&mut self) -> impl Future<Output = Result<ChannelLink, GatewayError>> + Send {
        (*self)()
    }
}

/// Reconnectable gateway over channel links.
///
/// Each `connect` drops the previous link and opens a new one through the
/// [`Connector`].
pub struct ChannelGateway<C> {
    connector: C,
    link: Option<ChannelLink>,
}

impl<C: Connector> ChannelGateway<C> {
    /// Gateway that dials through `connector`. Starts disconnected.
    pub fn new(connector: C) -> Self {
        Self { connector, link: None }
    }

    async fn transmit(&mut self, command: &ClientCommand) -> Result<(), GatewayError> {
        let bytes = command.encode()?;
        let link = self.link.as_ref().ok_or(GatewayError::Closed)?;
        link.to_server.send(bytes).await.map_err(|_| GatewayError::Closed)
    }
}

impl<C: Connector> Gateway for ChannelGateway<C> {
    type Error = GatewayError;

    async fn connect(&mut self, username: &str) -> Result<(), Self::Error> {
        self.link = None;
        self.link = Some(self.connector.open().await?);

        let joined = self.transmit(&ClientCommand::Join { username: username.to_string() }).await;
        if joined.is_err() {
            self.link = None;
        }
        joined
    }

    async fn send(&mut self, command: ClientCommand) -> Result<(), Self::Error> {
        self.transmit(&command).await
    }

    async fn recv(&mut self) -> Option<GatewayEvent> {
        let link = self.link.as_mut()?;
        loop {
            let bytes = link.from_server.recv().await?;
            match ServerEvent::decode(&bytes) {
                Ok(event) => return Some(GatewayEvent::Server(event)),
                Err(e) => tracing::warn!(error = %e, "dropping undecodable frame"),
            }
        }
    }

    async fn disconnect(&mut self) {
        self.link = None;
    }
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;

    use super::*;

    /// Server ends of each link the gateway opens.
    type Accepted = mpsc::UnboundedReceiver<(mpsc::Receiver<Vec<u8>>, mpsc::Sender<Vec<u8>>)>;

    fn gateway() -> (ChannelGateway<impl Connector>, Accepted) {
        let (accept, accepted) = mpsc::unbounded_channel();
        let connector = move || {
            let (to_server, server_rx) = mpsc::channel(8);
            let (server_tx, from_server) = mpsc::channel(8);
            let result = accept
                .send((server_rx, server_tx))
                .map(|()| ChannelLink { to_server, from_server })
                .map_err(|_| GatewayError::Refused("listener gone".into()));
            std::future::ready(result)
        };
        (ChannelGateway::new(connector), accepted)
    }

    #[tokio::test]
    async fn connect_sends_join() {
        let (mut gateway, mut accepted) = gateway();

        gateway.connect("alice").await.unwrap();

        let (mut server_rx, _server_tx) = accepted.recv().await.unwrap();
        let bytes = server_rx.recv().await.unwrap();
        assert_eq!(ClientCommand::decode(&bytes).unwrap(), ClientCommand::Join {
            username: "alice".into()
        });
    }

    #[tokio::test]
    async fn recv_skips_garbage() {
        let (mut gateway, mut accepted) = gateway();
        gateway.connect("alice").await.unwrap();
        let (_server_rx, server_tx) = accepted.recv().await.unwrap();
        let event = ServerEvent::System { text: "hi".into(), timestamp: DateTime::default() };

        server_tx.send(vec![0xff, 0x00, 0x13]).await.unwrap();
        server_tx.send(event.encode().unwrap()).await.unwrap();

        assert_eq!(gateway.recv().await, Some(GatewayEvent::Server(event)));
    }

    #[tokio::test]
    async fn recv_ends_when_server_hangs_up() {
        let (mut gateway, mut accepted) = gateway();
        gateway.connect("alice").await.unwrap();
        drop(accepted.recv().await.unwrap());

        assert_eq!(gateway.recv().await, None);
    }

    #[tokio::test]
    async fn send_after_disconnect_fails() {
        let (mut gateway, _accepted) = gateway();
        gateway.connect("alice").await.unwrap();
        gateway.disconnect().await;

        let result = gateway.send(ClientCommand::Leave).await;
        assert!(matches!(result, Err(GatewayError::Closed)));
        assert_eq!(gateway.recv().await, None);
    }

    #[tokio::test]
    async fn reconnect_opens_fresh_link() {
        let (mut gateway, mut accepted) = gateway();
        gateway.connect("alice").await.unwrap();
        drop(accepted.recv().await.unwrap());
        assert_eq!(gateway.recv().await, None);

        gateway.connect("alice").await.unwrap();
        let (mut server_rx, _server_tx) = accepted.recv().await.unwrap();

        let bytes = server_rx.recv().await.unwrap();
        assert_eq!(ClientCommand::decode(&bytes).unwrap(), ClientCommand::Join {
            username: "alice".into()
        });
        gateway.send(ClientCommand::Leave).await.unwrap();
    }

    #[tokio::test]
    async fn refused_connect_leaves_gateway_closed() {
        let mut gateway = ChannelGateway::new(|| {
            std::future::ready(Err::<ChannelLink, _>(GatewayError::Refused("full".into())))
        });

        let result = gateway.connect("alice").await;

        assert!(matches!(result, Err(GatewayError::Refused(reason)) if reason == "full"));
        assert!(matches!(gateway.send(ClientCommand::Leave).await, Err(GatewayError::Closed)));
    }
}
