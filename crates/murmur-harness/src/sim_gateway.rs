//! Gateway over a shared [`SimServer`].
//!
//! Lets the production [`murmur_client::Runtime`] run against the simulated
//! room without any network.

use std::sync::PoisonError;

use murmur_client::{Gateway, GatewayError};
use murmur_core::{GatewayEvent, env::Environment};
use murmur_proto::{ClientCommand, ServerEvent};

use crate::{
    SharedSimServer, SimEnv,
    sim_server::{ConnectionId, Inbox},
};

/// Simulated realtime transport.
pub struct SimGateway<E: Environment = SimEnv> {
    server: SharedSimServer<E>,
    connection: Option<ConnectionId>,
    inbox: Option<Inbox>,
}

impl<E: Environment> SimGateway<E> {
    /// Create a gateway that connects to `server`.
    pub fn new(server: SharedSimServer<E>) -> Self {
        Self { server, connection: None, inbox: None }
    }

    /// Server-side id of the open connection.
    pub fn connection(&self) -> Option<ConnectionId> {
        self.connection
    }

    fn transmit(&self, command: &ClientCommand) -> Result<(), GatewayError> {
        let id = self.connection.ok_or(GatewayError::Closed)?;
        let bytes = command.encode()?;
        let accepted =
            self.server.lock().unwrap_or_else(PoisonError::into_inner).receive(id, &bytes);
        if accepted { Ok(()) } else { Err(GatewayError::Closed) }
    }

    fn close(&mut self) {
        self.inbox = None;
        if let Some(id) = self.connection.take() {
            self.server.lock().unwrap_or_else(PoisonError::into_inner).close(id);
        }
    }
}

impl<E: Environment> Gateway for SimGateway<E> {
    type Error = GatewayError;

    async fn connect(&mut self, username: &str) -> Result<(), Self::Error> {
        self.close();
        let (id, inbox) = self.server.lock().unwrap_or_else(PoisonError::into_inner).connect();
        self.connection = Some(id);
        self.inbox = Some(inbox);

        let result = self.transmit(&ClientCommand::Join { username: username.to_string() });
        if result.is_err() {
            self.close();
        }
        result
    }

    async fn send(&mut self, command: ClientCommand) -> Result<(), Self::Error> {
        self.transmit(&command)
    }

    async fn recv(&mut self) -> Option<GatewayEvent> {
        let inbox = self.inbox.as_mut()?;
        loop {
            let bytes = inbox.recv().await?;
            match ServerEvent::decode(&bytes) {
                Ok(event) => return Some(GatewayEvent::Server(event)),
                Err(e) => tracing::warn!(error = %e, "dropping undecodable event"),
            }
        }
    }

    async fn disconnect(&mut self) {
        self.close();
    }
}
