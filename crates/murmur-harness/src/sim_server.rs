//! In-process single-room chat server for simulation tests.
//!
//! `SimServer` speaks the real wire protocol: commands arrive as encoded
//! CBOR and every event leaves encoded on a per-connection queue. Delivery is
//! immediate and ordered, so a scenario is fully determined by the order in
//! which tests drive clients.

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};

use murmur_core::env::Environment;
use murmur_proto::{ClientCommand, RosterUpdate, ServerEvent, User, UserId};
use tokio::sync::mpsc;

use crate::SimEnv;

/// Server-side connection identifier.
pub type ConnectionId = u64;

/// Receiving end of a connection's event queue.
pub type Inbox = mpsc::UnboundedReceiver<Vec<u8>>;

struct Connection {
    outbox: mpsc::UnboundedSender<Vec<u8>>,
    /// Set once the connection has joined the room.
    user: Option<User>,
}

/// Simulated room server.
///
/// - Assigns each joiner an id from the environment RNG
/// - Sends a joiner the full roster, itself included
/// - Echoes messages to every member, the sender included
/// - Relays typing to every member except the sender
/// - Announces joins and leaves with system notices
///
/// Usernames are unique in the room. A join with a taken name closes that
/// connection.
pub struct SimServer<E: Environment = SimEnv> {
    env: E,
    connections: BTreeMap<ConnectionId, Connection>,
    next_connection: ConnectionId,
    /// Every decoded command, in arrival order.
    received: Vec<(ConnectionId, ClientCommand)>,
}

impl<E: Environment> SimServer<E> {
    /// Create an empty room.
    pub fn new(env: E) -> Self {
        Self { env, connections: BTreeMap::new(), next_connection: 1, received: Vec::new() }
    }

    /// Accept a transport connection. Nothing is delivered until it joins.
    pub fn connect(&mut self) -> (ConnectionId, Inbox) {
        let id = self.next_connection;
        self.next_connection += 1;

        let (outbox, inbox) = mpsc::unbounded_channel();
        self.connections.insert(id, Connection { outbox, user: None });
        tracing::debug!(connection = id, "connection accepted");
        (id, inbox)
    }

    /// Process an encoded command from `connection`.
    ///
    /// Returns `false` if the connection is unknown or already closed.
    pub fn receive(&mut self, connection: ConnectionId, bytes: &[u8]) -> bool {
        if !self.connections.contains_key(&connection) {
            return false;
        }

        match ClientCommand::decode(bytes) {
            Ok(command) => {
                self.received.push((connection, command.clone()));
                self.apply(connection, command);
            },
            Err(e) => tracing::warn!(connection, error = %e, "dropping undecodable command"),
        }
        true
    }

    /// Close a connection from the server side.
    ///
    /// A joined member leaves the room first. The client sees its event stream
    /// end.
    pub fn close(&mut self, connection: ConnectionId) {
        self.leave(connection);
        if self.connections.remove(&connection).is_some() {
            tracing::debug!(connection, "connection closed");
        }
    }

    /// Users currently in the room, in join order.
    pub fn members(&self) -> Vec<User> {
        self.connections.values().filter_map(|c| c.user.clone()).collect()
    }

    /// Open connections, joined or not.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Every command received so far.
    pub fn received(&self) -> &[(ConnectionId, ClientCommand)] {
        &self.received
    }

    fn apply(&mut self, connection: ConnectionId, command: ClientCommand) {
        match command {
            ClientCommand::Join { username } => self.join(connection, &username),
            ClientCommand::Message { body } => {
                let Some(sender) = self.username_of(connection) else {
                    tracing::debug!(connection, "message before join");
                    return;
                };
                if body.trim().is_empty() {
                    tracing::debug!(connection, "ignoring blank message");
                    return;
                }
                let event = ServerEvent::Message { sender, body, timestamp: self.env.wall_clock() };
                self.broadcast(&event, None);
            },
            ClientCommand::Typing { is_typing } => {
                let Some(username) = self.username_of(connection) else {
                    return;
                };
                self.broadcast(&ServerEvent::Typing { username, is_typing }, Some(connection));
            },
            ClientCommand::Leave => self.leave(connection),
        }
    }

    fn join(&mut self, connection: ConnectionId, username: &str) {
        let username = username.trim();
        if username.is_empty() || self.username_of(connection).is_some() {
            tracing::debug!(connection, "ignoring invalid join");
            return;
        }
        if self.members().iter().any(|u| u.username == username) {
            tracing::warn!(connection, username, "username taken, closing connection");
            self.connections.remove(&connection);
            return;
        }

        let user = User::new(self.fresh_id(), username);
        let existing = self.members();
        if let Some(conn) = self.connections.get_mut(&connection) {
            conn.user = Some(user.clone());
        }
        tracing::info!(connection, username, id = %user.id, "joined");

        for member in existing {
            self.send(connection, &ServerEvent::Roster(RosterUpdate::Joined(member)));
        }
        self.broadcast(&ServerEvent::Roster(RosterUpdate::Joined(user)), None);
        let notice = self.notice(format!("{username} joined the chat"));
        self.broadcast(&notice, None);
    }

    fn leave(&mut self, connection: ConnectionId) {
        let Some(user) = self.connections.get_mut(&connection).and_then(|c| c.user.take()) else {
            return;
        };
        tracing::info!(connection, username = %user.username, "left");

        self.broadcast(&ServerEvent::Roster(RosterUpdate::Left { id: user.id }), None);
        let notice = self.notice(format!("{} left the chat", user.username));
        self.broadcast(&notice, None);
        self.broadcast(&ServerEvent::Typing { username: user.username, is_typing: false }, None);
    }

    fn notice(&self, text: String) -> ServerEvent {
        ServerEvent::System { text, timestamp: self.env.wall_clock() }
    }

    fn username_of(&self, connection: ConnectionId) -> Option<String> {
        self.connections.get(&connection)?.user.as_ref().map(|u| u.username.clone())
    }

    fn fresh_id(&self) -> UserId {
        loop {
            let id = UserId(format!("{:016x}", self.env.random_u64()));
            if !self.members().iter().any(|u| u.id == id) {
                return id;
            }
        }
    }

    /// Deliver to every joined connection, optionally skipping one.
    ///
    /// Members whose inbox is gone are closed afterwards, which announces
    /// their departure to everyone still listening.
    fn broadcast(&mut self, event: &ServerEvent, except: Option<ConnectionId>) {
        let targets: Vec<ConnectionId> = self
            .connections
            .iter()
            .filter(|(id, c)| c.user.is_some() && Some(**id) != except)
            .map(|(id, _)| *id)
            .collect();

        let dead: Vec<ConnectionId> =
            targets.into_iter().filter(|target| !self.send(*target, event)).collect();
        for connection in dead {
            tracing::debug!(connection, "inbox dropped");
            self.close(connection);
        }
    }

    /// Returns `false` if the client dropped its inbox.
    fn send(&self, connection: ConnectionId, event: &ServerEvent) -> bool {
        let bytes = match event.encode() {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(kind = event.kind(), error = %e, "failed to encode event");
                return true;
            },
        };

        self.connections.get(&connection).is_none_or(|c| c.outbox.send(bytes).is_ok())
    }
}

impl<E: Environment> std::fmt::Debug for SimServer<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimServer")
            .field("connections", &self.connections.len())
            .field("members", &self.members())
            .finish_non_exhaustive()
    }
}

/// Server shared between simulated clients and gateways.
pub type SharedSimServer<E = SimEnv> = Arc<Mutex<SimServer<E>>>;

/// Create a shared server for testing.
pub fn create_shared_server<E: Environment>(env: E) -> SharedSimServer<E> {
    Arc::new(Mutex::new(SimServer::new(env)))
}
