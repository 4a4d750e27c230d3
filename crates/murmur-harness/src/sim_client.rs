//! Scenario client driving a Session against a [`SimServer`].
//!
//! `SimClient` is the synchronous counterpart of [`murmur_client::Runtime`]:
//! it executes the same [`SessionAction`]s, but the test decides when inbound
//! events are pumped and when timers tick. Every step is checked against an
//! optional [`InvariantRegistry`].

use std::{
    collections::VecDeque,
    sync::{MutexGuard, PoisonError},
};

use murmur_core::{
    GatewayEvent, Session, SessionAction, SessionConfig, SessionError, SessionSnapshot,
    env::Environment,
};
use murmur_proto::{ClientCommand, ServerEvent};
use tokio::sync::mpsc::error::TryRecvError;

use crate::{
    InvariantRegistry, SharedSimServer, SimEnv, SimInstant, SimServer, Violation,
    sim_server::{ConnectionId, Inbox},
};

/// Simulated chat client.
pub struct SimClient {
    env: SimEnv,
    server: SharedSimServer,
    session: Session<SimInstant>,
    connection: Option<ConnectionId>,
    inbox: Option<Inbox>,
    invariants: Option<InvariantRegistry>,
    /// Snapshot after the previous step, for transition invariants.
    last: SessionSnapshot,
    violations: Vec<Violation>,
    /// Commands handed to the server, in order.
    sent: Vec<ClientCommand>,
}

impl SimClient {
    /// Create a disconnected client with default timers.
    pub fn new(env: SimEnv, server: SharedSimServer) -> Self {
        Self::with_config(env, server, SessionConfig::default())
    }

    /// Create a disconnected client with custom timers.
    pub fn with_config(env: SimEnv, server: SharedSimServer, config: SessionConfig) -> Self {
        let session = Session::new(config);
        let last = session.snapshot();
        Self {
            env,
            server,
            session,
            connection: None,
            inbox: None,
            invariants: None,
            last,
            violations: Vec::new(),
            sent: Vec::new(),
        }
    }

    /// Check `registry` after every step.
    #[must_use]
    pub fn with_invariants(mut self, registry: InvariantRegistry) -> Self {
        self.invariants = Some(registry);
        self
    }

    /// Connect as `username`.
    pub fn connect(&mut self, username: &str) -> Result<(), SessionError> {
        let actions = self.session.connect(username, self.env.now())?;
        self.execute(actions);
        Ok(())
    }

    /// Send a chat message.
    pub fn send_message(&mut self, text: &str) -> Result<(), SessionError> {
        let actions = self.session.send_message(text)?;
        self.execute(actions);
        Ok(())
    }

    /// Report local typing activity.
    pub fn set_typing(&mut self, is_typing: bool) {
        let actions = self.session.set_typing(is_typing, self.env.now());
        self.execute(actions);
    }

    /// Disconnect at the user's request.
    pub fn disconnect(&mut self) {
        let actions = self.session.disconnect();
        self.execute(actions);
    }

    /// End the session and reset its state.
    pub fn teardown(&mut self) {
        let actions = self.session.teardown();
        self.execute(actions);
    }

    /// Fire any timers that are due at the current virtual time.
    pub fn tick(&mut self) {
        let actions = self.session.tick(self.env.now());
        self.execute(actions);
    }

    /// Apply every event the server has queued for this client.
    ///
    /// A closed connection is reported to the session as a disconnect.
    /// Returns the number of events applied.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        loop {
            let Some(inbox) = self.inbox.as_mut() else {
                return applied;
            };

            let event = match inbox.try_recv() {
                Ok(bytes) => match ServerEvent::decode(&bytes) {
                    Ok(event) => GatewayEvent::Server(event),
                    Err(e) => {
                        tracing::warn!(error = %e, "dropping undecodable event");
                        continue;
                    },
                },
                Err(TryRecvError::Empty) => return applied,
                Err(TryRecvError::Disconnected) => {
                    self.inbox = None;
                    self.connection = None;
                    GatewayEvent::Disconnected { reason: Some("connection closed".to_string()) }
                },
            };

            applied += 1;
            let actions = self.session.handle(event, self.env.now());
            self.execute(actions);
        }
    }

    /// Underlying session.
    pub fn session(&self) -> &Session<SimInstant> {
        &self.session
    }

    /// Current observable state.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.session.snapshot()
    }

    /// Server-side id of the open connection.
    pub fn connection(&self) -> Option<ConnectionId> {
        self.connection
    }

    /// Commands this client handed to the server.
    pub fn sent(&self) -> &[ClientCommand] {
        &self.sent
    }

    /// Invariant violations observed so far.
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    fn server(&self) -> MutexGuard<'_, SimServer> {
        self.server.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn execute(&mut self, actions: Vec<SessionAction>) {
        let mut pending = VecDeque::from(actions);

        while let Some(action) = pending.pop_front() {
            match action {
                SessionAction::Render => {},
                SessionAction::Connect { username } => {
                    let (id, inbox) = self.server().connect();
                    self.connection = Some(id);
                    self.inbox = Some(inbox);
                    self.transmit(ClientCommand::Join { username });
                    pending.extend(self.session.handle(GatewayEvent::Connected, self.env.now()));
                },
                SessionAction::Send(command) => self.transmit(command),
                SessionAction::Disconnect { reason } => {
                    tracing::debug!(%reason, "closing connection");
                    self.inbox = None;
                    if let Some(id) = self.connection.take() {
                        self.server().close(id);
                    }
                },
            }
        }

        self.observe();
    }

    fn transmit(&mut self, command: ClientCommand) {
        let Some(id) = self.connection else {
            tracing::debug!(?command, "dropping send without a connection");
            return;
        };
        match command.encode() {
            Ok(bytes) => {
                self.server().receive(id, &bytes);
                self.sent.push(command);
            },
            Err(e) => tracing::warn!(error = %e, "failed to encode command"),
        }
    }

    fn observe(&mut self) {
        let current = self.session.snapshot();
        if let Some(registry) = &self.invariants
            && let Err(found) = registry.check_all(&self.last, &current)
        {
            for violation in &found {
                tracing::error!(%violation, "invariant violated");
            }
            self.violations.extend(found);
        }
        self.last = current;
    }
}
