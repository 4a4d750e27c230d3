//! Generic runtime for session orchestration.
//!
//! The Runtime drives the session event loop, coordinating between:
//! - [`SessionHandle`]: user intent from the view layer
//! - [`Session`]: the Sans-IO synchronization core
//! - [`Gateway`]: the realtime transport
//!
//! It is the single serialization point: view commands, gateway events, and
//! timer expiries are reduced one at a time, in the order the loop picks them.

use std::{collections::VecDeque, time::Duration};

use murmur_core::{
    GatewayEvent, Session, SessionAction, SessionConfig, SessionSnapshot, env::Environment,
};
use tokio::sync::{mpsc, oneshot, watch};

use crate::{
    Gateway, SessionHandle,
    handle::Command,
};

/// Capacity of the handle-to-runtime command channel.
pub const DEFAULT_COMMAND_CAPACITY: usize = 64;

/// Runtime configuration
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Session timers
    pub session: SessionConfig,
    /// Pending view commands before handles start waiting
    pub command_capacity: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self { session: SessionConfig::default(), command_capacity: DEFAULT_COMMAND_CAPACITY }
    }
}

/// Generic runtime that owns a Session and drives it against a Gateway.
///
/// # Type Parameters
///
/// - `G`: Transport gateway
/// - `E`: Environment providing time
pub struct Runtime<G, E>
where
    G: Gateway,
    E: Environment,
{
    gateway: G,
    env: E,
    session: Session<E::Instant>,
    commands: mpsc::Receiver<Command>,
    snapshots: watch::Sender<SessionSnapshot>,
    /// Gateway link is open and `recv` should be polled.
    link_up: bool,
    /// Shutdown requested; the loop exits after the current reaction.
    stopping: bool,
}

impl<G, E> Runtime<G, E>
where
    G: Gateway,
    E: Environment,
{
    /// Create a runtime and the handle the view uses to drive it.
    pub fn new(gateway: G, env: E, config: RuntimeConfig) -> (Self, SessionHandle) {
        let (command_tx, commands) = mpsc::channel(config.command_capacity.max(1));
        let session = Session::new(config.session);
        let (snapshots, snapshot_rx) = watch::channel(session.snapshot());

        let runtime =
            Self { gateway, env, session, commands, snapshots, link_up: false, stopping: false };
        (runtime, SessionHandle::new(command_tx, snapshot_rx))
    }

    /// Run the event loop until shutdown or until every handle is dropped.
    ///
    /// Each iteration waits for whichever comes first:
    /// 1. A command from a [`SessionHandle`]
    /// 2. An inbound gateway event (only while the link is up)
    /// 3. The session's next timer deadline
    ///
    /// On exit the session is torn down, which cancels every timer and closes
    /// the gateway.
    pub async fn run(mut self) {
        while !self.stopping {
            let deadline = self.session.next_deadline(self.env.now());
            let env = self.env.clone();
            let timer = async move {
                match deadline {
                    Some(remaining) => env.sleep(remaining).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown) | None => self.stopping = true,
                    Some(command) => self.handle_command(command).await,
                },
                event = self.gateway.recv(), if self.link_up => {
                    let event = event.unwrap_or_else(|| GatewayEvent::Disconnected {
                        reason: Some("gateway closed".to_string()),
                    });
                    self.dispatch(event).await;
                },
                () = timer => {
                    let actions = self.session.tick(self.env.now());
                    self.execute(actions).await;
                },
            }
        }

        let actions = self.session.teardown();
        self.execute(actions).await;
        self.close().await;
        tracing::debug!("runtime stopped");
    }

    /// Current session state.
    pub fn session(&self) -> &Session<E::Instant> {
        &self.session
    }

    async fn handle_command(&mut self, command: Command) {
        let now = self.env.now();
        match command {
            Command::Connect { username, reply } => {
                let result = self.session.connect(&username, now);
                let (actions, outcome) = split(result);
                let _ = reply.send(outcome);
                self.execute(actions).await;
            },
            Command::SendMessage { text, reply } => {
                let result = self.session.send_message(&text);
                let (actions, outcome) = split(result);
                let _ = reply.send(outcome);
                self.execute(actions).await;
            },
            Command::SetTyping { is_typing } => {
                let actions = self.session.set_typing(is_typing, now);
                self.execute(actions).await;
            },
            Command::Disconnect { reply } => {
                let actions = self.session.disconnect();
                self.execute(actions).await;
                let _ = reply.send(());
            },
            Command::Shutdown => self.stopping = true,
        }
    }

    async fn dispatch(&mut self, event: GatewayEvent) {
        if matches!(event, GatewayEvent::Disconnected { .. }) {
            self.link_up = false;
        }
        let actions = self.session.handle(event, self.env.now());
        self.execute(actions).await;
    }

    /// Execute session actions, feeding transport outcomes back into the
    /// session until it is quiescent.
    async fn execute(&mut self, actions: Vec<SessionAction>) {
        let mut pending = VecDeque::from(actions);
        let mut render = false;
        let mut disconnected = Vec::new();

        while let Some(action) = pending.pop_front() {
            match action {
                SessionAction::Render => render = true,
                SessionAction::Connect { username } => {
                    // The view sees Connecting while the gateway works.
                    self.publish();
                    let event = match self.open(&username).await {
                        Opened::Up => {
                            self.link_up = true;
                            GatewayEvent::Connected
                        },
                        Opened::Failed(reason) => {
                            self.gateway.disconnect().await;
                            GatewayEvent::Disconnected { reason: Some(reason) }
                        },
                        Opened::Cancelled(reply) => {
                            tracing::info!("connect cancelled");
                            self.gateway.disconnect().await;
                            pending.extend(self.session.disconnect());
                            disconnected.push(reply);
                            continue;
                        },
                        Opened::Shutdown => {
                            self.gateway.disconnect().await;
                            self.stopping = true;
                            continue;
                        },
                    };
                    pending.extend(self.session.handle(event, self.env.now()));
                },
                SessionAction::Send(command) => {
                    if !self.link_up {
                        tracing::debug!(?command, "dropping send without a link");
                        continue;
                    }
                    if let Err(e) = self.gateway.send(command).await {
                        tracing::warn!(error = %e, "send failed, dropping connection");
                        self.close().await;
                        let event = GatewayEvent::Disconnected { reason: Some(e.to_string()) };
                        pending.extend(self.session.handle(event, self.env.now()));
                    }
                },
                SessionAction::Disconnect { reason } => {
                    tracing::debug!(%reason, "closing gateway");
                    self.close().await;
                },
            }
        }

        if render {
            self.publish();
        }
        for reply in disconnected {
            let _ = reply.send(());
        }
    }

    /// Connect the gateway, bounded by the session's connect timeout.
    ///
    /// Handle commands keep being served while the attempt is pending. The
    /// session is Connecting, so they are answered without touching the
    /// gateway; a disconnect or shutdown abandons the attempt.
    async fn open(&mut self, username: &str) -> Opened {
        let timeout: Duration = self.session.config().connect_timeout;
        let env = self.env.clone();
        let expiry = env.sleep(timeout);
        let connect = self.gateway.connect(username);
        tokio::pin!(expiry, connect);

        loop {
            tokio::select! {
                result = &mut connect => {
                    return match result {
                        Ok(()) => Opened::Up,
                        Err(e) => {
                            tracing::warn!(error = %e, "connect failed");
                            Opened::Failed(e.to_string())
                        },
                    };
                },
                () = &mut expiry => {
                    tracing::warn!(?timeout, "connect timed out");
                    return Opened::Failed("connect timeout".to_string());
                },
                command = self.commands.recv() => {
                    let now = self.env.now();
                    match command {
                        Some(Command::Shutdown) | None => return Opened::Shutdown,
                        Some(Command::Disconnect { reply }) => return Opened::Cancelled(reply),
                        Some(Command::Connect { username, reply }) => {
                            let _ = reply.send(self.session.connect(&username, now).map(drop));
                        },
                        Some(Command::SendMessage { text, reply }) => {
                            let _ = reply.send(self.session.send_message(&text).map(drop));
                        },
                        Some(Command::SetTyping { is_typing }) => {
                            self.session.set_typing(is_typing, now);
                        },
                    }
                },
            }
        }
    }

    async fn close(&mut self) {
        if self.link_up {
            self.link_up = false;
            self.gateway.disconnect().await;
        }
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.session.snapshot());
    }
}

/// How a gateway connect attempt ended.
enum Opened {
    Up,
    Failed(String),
    /// The user disconnected while the attempt was pending.
    Cancelled(oneshot::Sender<()>),
    Shutdown,
}

/// Separate actions from the reply sent back to the handle.
fn split(
    result: Result<Vec<SessionAction>, murmur_core::SessionError>,
) -> (Vec<SessionAction>, Result<(), murmur_core::SessionError>) {
    match result {
        Ok(actions) => (actions, Ok(())),
        Err(e) => (vec![], Err(e)),
    }
}
