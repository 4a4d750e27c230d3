//! Session state machine.
//!
//! Owns the connection lifecycle, message log, roster, and typing state for a
//! single chat session. Uses the action pattern: methods take time as input
//! and return [`SessionAction`]s for the driver to execute.
//!
//! # State Machine
//!
//! ```text
//!                connect()            Connected
//! ┌──────────────┐ ───────> ┌────────────┐ ───────> ┌───────────┐
//! │ Disconnected │          │ Connecting │          │ Connected │
//! └──────────────┘ <─────── └────────────┘          └───────────┘
//!        ^        timeout/Disconnected                    │
//!        └────────────────────────────────────────────────┘
//!                   Disconnected / disconnect()
//! ```
//!
//! # Invariants
//!
//! - The message log is append-only: one entry per inbound message or system
//!   event, in arrival order, until teardown.
//! - The roster holds at most one entry per user id.
//! - The visible typing set never contains the local user.
//! - No timer is armed while disconnected.

use std::{
    collections::BTreeSet,
    ops::Sub,
    time::{Duration, Instant},
};

use murmur_proto::{ClientCommand, RosterUpdate, ServerEvent, User};

use crate::{
    GatewayEvent, SessionAction, SessionError,
    state::{ConnectionStatus, Message, Roster, Sender, SessionSnapshot, visible_typing},
    typing::TypingTimer,
};

/// Inactivity window after which the local typing signal clears itself.
pub const DEFAULT_TYPING_TIMEOUT: Duration = Duration::from_secs(3);

/// Time allowed between `connect` and the gateway reporting success.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Session configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Typing signal expiry after the last keystroke
    pub typing_timeout: Duration,
    /// Timeout for the connection attempt
    pub connect_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { typing_timeout: DEFAULT_TYPING_TIMEOUT, connect_timeout: DEFAULT_CONNECT_TIMEOUT }
    }
}

/// Client-side chat session.
///
/// This is a pure state machine with no I/O. Generic over `Instant` to support
/// both real time and virtual time for deterministic testing.
#[derive(Debug, Clone)]
pub struct Session<I = Instant>
where
    I: Copy + Ord + Send + Sync + Sub<Output = Duration>,
{
    config: SessionConfig,
    status: ConnectionStatus,
    /// Local identity, fixed at the first connect until teardown.
    username: Option<String>,
    messages: Vec<Message>,
    roster: Roster,
    /// Remote users typing, by display name.
    typing_users: BTreeSet<String>,
    typing: TypingTimer<I>,
    /// When the current connection attempt started. `None` unless Connecting.
    connecting_since: Option<I>,
}

impl<I> Session<I>
where
    I: Copy + Ord + Send + Sync + Sub<Output = Duration>,
{
    /// Create a disconnected session with no identity.
    pub fn new(config: SessionConfig) -> Self {
        let typing = TypingTimer::new(config.typing_timeout);
        Self {
            config,
            status: ConnectionStatus::Disconnected,
            username: None,
            messages: Vec::new(),
            roster: Roster::new(),
            typing_users: BTreeSet::new(),
            typing,
            connecting_since: None,
        }
    }

    /// Start connecting as `username`.
    ///
    /// Leading and trailing whitespace is trimmed. The identity is fixed by the
    /// first successful call and a later reconnect must use the same name.
    ///
    /// # Errors
    ///
    /// - `SessionError::Validation` if `username` is blank
    /// - `SessionError::AlreadyActive` if connecting or connected
    /// - `SessionError::IdentityLocked` if a different identity is set
    pub fn connect(&mut self, username: &str, now: I) -> Result<Vec<SessionAction>, SessionError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(SessionError::Validation { field: "username" });
        }

        if self.status != ConnectionStatus::Disconnected {
            return Err(SessionError::AlreadyActive);
        }

        if let Some(current) = &self.username
            && current != username
        {
            return Err(SessionError::IdentityLocked { current: current.clone() });
        }

        tracing::info!(%username, "connecting");

        self.username = Some(username.to_string());
        self.status = ConnectionStatus::Connecting;
        self.connecting_since = Some(now);

        Ok(vec![SessionAction::Connect { username: username.to_string() }, SessionAction::Render])
    }

    /// Send a chat message.
    ///
    /// The log is not touched: the message appears when the server echoes it
    /// back. Sending also ends the local typing signal.
    ///
    /// # Errors
    ///
    /// - `SessionError::Validation` if `text` is blank
    /// - `SessionError::NotConnected` if not connected
    pub fn send_message(&mut self, text: &str) -> Result<Vec<SessionAction>, SessionError> {
        if text.trim().is_empty() {
            return Err(SessionError::Validation { field: "message" });
        }

        if self.status != ConnectionStatus::Connected {
            return Err(SessionError::NotConnected);
        }

        let mut actions =
            vec![SessionAction::Send(ClientCommand::Message { body: text.to_string() })];
        if self.typing.stop() {
            actions.push(SessionAction::Send(ClientCommand::Typing { is_typing: false }));
        }

        Ok(actions)
    }

    /// Report local typing activity.
    ///
    /// `true` starts the signal or re-arms its expiry window; `false` stops
    /// it. Ignored unless connected.
    pub fn set_typing(&mut self, is_typing: bool, now: I) -> Vec<SessionAction> {
        if self.status != ConnectionStatus::Connected {
            return vec![];
        }

        let changed = if is_typing { self.typing.start(now) } else { self.typing.stop() };
        if changed {
            vec![SessionAction::Send(ClientCommand::Typing { is_typing })]
        } else {
            vec![]
        }
    }

    /// Apply one inbound gateway event.
    ///
    /// Malformed or stale events are logged and ignored; they never fail the
    /// session.
    pub fn handle(&mut self, event: GatewayEvent, _now: I) -> Vec<SessionAction> {
        match event {
            GatewayEvent::Connected => self.handle_connected(),
            GatewayEvent::Disconnected { reason } => {
                if self.status == ConnectionStatus::Disconnected {
                    return vec![];
                }
                tracing::info!(reason = reason.as_deref().unwrap_or("unknown"), "disconnected");
                self.drop_connection();
                vec![SessionAction::Render]
            },
            GatewayEvent::Server(event) => {
                if self.status == ConnectionStatus::Disconnected {
                    tracing::debug!(kind = event.kind(), "ignoring event while disconnected");
                    return vec![];
                }
                if self.apply(event) { vec![SessionAction::Render] } else { vec![] }
            },
        }
    }

    /// Process expired timers.
    ///
    /// Call when [`Session::next_deadline`] elapses.
    pub fn tick(&mut self, now: I) -> Vec<SessionAction> {
        let mut actions = Vec::new();

        if let Some(since) = self.connecting_since
            && now - since >= self.config.connect_timeout
        {
            tracing::warn!(timeout = ?self.config.connect_timeout, "connect timed out");
            self.drop_connection();
            actions.push(SessionAction::Disconnect { reason: "connect timeout".to_string() });
            actions.push(SessionAction::Render);
            return actions;
        }

        if self.typing.expire(now) {
            tracing::debug!("typing signal expired");
            actions.push(SessionAction::Send(ClientCommand::Typing { is_typing: false }));
        }

        actions
    }

    /// Time until the next timer fires. `None` if no timer is armed.
    pub fn next_deadline(&self, now: I) -> Option<Duration> {
        let connect = self
            .connecting_since
            .map(|since| self.config.connect_timeout.saturating_sub(now - since));
        let typing = self.typing.remaining(now);

        match (connect, typing) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Close the connection at the user's request.
    ///
    /// Keeps identity and history so the user can reconnect.
    pub fn disconnect(&mut self) -> Vec<SessionAction> {
        if self.status == ConnectionStatus::Disconnected {
            return vec![];
        }

        let mut actions = Vec::new();
        if self.status == ConnectionStatus::Connected {
            if self.typing.stop() {
                actions.push(SessionAction::Send(ClientCommand::Typing { is_typing: false }));
            }
            actions.push(SessionAction::Send(ClientCommand::Leave));
        }

        tracing::info!("disconnecting");
        self.drop_connection();

        actions.push(SessionAction::Disconnect { reason: "user disconnect".to_string() });
        actions.push(SessionAction::Render);
        actions
    }

    /// End the session: disconnect if needed and reset all state.
    pub fn teardown(&mut self) -> Vec<SessionAction> {
        let mut actions = self.disconnect();
        let had_state = self.username.is_some() || !self.messages.is_empty();

        self.username = None;
        self.messages.clear();
        self.roster.clear();
        self.typing_users.clear();
        self.typing.cancel();
        self.connecting_since = None;

        if had_state && !actions.contains(&SessionAction::Render) {
            actions.push(SessionAction::Render);
        }
        tracing::info!("session torn down");
        actions
    }

    /// Connection status.
    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    /// Local identity. `None` before the first connect or after teardown.
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Message log in arrival order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Current roster.
    pub fn users(&self) -> &Roster {
        &self.roster
    }

    /// Other users currently typing, ordered by name.
    pub fn typing_users(&self) -> impl Iterator<Item = &str> {
        let me = self.username.as_deref();
        self.typing_users.iter().map(String::as_str).filter(move |name| Some(*name) != me)
    }

    /// True while the local typing signal is on.
    pub fn is_typing(&self) -> bool {
        self.typing.is_typing()
    }

    /// Session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Copy of the observable state for renderers.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            status: self.status,
            username: self.username.clone(),
            messages: self.messages.clone(),
            users: self.roster.iter().cloned().collect(),
            typing_users: visible_typing(&self.typing_users, self.username.as_deref()),
        }
    }

    fn handle_connected(&mut self) -> Vec<SessionAction> {
        if self.status != ConnectionStatus::Connecting {
            tracing::debug!(status = ?self.status, "ignoring unexpected connected event");
            return vec![];
        }

        tracing::info!(username = self.username.as_deref().unwrap_or_default(), "connected");
        self.status = ConnectionStatus::Connected;
        self.connecting_since = None;
        vec![SessionAction::Render]
    }

    /// Reset presence after the connection is gone. History and identity stay.
    fn drop_connection(&mut self) {
        self.status = ConnectionStatus::Disconnected;
        self.connecting_since = None;
        self.roster.clear();
        self.typing_users.clear();
        self.typing.cancel();
    }

    /// Reduce a server push. Returns true if observable state changed.
    fn apply(&mut self, event: ServerEvent) -> bool {
        match event {
            ServerEvent::Message { sender, body, timestamp } => {
                self.typing_users.remove(&sender);
                self.messages.push(Message { sender: Sender::User(sender), body, timestamp });
                true
            },
            ServerEvent::System { text, timestamp } => {
                self.messages.push(Message { sender: Sender::System, body: text, timestamp });
                true
            },
            ServerEvent::Roster(RosterUpdate::Joined(user)) => self.apply_join(user),
            ServerEvent::Roster(RosterUpdate::Left { id }) => {
                let Some(user) = self.roster.remove(&id) else {
                    tracing::debug!(%id, "ignoring leave for unknown user");
                    return false;
                };
                if !self.roster.contains_username(&user.username) {
                    self.typing_users.remove(&user.username);
                }
                true
            },
            ServerEvent::Typing { username, is_typing: true } => {
                if self.username.as_deref() == Some(username.as_str()) {
                    return false;
                }
                if !self.roster.contains_username(&username) {
                    tracing::debug!(%username, "ignoring typing for user not in roster");
                    return false;
                }
                self.typing_users.insert(username)
            },
            ServerEvent::Typing { username, is_typing: false } => {
                self.typing_users.remove(&username)
            },
        }
    }

    fn apply_join(&mut self, user: User) -> bool {
        if user.id.as_str().is_empty() || user.username.trim().is_empty() {
            tracing::debug!(?user, "ignoring malformed roster entry");
            return false;
        }

        let replaced = self.roster.upsert(user);
        if let Some(previous) = replaced
            && !self.roster.contains_username(&previous.username)
        {
            self.typing_users.remove(&previous.username);
        }
        true
    }
}

impl<I> Default for Session<I>
where
    I: Copy + Ord + Send + Sync + Sub<Output = Duration>,
{
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use chrono::{DateTime, Utc};

    use super::*;

    fn message(sender: &str, body: &str) -> GatewayEvent {
        GatewayEvent::Server(ServerEvent::Message {
            sender: sender.into(),
            body: body.into(),
            timestamp: DateTime::<Utc>::default(),
        })
    }

    fn joined(id: &str, username: &str) -> GatewayEvent {
        GatewayEvent::Server(ServerEvent::Roster(RosterUpdate::Joined(User::new(id, username))))
    }

    fn typing(username: &str, is_typing: bool) -> GatewayEvent {
        GatewayEvent::Server(ServerEvent::Typing { username: username.into(), is_typing })
    }

    fn connected_session(t0: Instant) -> Session {
        let mut session = Session::default();
        session.connect("me", t0).unwrap();
        session.handle(GatewayEvent::Connected, t0);
        session
    }

    #[test]
    fn connect_trims_and_requests_connection() {
        let t0 = Instant::now();
        let mut session: Session = Session::default();

        let actions = session.connect("  alice ", t0).unwrap();

        assert_eq!(actions, vec![
            SessionAction::Connect { username: "alice".into() },
            SessionAction::Render
        ]);
        assert_eq!(session.status(), ConnectionStatus::Connecting);
        assert_eq!(session.username(), Some("alice"));
    }

    #[test]
    fn blank_username_rejected_without_side_effects() {
        let t0 = Instant::now();
        let mut session: Session = Session::default();

        for name in ["", "   ", "\t\n"] {
            let result = session.connect(name, t0);
            assert_eq!(result, Err(SessionError::Validation { field: "username" }));
        }
        assert_eq!(session.status(), ConnectionStatus::Disconnected);
        assert_eq!(session.username(), None);
    }

    #[test]
    fn second_connect_rejected_while_active() {
        let t0 = Instant::now();
        let mut session: Session = Session::default();
        session.connect("alice", t0).unwrap();

        assert_eq!(session.connect("alice", t0), Err(SessionError::AlreadyActive));
        session.handle(GatewayEvent::Connected, t0);
        assert_eq!(session.connect("alice", t0), Err(SessionError::AlreadyActive));
    }

    #[test]
    fn reconnect_requires_same_identity() {
        let t0 = Instant::now();
        let mut session = connected_session(t0);
        session.handle(GatewayEvent::Disconnected { reason: None }, t0);

        assert_eq!(
            session.connect("someone-else", t0),
            Err(SessionError::IdentityLocked { current: "me".into() })
        );
        assert!(session.connect("me", t0).is_ok());
    }

    #[test]
    fn send_message_does_not_echo_locally() {
        let t0 = Instant::now();
        let mut session = connected_session(t0);

        let actions = session.send_message("hello").unwrap();

        assert_eq!(actions, vec![SessionAction::Send(ClientCommand::Message {
            body: "hello".into()
        })]);
        assert!(session.messages().is_empty());
    }

    #[test]
    fn send_message_validates_before_connection_check() {
        let mut session: Session = Session::default();
        assert_eq!(session.send_message("  "), Err(SessionError::Validation { field: "message" }));
        assert_eq!(session.send_message("hi"), Err(SessionError::NotConnected));
    }

    #[test]
    fn send_message_stops_typing() {
        let t0 = Instant::now();
        let mut session = connected_session(t0);
        session.set_typing(true, t0);

        let actions = session.send_message("done").unwrap();

        assert_eq!(actions, vec![
            SessionAction::Send(ClientCommand::Message { body: "done".into() }),
            SessionAction::Send(ClientCommand::Typing { is_typing: false }),
        ]);
        assert!(!session.is_typing());
    }

    #[test]
    fn set_typing_ignored_when_not_connected() {
        let t0 = Instant::now();
        let mut session: Session = Session::default();
        assert!(session.set_typing(true, t0).is_empty());

        session.connect("me", t0).unwrap();
        assert!(session.set_typing(true, t0).is_empty());
        assert!(!session.is_typing());
    }

    #[test]
    fn set_typing_debounces_start_signal() {
        let t0 = Instant::now();
        let mut session = connected_session(t0);

        assert_eq!(session.set_typing(true, t0), vec![SessionAction::Send(
            ClientCommand::Typing { is_typing: true }
        )]);
        assert!(session.set_typing(true, t0 + Duration::from_millis(200)).is_empty());
        assert!(session.set_typing(false, t0 + Duration::from_millis(300)).len() == 1);
        assert!(session.set_typing(false, t0 + Duration::from_millis(400)).is_empty());
    }

    #[test]
    fn typing_expires_after_timeout() {
        let t0 = Instant::now();
        let mut session = connected_session(t0);
        session.set_typing(true, t0);

        assert_eq!(session.next_deadline(t0), Some(DEFAULT_TYPING_TIMEOUT));
        assert!(session.tick(t0 + Duration::from_secs(2)).is_empty());

        let actions = session.tick(t0 + DEFAULT_TYPING_TIMEOUT);
        assert_eq!(actions, vec![SessionAction::Send(ClientCommand::Typing { is_typing: false })]);
        assert_eq!(session.next_deadline(t0 + DEFAULT_TYPING_TIMEOUT), None);
    }

    #[test]
    fn message_clears_sender_typing() {
        let t0 = Instant::now();
        let mut session = connected_session(t0);
        session.handle(joined("1", "alice"), t0);
        session.handle(typing("alice", true), t0);
        assert_eq!(session.typing_users().collect::<Vec<_>>(), ["alice"]);

        session.handle(message("alice", "hi"), t0);

        assert_eq!(session.typing_users().count(), 0);
        assert_eq!(session.messages().len(), 1);
        assert_eq!(session.messages()[0].sender_name(), Some("alice"));
    }

    #[test]
    fn disconnected_clears_presence() {
        let t0 = Instant::now();
        let mut session = connected_session(t0);
        session.handle(joined("2", "bob"), t0);
        session.handle(typing("bob", true), t0);
        session.handle(message("bob", "hi"), t0);
        session.handle(typing("bob", true), t0);
        session.set_typing(true, t0);

        let actions = session.handle(GatewayEvent::Disconnected { reason: None }, t0);

        assert_eq!(actions, vec![SessionAction::Render]);
        assert_eq!(session.typing_users().count(), 0);
        assert!(session.users().is_empty());
        assert!(!session.is_typing());
        assert_eq!(session.messages().len(), 1);
        assert_eq!(session.next_deadline(t0), None);
    }

    #[test]
    fn typing_for_unknown_user_ignored() {
        let t0 = Instant::now();
        let mut session = connected_session(t0);

        assert!(session.handle(typing("ghost", true), t0).is_empty());
        assert_eq!(session.typing_users().count(), 0);
    }

    #[test]
    fn own_typing_echo_ignored() {
        let t0 = Instant::now();
        let mut session = connected_session(t0);
        session.handle(joined("1", "me"), t0);

        session.handle(typing("me", true), t0);
        assert_eq!(session.typing_users().count(), 0);
    }

    #[test]
    fn typing_stop_for_absent_user_is_noop() {
        let t0 = Instant::now();
        let mut session = connected_session(t0);
        session.handle(joined("1", "alice"), t0);

        assert!(session.handle(typing("alice", false), t0).is_empty());
        assert_eq!(session.typing_users().count(), 0);
    }

    #[test]
    fn leave_for_unknown_id_ignored() {
        let t0 = Instant::now();
        let mut session = connected_session(t0);
        session.handle(joined("1", "alice"), t0);

        let leave = GatewayEvent::Server(ServerEvent::Roster(RosterUpdate::Left { id: "9".into() }));
        assert!(session.handle(leave, t0).is_empty());
        assert_eq!(session.users().len(), 1);
    }

    #[test]
    fn leave_clears_departed_typing() {
        let t0 = Instant::now();
        let mut session = connected_session(t0);
        session.handle(joined("1", "alice"), t0);
        session.handle(typing("alice", true), t0);

        let leave = GatewayEvent::Server(ServerEvent::Roster(RosterUpdate::Left { id: "1".into() }));
        session.handle(leave, t0);

        assert!(session.users().is_empty());
        assert_eq!(session.typing_users().count(), 0);
    }

    #[test]
    fn malformed_join_ignored() {
        let t0 = Instant::now();
        let mut session = connected_session(t0);

        assert!(session.handle(joined("", "alice"), t0).is_empty());
        assert!(session.handle(joined("3", "  "), t0).is_empty());
        assert!(session.users().is_empty());
    }

    #[test]
    fn events_ignored_while_disconnected() {
        let t0 = Instant::now();
        let mut session: Session = Session::default();

        assert!(session.handle(message("alice", "hi"), t0).is_empty());
        assert!(session.handle(GatewayEvent::Connected, t0).is_empty());
        assert!(session.messages().is_empty());
        assert_eq!(session.status(), ConnectionStatus::Disconnected);
    }

    #[test]
    fn connect_timeout_drops_attempt() {
        let t0 = Instant::now();
        let mut session: Session = Session::default();
        session.connect("me", t0).unwrap();

        assert_eq!(session.next_deadline(t0), Some(DEFAULT_CONNECT_TIMEOUT));
        assert!(session.tick(t0 + Duration::from_secs(9)).is_empty());

        let actions = session.tick(t0 + DEFAULT_CONNECT_TIMEOUT);
        assert!(matches!(actions.as_slice(), [
            SessionAction::Disconnect { .. },
            SessionAction::Render
        ]));
        assert_eq!(session.status(), ConnectionStatus::Disconnected);

        // A late success report must not resurrect the attempt
        assert!(session.handle(GatewayEvent::Connected, t0 + DEFAULT_CONNECT_TIMEOUT).is_empty());
        assert_eq!(session.status(), ConnectionStatus::Disconnected);
    }

    #[test]
    fn user_disconnect_says_goodbye() {
        let t0 = Instant::now();
        let mut session = connected_session(t0);
        session.set_typing(true, t0);

        let actions = session.disconnect();

        assert!(matches!(actions.as_slice(), [
            SessionAction::Send(ClientCommand::Typing { is_typing: false }),
            SessionAction::Send(ClientCommand::Leave),
            SessionAction::Disconnect { .. },
            SessionAction::Render,
        ]));
        assert!(session.disconnect().is_empty());
    }

    #[test]
    fn teardown_resets_everything() {
        let t0 = Instant::now();
        let mut session = connected_session(t0);
        session.handle(joined("1", "alice"), t0);
        session.handle(message("alice", "hi"), t0);
        session.set_typing(true, t0);

        session.teardown();

        assert_eq!(session.status(), ConnectionStatus::Disconnected);
        assert_eq!(session.username(), None);
        assert!(session.messages().is_empty());
        assert!(session.users().is_empty());
        assert_eq!(session.next_deadline(t0), None);
        assert!(session.tick(t0 + Duration::from_secs(60)).is_empty());

        // Fresh identity is allowed after teardown
        assert!(session.connect("someone-else", t0).is_ok());
    }
}
