//! Multi-client scenarios against the simulated room.
//!
//! Every assertion is made from a peer's point of view: what bob's session
//! shows after alice's client acts and the virtual clock moves.

use std::time::Duration;

use murmur_core::{ConnectionStatus, Sender, SessionError, env::Environment};
use murmur_harness::{InvariantRegistry, SharedSimServer, SimClient, SimEnv, create_shared_server};
use murmur_proto::ClientCommand;

struct Room {
    env: SimEnv,
    server: SharedSimServer,
}

impl Room {
    fn new() -> Self {
        let env = SimEnv::with_seed(42);
        let server = create_shared_server(env.clone());
        Self { env, server }
    }

    fn client(&self) -> SimClient {
        SimClient::new(self.env.clone(), self.server.clone())
            .with_invariants(InvariantRegistry::standard())
    }

    fn join(&self, username: &str) -> SimClient {
        let mut client = self.client();
        client.connect(username).expect("valid username");
        client.pump();
        client
    }

    /// Advance the clock, then fire timers and deliver events on every client.
    fn step(&self, by: Duration, clients: &mut [&mut SimClient]) {
        self.env.advance(by);
        for client in &mut *clients {
            client.tick();
        }
        settle(clients);
    }
}

fn settle(clients: &mut [&mut SimClient]) {
    while clients.iter_mut().fold(0, |delivered, client| delivered + client.pump()) > 0 {}
}

fn assert_clean(clients: &[&SimClient]) {
    for client in clients {
        assert!(client.violations().is_empty(), "violations: {:?}", client.violations());
    }
}

#[test]
fn roster_converges_on_join() {
    let room = Room::new();
    let mut alice = room.join("alice");
    let mut bob = room.join("bob");
    settle(&mut [&mut alice, &mut bob]);

    for client in [&alice, &bob] {
        let names: Vec<_> = client.snapshot().users.into_iter().map(|u| u.username).collect();
        assert_eq!(names.len(), 2);
        assert!(names.contains(&"alice".to_string()));
        assert!(names.contains(&"bob".to_string()));
    }

    let notices: Vec<_> = alice
        .snapshot()
        .messages
        .into_iter()
        .filter_map(|m| m.is_system().then_some(m.body))
        .collect();
    assert_eq!(notices, ["alice joined the chat", "bob joined the chat"]);
    assert_clean(&[&alice, &bob]);
}

#[test]
fn typing_seen_by_peer_expires_after_timeout() {
    let room = Room::new();
    let mut alice = room.join("alice");
    let mut bob = room.join("bob");
    settle(&mut [&mut alice, &mut bob]);

    alice.set_typing(true);
    settle(&mut [&mut alice, &mut bob]);
    assert_eq!(bob.snapshot().typing_users, ["alice"]);
    assert!(alice.snapshot().typing_users.is_empty());

    room.step(Duration::from_millis(2999), &mut [&mut alice, &mut bob]);
    assert_eq!(bob.snapshot().typing_users, ["alice"]);

    room.step(Duration::from_millis(1), &mut [&mut alice, &mut bob]);
    assert!(bob.snapshot().typing_users.is_empty());
    assert_eq!(bob.snapshot().typing_label(), None);
    assert_clean(&[&alice, &bob]);
}

#[test]
fn repeated_keystrokes_keep_peer_indicator_alive() {
    let room = Room::new();
    let mut alice = room.join("alice");
    let mut bob = room.join("bob");
    settle(&mut [&mut alice, &mut bob]);

    alice.set_typing(true);
    room.step(Duration::from_secs(2), &mut [&mut alice, &mut bob]);
    alice.set_typing(true);
    room.step(Duration::from_secs(2), &mut [&mut alice, &mut bob]);
    assert_eq!(bob.snapshot().typing_users, ["alice"]);

    room.step(Duration::from_secs(1), &mut [&mut alice, &mut bob]);
    assert!(bob.snapshot().typing_users.is_empty());

    let signals: Vec<_> = alice
        .sent()
        .iter()
        .filter(|c| matches!(c, ClientCommand::Typing { .. }))
        .cloned()
        .collect();
    assert_eq!(signals, [
        ClientCommand::Typing { is_typing: true },
        ClientCommand::Typing { is_typing: false },
    ]);
    assert_clean(&[&alice, &bob]);
}

#[test]
fn message_clears_sender_typing() {
    let room = Room::new();
    let mut alice = room.join("alice");
    let mut bob = room.join("bob");
    settle(&mut [&mut alice, &mut bob]);

    alice.set_typing(true);
    settle(&mut [&mut alice, &mut bob]);
    assert_eq!(bob.snapshot().typing_users, ["alice"]);

    alice.send_message("hello").expect("connected");
    settle(&mut [&mut alice, &mut bob]);

    let snapshot = bob.snapshot();
    assert!(snapshot.typing_users.is_empty());
    let last = snapshot.messages.last().expect("message delivered");
    assert_eq!(last.sender, Sender::User("alice".into()));
    assert_eq!(last.body, "hello");
    assert!(!snapshot.is_own(last));

    let own = alice.snapshot();
    assert!(own.is_own(own.messages.last().expect("echoed")));
    assert_clean(&[&alice, &bob]);
}

#[test]
fn own_message_waits_for_echo() {
    let room = Room::new();
    let mut alice = room.join("alice");
    let before = alice.snapshot().messages.len();

    alice.send_message("  spaced  ").expect("connected");
    assert_eq!(alice.snapshot().messages.len(), before);

    alice.pump();
    assert_eq!(alice.snapshot().messages.len(), before + 1);
}

#[test]
fn blank_input_never_reaches_server() {
    let room = Room::new();
    let mut carol = room.client();

    assert_eq!(carol.connect("   "), Err(SessionError::Validation { field: "username" }));
    assert_eq!(carol.snapshot().status, ConnectionStatus::Disconnected);
    assert_eq!(room.server.lock().unwrap().connection_count(), 0);

    carol.connect("carol").expect("valid username");
    assert_eq!(carol.send_message(" \n\t"), Err(SessionError::Validation { field: "message" }));
    assert_eq!(carol.sent(), [ClientCommand::Join { username: "carol".into() }]);
}

#[test]
fn departure_clears_peer_presence() {
    let room = Room::new();
    let mut alice = room.join("alice");
    let mut bob = room.join("bob");
    settle(&mut [&mut alice, &mut bob]);

    alice.set_typing(true);
    settle(&mut [&mut alice, &mut bob]);

    alice.disconnect();
    settle(&mut [&mut alice, &mut bob]);

    let snapshot = bob.snapshot();
    assert!(snapshot.typing_users.is_empty());
    assert_eq!(snapshot.user_count(), 1);
    assert_eq!(
        snapshot.messages.last().map(|m| m.body.as_str()),
        Some("alice left the chat")
    );

    let own = alice.snapshot();
    assert_eq!(own.status, ConnectionStatus::Disconnected);
    assert_eq!(own.username.as_deref(), Some("alice"));
    assert!(!own.messages.is_empty());
    assert_clean(&[&alice, &bob]);
}

#[test]
fn server_hangup_clears_presence_and_timers() {
    let room = Room::new();
    let mut alice = room.join("alice");
    let mut bob = room.join("bob");
    settle(&mut [&mut alice, &mut bob]);

    bob.set_typing(true);
    alice.set_typing(true);
    settle(&mut [&mut alice, &mut bob]);
    assert_eq!(alice.snapshot().typing_users, ["bob"]);

    let id = alice.connection().expect("connected");
    room.server.lock().unwrap().close(id);
    alice.pump();

    let snapshot = alice.snapshot();
    assert_eq!(snapshot.status, ConnectionStatus::Disconnected);
    assert!(snapshot.typing_users.is_empty());
    assert!(snapshot.users.is_empty());
    assert!(!alice.session().is_typing());
    assert_eq!(alice.session().next_deadline(room.env.now()), None);
    assert_clean(&[&alice, &bob]);
}

#[test]
fn reconnect_keeps_history_and_identity() {
    let room = Room::new();
    let mut alice = room.join("alice");
    alice.send_message("first").expect("connected");
    alice.pump();
    alice.disconnect();
    let history = alice.snapshot().messages;

    assert!(matches!(alice.connect("mallory"), Err(SessionError::IdentityLocked { .. })));
    alice.connect("alice").expect("same identity");
    alice.pump();

    let snapshot = alice.snapshot();
    assert_eq!(snapshot.status, ConnectionStatus::Connected);
    assert!(snapshot.messages.starts_with(&history));
    assert_eq!(snapshot.user_count(), 1);
    assert_clean(&[&alice]);
}

#[test]
fn teardown_silences_timers() {
    let room = Room::new();
    let mut alice = room.join("alice");
    let mut bob = room.join("bob");
    settle(&mut [&mut alice, &mut bob]);

    alice.set_typing(true);
    alice.teardown();
    let sent = alice.sent().len();

    room.step(Duration::from_secs(10), &mut [&mut alice, &mut bob]);

    assert_eq!(alice.sent().len(), sent);
    assert_eq!(alice.snapshot().username, None);
    assert!(alice.snapshot().messages.is_empty());
    assert!(bob.snapshot().typing_users.is_empty());
    assert_eq!(bob.snapshot().user_count(), 1);
}
