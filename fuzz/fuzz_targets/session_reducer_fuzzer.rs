//! Fuzz target for the Session reducer
//!
//! Drives a session with an arbitrary interleaving of server pushes,
//! lifecycle events, local actions and clock advances.
//!
//! # Invariants
//!
//! - The reducer NEVER panics
//! - The local user is NEVER listed as typing
//! - Disconnected sessions show no roster, no typists and no armed timers
//! - The message log only grows while the identity is unchanged
//! - Every typing user is in the roster while connected

#![no_main]

use std::time::{Duration, Instant};

use arbitrary::Arbitrary;
use chrono::DateTime;
use libfuzzer_sys::fuzz_target;
use murmur_core::{
    ConnectionStatus, GatewayEvent, RosterUpdate, ServerEvent, Session, User,
};

const NAMES: [&str; 4] = ["alice", "bob", "carol", ""];

#[derive(Debug, Clone, Arbitrary)]
enum Input {
    Connect { name: u8 },
    Connected,
    Disconnected,
    Message { name: u8, body: String },
    System { text: String },
    Joined { id: u8, name: u8 },
    Left { id: u8 },
    Typing { name: u8, is_typing: bool },
    LocalTyping(bool),
    Send(String),
    Disconnect,
    Teardown,
    Advance { millis: u16 },
}

fn name(n: u8) -> String {
    NAMES[n as usize % NAMES.len()].to_string()
}

fuzz_target!(|inputs: Vec<Input>| {
    let mut now = Instant::now();
    let mut session: Session = Session::default();

    for input in inputs {
        let before = session.snapshot();

        match input {
            Input::Connect { name: n } => {
                let _ = session.connect(&name(n), now);
            },
            Input::Connected => {
                session.handle(GatewayEvent::Connected, now);
            },
            Input::Disconnected => {
                session.handle(GatewayEvent::Disconnected { reason: None }, now);
            },
            Input::Message { name: n, body } => {
                let event =
                    ServerEvent::Message { sender: name(n), body, timestamp: DateTime::default() };
                session.handle(event.into(), now);
            },
            Input::System { text } => {
                let event = ServerEvent::System { text, timestamp: DateTime::default() };
                session.handle(event.into(), now);
            },
            Input::Joined { id, name: n } => {
                let user = User::new(id.to_string().as_str(), name(n));
                session.handle(ServerEvent::Roster(RosterUpdate::Joined(user)).into(), now);
            },
            Input::Left { id } => {
                let event = ServerEvent::Roster(RosterUpdate::Left { id: id.to_string().as_str().into() });
                session.handle(event.into(), now);
            },
            Input::Typing { name: n, is_typing } => {
                session.handle(ServerEvent::Typing { username: name(n), is_typing }.into(), now);
            },
            Input::LocalTyping(on) => {
                session.set_typing(on, now);
            },
            Input::Send(text) => {
                let _ = session.send_message(&text);
            },
            Input::Disconnect => {
                session.disconnect();
            },
            Input::Teardown => {
                session.teardown();
            },
            Input::Advance { millis } => {
                now += Duration::from_millis(u64::from(millis));
                session.tick(now);
            },
        }

        let after = session.snapshot();

        if let Some(me) = after.username.as_deref() {
            assert!(!after.typing_users.iter().any(|n| n == me), "self listed as typing");
            assert!(after.messages.starts_with(&before.messages), "log rewritten");
        }

        if after.status == ConnectionStatus::Disconnected {
            assert!(after.users.is_empty());
            assert!(after.typing_users.is_empty());
            assert!(!session.is_typing());
            assert_eq!(session.next_deadline(now), None);
        } else {
            for typist in &after.typing_users {
                assert!(session.users().contains_username(typist), "typist not in roster");
            }
        }
    }
});
