//! Observable session state types.
//!
//! These structures are the view model: the subset of session state a
//! renderer needs (status indicator, message list, sidebar, typing bubble).

use std::collections::{BTreeMap, BTreeSet, btree_map};

use chrono::{DateTime, Utc};
use murmur_proto::{User, UserId};

/// Connection status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    /// No connection. Initial state, and the state after any loss.
    #[default]
    Disconnected,
    /// Connect requested, waiting for the gateway to report success.
    Connecting,
    /// Connected and receiving room events.
    Connected,
}

/// Author of a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sender {
    /// A room member, by display name.
    User(String),
    /// Room-wide notice, not attributable to any user.
    System,
}

/// A message in the log. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Who wrote it.
    pub sender: Sender,
    /// Message text.
    pub body: String,
    /// Server timestamp.
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// True for system notices.
    pub fn is_system(&self) -> bool {
        self.sender == Sender::System
    }

    /// Display name of the author. `None` for system notices.
    pub fn sender_name(&self) -> Option<&str> {
        match &self.sender {
            Sender::User(name) => Some(name),
            Sender::System => None,
        }
    }
}

/// Live room roster keyed by user id.
///
/// Ordered by id so enumeration is stable between mutations. At most one
/// entry per id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Roster {
    users: BTreeMap<UserId, User>,
}

impl Roster {
    /// Empty roster.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry for `user.id`. Returns the replaced entry.
    pub fn upsert(&mut self, user: User) -> Option<User> {
        self.users.insert(user.id.clone(), user)
    }

    /// Remove the entry for `id`. `None` if it was not present.
    pub fn remove(&mut self, id: &UserId) -> Option<User> {
        self.users.remove(id)
    }

    /// True if any entry has this display name.
    pub fn contains_username(&self, username: &str) -> bool {
        self.users.values().any(|u| u.username == username)
    }

    /// Users ordered by id.
    pub fn iter(&self) -> btree_map::Values<'_, UserId, User> {
        self.users.values()
    }

    /// Number of users present.
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// True if nobody is present.
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.users.clear();
    }
}

impl<'a> IntoIterator for &'a Roster {
    type IntoIter = btree_map::Values<'a, UserId, User>;
    type Item = &'a User;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Read-only copy of everything a renderer needs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// Connection status.
    pub status: ConnectionStatus,
    /// Local identity. `None` before the first connect.
    pub username: Option<String>,
    /// Message log in arrival order.
    pub messages: Vec<Message>,
    /// Roster ordered by id.
    pub users: Vec<User>,
    /// Other users currently typing, ordered by name. Never contains the
    /// local user.
    pub typing_users: Vec<String>,
}

impl SessionSnapshot {
    /// True if `message` was written by the local user.
    pub fn is_own(&self, message: &Message) -> bool {
        match (&self.username, message.sender_name()) {
            (Some(me), Some(sender)) => me == sender,
            _ => false,
        }
    }

    /// True if `user` is the local user's roster entry.
    pub fn is_self(&self, user: &User) -> bool {
        self.username.as_deref() == Some(user.username.as_str())
    }

    /// Number of users present.
    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    /// Typing bubble text, e.g. "alice, bob is typing...". `None` if nobody
    /// is typing.
    pub fn typing_label(&self) -> Option<String> {
        if self.typing_users.is_empty() {
            return None;
        }
        Some(format!("{} is typing...", self.typing_users.join(", ")))
    }
}

/// Collect a typing set into snapshot order, excluding `me`.
pub(crate) fn visible_typing(typing: &BTreeSet<String>, me: Option<&str>) -> Vec<String> {
    typing.iter().filter(|name| Some(name.as_str()) != me).cloned().collect()
}
