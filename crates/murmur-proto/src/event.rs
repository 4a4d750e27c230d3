//! Server-to-client events.
//!
//! The roster contract is incremental and keyed by [`UserId`]: a joining
//! client first receives one [`RosterUpdate::Joined`] per member already in
//! the room (itself included), followed by live joins and leaves.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Result, decode_cbor, encode_cbor};

/// Server-assigned user identifier, stable and unique within the room.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    /// Identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// A user present in the room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Server-assigned identifier.
    pub id: UserId,
    /// Room-unique display name.
    pub username: String,
}

impl User {
    /// Create a user entry.
    pub fn new(id: impl Into<UserId>, username: impl Into<String>) -> Self {
        Self { id: id.into(), username: username.into() }
    }
}

/// Incremental change to the room roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RosterUpdate {
    /// A user entered the room (or was already present when we joined).
    Joined(User),
    /// A user left the room.
    Left {
        /// Identifier of the departed user.
        id: UserId,
    },
}

/// Events pushed by the room server.
///
/// Connection lifecycle (connected, disconnected) is a property of the
/// transport, not of the wire, and is therefore not represented here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerEvent {
    /// A chat message posted by a user (including our own, echoed back).
    Message {
        /// Display name of the author.
        sender: String,
        /// Message text.
        body: String,
        /// Server timestamp (ISO-8601 / RFC 3339 on the wire).
        timestamp: DateTime<Utc>,
    },

    /// A room-wide notice not attributable to any user.
    System {
        /// Notice text, e.g. "alice joined the chat".
        text: String,
        /// Server timestamp.
        timestamp: DateTime<Utc>,
    },

    /// Presence change.
    Roster(RosterUpdate),

    /// Another user's typing state changed.
    Typing {
        /// Display name of the user.
        username: String,
        /// Whether they are currently composing.
        is_typing: bool,
    },
}

impl ServerEvent {
    /// Short name of the event kind, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Message { .. } => "message",
            Self::System { .. } => "system",
            Self::Roster(_) => "roster_update",
            Self::Typing { .. } => "typing_update",
        }
    }

    /// Encode as a CBOR document.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::CborEncode` if serialization fails
    pub fn encode(&self) -> Result<Vec<u8>> {
        encode_cbor(self)
    }

    /// Decode from a CBOR document.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::EventTooLarge` if `bytes` exceeds the size limit
    /// - `ProtocolError::CborDecode` if the bytes are not a valid event
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        decode_cbor(bytes)
    }
}
