//! Client-to-server commands.

use serde::{Deserialize, Serialize};

use crate::{Result, decode_cbor, encode_cbor};

/// Commands a client sends to the room server.
///
/// None of these are acknowledged. The client learns the outcome only from
/// subsequent [`crate::ServerEvent`]s (e.g. a sent message shows up when the
/// server echoes it back).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientCommand {
    /// Associate this connection with a display name.
    Join {
        /// Room-unique display name.
        username: String,
    },

    /// Post a chat message to the room.
    Message {
        /// Message text as typed by the user.
        body: String,
    },

    /// Local typing state changed.
    Typing {
        /// `true` when the user started composing, `false` when they stopped.
        is_typing: bool,
    },

    /// Graceful goodbye before the transport is closed.
    Leave,
}

impl ClientCommand {
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
    /// - `ProtocolError::CborDecode` if the bytes are not a valid command
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        decode_cbor(bytes)
    }
}
