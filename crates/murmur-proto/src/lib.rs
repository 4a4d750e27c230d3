//! Murmur wire protocol
//!
//! Typed messages exchanged between a chat client and the room server. The
//! transport carrying them is not specified here: any bidirectional realtime
//! channel that moves opaque byte frames will do.
//!
//! # Components
//!
//! - [`ClientCommand`]: client to server (join, message, typing, leave)
//! - [`ServerEvent`]: server to client pushes (message, system, roster, typing)
//! - [`RosterUpdate`]: incremental presence change keyed by [`UserId`]
//!
//! Each command or event is one self-describing CBOR document. See
//! [`ServerEvent::encode`] and [`ServerEvent::decode`].

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod command;
mod errors;
mod event;

pub use command::ClientCommand;
pub use errors::{ProtocolError, Result};
pub use event::{RosterUpdate, ServerEvent, User, UserId};

/// Maximum encoded size of a single command or event (64 KiB).
///
/// Checked before CBOR parsing starts so a hostile peer cannot make the
/// decoder chew through arbitrarily large input.
pub const MAX_EVENT_SIZE: usize = 64 * 1024;

/// Serialize any wire value as a CBOR document.
fn encode_cbor<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::ser::into_writer(value, &mut buf)
        .map_err(|e| ProtocolError::CborEncode(e.to_string()))?;
    Ok(buf)
}

/// Deserialize a wire value, enforcing [`MAX_EVENT_SIZE`] first.
fn decode_cbor<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    if bytes.len() > MAX_EVENT_SIZE {
        return Err(ProtocolError::EventTooLarge { size: bytes.len(), max: MAX_EVENT_SIZE });
    }

    ciborium::de::from_reader(bytes).map_err(|e| ProtocolError::CborDecode(e.to_string()))
}
