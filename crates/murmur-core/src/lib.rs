//! Murmur synchronization core
//!
//! Client-side state manager for a realtime group chat: connection lifecycle,
//! the ordered message log, the live roster, and the typing indicator with its
//! expiry timer.
//!
//! # Architecture
//!
//! Everything here is Sans-IO. A [`Session`] receives inbound
//! [`GatewayEvent`]s and user intents, takes the current time as a parameter,
//! and returns [`SessionAction`]s for a driver to execute. Timers are plain
//! deadlines inside the state machine; the driver asks for
//! [`Session::next_deadline`] and calls [`Session::tick`] when it elapses.
//! Nothing can fire after the session is torn down because nothing is
//! scheduled outside of it.
//!
//! # Components
//!
//! - [`Session`]: the reducer and public action surface
//! - [`TypingTimer`]: local typing debounce/expiry state machine
//! - [`SessionSnapshot`]: read-only view model for renderers
//! - [`env::Environment`]: time and randomness abstraction for drivers

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod action;
pub mod env;
mod error;
mod event;
mod session;
mod state;
mod typing;

pub use action::SessionAction;
pub use error::SessionError;
pub use event::GatewayEvent;
pub use murmur_proto::{ClientCommand, RosterUpdate, ServerEvent, User, UserId};
pub use session::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_TYPING_TIMEOUT, Session, SessionConfig};
pub use state::{ConnectionStatus, Message, Roster, Sender, SessionSnapshot};
pub use typing::{TypingState, TypingTimer};
