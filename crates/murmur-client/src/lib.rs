//! Async runtime for the Murmur chat client.
//!
//! Drives a Sans-IO [`murmur_core::Session`] against a live [`Gateway`] and
//! exposes it to a view layer through a cloneable [`SessionHandle`].
//!
//! # Components
//!
//! - [`Gateway`]: Trait for the realtime transport capability
//! - [`ChannelGateway`]: Reconnectable gateway over byte channels opened by a
//!   [`Connector`]
//! - [`Runtime`]: Event loop and single serialization point for all state
//!   mutation
//! - [`SessionHandle`]: Actions and reactive snapshots for the view
//! - [`SystemEnv`]: Production environment on the tokio clock

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod channel;
mod gateway;
mod handle;
mod runtime;
mod system_env;

pub use channel::{ChannelGateway, ChannelLink, Connector};
pub use gateway::{Gateway, GatewayError};
pub use handle::SessionHandle;
pub use murmur_core::{ConnectionStatus, Message, SessionError, SessionSnapshot};
pub use runtime::{DEFAULT_COMMAND_CAPACITY, Runtime, RuntimeConfig};
pub use system_env::SystemEnv;
