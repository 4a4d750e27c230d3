//! Deterministic simulation harness for Murmur session testing.
//!
//! An in-process room server, a virtual clock and seeded randomness, so that
//! multi-client scenarios replay identically on every run.
//!
//! # Scenario Testing
//!
//! [`SimClient`] wires a [`murmur_core::Session`] to a [`SimServer`] through
//! the action pattern. Tests advance the clock, tick clients and pump inbound
//! events by hand, observing exactly what each peer sees.
//!
//! # Runtime Testing
//!
//! [`SimGateway`] implements [`murmur_client::Gateway`] over the same shared
//! server so the production [`murmur_client::Runtime`] runs unchanged.
//!
//! # Invariant Testing
//!
//! The `invariants` module checks behavioral properties between consecutive
//! snapshots. Use [`InvariantRegistry::standard()`] for the session
//! invariants.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod invariants;
pub mod sim_client;
pub mod sim_env;
pub mod sim_gateway;
pub mod sim_server;

pub use invariants::{
    Invariant, InvariantRegistry, InvariantResult, MessageLogAppendOnly, RosterIdsUnique,
    TypingExcludesSelf, TypingRequiresConnection, Violation,
};
pub use sim_client::SimClient;
pub use sim_env::{SimEnv, SimInstant};
pub use sim_gateway::SimGateway;
pub use sim_server::{ConnectionId, SharedSimServer, SimServer, create_shared_server};
