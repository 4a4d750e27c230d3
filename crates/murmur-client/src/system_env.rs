//! Production Environment implementation.
//!
//! `SystemEnv` uses the tokio clock rather than `std::time::Instant`, so
//! tests running with a paused runtime get deterministic virtual time through
//! the exact same code path.

use std::time::Duration;

use chrono::{DateTime, Utc};
use murmur_core::env::Environment;

/// Production environment using the tokio clock and OS randomness.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    type Instant = tokio::time::Instant;

    fn now(&self) -> Self::Instant {
        tokio::time::Instant::now()
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    #[allow(clippy::expect_used)]
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer).expect("invariant: OS RNG failure is unrecoverable");
    }

    fn wall_clock(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
