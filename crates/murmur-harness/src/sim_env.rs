//! Simulated environment with a virtual clock and seeded randomness.
//!
//! Time only moves when a test calls [`SimEnv::advance`]. Sleepers wake when
//! the clock passes their deadline, so a runtime driven by `SimEnv` fires its
//! timers exactly when the test says so.

use std::{
    ops::{Add, Sub},
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use chrono::{DateTime, Utc};
use murmur_core::env::Environment;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokio::sync::watch;

/// Unix time of the simulated wall clock at `SimInstant` zero.
const EPOCH_SECS: i64 = 1_700_000_000;

/// Point on the virtual clock, measured from simulation start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SimInstant(Duration);

impl SimInstant {
    /// Time since simulation start.
    pub fn elapsed(self) -> Duration {
        self.0
    }
}

impl Sub for SimInstant {
    type Output = Duration;

    fn sub(self, rhs: Self) -> Duration {
        self.0.saturating_sub(rhs.0)
    }
}

impl Add<Duration> for SimInstant {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self {
        Self(self.0 + rhs)
    }
}

/// Deterministic environment for simulation tests.
///
/// Clones share the same clock and RNG.
#[derive(Clone)]
pub struct SimEnv {
    clock: Arc<watch::Sender<Duration>>,
    rng: Arc<Mutex<ChaCha8Rng>>,
}

impl SimEnv {
    /// Environment at time zero with a fixed default seed.
    pub fn new() -> Self {
        Self::with_seed(0)
    }

    /// Environment at time zero seeded with `seed`.
    pub fn with_seed(seed: u64) -> Self {
        let (clock, _) = watch::channel(Duration::ZERO);
        Self {
            clock: Arc::new(clock),
            rng: Arc::new(Mutex::new(ChaCha8Rng::seed_from_u64(seed))),
        }
    }

    /// Move the virtual clock forward, waking any sleeper whose deadline has
    /// passed.
    pub fn advance(&self, duration: Duration) {
        self.clock.send_modify(|elapsed| *elapsed += duration);
    }

    /// Time since simulation start.
    pub fn elapsed(&self) -> Duration {
        *self.clock.borrow()
    }
}

impl Default for SimEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SimEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimEnv").field("elapsed", &self.elapsed()).finish_non_exhaustive()
    }
}

impl Environment for SimEnv {
    type Instant = SimInstant;

    fn now(&self) -> SimInstant {
        SimInstant(self.elapsed())
    }

    #[allow(refining_impl_trait)]
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send + 'static {
        let deadline = self.elapsed() + duration;
        let mut clock = self.clock.subscribe();
        async move {
            // The sender lives as long as any SimEnv clone, so an error here
            // only means the simulation was dropped.
            let _ = clock.wait_for(|elapsed| *elapsed >= deadline).await;
        }
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        self.rng.lock().unwrap_or_else(PoisonError::into_inner).fill_bytes(buffer);
    }

    fn wall_clock(&self) -> DateTime<Utc> {
        let elapsed = self.elapsed();
        DateTime::from_timestamp(EPOCH_SECS + elapsed.as_secs() as i64, elapsed.subsec_nanos())
            .unwrap_or_default()
    }
}
