//! Invariant checking for deterministic simulation testing.
//!
//! Invariants are properties that must always hold during session execution.
//! Unlike example-based tests that check specific scenarios, invariants
//! verify behavioral properties across all possible execution paths.
//!
//! # Architecture
//!
//! Each check sees two consecutive [`SessionSnapshot`]s of one client, so
//! both state properties and transition properties (such as append-only
//! logs) can be expressed.
//!
//! # Usage
//!
//! ```ignore
//! let registry = InvariantRegistry::standard();
//! registry.check_all(&before, &after)?;
//! ```

mod checks;

pub use checks::{
    MessageLogAppendOnly, RosterIdsUnique, TypingExcludesSelf, TypingRequiresConnection,
};
use murmur_core::SessionSnapshot;

/// Invariant check result.
pub type InvariantResult = Result<(), Violation>;

/// Invariant violation with context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Name of the violated invariant.
    pub invariant: &'static str,
    /// Description of what went wrong.
    pub message: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.invariant, self.message)
    }
}

impl std::error::Error for Violation {}

/// An invariant that can be checked against a session transition.
pub trait Invariant: Send + Sync {
    /// Invariant name for error reporting.
    fn name(&self) -> &'static str;

    /// Check the invariant on the step from `before` to `after`.
    ///
    /// Pure state invariants only look at `after`.
    fn check(&self, before: &SessionSnapshot, after: &SessionSnapshot) -> InvariantResult;
}

/// Registry of invariants to check.
///
/// Use [`InvariantRegistry::standard()`] for the session invariants.
pub struct InvariantRegistry {
    invariants: Vec<Box<dyn Invariant>>,
}

impl Default for InvariantRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InvariantRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self { invariants: Vec::new() }
    }

    /// Create a registry with the standard session invariants.
    ///
    /// Includes:
    /// - [`TypingExcludesSelf`]: the local user is never listed as typing
    /// - [`RosterIdsUnique`]: one roster entry per user id
    /// - [`TypingRequiresConnection`]: no presence while disconnected
    /// - [`MessageLogAppendOnly`]: the log only grows at the end
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.add(TypingExcludesSelf);
        registry.add(RosterIdsUnique);
        registry.add(TypingRequiresConnection);
        registry.add(MessageLogAppendOnly);
        registry
    }

    /// Add an invariant to the registry.
    pub fn add<I: Invariant + 'static>(&mut self, invariant: I) {
        self.invariants.push(Box::new(invariant));
    }

    /// Check all invariants on one transition.
    ///
    /// Returns `Ok(())` if all invariants hold, or all violations found.
    pub fn check_all(
        &self,
        before: &SessionSnapshot,
        after: &SessionSnapshot,
    ) -> Result<(), Vec<Violation>> {
        let violations: Vec<_> =
            self.invariants.iter().filter_map(|inv| inv.check(before, after).err()).collect();

        if violations.is_empty() { Ok(()) } else { Err(violations) }
    }

    /// Number of registered invariants.
    pub fn len(&self) -> usize {
        self.invariants.len()
    }

    /// Check if registry is empty.
    pub fn is_empty(&self) -> bool {
        self.invariants.is_empty()
    }
}
