//! Standard invariant checks.
//!
//! These invariants capture behavioral properties that must always hold.
//! They verify WHAT must be true, not specific test scenarios.

use std::collections::BTreeSet;

use murmur_core::{ConnectionStatus, SessionSnapshot};

use super::{Invariant, InvariantResult, Violation};

/// The local user never appears in the typing list.
///
/// A client does not need to be told that it is typing, and the server relays
/// typing to everyone but the sender anyway. A stray echo must not leak in.
pub struct TypingExcludesSelf;

impl Invariant for TypingExcludesSelf {
    fn name(&self) -> &'static str {
        "typing_excludes_self"
    }

    fn check(&self, _before: &SessionSnapshot, after: &SessionSnapshot) -> InvariantResult {
        let Some(me) = after.username.as_deref() else {
            return Ok(());
        };
        if after.typing_users.iter().any(|name| name == me) {
            return Err(Violation {
                invariant: self.name(),
                message: format!("{me} listed in typing users {:?}", after.typing_users),
            });
        }
        Ok(())
    }
}

/// Roster entries are keyed by id: no id appears twice.
pub struct RosterIdsUnique;

impl Invariant for RosterIdsUnique {
    fn name(&self) -> &'static str {
        "roster_ids_unique"
    }

    fn check(&self, _before: &SessionSnapshot, after: &SessionSnapshot) -> InvariantResult {
        let mut seen = BTreeSet::new();
        for user in &after.users {
            if !seen.insert(&user.id) {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!("id {} appears more than once", user.id),
                });
            }
        }
        Ok(())
    }
}

/// Presence is only shown while a connection exists.
///
/// Once disconnected, nobody is typing and nobody is online. While
/// connected, every typing user is in the roster.
pub struct TypingRequiresConnection;

impl Invariant for TypingRequiresConnection {
    fn name(&self) -> &'static str {
        "typing_requires_connection"
    }

    fn check(&self, _before: &SessionSnapshot, after: &SessionSnapshot) -> InvariantResult {
        if after.status == ConnectionStatus::Disconnected {
            if !after.typing_users.is_empty() || !after.users.is_empty() {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!(
                        "disconnected with {} users and typing {:?}",
                        after.users.len(),
                        after.typing_users
                    ),
                });
            }
            return Ok(());
        }

        if let Some(ghost) =
            after.typing_users.iter().find(|name| !after.users.iter().any(|u| &u.username == *name))
        {
            return Err(Violation {
                invariant: self.name(),
                message: format!("{ghost} typing but not in roster"),
            });
        }
        Ok(())
    }
}

/// Messages are only ever appended.
///
/// Between two snapshots of the same session identity, the earlier log is a
/// prefix of the later one. Teardown resets the identity and is exempt.
pub struct MessageLogAppendOnly;

impl Invariant for MessageLogAppendOnly {
    fn name(&self) -> &'static str {
        "message_log_append_only"
    }

    fn check(&self, before: &SessionSnapshot, after: &SessionSnapshot) -> InvariantResult {
        if after.username.is_none() {
            return Ok(());
        }
        if !after.messages.starts_with(&before.messages) {
            return Err(Violation {
                invariant: self.name(),
                message: format!(
                    "log of {} entries is not a prefix of the next {}",
                    before.messages.len(),
                    after.messages.len()
                ),
            });
        }
        Ok(())
    }
}
