//! Local typing indicator state machine.
//!
//! The view reports "typing" on every keystroke. This timer turns that into a
//! bounded signal: one start when composing begins, one stop when the user
//! stops explicitly or goes quiet for the timeout.
//!
//! # State Machine
//!
//! ```text
//!            start / send(true)
//! ┌──────┐ ─────────────────────> ┌────────┐ ─┐ start
//! │ Idle │                        │ Typing │  │ (re-arm, no send)
//! └──────┘ <───────────────────── └────────┘ <┘
//!          stop or expiry / send(false)
//! ```
//!
//! `cancel` returns to Idle without signalling; it is used when the
//! connection is already gone.

use std::{ops::Sub, time::Duration};

/// Timer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypingState<I> {
    /// Not typing.
    Idle,
    /// Typing; expires `timeout` after `armed_at`.
    Typing {
        /// Time of the most recent keystroke.
        armed_at: I,
    },
}

/// Debounce/expiry timer for the local user's typing signal.
///
/// Pure state machine: every method takes the current time and returns
/// whether the remote typing signal must change. The caller turns `true` into
/// a send.
#[derive(Debug, Clone)]
pub struct TypingTimer<I>
where
    I: Copy + Ord + Send + Sync + Sub<Output = Duration>,
{
    state: TypingState<I>,
    timeout: Duration,
}

impl<I> TypingTimer<I>
where
    I: Copy + Ord + Send + Sync + Sub<Output = Duration>,
{
    /// Idle timer that expires `timeout` after the last keystroke.
    pub fn new(timeout: Duration) -> Self {
        Self { state: TypingState::Idle, timeout }
    }

    /// Current state.
    pub fn state(&self) -> TypingState<I> {
        self.state
    }

    /// True while in [`TypingState::Typing`].
    pub fn is_typing(&self) -> bool {
        matches!(self.state, TypingState::Typing { .. })
    }

    /// Record a keystroke.
    ///
    /// Returns `true` on the Idle to Typing transition (send a start signal).
    /// While already typing, re-arms the window and returns `false`.
    pub fn start(&mut self, now: I) -> bool {
        let was_idle = !self.is_typing();
        if !was_idle {
            tracing::trace!("typing timer re-armed");
        }
        self.state = TypingState::Typing { armed_at: now };
        was_idle
    }

    /// Explicit stop. Returns `true` if a stop signal must be sent.
    pub fn stop(&mut self) -> bool {
        let was_typing = self.is_typing();
        self.state = TypingState::Idle;
        was_typing
    }

    /// Expire the window if it has elapsed.
    ///
    /// Returns `true` if the timer fired (send a stop signal).
    pub fn expire(&mut self, now: I) -> bool {
        match self.state {
            TypingState::Typing { armed_at } if now - armed_at >= self.timeout => {
                self.state = TypingState::Idle;
                true
            },
            _ => false,
        }
    }

    /// Return to Idle without signalling.
    pub fn cancel(&mut self) {
        self.state = TypingState::Idle;
    }

    /// Time left before expiry. `None` while idle.
    pub fn remaining(&self, now: I) -> Option<Duration> {
        match self.state {
            TypingState::Typing { armed_at } => {
                Some(self.timeout.saturating_sub(now - armed_at))
            },
            TypingState::Idle => None,
        }
    }
}
