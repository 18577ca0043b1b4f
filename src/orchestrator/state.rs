//! Pipeline state tracking.
//!
//! `PipelineState` is the sequencer's state machine:
//!
//! ```text
//! Pending -> Running(0) -> Running(1) -> ... -> Succeeded
//!                 |             |
//!                 +-> FailedSafe / FailedUnsafe
//! ```
//!
//! Transitions are validated; the three terminal states have no successors.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PipelineState {
    /// Nothing has run yet.
    Pending,

    /// Step at this index is executing (including its retries).
    Running(usize),

    /// Every step returned success.
    Succeeded,

    /// A step failed and classified the device as safe to reboot.
    FailedSafe,

    /// A step failed and classified the device as unsafe to reboot.
    FailedUnsafe,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineState::Pending => "pending",
            PipelineState::Running(_) => "running",
            PipelineState::Succeeded => "succeeded",
            PipelineState::FailedSafe => "failed-safe",
            PipelineState::FailedUnsafe => "failed-unsafe",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineState::Succeeded | PipelineState::FailedSafe | PipelineState::FailedUnsafe
        )
    }

    /// Check if a transition to `next` is valid.
    pub fn can_transition_to(&self, next: PipelineState) -> bool {
        match (*self, next) {
            // An empty pipeline succeeds without running anything.
            (PipelineState::Pending, PipelineState::Running(0))
            | (PipelineState::Pending, PipelineState::Succeeded) => true,
            (PipelineState::Running(i), PipelineState::Running(j)) => j == i + 1,
            (PipelineState::Running(_), PipelineState::Succeeded)
            | (PipelineState::Running(_), PipelineState::FailedSafe)
            | (PipelineState::Running(_), PipelineState::FailedUnsafe) => true,
            _ => false,
        }
    }

    /// Move to `next`, rejecting transitions the state machine does not allow.
    pub fn transition_to(&mut self, next: PipelineState) -> Result<(), String> {
        if !self.can_transition_to(next) {
            return Err(format!("Invalid pipeline transition: {} -> {}", self, next));
        }
        *self = next;
        Ok(())
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Running(i) => write!(f, "running({})", i),
            other => f.write_str(other.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions() {
        assert!(PipelineState::Pending.can_transition_to(PipelineState::Running(0)));
        assert!(PipelineState::Running(0).can_transition_to(PipelineState::Running(1)));
        assert!(PipelineState::Running(3).can_transition_to(PipelineState::Succeeded));
        assert!(PipelineState::Running(1).can_transition_to(PipelineState::FailedUnsafe));
    }

    #[test]
    fn test_skipping_steps_is_invalid() {
        assert!(!PipelineState::Pending.can_transition_to(PipelineState::Running(1)));
        assert!(!PipelineState::Running(0).can_transition_to(PipelineState::Running(2)));
        assert!(!PipelineState::Pending.can_transition_to(PipelineState::FailedSafe));
    }

    #[test]
    fn test_terminal_states_have_no_successors() {
        for terminal in [
            PipelineState::Succeeded,
            PipelineState::FailedSafe,
            PipelineState::FailedUnsafe,
        ] {
            assert!(terminal.is_terminal());
            assert!(!terminal.can_transition_to(PipelineState::Running(0)));
            assert!(!terminal.can_transition_to(PipelineState::Succeeded));
        }
    }

    #[test]
    fn test_transition_to_updates_state() {
        let mut state = PipelineState::Pending;
        assert!(state.transition_to(PipelineState::Running(0)).is_ok());
        assert_eq!(state, PipelineState::Running(0));

        let err = state.transition_to(PipelineState::Pending).unwrap_err();
        assert_eq!(err, "Invalid pipeline transition: running(0) -> pending");
        assert_eq!(state, PipelineState::Running(0));
    }
}
