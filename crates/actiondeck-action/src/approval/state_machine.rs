//! Run state machine with validated transitions.
//!
//! Requested -> PendingApproval -> Approved -> Executing -> Completed/Failed
//! Requested -> Executing (no approval needed)
//! PendingApproval -> Denied

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Lifecycle state of one dispatched action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Requested,
    PendingApproval,
    Approved,
    Executing,
    Completed,
    Failed,
    Denied,
}

impl RunState {
    pub const ALL: [RunState; 7] = [
        RunState::Requested,
        RunState::PendingApproval,
        RunState::Approved,
        RunState::Executing,
        RunState::Completed,
        RunState::Failed,
        RunState::Denied,
    ];

    /// Completed, Failed and Denied are final.
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Completed | RunState::Failed | RunState::Denied)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RunState::Requested => "requested",
            RunState::PendingApproval => "pending_approval",
            RunState::Approved => "approved",
            RunState::Executing => "executing",
            RunState::Completed => "completed",
            RunState::Failed => "failed",
            RunState::Denied => "denied",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RunState::ALL
            .iter()
            .copied()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| format!("Unknown run state: {}", s))
    }
}

/// Validate that a state transition is allowed.
///
/// Valid transitions:
/// - Requested -> PendingApproval
/// - Requested -> Executing
/// - PendingApproval -> Approved
/// - PendingApproval -> Denied
/// - Approved -> Executing
/// - Executing -> Completed
/// - Executing -> Failed
pub fn validate_transition(from: RunState, to: RunState) -> Result<(), PipelineError> {
    let valid = matches!(
        (from, to),
        (RunState::Requested, RunState::PendingApproval)
            | (RunState::Requested, RunState::Executing)
            | (RunState::PendingApproval, RunState::Approved)
            | (RunState::PendingApproval, RunState::Denied)
            | (RunState::Approved, RunState::Executing)
            | (RunState::Executing, RunState::Completed)
            | (RunState::Executing, RunState::Failed)
    );

    if valid {
        Ok(())
    } else {
        Err(PipelineError::InvalidTransition(from, to))
    }
}
