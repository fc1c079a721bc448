use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{ApprovalStatus, Timestamp};

/// Events emitted by the execution pipeline as a run moves through its
/// states.
///
/// Consumed by UI surfaces that render run progress (chat panel, approval
/// drawer) and by the audit log.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum DomainEvent {
    /// A dispatched signal was accepted and a run was created.
    ActionDispatched {
        run_id: Uuid,
        action_id: String,
        source: String,
        timestamp: Timestamp,
    },

    /// The action requires approval; a pending request was created.
    ApprovalRequested {
        run_id: Uuid,
        request_id: Uuid,
        action_id: String,
        timestamp: Timestamp,
    },

    /// A human decision was recorded on an approval request.
    ApprovalDecided {
        run_id: Uuid,
        request_id: Uuid,
        status: ApprovalStatus,
        actor: Option<String>,
        timestamp: Timestamp,
    },

    /// The action was handed to the execution backend.
    ExecutionStarted {
        run_id: Uuid,
        action_id: String,
        timestamp: Timestamp,
    },

    /// The backend reported success.
    ExecutionCompleted {
        run_id: Uuid,
        action_id: String,
        timestamp: Timestamp,
    },

    /// The backend reported failure or could not be reached.
    ExecutionFailed {
        run_id: Uuid,
        action_id: String,
        error: String,
        timestamp: Timestamp,
    },
}

impl DomainEvent {
    /// Returns the timestamp of the event.
    pub fn timestamp(&self) -> Timestamp {
        match self {
            DomainEvent::ActionDispatched { timestamp, .. }
            | DomainEvent::ApprovalRequested { timestamp, .. }
            | DomainEvent::ApprovalDecided { timestamp, .. }
            | DomainEvent::ExecutionStarted { timestamp, .. }
            | DomainEvent::ExecutionCompleted { timestamp, .. }
            | DomainEvent::ExecutionFailed { timestamp, .. } => *timestamp,
        }
    }

    /// The run this event belongs to.
    pub fn run_id(&self) -> Uuid {
        match self {
            DomainEvent::ActionDispatched { run_id, .. }
            | DomainEvent::ApprovalRequested { run_id, .. }
            | DomainEvent::ApprovalDecided { run_id, .. }
            | DomainEvent::ExecutionStarted { run_id, .. }
            | DomainEvent::ExecutionCompleted { run_id, .. }
            | DomainEvent::ExecutionFailed { run_id, .. } => *run_id,
        }
    }

    /// Returns a human-readable event name for logging.
    pub fn event_name(&self) -> &'static str {
        match self {
            DomainEvent::ActionDispatched { .. } => "action_dispatched",
            DomainEvent::ApprovalRequested { .. } => "approval_requested",
            DomainEvent::ApprovalDecided { .. } => "approval_decided",
            DomainEvent::ExecutionStarted { .. } => "execution_started",
            DomainEvent::ExecutionCompleted { .. } => "execution_completed",
            DomainEvent::ExecutionFailed { .. } => "execution_failed",
        }
    }
}
