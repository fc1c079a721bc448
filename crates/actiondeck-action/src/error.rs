//! Error types for the action engine.
//!
//! Only pipeline bookkeeping and backend I/O produce errors. Registry,
//! context and availability checks report their outcome as data.

use crate::approval::state_machine::RunState;
use actiondeck_core::error::DeckError;
use actiondeck_core::types::ApprovalStatus;
use uuid::Uuid;

/// Errors from the dispatch/approval/execution pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Action not in catalog: {0}")]
    UnknownAction(String),
    #[error("Run not found: {0}")]
    RunNotFound(Uuid),
    #[error("Approval request not found: {0}")]
    ApprovalNotFound(Uuid),
    #[error("No run is waiting on approval request {0}")]
    NoRunForApproval(Uuid),
    #[error("Approval request {0} already {1}")]
    AlreadyDecided(Uuid, ApprovalStatus),
    #[error("Invalid state transition: {0} -> {1}")]
    InvalidTransition(RunState, RunState),
    #[error("{action_id} is already in flight for {target_kind} {target_id} (run {run_id})")]
    DuplicateInFlight {
        action_id: String,
        target_kind: String,
        target_id: String,
        run_id: Uuid,
    },
    #[error("Storage error: {0}")]
    Storage(String),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Errors raised by the remote approval/execution backend.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BackendError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Backend returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Could not decode backend response: {0}")]
    Decode(String),
    #[error("Backend rejected the request: {0}")]
    Rejected(String),
}

/// Errors from quick-action preference storage.
#[derive(Debug, thiserror::Error)]
pub enum PreferencesError {
    #[error("preferences I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("preferences serialization error: {0}")]
    Serialization(String),
    #[error("preferences store unavailable: {0}")]
    Unavailable(String),
}

impl From<toml::de::Error> for PreferencesError {
    fn from(err: toml::de::Error) -> Self {
        PreferencesError::Serialization(err.to_string())
    }
}

impl From<toml::ser::Error> for PreferencesError {
    fn from(err: toml::ser::Error) -> Self {
        PreferencesError::Serialization(err.to_string())
    }
}

impl From<BackendError> for DeckError {
    fn from(err: BackendError) -> Self {
        DeckError::Backend(err.to_string())
    }
}

impl From<PreferencesError> for DeckError {
    fn from(err: PreferencesError) -> Self {
        DeckError::Preferences(err.to_string())
    }
}
