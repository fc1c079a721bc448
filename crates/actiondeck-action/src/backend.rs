//! Seams to the remote execution and approval service.
//!
//! The pipeline and the approval queue only talk to these traits; the HTTP
//! implementation lives in `actiondeck-client`.

use actiondeck_core::types::ApprovalStatus;
use async_trait::async_trait;
use uuid::Uuid;

use crate::error::BackendError;
use crate::types::{ApprovalQueuePage, ApprovalRequest, ExecutionRequest, ExecutionResult};

/// Runs an action once it has cleared the gate (or needs none).
///
/// A returned `ExecutionResult` with `success == false` is a reported
/// failure; `Err` means the backend could not be reached or understood.
/// Neither is retried by the caller.
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionResult, BackendError>;
}

/// Server-side record of approval requests and their decisions.
///
/// The service is the authority: `submit` may assign its own id, and the
/// returned record is the one callers keep.
#[async_trait]
pub trait ApprovalBackend: Send + Sync {
    async fn submit(&self, request: &ApprovalRequest) -> Result<ApprovalRequest, BackendError>;

    async fn fetch_request(&self, id: Uuid) -> Result<ApprovalRequest, BackendError>;

    async fn fetch_queue(&self, status: ApprovalStatus) -> Result<ApprovalQueuePage, BackendError>;

    async fn approve(&self, id: Uuid, actor: Option<&str>) -> Result<(), BackendError>;

    async fn deny(
        &self,
        id: Uuid,
        actor: Option<&str>,
        reason: Option<&str>,
    ) -> Result<(), BackendError>;
}
