//! Human-in-the-loop approval for sensitive actions.
//!
//! The gate holds every [`ApprovalRequest`] the pipeline is waiting on. A
//! request is decided exactly once; later decisions fail with
//! `AlreadyDecided`. Decided requests are evicted oldest first once more
//! than the retention limit have piled up.

pub mod state_machine;

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use actiondeck_core::types::{ApprovalStatus, Timestamp};
use uuid::Uuid;

use crate::error::PipelineError;
use crate::types::ApprovalRequest;

const DEFAULT_RETAIN_DECIDED: usize = 1000;

#[derive(Default)]
struct GateState {
    requests: HashMap<Uuid, (u64, ApprovalRequest)>,
    decided: VecDeque<Uuid>,
    next_seq: u64,
}

impl GateState {
    fn mark_decided(&mut self, id: Uuid, retain: usize) {
        self.decided.push_back(id);
        while self.decided.len() > retain {
            if let Some(old) = self.decided.pop_front() {
                self.requests.remove(&old);
                tracing::debug!(request_id = %old, "Evicted decided approval request");
            }
        }
    }
}

/// In-memory store of approval requests.
pub struct ApprovalGate {
    tenant_id: String,
    retain_decided: usize,
    state: Mutex<GateState>,
}

impl ApprovalGate {
    pub fn new(tenant_id: &str) -> Self {
        Self::with_retention(tenant_id, DEFAULT_RETAIN_DECIDED)
    }

    pub fn with_retention(tenant_id: &str, retain_decided: usize) -> Self {
        Self {
            tenant_id: tenant_id.to_string(),
            retain_decided,
            state: Mutex::new(GateState::default()),
        }
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    fn lock(&self) -> Result<MutexGuard<'_, GateState>, PipelineError> {
        self.state
            .lock()
            .map_err(|e| PipelineError::Storage(format!("Lock poisoned: {}", e)))
    }

    /// Build a pending request for `action_id` without storing it.
    pub fn draft(
        &self,
        action_id: &str,
        parameters: serde_json::Value,
        source: Option<String>,
    ) -> ApprovalRequest {
        ApprovalRequest {
            id: Uuid::new_v4(),
            tenant_id: self.tenant_id.clone(),
            tool_name: action_id.to_string(),
            parameters,
            status: ApprovalStatus::Pending,
            created_at: Timestamp::now(),
            decided_at: None,
            actor: None,
            reason: None,
            approval_token: None,
            source,
        }
    }

    /// Start tracking `request`, typically the record the approval service
    /// returned for a draft.
    pub fn record(&self, request: ApprovalRequest) -> Result<ApprovalRequest, PipelineError> {
        let mut state = self.lock()?;
        let seq = state.next_seq;
        state.next_seq += 1;
        state.requests.insert(request.id, (seq, request.clone()));
        tracing::info!(request_id = %request.id, action_id = %request.tool_name, "Approval requested");
        Ok(request)
    }

    /// Create and track a pending request for `action_id`.
    pub fn request_approval(
        &self,
        action_id: &str,
        parameters: serde_json::Value,
        source: Option<String>,
    ) -> Result<ApprovalRequest, PipelineError> {
        self.record(self.draft(action_id, parameters, source))
    }

    pub fn get(&self, id: Uuid) -> Result<ApprovalRequest, PipelineError> {
        self.lock()?
            .requests
            .get(&id)
            .map(|(_, r)| r.clone())
            .ok_or(PipelineError::ApprovalNotFound(id))
    }

    /// Approve a pending request. Issues the token the execution backend
    /// uses to verify the decision.
    pub fn approve(&self, id: Uuid, actor: Option<&str>) -> Result<ApprovalRequest, PipelineError> {
        self.decide(id, |request| {
            request.status = ApprovalStatus::Approved;
            request.decided_at = Some(Timestamp::now());
            request.actor = actor.map(str::to_string);
            request.approval_token = Some(Uuid::new_v4().to_string());
        })
    }

    /// Deny a pending request. Terminal; nothing is executed.
    pub fn deny(
        &self,
        id: Uuid,
        actor: Option<&str>,
        reason: Option<&str>,
    ) -> Result<ApprovalRequest, PipelineError> {
        self.decide(id, |request| {
            request.status = ApprovalStatus::Denied;
            request.decided_at = Some(Timestamp::now());
            request.actor = actor.map(str::to_string);
            request.reason = reason.map(str::to_string);
        })
    }

    /// Adopt a decision the approval service already recorded, including
    /// the token it issued. A still-pending `remote` changes nothing.
    pub fn apply_remote(&self, remote: &ApprovalRequest) -> Result<ApprovalRequest, PipelineError> {
        if !remote.status.is_decided() {
            return self.get(remote.id);
        }
        self.decide(remote.id, |request| {
            request.status = remote.status;
            request.decided_at = Some(remote.decided_at.unwrap_or_else(Timestamp::now));
            request.actor = remote.actor.clone();
            request.reason = remote.reason.clone();
            request.approval_token = remote.approval_token.clone();
        })
    }

    fn decide<F>(&self, id: Uuid, apply: F) -> Result<ApprovalRequest, PipelineError>
    where
        F: FnOnce(&mut ApprovalRequest),
    {
        let mut state = self.lock()?;
        let (_, request) = state
            .requests
            .get_mut(&id)
            .ok_or(PipelineError::ApprovalNotFound(id))?;

        if request.status.is_decided() {
            return Err(PipelineError::AlreadyDecided(id, request.status));
        }

        apply(request);
        let decided = request.clone();
        tracing::info!(request_id = %id, status = %decided.status, actor = ?decided.actor, "Approval decided");

        state.mark_decided(id, self.retain_decided);
        Ok(decided)
    }

    /// Pending requests, oldest first.
    pub fn pending(&self) -> Vec<ApprovalRequest> {
        let state = match self.lock() {
            Ok(state) => state,
            Err(_) => return vec![],
        };
        let mut pending: Vec<&(u64, ApprovalRequest)> = state
            .requests
            .values()
            .filter(|(_, r)| r.status == ApprovalStatus::Pending)
            .collect();
        pending.sort_by_key(|(seq, _)| *seq);
        pending.into_iter().map(|(_, r)| r.clone()).collect()
    }

    pub fn pending_count(&self) -> usize {
        self.pending().len()
    }

    /// Requests currently held, pending and decided.
    pub fn len(&self) -> usize {
        self.lock().map(|s| s.requests.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
