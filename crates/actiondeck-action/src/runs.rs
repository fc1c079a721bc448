//! Run records: one per handled dispatch signal.
//!
//! Runs are indexed by id, by the approval request gating them, and (while
//! in flight) by their deduplication key. Finished runs are evicted oldest
//! first once more than the retention limit have piled up.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use actiondeck_core::types::Timestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::approval::state_machine::{validate_transition, RunState};
use crate::dispatch::ActionStartSignal;
use crate::error::PipelineError;
use crate::types::{ActionContext, ExecutionResult};

const DEFAULT_RETAIN_FINISHED: usize = 1000;

/// A dispatched action as the pipeline tracks it. The context is the
/// snapshot taken at dispatch time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRun {
    pub id: Uuid,
    pub action_id: String,
    pub context: ActionContext,
    pub default_config: Option<serde_json::Value>,
    pub source: String,
    pub state: RunState,
    pub approval_request_id: Option<Uuid>,
    /// What the backend returned, when it was reached.
    pub outcome: Option<ExecutionResult>,
    /// Why a `Failed` run failed.
    pub error: Option<String>,
    /// Reviewer's reason on a `Denied` run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub denial_reason: Option<String>,
    pub created_at: Timestamp,
    pub finished_at: Option<Timestamp>,
}

/// `(action id, target kind, target id)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct InFlightKey(String, String, String);

impl ActionRun {
    fn from_signal(signal: &ActionStartSignal) -> Self {
        Self {
            id: Uuid::new_v4(),
            action_id: signal.action_id.clone(),
            context: signal.context.clone(),
            default_config: signal.default_config.clone(),
            source: signal.source.clone(),
            state: RunState::Requested,
            approval_request_id: None,
            outcome: None,
            error: None,
            denial_reason: None,
            created_at: Timestamp::now(),
            finished_at: None,
        }
    }

    fn in_flight_key(&self) -> Option<InFlightKey> {
        self.context
            .target
            .as_ref()
            .map(|t| InFlightKey(self.action_id.clone(), t.kind.clone(), t.id.clone()))
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

#[derive(Default)]
struct RunIndex {
    runs: HashMap<Uuid, (u64, ActionRun)>,
    in_flight: HashMap<InFlightKey, Uuid>,
    by_approval: HashMap<Uuid, Uuid>,
    finished: VecDeque<Uuid>,
    next_seq: u64,
}

impl RunIndex {
    fn release_key(&mut self, run: &ActionRun) {
        if let Some(key) = run.in_flight_key() {
            if self.in_flight.get(&key) == Some(&run.id) {
                self.in_flight.remove(&key);
            }
        }
    }

    fn remove(&mut self, id: Uuid) {
        if let Some((_, run)) = self.runs.remove(&id) {
            self.release_key(&run);
            if let Some(request_id) = run.approval_request_id {
                self.by_approval.remove(&request_id);
            }
        }
    }
}

/// In-memory run store.
pub struct RunStore {
    retain_finished: usize,
    index: Mutex<RunIndex>,
}

impl RunStore {
    pub fn new() -> Self {
        Self::with_retention(DEFAULT_RETAIN_FINISHED)
    }

    pub fn with_retention(retain_finished: usize) -> Self {
        Self {
            retain_finished,
            index: Mutex::new(RunIndex::default()),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, RunIndex>, PipelineError> {
        self.index
            .lock()
            .map_err(|e| PipelineError::Storage(format!("Lock poisoned: {}", e)))
    }

    /// Record a new run in `Requested`.
    ///
    /// With `reject_duplicates`, fails if a non-terminal run exists for the
    /// same action and target. Check and insert happen under one lock.
    pub fn create(
        &self,
        signal: &ActionStartSignal,
        reject_duplicates: bool,
    ) -> Result<ActionRun, PipelineError> {
        let run = ActionRun::from_signal(signal);
        let key = run.in_flight_key();
        let mut index = self.lock()?;

        if let Some(key) = key {
            match index.in_flight.get(&key).copied() {
                Some(existing) if reject_duplicates => {
                    return Err(PipelineError::DuplicateInFlight {
                        action_id: key.0,
                        target_kind: key.1,
                        target_id: key.2,
                        run_id: existing,
                    });
                }
                // Unguarded duplicates run alongside; the first keeps the key.
                Some(_) => {}
                None => {
                    index.in_flight.insert(key, run.id);
                }
            }
        }

        let seq = index.next_seq;
        index.next_seq += 1;
        index.runs.insert(run.id, (seq, run.clone()));
        Ok(run)
    }

    /// Drop a run that never left `Requested`, e.g. because its approval
    /// request could not be submitted.
    pub fn discard(&self, id: Uuid) -> Result<(), PipelineError> {
        let mut index = self.lock()?;
        let state = index
            .runs
            .get(&id)
            .map(|(_, r)| r.state)
            .ok_or(PipelineError::RunNotFound(id))?;
        if state != RunState::Requested {
            return Err(PipelineError::InvalidTransition(state, RunState::Requested));
        }
        index.remove(id);
        Ok(())
    }

    pub fn get(&self, id: Uuid) -> Result<ActionRun, PipelineError> {
        self.lock()?
            .runs
            .get(&id)
            .map(|(_, r)| r.clone())
            .ok_or(PipelineError::RunNotFound(id))
    }

    /// Move a run to `to`, validating the transition. Terminal states stamp
    /// `finished_at`.
    pub fn transition(&self, id: Uuid, to: RunState) -> Result<ActionRun, PipelineError> {
        self.update(id, to, |_| {})
    }

    /// Move to `PendingApproval` and remember the request gating the run.
    pub fn await_approval(&self, id: Uuid, request_id: Uuid) -> Result<ActionRun, PipelineError> {
        let run = self.update(id, RunState::PendingApproval, |run| {
            run.approval_request_id = Some(request_id);
        })?;
        self.lock()?.by_approval.insert(request_id, id);
        Ok(run)
    }

    /// Move to `Completed` or `Failed` and record what the backend said.
    pub fn finish(
        &self,
        id: Uuid,
        to: RunState,
        outcome: Option<ExecutionResult>,
        error: Option<String>,
    ) -> Result<ActionRun, PipelineError> {
        self.update(id, to, |run| {
            run.outcome = outcome;
            run.error = error;
        })
    }

    /// Move to `Denied`.
    pub fn deny(&self, id: Uuid, reason: Option<String>) -> Result<ActionRun, PipelineError> {
        self.update(id, RunState::Denied, |run| {
            run.denial_reason = reason;
        })
    }

    fn update<F>(&self, id: Uuid, to: RunState, apply: F) -> Result<ActionRun, PipelineError>
    where
        F: FnOnce(&mut ActionRun),
    {
        let mut index = self.lock()?;
        let (_, run) = index
            .runs
            .get_mut(&id)
            .ok_or(PipelineError::RunNotFound(id))?;

        validate_transition(run.state, to)?;

        run.state = to;
        apply(run);
        if !to.is_terminal() {
            return Ok(run.clone());
        }

        run.finished_at = Some(Timestamp::now());
        let run = run.clone();
        index.release_key(&run);
        index.finished.push_back(id);
        while index.finished.len() > self.retain_finished {
            if let Some(old) = index.finished.pop_front() {
                index.remove(old);
                tracing::debug!(run_id = %old, "Evicted finished run");
            }
        }
        Ok(run)
    }

    /// The run waiting on approval request `request_id`.
    pub fn find_by_approval(&self, request_id: Uuid) -> Result<ActionRun, PipelineError> {
        let index = self.lock()?;
        index
            .by_approval
            .get(&request_id)
            .and_then(|id| index.runs.get(id))
            .map(|(_, r)| r.clone())
            .ok_or(PipelineError::NoRunForApproval(request_id))
    }

    /// Runs, newest first, optionally filtered by state.
    pub fn list(&self, state: Option<RunState>, limit: Option<usize>) -> Vec<ActionRun> {
        let index = match self.lock() {
            Ok(index) => index,
            Err(_) => return vec![],
        };

        let mut result: Vec<&(u64, ActionRun)> = index
            .runs
            .values()
            .filter(|(_, r)| state.map_or(true, |s| r.state == s))
            .collect();
        result.sort_by(|a, b| b.0.cmp(&a.0));

        result
            .into_iter()
            .take(limit.unwrap_or(usize::MAX))
            .map(|(_, r)| r.clone())
            .collect()
    }
}

impl Default for RunStore {
    fn default() -> Self {
        Self::new()
    }
}
