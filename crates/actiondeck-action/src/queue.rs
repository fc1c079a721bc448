//! Approval queue surface.
//!
//! Client-side view of the remote approval queue: polls the backend on a
//! fixed interval, refreshes on demand, and commits decisions. Loading and
//! error state are kept in the snapshot for the UI instead of being retried.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use actiondeck_core::config::ApprovalsConfig;
use actiondeck_core::types::{ApprovalStatus, Timestamp};
use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::Notify;
use uuid::Uuid;

use crate::backend::ApprovalBackend;
use crate::error::{BackendError, PipelineError};
use crate::types::ApprovalRequest;

/// Receives decisions once the backend has committed them.
#[async_trait]
pub trait DecisionSink: Send + Sync {
    async fn approved(&self, request_id: Uuid, actor: Option<&str>) -> Result<(), PipelineError>;

    async fn denied(
        &self,
        request_id: Uuid,
        actor: Option<&str>,
        reason: Option<&str>,
    ) -> Result<(), PipelineError>;
}

/// What the queue UI renders.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueueSnapshot {
    pub queue: Vec<ApprovalRequest>,
    pub total_count: usize,
    pub pending_count: usize,
    pub loading: bool,
    pub error: Option<String>,
    pub last_refreshed: Option<Timestamp>,
}

pub struct ApprovalQueue {
    backend: Arc<dyn ApprovalBackend>,
    sink: Option<Arc<dyn DecisionSink>>,
    status_filter: ApprovalStatus,
    poll_interval: Duration,
    state: Mutex<QueueSnapshot>,
    refresh: Notify,
    shutdown: Notify,
}

impl ApprovalQueue {
    pub fn new(backend: Arc<dyn ApprovalBackend>, config: &ApprovalsConfig) -> Self {
        let status_filter = config.status_filter.parse().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Invalid approvals.status_filter; showing pending requests");
            ApprovalStatus::Pending
        });
        Self {
            backend,
            sink: None,
            status_filter,
            poll_interval: Duration::from_secs(config.poll_interval_secs.max(1)),
            state: Mutex::new(QueueSnapshot::default()),
            refresh: Notify::new(),
            shutdown: Notify::new(),
        }
    }

    /// Forward committed decisions to `sink`.
    pub fn with_sink(mut self, sink: Arc<dyn DecisionSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn status_filter(&self) -> ApprovalStatus {
        self.status_filter
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        self.state.lock().map(|s| s.clone()).unwrap_or_default()
    }

    fn update<F: FnOnce(&mut QueueSnapshot)>(&self, apply: F) {
        if let Ok(mut state) = self.state.lock() {
            apply(&mut state);
        }
    }

    fn record_error(&self, error: &BackendError) {
        self.update(|s| {
            s.loading = false;
            s.error = Some(error.to_string());
        });
    }

    /// Fetch the queue once. Failures are stored in the snapshot and
    /// returned.
    pub async fn refresh(&self) -> Result<(), BackendError> {
        self.update(|s| s.loading = true);

        match self.backend.fetch_queue(self.status_filter).await {
            Ok(page) => {
                tracing::debug!(
                    total = page.total_count,
                    pending = page.pending_count,
                    "Approval queue refreshed"
                );
                self.update(|s| {
                    s.queue = page.queue;
                    s.total_count = page.total_count;
                    s.pending_count = page.pending_count;
                    s.loading = false;
                    s.error = None;
                    s.last_refreshed = Some(Timestamp::now());
                });
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to refresh approval queue");
                self.record_error(&e);
                Err(e)
            }
        }
    }

    /// Approve on the backend, forward to the sink, then refresh.
    pub async fn approve(&self, id: Uuid, actor: Option<&str>) -> Result<(), BackendError> {
        if let Err(e) = self.backend.approve(id, actor).await {
            tracing::warn!(request_id = %id, error = %e, "Approve failed");
            self.record_error(&e);
            return Err(e);
        }
        tracing::info!(request_id = %id, actor = ?actor, "Approval committed");

        if let Some(sink) = &self.sink {
            forward_result(id, sink.approved(id, actor).await);
        }
        // Failure is already in the snapshot.
        let _ = self.refresh().await;
        Ok(())
    }

    /// Deny on the backend, forward to the sink, then refresh.
    pub async fn deny(
        &self,
        id: Uuid,
        actor: Option<&str>,
        reason: Option<&str>,
    ) -> Result<(), BackendError> {
        if let Err(e) = self.backend.deny(id, actor, reason).await {
            tracing::warn!(request_id = %id, error = %e, "Deny failed");
            self.record_error(&e);
            return Err(e);
        }
        tracing::info!(request_id = %id, actor = ?actor, "Denial committed");

        if let Some(sink) = &self.sink {
            forward_result(id, sink.denied(id, actor, reason).await);
        }
        let _ = self.refresh().await;
        Ok(())
    }

    /// Poll until [`shutdown`](Self::shutdown). Refreshes immediately, then
    /// every poll interval or whenever [`refresh_now`](Self::refresh_now)
    /// is called.
    pub async fn run(&self) {
        loop {
            let _ = self.refresh().await;
            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                _ = self.refresh.notified() => {}
                _ = self.shutdown.notified() => return,
            }
        }
    }

    pub fn refresh_now(&self) {
        self.refresh.notify_one();
    }

    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }
}

fn forward_result(id: Uuid, result: Result<(), PipelineError>) {
    match result {
        Ok(()) => {}
        // Requests created by other clients have no local run.
        Err(PipelineError::ApprovalNotFound(_)) | Err(PipelineError::NoRunForApproval(_)) => {
            tracing::debug!(request_id = %id, "Decision has no local run");
        }
        Err(e) => {
            tracing::warn!(request_id = %id, error = %e, "Failed to apply decision locally");
        }
    }
}
