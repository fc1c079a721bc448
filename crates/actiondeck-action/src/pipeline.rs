//! Execution pipeline.
//!
//! Consumes dispatched signals, gates sensitive actions behind an approval
//! request, and hands everything else straight to the execution backend.
//! Every transition is recorded on the run and published as a
//! [`DomainEvent`].
//!
//! With an approval backend attached, gated requests are submitted to the
//! approval service and decisions recorded there (by any client) are
//! picked up through [`ExecutionPipeline::sync_approval`].

use std::sync::Arc;

use actiondeck_core::config::PipelineConfig;
use actiondeck_core::events::DomainEvent;
use actiondeck_core::types::{ApprovalStatus, Timestamp};
use async_trait::async_trait;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, Notify};
use uuid::Uuid;

use crate::approval::state_machine::RunState;
use crate::approval::ApprovalGate;
use crate::backend::{ApprovalBackend, ExecutionBackend};
use crate::catalog::ActionCatalog;
use crate::dispatch::ActionStartSignal;
use crate::error::PipelineError;
use crate::queue::DecisionSink;
use crate::runs::{ActionRun, RunStore};
use crate::types::{ApprovalRequest, ExecutionRequest};

const EVENT_CAPACITY: usize = 256;

pub struct ExecutionPipeline {
    catalog: Arc<ActionCatalog>,
    gate: ApprovalGate,
    runs: RunStore,
    backend: Arc<dyn ExecutionBackend>,
    approvals: Option<Arc<dyn ApprovalBackend>>,
    config: PipelineConfig,
    events: broadcast::Sender<DomainEvent>,
    shutdown: Notify,
}

impl ExecutionPipeline {
    pub fn new(
        catalog: Arc<ActionCatalog>,
        backend: Arc<dyn ExecutionBackend>,
        tenant_id: &str,
        config: PipelineConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            catalog,
            gate: ApprovalGate::with_retention(tenant_id, config.retain_finished),
            runs: RunStore::with_retention(config.retain_finished),
            backend,
            approvals: None,
            config,
            events,
            shutdown: Notify::new(),
        }
    }

    /// Submit approval requests to `approvals` instead of keeping them
    /// local only.
    pub fn with_approval_backend(mut self, approvals: Arc<dyn ApprovalBackend>) -> Self {
        self.approvals = Some(approvals);
        self
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<DomainEvent> {
        self.events.subscribe()
    }

    pub fn get_run(&self, id: Uuid) -> Result<ActionRun, PipelineError> {
        self.runs.get(id)
    }

    pub fn list_runs(&self, state: Option<RunState>, limit: Option<usize>) -> Vec<ActionRun> {
        self.runs.list(state, limit)
    }

    pub fn get_approval(&self, id: Uuid) -> Result<ApprovalRequest, PipelineError> {
        self.gate.get(id)
    }

    pub fn pending_approvals(&self) -> Vec<ApprovalRequest> {
        self.gate.pending()
    }

    fn emit(&self, event: DomainEvent) {
        tracing::debug!(event = event.event_name(), run_id = %event.run_id(), "Pipeline event");
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn emit_dispatched(&self, run: &ActionRun) {
        self.emit(DomainEvent::ActionDispatched {
            run_id: run.id,
            action_id: run.action_id.clone(),
            source: run.source.clone(),
            timestamp: Timestamp::now(),
        });
    }

    /// Handle one dispatched signal.
    ///
    /// Returns the run as it stands when this call finishes: `PendingApproval`
    /// for gated actions, `Completed` or `Failed` otherwise. A backend
    /// failure during execution is a `Failed` run, not an `Err`. A gated
    /// request the approval service refuses or cannot take is an `Err`, and
    /// no run is kept.
    pub async fn handle_signal(&self, signal: &ActionStartSignal) -> Result<ActionRun, PipelineError> {
        let definition = self
            .catalog
            .get(&signal.action_id)
            .ok_or_else(|| PipelineError::UnknownAction(signal.action_id.clone()))?;

        let run = self
            .runs
            .create(signal, self.config.reject_duplicate_in_flight)?;
        tracing::info!(run_id = %run.id, action_id = %run.action_id, source = %run.source, "Action run created");

        if definition.requires_approval {
            let request = match self.open_request(&definition.id, signal).await {
                Ok(request) => request,
                Err(e) => {
                    tracing::warn!(run_id = %run.id, action_id = %run.action_id, error = %e, "Approval request not submitted; run dropped");
                    self.runs.discard(run.id)?;
                    return Err(e);
                }
            };
            let run = self.runs.await_approval(run.id, request.id)?;
            self.emit_dispatched(&run);
            self.emit(DomainEvent::ApprovalRequested {
                run_id: run.id,
                request_id: request.id,
                action_id: run.action_id.clone(),
                timestamp: Timestamp::now(),
            });
            return Ok(run);
        }

        self.emit_dispatched(&run);
        let run = self.runs.transition(run.id, RunState::Executing)?;
        self.execute(run, None).await
    }

    /// Draft the request, submit it when an approval service is attached,
    /// and track whatever record comes back.
    async fn open_request(
        &self,
        action_id: &str,
        signal: &ActionStartSignal,
    ) -> Result<ApprovalRequest, PipelineError> {
        let parameters = serde_json::json!({
            "context": signal.context,
            "defaultConfig": signal.default_config,
        });
        let draft = self
            .gate
            .draft(action_id, parameters, Some(signal.source.clone()));
        let request = match &self.approvals {
            Some(service) => service.submit(&draft).await?,
            None => draft,
        };
        self.gate.record(request)
    }

    /// Approve the request gating a run and execute it.
    pub async fn approve(
        &self,
        request_id: Uuid,
        actor: Option<&str>,
    ) -> Result<ActionRun, PipelineError> {
        let run = self.runs.find_by_approval(request_id)?;
        let request = self.gate.approve(request_id, actor)?;
        self.resume(run, request).await
    }

    /// Deny the request gating a run. The backend is never called.
    pub async fn deny(
        &self,
        request_id: Uuid,
        actor: Option<&str>,
        reason: Option<&str>,
    ) -> Result<ActionRun, PipelineError> {
        let run = self.runs.find_by_approval(request_id)?;
        let request = self.gate.deny(request_id, actor, reason)?;
        self.resume(run, request).await
    }

    /// Ask the approval service about `request_id` and act on a decision
    /// recorded there. Returns the run unchanged while the request is still
    /// pending, and without a call when no service is attached or the run
    /// is no longer waiting.
    pub async fn sync_approval(&self, request_id: Uuid) -> Result<ActionRun, PipelineError> {
        let run = self.runs.find_by_approval(request_id)?;
        let service = match &self.approvals {
            Some(service) if run.state == RunState::PendingApproval => service,
            _ => return Ok(run),
        };

        let remote = service.fetch_request(request_id).await?;
        if !remote.status.is_decided() {
            return Ok(run);
        }
        let request = match self.gate.apply_remote(&remote) {
            Ok(request) => request,
            // Decided here while the fetch was in flight.
            Err(PipelineError::AlreadyDecided(..)) => return self.runs.get(run.id),
            Err(e) => return Err(e),
        };
        self.resume(run, request).await
    }

    /// Continue a run after its request was decided.
    async fn resume(
        &self,
        run: ActionRun,
        request: ApprovalRequest,
    ) -> Result<ActionRun, PipelineError> {
        self.emit(DomainEvent::ApprovalDecided {
            run_id: run.id,
            request_id: request.id,
            status: request.status,
            actor: request.actor.clone(),
            timestamp: Timestamp::now(),
        });

        if request.status == ApprovalStatus::Approved {
            self.runs.transition(run.id, RunState::Approved)?;
            let run = self.runs.transition(run.id, RunState::Executing)?;
            return self.execute(run, request.approval_token).await;
        }

        let run = self.runs.deny(run.id, request.reason)?;
        tracing::info!(run_id = %run.id, action_id = %run.action_id, "Action denied");
        Ok(run)
    }

    /// A decision was committed on the approval service by this process.
    /// Prefer the service's record (and its token); decide locally when it
    /// cannot be read back.
    async fn adopt_decision<F>(&self, request_id: Uuid, decide_locally: F) -> Result<(), PipelineError>
    where
        F: FnOnce() -> Result<ApprovalRequest, PipelineError>,
    {
        if self.approvals.is_some() {
            match self.sync_approval(request_id).await {
                Ok(run) if run.state != RunState::PendingApproval => return Ok(()),
                Ok(_) => {}
                Err(PipelineError::Backend(e)) => {
                    tracing::warn!(request_id = %request_id, error = %e, "Could not read decision back; recording it locally");
                }
                Err(e) => return Err(e),
            }
        }
        let run = self.runs.find_by_approval(request_id)?;
        let request = decide_locally()?;
        self.resume(run, request).await.map(|_| ())
    }

    async fn execute(
        &self,
        run: ActionRun,
        approval_token: Option<String>,
    ) -> Result<ActionRun, PipelineError> {
        self.emit(DomainEvent::ExecutionStarted {
            run_id: run.id,
            action_id: run.action_id.clone(),
            timestamp: Timestamp::now(),
        });

        let request = ExecutionRequest {
            action_id: run.action_id.clone(),
            context: run.context.clone(),
            default_config: run.default_config.clone(),
            approval_token,
        };

        let (state, outcome, error) = match self.backend.execute(&request).await {
            Ok(result) if result.success => (RunState::Completed, Some(result), None),
            Ok(result) => {
                let error = result
                    .error
                    .clone()
                    .unwrap_or_else(|| "Execution failed".to_string());
                (RunState::Failed, Some(result), Some(error))
            }
            Err(e) => (RunState::Failed, None, Some(e.to_string())),
        };

        let run = self.runs.finish(run.id, state, outcome, error.clone())?;
        let elapsed_ms = run.created_at.elapsed_ms();
        match error {
            None => {
                tracing::info!(run_id = %run.id, action_id = %run.action_id, elapsed_ms, "Action completed");
                self.emit(DomainEvent::ExecutionCompleted {
                    run_id: run.id,
                    action_id: run.action_id.clone(),
                    timestamp: Timestamp::now(),
                });
            }
            Some(error) => {
                tracing::warn!(run_id = %run.id, action_id = %run.action_id, elapsed_ms, error = %error, "Action failed");
                self.emit(DomainEvent::ExecutionFailed {
                    run_id: run.id,
                    action_id: run.action_id.clone(),
                    error,
                    timestamp: Timestamp::now(),
                });
            }
        }
        Ok(run)
    }

    /// Consume signals until shutdown or until every sender is dropped.
    /// Signals are handled one at a time in arrival order.
    pub async fn run(&self, mut signals: broadcast::Receiver<ActionStartSignal>) {
        loop {
            tokio::select! {
                received = signals.recv() => match received {
                    Ok(signal) => {
                        if let Err(e) = self.handle_signal(&signal).await {
                            tracing::warn!(action_id = %signal.action_id, error = %e, "Signal rejected");
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Pipeline lagged behind dispatcher; signals dropped");
                    }
                    Err(RecvError::Closed) => return,
                },
                _ = self.shutdown.notified() => return,
            }
        }
    }

    /// Stop [`run`](Self::run). A stop requested before `run` starts is kept.
    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }
}

#[async_trait]
impl DecisionSink for ExecutionPipeline {
    async fn approved(&self, request_id: Uuid, actor: Option<&str>) -> Result<(), PipelineError> {
        self.adopt_decision(request_id, || self.gate.approve(request_id, actor))
            .await
    }

    async fn denied(
        &self,
        request_id: Uuid,
        actor: Option<&str>,
        reason: Option<&str>,
    ) -> Result<(), PipelineError> {
        self.adopt_decision(request_id, || self.gate.deny(request_id, actor, reason))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::ActionDispatcher;
    use crate::error::BackendError;
    use crate::types::{ActionContext, ApprovalQueuePage, ExecutionResult};
    use actiondeck_core::types::EntityRef;
    use std::sync::Mutex;
    use std::time::Duration;

    struct FixedBackend {
        response: Result<ExecutionResult, BackendError>,
        calls: Mutex<Vec<ExecutionRequest>>,
    }

    impl FixedBackend {
        fn new(response: Result<ExecutionResult, BackendError>) -> Arc<Self> {
            Arc::new(Self {
                response,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<ExecutionRequest> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ExecutionBackend for FixedBackend {
        async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionResult, BackendError> {
            self.calls.lock().unwrap().push(request.clone());
            self.response.clone()
        }
    }

    /// Approval service that assigns its own ids and tokens.
    #[derive(Default)]
    struct FakeApprovals {
        requests: Mutex<Vec<ApprovalRequest>>,
        offline: bool,
    }

    impl FakeApprovals {
        fn offline() -> Arc<Self> {
            Arc::new(Self {
                offline: true,
                ..Self::default()
            })
        }

        fn record(&self, id: Uuid, status: ApprovalStatus, reason: Option<&str>) {
            let mut requests = self.requests.lock().unwrap();
            let request = requests.iter_mut().find(|r| r.id == id).unwrap();
            request.status = status;
            request.decided_at = Some(Timestamp::now());
            request.actor = Some("reviewer".to_string());
            request.reason = reason.map(str::to_string);
            if status == ApprovalStatus::Approved {
                request.approval_token = Some("server-token".to_string());
            }
        }

        fn stored(&self) -> Vec<ApprovalRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ApprovalBackend for FakeApprovals {
        async fn submit(&self, request: &ApprovalRequest) -> Result<ApprovalRequest, BackendError> {
            if self.offline {
                return Err(BackendError::Network("connection refused".to_string()));
            }
            let stored = ApprovalRequest {
                id: Uuid::new_v4(),
                ..request.clone()
            };
            self.requests.lock().unwrap().push(stored.clone());
            Ok(stored)
        }

        async fn fetch_request(&self, id: Uuid) -> Result<ApprovalRequest, BackendError> {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .find(|r| r.id == id)
                .cloned()
                .ok_or(BackendError::Status {
                    status: 404,
                    body: "no such request".to_string(),
                })
        }

        async fn fetch_queue(&self, _status: ApprovalStatus) -> Result<ApprovalQueuePage, BackendError> {
            Ok(ApprovalQueuePage::default())
        }

        async fn approve(&self, id: Uuid, _actor: Option<&str>) -> Result<(), BackendError> {
            self.record(id, ApprovalStatus::Approved, None);
            Ok(())
        }

        async fn deny(
            &self,
            id: Uuid,
            _actor: Option<&str>,
            reason: Option<&str>,
        ) -> Result<(), BackendError> {
            self.record(id, ApprovalStatus::Denied, reason);
            Ok(())
        }
    }

    fn pipeline(backend: Arc<FixedBackend>) -> ExecutionPipeline {
        ExecutionPipeline::new(
            Arc::new(ActionCatalog::shipped()),
            backend,
            "tenant-1",
            PipelineConfig::default(),
        )
    }

    fn signal(action_id: &str) -> ActionStartSignal {
        signal_on(action_id, "item-1")
    }

    fn signal_on(action_id: &str, item_id: &str) -> ActionStartSignal {
        ActionStartSignal {
            action_id: action_id.to_string(),
            context: ActionContext::new("inbox")
                .with_field("inbox", "itemId", item_id)
                .with_target(EntityRef::new("inbox_item", item_id)),
            default_config: Some(serde_json::json!({"tone": "friendly"})),
            source: "quick_actions".to_string(),
            timestamp: Timestamp::now(),
        }
    }

    fn drain(rx: &mut broadcast::Receiver<DomainEvent>) -> Vec<&'static str> {
        let mut names = Vec::new();
        while let Ok(event) = rx.try_recv() {
            names.push(event.event_name());
        }
        names
    }

    #[tokio::test]
    async fn test_ungated_action_completes() {
        let backend = FixedBackend::new(Ok(ExecutionResult::ok(serde_json::json!("summary"))));
        let pipeline = pipeline(Arc::clone(&backend));
        let mut events = pipeline.subscribe_events();

        let run = pipeline.handle_signal(&signal("inbox.summarize")).await.unwrap();
        assert_eq!(run.state, RunState::Completed);
        assert!(run.approval_request_id.is_none());
        assert!(pipeline.pending_approvals().is_empty());

        let calls = backend.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].action_id, "inbox.summarize");
        assert_eq!(calls[0].default_config, Some(serde_json::json!({"tone": "friendly"})));
        assert!(calls[0].approval_token.is_none());

        assert_eq!(
            drain(&mut events),
            vec!["action_dispatched", "execution_started", "execution_completed"]
        );
    }

    #[tokio::test]
    async fn test_reported_failure_fails_run() {
        let backend = FixedBackend::new(Ok(ExecutionResult::failed("quota exceeded")));
        let pipeline = pipeline(backend);
        let run = pipeline.handle_signal(&signal("inbox.summarize")).await.unwrap();
        assert_eq!(run.state, RunState::Failed);
        assert_eq!(run.error.as_deref(), Some("quota exceeded"));
        assert!(run.finished_at.is_some());
    }

    #[tokio::test]
    async fn test_unreachable_backend_fails_run_once() {
        let backend = FixedBackend::new(Err(BackendError::Network("connection refused".into())));
        let pipeline = pipeline(Arc::clone(&backend));
        let run = pipeline.handle_signal(&signal("inbox.summarize")).await.unwrap();
        assert_eq!(run.state, RunState::Failed);
        assert!(run.error.unwrap().contains("connection refused"));
        assert!(run.outcome.is_none());
        assert_eq!(backend.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_action_creates_no_run() {
        let backend = FixedBackend::new(Ok(ExecutionResult::ok(serde_json::Value::Null)));
        let pipeline = pipeline(Arc::clone(&backend));
        let err = pipeline.handle_signal(&signal("inbox.draftReply")).await.unwrap_err();
        assert!(matches!(err, PipelineError::UnknownAction(id) if id == "inbox.draftReply"));
        assert!(pipeline.list_runs(None, None).is_empty());
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_gated_action_waits_then_executes_on_approve() {
        let backend = FixedBackend::new(Ok(ExecutionResult::ok(serde_json::json!("sent"))));
        let pipeline = pipeline(Arc::clone(&backend));
        let mut events = pipeline.subscribe_events();

        let run = pipeline.handle_signal(&signal("inbox.send_reply")).await.unwrap();
        assert_eq!(run.state, RunState::PendingApproval);
        assert!(backend.calls().is_empty());

        let request_id = run.approval_request_id.unwrap();
        let request = pipeline.get_approval(request_id).unwrap();
        assert_eq!(request.status, ApprovalStatus::Pending);
        assert_eq!(request.tool_name, "inbox.send_reply");
        assert_eq!(request.tenant_id, "tenant-1");
        assert_eq!(request.source.as_deref(), Some("quick_actions"));
        assert_eq!(request.parameters["context"]["moduleContext"]["inbox"]["itemId"], "item-1");

        let run = pipeline.approve(request_id, Some("alice")).await.unwrap();
        assert_eq!(run.state, RunState::Completed);

        let calls = backend.calls();
        assert_eq!(calls.len(), 1);
        let request = pipeline.get_approval(request_id).unwrap();
        assert_eq!(calls[0].approval_token, request.approval_token);
        assert!(calls[0].approval_token.is_some());

        assert_eq!(
            drain(&mut events),
            vec![
                "action_dispatched",
                "approval_requested",
                "approval_decided",
                "execution_started",
                "execution_completed"
            ]
        );
    }

    #[tokio::test]
    async fn test_deny_never_executes() {
        let backend = FixedBackend::new(Ok(ExecutionResult::ok(serde_json::Value::Null)));
        let pipeline = pipeline(Arc::clone(&backend));

        let run = pipeline.handle_signal(&signal("inbox.send_reply")).await.unwrap();
        let request_id = run.approval_request_id.unwrap();
        let run = pipeline.deny(request_id, Some("bob"), Some("not now")).await.unwrap();

        assert_eq!(run.state, RunState::Denied);
        assert_eq!(run.denial_reason.as_deref(), Some("not now"));
        assert!(run.error.is_none());
        assert!(backend.calls().is_empty());

        let request = pipeline.get_approval(request_id).unwrap();
        assert_eq!(request.status, ApprovalStatus::Denied);
        assert!(request.decided_at.is_some());

        let err = pipeline.approve(request_id, None).await.unwrap_err();
        assert!(matches!(err, PipelineError::AlreadyDecided(..)));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_gated_request_is_submitted_under_service_id() {
        let backend = FixedBackend::new(Ok(ExecutionResult::ok(serde_json::Value::Null)));
        let service = Arc::new(FakeApprovals::default());
        let pipeline = pipeline(backend).with_approval_backend(service.clone());

        let run = pipeline.handle_signal(&signal("inbox.send_reply")).await.unwrap();
        assert_eq!(run.state, RunState::PendingApproval);

        let stored = service.stored();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].tool_name, "inbox.send_reply");
        assert_eq!(stored[0].status, ApprovalStatus::Pending);
        assert_eq!(run.approval_request_id, Some(stored[0].id));
        assert_eq!(pipeline.get_approval(stored[0].id).unwrap(), stored[0]);
    }

    #[tokio::test]
    async fn test_unsubmittable_request_keeps_no_run() {
        let backend = FixedBackend::new(Ok(ExecutionResult::ok(serde_json::Value::Null)));
        let pipeline = pipeline(Arc::clone(&backend)).with_approval_backend(FakeApprovals::offline());

        let err = pipeline.handle_signal(&signal("inbox.send_reply")).await.unwrap_err();
        assert!(matches!(err, PipelineError::Backend(BackendError::Network(_))));
        assert!(pipeline.list_runs(None, None).is_empty());
        assert!(pipeline.pending_approvals().is_empty());
        assert!(backend.calls().is_empty());

        // The failed attempt does not hold the in-flight slot.
        let err = pipeline.handle_signal(&signal("inbox.send_reply")).await.unwrap_err();
        assert!(matches!(err, PipelineError::Backend(_)));
    }

    #[tokio::test]
    async fn test_sync_approval_executes_with_service_token() {
        let backend = FixedBackend::new(Ok(ExecutionResult::ok(serde_json::json!("deleted"))));
        let service = Arc::new(FakeApprovals::default());
        let pipeline = pipeline(Arc::clone(&backend)).with_approval_backend(service.clone());

        let run = pipeline.handle_signal(&signal("inbox.send_reply")).await.unwrap();
        let request_id = run.approval_request_id.unwrap();

        // Nothing decided yet.
        let still = pipeline.sync_approval(request_id).await.unwrap();
        assert_eq!(still.state, RunState::PendingApproval);
        assert!(backend.calls().is_empty());

        // Another client approves on the service.
        service.record(request_id, ApprovalStatus::Approved, None);
        let run = pipeline.sync_approval(request_id).await.unwrap();
        assert_eq!(run.state, RunState::Completed);
        assert_eq!(backend.calls()[0].approval_token.as_deref(), Some("server-token"));
        assert_eq!(
            pipeline.get_approval(request_id).unwrap().actor.as_deref(),
            Some("reviewer")
        );

        // Syncing again is a no-op.
        pipeline.sync_approval(request_id).await.unwrap();
        assert_eq!(backend.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_sync_approval_applies_remote_denial() {
        let backend = FixedBackend::new(Ok(ExecutionResult::ok(serde_json::Value::Null)));
        let service = Arc::new(FakeApprovals::default());
        let pipeline = pipeline(Arc::clone(&backend)).with_approval_backend(service.clone());

        let run = pipeline.handle_signal(&signal("inbox.send_reply")).await.unwrap();
        let request_id = run.approval_request_id.unwrap();
        service.record(request_id, ApprovalStatus::Denied, Some("wrong thread"));

        let run = pipeline.sync_approval(request_id).await.unwrap();
        assert_eq!(run.state, RunState::Denied);
        assert_eq!(run.denial_reason.as_deref(), Some("wrong thread"));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_sink_prefers_service_record() {
        let backend = FixedBackend::new(Ok(ExecutionResult::ok(serde_json::Value::Null)));
        let service = Arc::new(FakeApprovals::default());
        let pipeline = pipeline(Arc::clone(&backend)).with_approval_backend(service.clone());

        let run = pipeline.handle_signal(&signal("inbox.send_reply")).await.unwrap();
        let request_id = run.approval_request_id.unwrap();
        service.approve(request_id, Some("admin")).await.unwrap();

        pipeline.approved(request_id, Some("admin")).await.unwrap();
        assert_eq!(pipeline.get_run(run.id).unwrap().state, RunState::Completed);
        assert_eq!(backend.calls()[0].approval_token.as_deref(), Some("server-token"));
    }

    #[tokio::test]
    async fn test_sink_decides_locally_without_service() {
        let backend = FixedBackend::new(Ok(ExecutionResult::ok(serde_json::Value::Null)));
        let pipeline = pipeline(Arc::clone(&backend));

        let run = pipeline.handle_signal(&signal("inbox.send_reply")).await.unwrap();
        let request_id = run.approval_request_id.unwrap();
        pipeline
            .denied(request_id, Some("bob"), Some("later"))
            .await
            .unwrap();
        assert_eq!(pipeline.get_run(run.id).unwrap().state, RunState::Denied);
        assert!(matches!(
            pipeline.approved(Uuid::new_v4(), None).await,
            Err(PipelineError::NoRunForApproval(_))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_pending_approval_rejected() {
        let backend = FixedBackend::new(Ok(ExecutionResult::ok(serde_json::Value::Null)));
        let pipeline = pipeline(backend);

        pipeline.handle_signal(&signal("inbox.send_reply")).await.unwrap();
        let err = pipeline.handle_signal(&signal("inbox.send_reply")).await.unwrap_err();
        assert!(matches!(err, PipelineError::DuplicateInFlight { .. }));
        assert_eq!(pipeline.pending_approvals().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicates_allowed_when_guard_disabled() {
        let backend = FixedBackend::new(Ok(ExecutionResult::ok(serde_json::Value::Null)));
        let pipeline = ExecutionPipeline::new(
            Arc::new(ActionCatalog::shipped()),
            backend,
            "tenant-1",
            PipelineConfig {
                reject_duplicate_in_flight: false,
                ..PipelineConfig::default()
            },
        );
        pipeline.handle_signal(&signal("inbox.send_reply")).await.unwrap();
        pipeline.handle_signal(&signal("inbox.send_reply")).await.unwrap();
        assert_eq!(pipeline.pending_approvals().len(), 2);
    }

    #[tokio::test]
    async fn test_finished_runs_bounded_by_retention() {
        let backend = FixedBackend::new(Ok(ExecutionResult::ok(serde_json::Value::Null)));
        let pipeline = ExecutionPipeline::new(
            Arc::new(ActionCatalog::shipped()),
            backend,
            "tenant-1",
            PipelineConfig {
                retain_finished: 3,
                ..PipelineConfig::default()
            },
        );
        for i in 0..10 {
            let item = format!("item-{}", i);
            pipeline
                .handle_signal(&signal_on("inbox.summarize", &item))
                .await
                .unwrap();
        }
        let pending = pipeline.handle_signal(&signal("inbox.send_reply")).await.unwrap();

        let runs = pipeline.list_runs(None, None);
        assert_eq!(runs.len(), 4);
        assert_eq!(runs[0].id, pending.id);
        assert_eq!(pipeline.list_runs(Some(RunState::Completed), None).len(), 3);
    }

    #[tokio::test]
    async fn test_approve_unknown_request() {
        let backend = FixedBackend::new(Ok(ExecutionResult::ok(serde_json::Value::Null)));
        let pipeline = pipeline(backend);
        let err = pipeline.approve(Uuid::new_v4(), None).await.unwrap_err();
        assert!(matches!(err, PipelineError::NoRunForApproval(_)));
    }

    #[tokio::test]
    async fn test_run_loop_consumes_dispatched_signals() {
        let backend = FixedBackend::new(Ok(ExecutionResult::ok(serde_json::Value::Null)));
        let pipeline = Arc::new(pipeline(Arc::clone(&backend)));
        let dispatcher = ActionDispatcher::default();
        let mut events = pipeline.subscribe_events();

        let worker = {
            let pipeline = Arc::clone(&pipeline);
            let signals = dispatcher.subscribe();
            tokio::spawn(async move { pipeline.run(signals).await })
        };

        dispatcher.dispatch_action_start(
            "inbox.summarize",
            signal("inbox.summarize").context,
            None,
            "chat",
        );

        loop {
            let event = tokio::time::timeout(Duration::from_secs(2), events.recv())
                .await
                .expect("pipeline should emit events")
                .unwrap();
            if event.event_name() == "execution_completed" {
                break;
            }
        }

        pipeline.shutdown();
        tokio::time::timeout(Duration::from_secs(2), worker)
            .await
            .expect("pipeline should shut down within timeout")
            .unwrap();
        assert_eq!(backend.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_run_loop_survives_lag() {
        let backend = FixedBackend::new(Ok(ExecutionResult::ok(serde_json::Value::Null)));
        let pipeline = Arc::new(pipeline(Arc::clone(&backend)));
        let dispatcher = ActionDispatcher::new(1);
        let signals = dispatcher.subscribe();
        let mut events = pipeline.subscribe_events();

        // Overflow the one-slot channel before the loop starts: only the
        // last signal survives.
        for item in ["item-1", "item-2", "item-3"] {
            dispatcher.dispatch_action_start(
                "inbox.summarize",
                signal_on("inbox.summarize", item).context,
                None,
                "chat",
            );
        }

        let worker = {
            let pipeline = Arc::clone(&pipeline);
            tokio::spawn(async move { pipeline.run(signals).await })
        };

        loop {
            let event = tokio::time::timeout(Duration::from_secs(2), events.recv())
                .await
                .expect("pipeline should keep going after lagging")
                .unwrap();
            if event.event_name() == "execution_completed" {
                break;
            }
        }

        // Still consuming after the lag.
        dispatcher.dispatch_action_start(
            "inbox.summarize",
            signal_on("inbox.summarize", "item-4").context,
            None,
            "chat",
        );
        loop {
            let event = tokio::time::timeout(Duration::from_secs(2), events.recv())
                .await
                .expect("pipeline should handle signals sent after the lag")
                .unwrap();
            if event.event_name() == "execution_completed" {
                break;
            }
        }

        pipeline.shutdown();
        tokio::time::timeout(Duration::from_secs(2), worker)
            .await
            .expect("pipeline should shut down within timeout")
            .unwrap();

        let handled: Vec<String> = backend
            .calls()
            .iter()
            .filter_map(|c| c.context.target.as_ref().map(|t| t.id.clone()))
            .collect();
        assert_eq!(handled, vec!["item-3".to_string(), "item-4".to_string()]);
    }

    #[tokio::test]
    async fn test_shutdown_before_run_returns() {
        let backend = FixedBackend::new(Ok(ExecutionResult::ok(serde_json::Value::Null)));
        let pipeline = pipeline(backend);
        let (_tx, rx) = broadcast::channel(4);
        pipeline.shutdown();
        tokio::time::timeout(Duration::from_secs(2), pipeline.run(rx))
            .await
            .expect("pipeline should shut down within timeout");
    }
}
