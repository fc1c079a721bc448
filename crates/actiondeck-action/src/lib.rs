//! Action registry and execution pipeline.
//!
//! The catalog declares what actions exist; the selector decides which of
//! them a screen offers; the dispatcher signals a click; the pipeline gates
//! sensitive actions behind human approval and hands the rest to the
//! execution backend.

pub mod approval;
pub mod backend;
pub mod catalog;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod icon;
pub mod legacy;
pub mod pipeline;
pub mod preferences;
pub mod queue;
pub mod registry;
pub mod runs;
pub mod selector;
pub mod types;

pub use approval::state_machine::{validate_transition, RunState};
pub use approval::ApprovalGate;
pub use backend::{ApprovalBackend, ExecutionBackend};
pub use catalog::{get_action_definition, shipped_catalog, ActionCatalog};
pub use context::{validate_context, ContextCheck, ContextRule, ContextValidator};
pub use dispatch::{ActionDispatcher, ActionStartSignal};
pub use error::{BackendError, PipelineError, PreferencesError};
pub use icon::{get_action_icon, Icon, IconKey, DEFAULT_ICON};
pub use legacy::{canonical_action_id, LEGACY_ACTION_IDS};
pub use pipeline::ExecutionPipeline;
pub use preferences::{
    apply_overrides, select_with_preferences, MemoryPreferences, PreferencesProvider,
    QuickActionOverride, TomlPreferences,
};
pub use queue::{ApprovalQueue, DecisionSink, QueueSnapshot};
pub use registry::{validate_action_registry, validate_catalog, RegistryReport};
pub use runs::{ActionRun, RunStore};
pub use selector::{
    annotate, bucket_by_placement, get_action_availability, get_actions_for_ui,
    get_primary_actions, get_secondary_actions, select_actions, split_primary, AnnotatedAction,
    PlacementBuckets, SelectOptions,
};
pub use types::{
    ActionContext, ActionDefinition, ApprovalQueuePage, ApprovalRequest, Availability,
    ExecutionRequest, ExecutionResult, UiPlacement,
};
