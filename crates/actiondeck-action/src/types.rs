//! Core types and value objects for the action engine.
//!
//! Defines action definitions, runtime contexts, approval requests and the
//! request/response shapes exchanged with the execution backend.

use actiondeck_core::types::{ApprovalStatus, EntityRef, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Sort position used for definitions that do not set `ui_order`.
pub const DEFAULT_UI_ORDER: i32 = 1000;

// =============================================================================
// Enums
// =============================================================================

/// Where in the UI an action may appear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UiPlacement {
    Primary,
    Secondary,
    Menu,
    Hidden,
}

impl UiPlacement {
    pub const ALL: [UiPlacement; 4] = [
        UiPlacement::Primary,
        UiPlacement::Secondary,
        UiPlacement::Menu,
        UiPlacement::Hidden,
    ];
}

impl fmt::Display for UiPlacement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UiPlacement::Primary => write!(f, "primary"),
            UiPlacement::Secondary => write!(f, "secondary"),
            UiPlacement::Menu => write!(f, "menu"),
            UiPlacement::Hidden => write!(f, "hidden"),
        }
    }
}

impl std::str::FromStr for UiPlacement {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "primary" => Ok(UiPlacement::Primary),
            "secondary" => Ok(UiPlacement::Secondary),
            "menu" => Ok(UiPlacement::Menu),
            "hidden" => Ok(UiPlacement::Hidden),
            _ => Err(format!("Unknown placement: {}", s)),
        }
    }
}

// =============================================================================
// Availability
// =============================================================================

/// Whether an action can run right now, and why not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Availability {
    pub available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Availability {
    pub fn available() -> Self {
        Self {
            available: true,
            reason: None,
        }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            available: false,
            reason: Some(reason.into()),
        }
    }
}

/// Action-specific availability predicate. Must be pure.
pub type AvailabilityFn = fn(&ActionContext) -> Availability;

// =============================================================================
// Action definitions
// =============================================================================

/// One catalog entry. Immutable once the catalog is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionDefinition {
    /// Namespaced `<module>.<verb>` token, e.g. `inbox.summarize`.
    pub id: String,
    pub label: String,
    pub description: String,
    /// Symbolic icon name, resolved by [`crate::icon::get_action_icon`].
    pub icon: String,
    pub supported_modules: Vec<String>,
    pub ui_placement: UiPlacement,
    #[serde(default)]
    pub ui_order: Option<i32>,
    #[serde(default)]
    pub requires_approval: bool,
    #[serde(skip)]
    pub availability: Option<AvailabilityFn>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_config: Option<serde_json::Value>,
}

impl ActionDefinition {
    /// Start a definition with the mandatory display fields. Defaults to
    /// secondary placement, no modules and no approval gate.
    pub fn new(id: &str, label: &str, description: &str) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            description: description.to_string(),
            icon: String::new(),
            supported_modules: Vec::new(),
            ui_placement: UiPlacement::Secondary,
            ui_order: None,
            requires_approval: false,
            availability: None,
            default_config: None,
        }
    }

    pub fn icon(mut self, icon: &str) -> Self {
        self.icon = icon.to_string();
        self
    }

    pub fn modules(mut self, modules: &[&str]) -> Self {
        self.supported_modules = modules.iter().map(|m| m.to_string()).collect();
        self
    }

    pub fn placement(mut self, placement: UiPlacement) -> Self {
        self.ui_placement = placement;
        self
    }

    pub fn order(mut self, order: i32) -> Self {
        self.ui_order = Some(order);
        self
    }

    pub fn requires_approval(mut self) -> Self {
        self.requires_approval = true;
        self
    }

    pub fn availability(mut self, predicate: AvailabilityFn) -> Self {
        self.availability = Some(predicate);
        self
    }

    pub fn default_config(mut self, config: serde_json::Value) -> Self {
        self.default_config = Some(config);
        self
    }

    /// `ui_order`, or [`DEFAULT_UI_ORDER`] when unset.
    pub fn effective_order(&self) -> i32 {
        self.ui_order.unwrap_or(DEFAULT_UI_ORDER)
    }

    pub fn supports_module(&self, module: &str) -> bool {
        self.supported_modules.iter().any(|m| m == module)
    }
}

// =============================================================================
// Runtime context
// =============================================================================

/// Free-form field bag for one module (e.g. `{itemId, threadId, channel}`).
pub type ModuleFields = serde_json::Map<String, serde_json::Value>;

/// Per-interaction context handed to the selector and the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionContext {
    pub module: String,
    #[serde(default)]
    pub module_context: BTreeMap<String, ModuleFields>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<EntityRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub selection: Vec<EntityRef>,
}

impl ActionContext {
    pub fn new(module: &str) -> Self {
        Self {
            module: module.to_string(),
            ..Self::default()
        }
    }

    /// Set a field inside `module_context[module]`.
    pub fn with_field(
        mut self,
        module: &str,
        key: &str,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.module_context
            .entry(module.to_string())
            .or_default()
            .insert(key.to_string(), value.into());
        self
    }

    pub fn with_target(mut self, target: EntityRef) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_selection(mut self, selection: Vec<EntityRef>) -> Self {
        self.selection = selection;
        self
    }

    pub fn field(&self, module: &str, key: &str) -> Option<&serde_json::Value> {
        self.module_context.get(module).and_then(|fields| fields.get(key))
    }

    pub fn field_str(&self, module: &str, key: &str) -> Option<&str> {
        self.field(module, key).and_then(|v| v.as_str())
    }
}

// =============================================================================
// Approval requests
// =============================================================================

/// A human-in-the-loop checkpoint for an action flagged `requires_approval`.
///
/// Created `Pending`; decided exactly once; immutable afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub id: Uuid,
    pub tenant_id: String,
    /// The action id this request gates.
    pub tool_name: String,
    #[serde(default)]
    pub parameters: serde_json::Value,
    pub status: ApprovalStatus,
    pub created_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decided_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Response body of `GET /approval-flows/queue`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApprovalQueuePage {
    #[serde(default)]
    pub queue: Vec<ApprovalRequest>,
    #[serde(default)]
    pub total_count: usize,
    #[serde(default)]
    pub pending_count: usize,
}

// =============================================================================
// Execution
// =============================================================================

/// What the execution backend receives once an action clears the gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRequest {
    pub action_id: String,
    pub context: ActionContext,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_config: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_token: Option<String>,
}

/// Completion report from the execution backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionResult {
    pub fn ok(output: serde_json::Value) -> Self {
        Self {
            success: true,
            output: Some(output),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: None,
            error: Some(error.into()),
        }
    }
}
