//! Typed "run this action now" channel.
//!
//! The application root owns one [`ActionDispatcher`] and hands clones to
//! the UI surfaces that trigger actions and to the pipeline that executes
//! them. Dispatch is fire-and-forget: no validation, no acknowledgement.

use actiondeck_core::types::Timestamp;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::legacy::canonical_action_id;
use crate::types::ActionContext;

/// Default channel capacity. Slow receivers past this lag and lose signals.
pub const DEFAULT_DISPATCH_CAPACITY: usize = 256;

/// One dispatched action, as broadcast to every subscriber.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionStartSignal {
    pub action_id: String,
    pub context: ActionContext,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_config: Option<serde_json::Value>,
    /// Which surface fired the action, e.g. `quick_actions` or `chat`.
    pub source: String,
    pub timestamp: Timestamp,
}

/// Broadcast sender for [`ActionStartSignal`]s. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ActionDispatcher {
    tx: broadcast::Sender<ActionStartSignal>,
}

impl ActionDispatcher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Register a receiver. Only signals sent after this call are seen.
    pub fn subscribe(&self) -> broadcast::Receiver<ActionStartSignal> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Broadcast a start signal. Legacy ids are rewritten to their canonical
    /// form here and nowhere else; the caller is expected to have checked
    /// availability already.
    pub fn dispatch_action_start(
        &self,
        action_id: &str,
        context: ActionContext,
        default_config: Option<serde_json::Value>,
        source: &str,
    ) {
        let canonical = canonical_action_id(action_id);
        if canonical != action_id {
            tracing::debug!(legacy = action_id, canonical, "Rewrote legacy action id");
        }

        let signal = ActionStartSignal {
            action_id: canonical.to_string(),
            context,
            default_config,
            source: source.to_string(),
            timestamp: Timestamp::now(),
        };

        match self.tx.send(signal) {
            Ok(receivers) => {
                tracing::debug!(action_id = canonical, source, receivers, "Action dispatched");
            }
            Err(_) => {
                tracing::debug!(action_id = canonical, source, "Action dispatched with no subscribers");
            }
        }
    }
}

impl Default for ActionDispatcher {
    fn default() -> Self {
        Self::new(DEFAULT_DISPATCH_CAPACITY)
    }
}
