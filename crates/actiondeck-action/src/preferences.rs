//! User overrides for quick-action ordering and visibility.
//!
//! Persistence sits behind [`PreferencesProvider`]; the selector itself never
//! reads it. Callers merge overrides over the catalog with
//! [`apply_overrides`] and hand the merged list to
//! [`select_actions`](crate::selector::select_actions).

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::catalog::ActionCatalog;
use crate::error::PreferencesError;
use crate::selector::{select_actions, SelectOptions};
use crate::types::ActionDefinition;

/// One user override for an action within a context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuickActionOverride {
    pub action_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ui_order: Option<i32>,
    #[serde(default)]
    pub hidden: bool,
}

impl QuickActionOverride {
    pub fn order(action_id: &str, ui_order: i32) -> Self {
        Self {
            action_id: action_id.to_string(),
            ui_order: Some(ui_order),
            hidden: false,
        }
    }

    pub fn hide(action_id: &str) -> Self {
        Self {
            action_id: action_id.to_string(),
            ui_order: None,
            hidden: true,
        }
    }
}

/// Storage for per-context overrides. `context_key` is opaque to the store;
/// callers typically use the module token.
pub trait PreferencesProvider: Send + Sync {
    fn load(&self, context_key: &str) -> Result<Vec<QuickActionOverride>, PreferencesError>;

    fn save(
        &self,
        context_key: &str,
        overrides: &[QuickActionOverride],
    ) -> Result<(), PreferencesError>;
}

/// Merge `overrides` over `defaults`. Hidden entries are dropped, `ui_order`
/// replaced, and overrides for ids not in `defaults` ignored.
pub fn apply_overrides(
    defaults: &[ActionDefinition],
    overrides: &[QuickActionOverride],
) -> Vec<ActionDefinition> {
    defaults
        .iter()
        .filter_map(|definition| {
            match overrides.iter().rev().find(|o| o.action_id == definition.id) {
                Some(o) if o.hidden => None,
                Some(o) => {
                    let mut merged = definition.clone();
                    if let Some(order) = o.ui_order {
                        merged.ui_order = Some(order);
                    }
                    Some(merged)
                }
                None => Some(definition.clone()),
            }
        })
        .collect()
}

/// Load the overrides for `context_key`, merge them over `catalog` and run
/// the selector. A failing store falls back to the catalog defaults.
pub fn select_with_preferences(
    catalog: &ActionCatalog,
    provider: &dyn PreferencesProvider,
    context_key: &str,
    options: &SelectOptions,
) -> Vec<ActionDefinition> {
    let overrides = match provider.load(context_key) {
        Ok(overrides) => overrides,
        Err(e) => {
            tracing::warn!(context = context_key, error = %e, "Failed to load quick-action preferences; using defaults");
            Vec::new()
        }
    };
    let merged = apply_overrides(catalog.entries(), &overrides);
    select_actions(&merged, options)
}

// =============================================================================
// In-memory store
// =============================================================================

/// Process-local store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryPreferences {
    contexts: Mutex<HashMap<String, Vec<QuickActionOverride>>>,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferencesProvider for MemoryPreferences {
    fn load(&self, context_key: &str) -> Result<Vec<QuickActionOverride>, PreferencesError> {
        let contexts = self
            .contexts
            .lock()
            .map_err(|e| PreferencesError::Unavailable(format!("Lock poisoned: {}", e)))?;
        Ok(contexts.get(context_key).cloned().unwrap_or_default())
    }

    fn save(
        &self,
        context_key: &str,
        overrides: &[QuickActionOverride],
    ) -> Result<(), PreferencesError> {
        let mut contexts = self
            .contexts
            .lock()
            .map_err(|e| PreferencesError::Unavailable(format!("Lock poisoned: {}", e)))?;
        contexts.insert(context_key.to_string(), overrides.to_vec());
        Ok(())
    }
}

// =============================================================================
// TOML file store
// =============================================================================

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct PreferencesFile {
    #[serde(default)]
    contexts: BTreeMap<String, Vec<QuickActionOverride>>,
}

/// File-backed store. The whole file is rewritten on every save.
#[derive(Debug)]
pub struct TomlPreferences {
    path: PathBuf,
    payload: Mutex<PreferencesFile>,
}

impl TomlPreferences {
    /// Open the store at `path`. A missing file starts empty; an unparsable
    /// one is logged and treated as empty so a bad edit cannot lock the user
    /// out of the UI.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PreferencesError> {
        let path = path.into();
        let payload = load_file(&path)?;
        Ok(Self {
            path,
            payload: Mutex::new(payload),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_locked(&self, payload: &PreferencesFile) -> Result<(), PreferencesError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let data = toml::to_string_pretty(payload)?;
        fs::write(&self.path, data)?;
        Ok(())
    }
}

fn load_file(path: &Path) -> Result<PreferencesFile, PreferencesError> {
    match fs::read_to_string(path) {
        Ok(data) => match toml::from_str(&data) {
            Ok(payload) => Ok(payload),
            Err(error) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %error,
                    "Failed to parse preferences file; using defaults"
                );
                Ok(PreferencesFile::default())
            }
        },
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(PreferencesFile::default()),
        Err(error) => Err(PreferencesError::Io(error)),
    }
}

impl PreferencesProvider for TomlPreferences {
    fn load(&self, context_key: &str) -> Result<Vec<QuickActionOverride>, PreferencesError> {
        let payload = self
            .payload
            .lock()
            .map_err(|e| PreferencesError::Unavailable(format!("Lock poisoned: {}", e)))?;
        Ok(payload.contexts.get(context_key).cloned().unwrap_or_default())
    }

    fn save(
        &self,
        context_key: &str,
        overrides: &[QuickActionOverride],
    ) -> Result<(), PreferencesError> {
        let mut payload = self
            .payload
            .lock()
            .map_err(|e| PreferencesError::Unavailable(format!("Lock poisoned: {}", e)))?;
        payload
            .contexts
            .insert(context_key.to_string(), overrides.to_vec());
        self.write_locked(&payload)
    }
}
