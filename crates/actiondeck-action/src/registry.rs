//! Structural validation of the action catalog.
//!
//! Meant to run once from a test or at startup, never per request. A
//! failing report means the catalog was authored wrong.

use std::collections::HashSet;
use std::sync::OnceLock;

use actiondeck_core::types::modules;
use regex::Regex;
use serde::Serialize;

use crate::catalog::{shipped_catalog, ActionCatalog};
use crate::icon::IconKey;

/// Outcome of validating a catalog.
///
/// `warnings` never affect `valid`; they flag entries that still work but
/// probably were not intended (unknown icon names, unknown modules).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegistryReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

fn id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[a-z][a-z0-9_]*\.[a-z][a-z0-9_]*$").expect("action id pattern is valid")
    })
}

/// Validate every entry of `catalog`.
pub fn validate_catalog(catalog: &ActionCatalog) -> RegistryReport {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();

    for def in catalog.iter() {
        if !seen.insert(def.id.as_str()) {
            errors.push(format!("Duplicate action id: {}", def.id));
        }
        if !id_pattern().is_match(&def.id) {
            errors.push(format!(
                "Action id '{}' is not of the form <module>.<verb>",
                def.id
            ));
        }
        if def.label.trim().is_empty() {
            errors.push(format!("Action {} has no label", def.id));
        }
        if def.description.trim().is_empty() {
            errors.push(format!("Action {} has no description", def.id));
        }
        if def.supported_modules.is_empty() {
            errors.push(format!("Action {} supports no modules", def.id));
        }

        for module in &def.supported_modules {
            if !modules::ALL.contains(&module.as_str()) {
                warnings.push(format!("Action {} lists unknown module '{}'", def.id, module));
            }
        }
        if IconKey::parse(&def.icon) == IconKey::Unknown {
            warnings.push(format!(
                "Action {} uses unknown icon '{}', the default will be shown",
                def.id, def.icon
            ));
        }
    }

    if !errors.is_empty() {
        tracing::error!(count = errors.len(), "Action registry validation failed");
    }

    RegistryReport {
        valid: errors.is_empty(),
        errors,
        warnings,
    }
}

/// Validate the shipped catalog.
pub fn validate_action_registry() -> RegistryReport {
    validate_catalog(shipped_catalog())
}
