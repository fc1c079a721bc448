//! Per-module context validation.
//!
//! Decides whether the runtime context of a screen carries the minimum data
//! an action in that module needs. Modules without a registered rule are
//! always accepted.

use std::sync::OnceLock;

use actiondeck_core::types::modules::{CRM, DOCUMENTS, INBOX, REVIEWS, TELEPHONY};
use serde::Serialize;

use crate::types::{ActionContext, Availability};

/// Result of a context check. `reason` names the missing field on failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextCheck {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ContextCheck {
    pub fn ok() -> Self {
        Self {
            ok: true,
            reason: None,
        }
    }

    pub fn missing(module: &str, field: &str) -> Self {
        Self {
            ok: false,
            reason: Some(format!(
                "Missing required field '{}' in {} context",
                field, module
            )),
        }
    }

    pub fn into_availability(self) -> Availability {
        if self.ok {
            Availability::available()
        } else {
            Availability {
                available: false,
                reason: self.reason,
            }
        }
    }
}

/// `module_context[module][field]` must be a non-empty string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextRule {
    pub module: String,
    pub field: String,
}

impl ContextRule {
    pub fn new(module: &str, field: &str) -> Self {
        Self {
            module: module.to_string(),
            field: field.to_string(),
        }
    }
}

/// Rule table keyed by module.
#[derive(Debug, Clone, Default)]
pub struct ContextValidator {
    rules: Vec<ContextRule>,
}

impl ContextValidator {
    /// A validator with no rules; accepts every context.
    pub fn new() -> Self {
        Self::default()
    }

    /// The product's built-in rules.
    pub fn with_default_rules() -> Self {
        let mut validator = Self::new();
        validator.register(ContextRule::new(INBOX, "itemId"));
        validator.register(ContextRule::new(DOCUMENTS, "documentId"));
        validator.register(ContextRule::new(CRM, "customerId"));
        validator.register(ContextRule::new(REVIEWS, "reviewId"));
        validator.register(ContextRule::new(TELEPHONY, "callId"));
        validator
    }

    pub fn register(&mut self, rule: ContextRule) {
        self.rules.push(rule);
    }

    pub fn rules_for<'a>(&'a self, module: &'a str) -> impl Iterator<Item = &'a ContextRule> + 'a {
        self.rules.iter().filter(move |r| r.module == module)
    }

    /// Check `context` against every rule registered for `module`. The first
    /// missing field is reported.
    pub fn validate(&self, module: &str, context: &ActionContext) -> ContextCheck {
        for rule in self.rules_for(module) {
            let present = context
                .field_str(&rule.module, &rule.field)
                .map(|v| !v.trim().is_empty())
                .unwrap_or(false);
            if !present {
                return ContextCheck::missing(&rule.module, &rule.field);
            }
        }
        ContextCheck::ok()
    }
}

/// Process-wide validator with the built-in rules.
pub fn default_validator() -> &'static ContextValidator {
    static VALIDATOR: OnceLock<ContextValidator> = OnceLock::new();
    VALIDATOR.get_or_init(ContextValidator::with_default_rules)
}

/// Validate `context` for `module` using the built-in rules.
pub fn validate_context(module: &str, context: &ActionContext) -> ContextCheck {
    default_validator().validate(module, context)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inbox_with_item_id_is_ok() {
        let ctx = ActionContext::new("inbox")
            .with_field("inbox", "itemId", "test-item-123")
            .with_field("inbox", "threadId", "t")
            .with_field("inbox", "channel", "email");
        assert_eq!(validate_context("inbox", &ctx), ContextCheck::ok());
    }

    #[test]
    fn test_inbox_without_module_context_names_item_id() {
        let ctx = ActionContext::new("inbox");
        let check = validate_context("inbox", &ctx);
        assert!(!check.ok);
        assert!(check.reason.unwrap().contains("itemId"));
    }

    #[test]
    fn test_inbox_empty_item_id_rejected() {
        let ctx = ActionContext::new("inbox").with_field("inbox", "itemId", "  ");
        assert!(!validate_context("inbox", &ctx).ok);
    }

    #[test]
    fn test_non_string_item_id_rejected() {
        let ctx = ActionContext::new("inbox").with_field("inbox", "itemId", 17);
        assert!(!validate_context("inbox", &ctx).ok);
    }

    #[test]
    fn test_documents_rule() {
        let ctx = ActionContext::new("documents").with_field("documents", "documentId", "doc-123");
        assert!(validate_context("documents", &ctx).ok);

        let check = validate_context("documents", &ActionContext::new("documents"));
        assert!(check.reason.unwrap().contains("documentId"));
    }

    #[test]
    fn test_crm_rule() {
        let ctx = ActionContext::new("crm").with_field("crm", "customerId", "c-9");
        assert!(validate_context("crm", &ctx).ok);
        let check = validate_context("crm", &ActionContext::new("crm"));
        assert!(check.reason.unwrap().contains("customerId"));
    }

    #[test]
    fn test_field_under_other_module_does_not_count() {
        let ctx = ActionContext::new("inbox").with_field("crm", "itemId", "wrong-bag");
        assert!(!validate_context("inbox", &ctx).ok);
    }

    #[test]
    fn test_unknown_module_is_permissive() {
        let ctx = ActionContext::new("dashboard");
        assert_eq!(validate_context("dashboard", &ctx), ContextCheck::ok());
        assert!(validate_context("not-a-module", &ctx).ok);
    }

    #[test]
    fn test_registered_rule_applies_to_new_module() {
        let mut validator = ContextValidator::new();
        validator.register(ContextRule::new("marketing", "campaignId"));
        let check = validator.validate("marketing", &ActionContext::new("marketing"));
        assert!(check.reason.unwrap().contains("campaignId"));
    }

    #[test]
    fn test_multiple_rules_report_first_missing() {
        let mut validator = ContextValidator::new();
        validator.register(ContextRule::new("inbox", "itemId"));
        validator.register(ContextRule::new("inbox", "threadId"));
        let ctx = ActionContext::new("inbox").with_field("inbox", "itemId", "i");
        let check = validator.validate("inbox", &ctx);
        assert!(check.reason.unwrap().contains("threadId"));
    }

    #[test]
    fn test_into_availability_keeps_reason() {
        let availability = ContextCheck::missing("inbox", "itemId").into_availability();
        assert!(!availability.available);
        assert!(availability.reason.unwrap().contains("itemId"));
        assert!(ContextCheck::ok().into_availability().available);
    }
}
