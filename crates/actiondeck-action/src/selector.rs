//! Which actions a screen may offer, in which order.
//!
//! Filtering is by module, placement, whitelist and blacklist only.
//! Availability never removes an entry: it is attached afterwards so the UI
//! can show a disabled affordance with the reason.

use std::cmp::Ordering;

use serde::Serialize;

use crate::catalog::shipped_catalog;
use crate::context::{default_validator, ContextValidator};
use crate::icon::{get_action_icon, Icon};
use crate::types::{ActionContext, ActionDefinition, Availability, UiPlacement};

/// Placements returned when the caller does not ask for specific ones.
pub const DEFAULT_PLACEMENTS: [UiPlacement; 2] = [UiPlacement::Primary, UiPlacement::Secondary];

/// Selector request.
#[derive(Debug, Clone, Default)]
pub struct SelectOptions {
    pub module: String,
    /// `None` means [`DEFAULT_PLACEMENTS`].
    pub placement: Option<Vec<UiPlacement>>,
    pub whitelist: Option<Vec<String>>,
    pub blacklist: Option<Vec<String>>,
    /// Carried for availability annotation; not used for filtering.
    pub context: Option<ActionContext>,
}

impl SelectOptions {
    pub fn for_module(module: &str) -> Self {
        Self {
            module: module.to_string(),
            ..Self::default()
        }
    }

    pub fn with_placement(mut self, placement: &[UiPlacement]) -> Self {
        self.placement = Some(placement.to_vec());
        self
    }

    pub fn with_whitelist(mut self, ids: &[&str]) -> Self {
        self.whitelist = Some(ids.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn with_blacklist(mut self, ids: &[&str]) -> Self {
        self.blacklist = Some(ids.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn with_context(mut self, context: ActionContext) -> Self {
        self.context = Some(context);
        self
    }
}

/// Filter and sort `definitions` for `options`. Pure.
pub fn select_actions(
    definitions: &[ActionDefinition],
    options: &SelectOptions,
) -> Vec<ActionDefinition> {
    let placements: &[UiPlacement] = options.placement.as_deref().unwrap_or(&DEFAULT_PLACEMENTS);

    let mut selected: Vec<ActionDefinition> = definitions
        .iter()
        .filter(|d| d.supports_module(&options.module))
        .filter(|d| placements.contains(&d.ui_placement))
        .filter(|d| match &options.whitelist {
            Some(ids) => ids.iter().any(|id| *id == d.id),
            None => true,
        })
        .filter(|d| match &options.blacklist {
            Some(ids) => !ids.iter().any(|id| *id == d.id),
            None => true,
        })
        .cloned()
        .collect();

    sort_actions(&mut selected);
    selected
}

/// Stable sort by `(ui_order, label)`.
pub fn sort_actions(actions: &mut [ActionDefinition]) {
    actions.sort_by(|a, b| {
        a.effective_order()
            .cmp(&b.effective_order())
            .then_with(|| compare_labels(&a.label, &b.label))
    });
}

/// Select from the shipped catalog.
pub fn get_actions_for_ui(options: &SelectOptions) -> Vec<ActionDefinition> {
    select_actions(shipped_catalog().entries(), options)
}

pub fn get_primary_actions(module: &str) -> Vec<ActionDefinition> {
    get_actions_for_ui(&SelectOptions::for_module(module).with_placement(&[UiPlacement::Primary]))
}

pub fn get_secondary_actions(module: &str) -> Vec<ActionDefinition> {
    get_actions_for_ui(&SelectOptions::for_module(module).with_placement(&[UiPlacement::Secondary]))
}

// =============================================================================
// Label collation
// =============================================================================

fn fold_char(c: char, out: &mut String) -> bool {
    match c {
        'ä' | 'à' | 'á' | 'â' | 'ã' | 'å' => out.push('a'),
        'ö' | 'ò' | 'ó' | 'ô' | 'õ' => out.push('o'),
        'ü' | 'ù' | 'ú' | 'û' => out.push('u'),
        'é' | 'è' | 'ê' | 'ë' => out.push('e'),
        'í' | 'ì' | 'î' | 'ï' => out.push('i'),
        'ç' => out.push('c'),
        'ñ' => out.push('n'),
        'ß' => out.push_str("ss"),
        other => {
            out.push(other);
            return false;
        }
    }
    true
}

fn primary_key(label: &str) -> (String, Vec<bool>) {
    let mut key = String::with_capacity(label.len());
    let mut accents = Vec::with_capacity(label.len());
    for c in label.chars() {
        for lower in c.to_lowercase() {
            accents.push(fold_char(lower, &mut key));
        }
    }
    (key, accents)
}

/// Compare two labels the way a German collation would: base letters first
/// (umlauts sort with their vowel, `ß` as `ss`), then unaccented before
/// accented, then lowercase before uppercase.
pub fn compare_labels(a: &str, b: &str) -> Ordering {
    let (key_a, accents_a) = primary_key(a);
    let (key_b, accents_b) = primary_key(b);
    key_a
        .cmp(&key_b)
        .then_with(|| accents_a.cmp(&accents_b))
        .then_with(|| {
            let case_a: Vec<bool> = a.chars().map(char::is_uppercase).collect();
            let case_b: Vec<bool> = b.chars().map(char::is_uppercase).collect();
            case_a.cmp(&case_b)
        })
        .then_with(|| a.cmp(b))
}

// =============================================================================
// Availability annotation
// =============================================================================

/// Availability of `definition` under `context`, checking the context rules
/// of `validator` first and the definition's own predicate second.
pub fn availability_with(
    validator: &ContextValidator,
    definition: &ActionDefinition,
    context: &ActionContext,
) -> Availability {
    let check = validator.validate(&context.module, context);
    if !check.ok {
        return check.into_availability();
    }
    match definition.availability {
        Some(predicate) => predicate(context),
        None => Availability::available(),
    }
}

/// Availability using the built-in context rules.
pub fn definition_availability(
    definition: &ActionDefinition,
    context: &ActionContext,
) -> Availability {
    availability_with(default_validator(), definition, context)
}

/// Availability for an id in the shipped catalog.
pub fn get_action_availability(id: &str, context: &ActionContext) -> Availability {
    match shipped_catalog().get(id) {
        Some(definition) => definition_availability(definition, context),
        None => Availability::unavailable(format!("Unknown action '{}'", id)),
    }
}

/// A selected action ready for rendering.
#[derive(Debug, Clone, Serialize)]
pub struct AnnotatedAction {
    pub definition: ActionDefinition,
    pub availability: Availability,
    pub icon: Icon,
}

/// Attach availability and the resolved icon to every action.
pub fn annotate(actions: Vec<ActionDefinition>, context: &ActionContext) -> Vec<AnnotatedAction> {
    actions
        .into_iter()
        .map(|definition| {
            let availability = definition_availability(&definition, context);
            let icon = get_action_icon(Some(definition.icon.as_str()));
            AnnotatedAction {
                definition,
                availability,
                icon,
            }
        })
        .collect()
}

// =============================================================================
// Placement bucketing
// =============================================================================

/// Sorted actions grouped for rendering. Hidden entries are dropped.
#[derive(Debug, Clone, Default)]
pub struct PlacementBuckets {
    pub primary: Vec<ActionDefinition>,
    pub secondary: Vec<ActionDefinition>,
    pub menu: Vec<ActionDefinition>,
}

pub fn bucket_by_placement(actions: Vec<ActionDefinition>) -> PlacementBuckets {
    let mut buckets = PlacementBuckets::default();
    for action in actions {
        match action.ui_placement {
            UiPlacement::Primary => buckets.primary.push(action),
            UiPlacement::Secondary => buckets.secondary.push(action),
            UiPlacement::Menu => buckets.menu.push(action),
            UiPlacement::Hidden => {}
        }
    }
    buckets
}

/// First `n` as primary buttons, the rest for the overflow.
pub fn split_primary(
    mut actions: Vec<ActionDefinition>,
    n: usize,
) -> (Vec<ActionDefinition>, Vec<ActionDefinition>) {
    let rest = actions.split_off(n.min(actions.len()));
    (actions, rest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ActionCatalog;

    fn def(id: &str, label: &str, placement: UiPlacement, order: Option<i32>) -> ActionDefinition {
        let mut d = ActionDefinition::new(id, label, "description")
            .icon("SparklesIcon")
            .modules(&["inbox"])
            .placement(placement);
        d.ui_order = order;
        d
    }

    #[test]
    fn test_inbox_only_returns_inbox_entries() {
        let actions = get_actions_for_ui(&SelectOptions::for_module("inbox"));
        assert!(!actions.is_empty());
        for action in &actions {
            assert!(action.supports_module("inbox"), "{}", action.id);
        }
    }

    #[test]
    fn test_default_placement_is_primary_and_secondary() {
        let actions = get_actions_for_ui(&SelectOptions::for_module("inbox"));
        for action in &actions {
            assert!(DEFAULT_PLACEMENTS.contains(&action.ui_placement));
        }
        assert!(actions.iter().all(|a| a.id != "inbox.classify"));
    }

    #[test]
    fn test_whitelist_limits_to_listed_ids() {
        let options = SelectOptions::for_module("inbox")
            .with_whitelist(&["inbox.summarize", "inbox.draft_reply"]);
        let actions = get_actions_for_ui(&options);
        assert!(actions.len() <= 2);
        let ids: Vec<&str> = actions.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["inbox.summarize", "inbox.draft_reply"]);
    }

    #[test]
    fn test_whitelist_does_not_bypass_placement() {
        let options = SelectOptions::for_module("inbox").with_whitelist(&["inbox.classify"]);
        assert!(get_actions_for_ui(&options).is_empty());

        let options = options.with_placement(&[UiPlacement::Menu]);
        assert_eq!(get_actions_for_ui(&options).len(), 1);
    }

    #[test]
    fn test_blacklist_removes_entry() {
        let all = get_actions_for_ui(&SelectOptions::for_module("inbox"));
        let filtered =
            get_actions_for_ui(&SelectOptions::for_module("inbox").with_blacklist(&["inbox.summarize"]));
        assert!(filtered.len() < all.len());
        assert!(filtered.iter().all(|a| a.id != "inbox.summarize"));
    }

    #[test]
    fn test_blacklist_wins_over_whitelist() {
        let options = SelectOptions::for_module("inbox")
            .with_whitelist(&["inbox.summarize"])
            .with_blacklist(&["inbox.summarize"]);
        assert!(get_actions_for_ui(&options).is_empty());
    }

    #[test]
    fn test_unknown_module_yields_nothing() {
        assert!(get_actions_for_ui(&SelectOptions::for_module("fax")).is_empty());
    }

    #[test]
    fn test_sorted_by_order_then_label() {
        let catalog = ActionCatalog::new(vec![
            def("inbox.c", "Zebra", UiPlacement::Primary, Some(10)),
            def("inbox.a", "Äpfel", UiPlacement::Primary, Some(10)),
            def("inbox.b", "Birne", UiPlacement::Primary, Some(10)),
            def("inbox.d", "Alpha", UiPlacement::Primary, Some(5)),
            def("inbox.e", "Unordered", UiPlacement::Primary, None),
        ]);
        let actions = select_actions(catalog.entries(), &SelectOptions::for_module("inbox"));
        let labels: Vec<&str> = actions.iter().map(|a| a.label.as_str()).collect();
        assert_eq!(labels, vec!["Alpha", "Äpfel", "Birne", "Zebra", "Unordered"]);
    }

    #[test]
    fn test_sort_is_idempotent() {
        let mut actions = get_actions_for_ui(
            &SelectOptions::for_module("inbox").with_placement(&UiPlacement::ALL),
        );
        let first: Vec<String> = actions.iter().map(|a| a.id.clone()).collect();
        sort_actions(&mut actions);
        let second: Vec<String> = actions.iter().map(|a| a.id.clone()).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_equal_order_neighbours_are_label_sorted() {
        for module in actiondeck_core::types::modules::ALL {
            let actions = get_actions_for_ui(
                &SelectOptions::for_module(module).with_placement(&UiPlacement::ALL),
            );
            for pair in actions.windows(2) {
                assert!(pair[0].effective_order() <= pair[1].effective_order());
                if pair[0].effective_order() == pair[1].effective_order() {
                    assert_ne!(
                        compare_labels(&pair[0].label, &pair[1].label),
                        Ordering::Greater
                    );
                }
            }
        }
    }

    #[test]
    fn test_compare_labels_german_rules() {
        assert_eq!(compare_labels("Apfel", "Äpfel"), Ordering::Less);
        assert_eq!(compare_labels("Äpfel", "Ast"), Ordering::Less);
        assert_eq!(compare_labels("Straße", "Strasse"), Ordering::Greater);
        assert_eq!(compare_labels("strasse", "Straße"), Ordering::Less);
        assert_eq!(compare_labels("abc", "ABC"), Ordering::Less);
        assert_eq!(compare_labels("Über", "Zebra"), Ordering::Less);
        assert_eq!(compare_labels("same", "same"), Ordering::Equal);
    }

    #[test]
    fn test_primary_and_secondary_wrappers() {
        let primary = get_primary_actions("crm");
        assert!(!primary.is_empty());
        assert!(primary.iter().all(|a| a.ui_placement == UiPlacement::Primary));

        let secondary = get_secondary_actions("crm");
        assert!(!secondary.is_empty());
        assert!(secondary.iter().all(|a| a.ui_placement == UiPlacement::Secondary));
    }

    #[test]
    fn test_availability_context_failure_wins() {
        let def = shipped_catalog().get("inbox.send_reply").unwrap();
        let ctx = ActionContext::new("inbox").with_field("inbox", "channel", "email");
        let availability = definition_availability(def, &ctx);
        assert!(!availability.available);
        assert!(availability.reason.unwrap().contains("itemId"));
    }

    #[test]
    fn test_availability_predicate_after_context() {
        let def = shipped_catalog().get("inbox.send_reply").unwrap();
        let ctx = ActionContext::new("inbox")
            .with_field("inbox", "itemId", "i-1")
            .with_field("inbox", "channel", "sms");
        let availability = definition_availability(def, &ctx);
        assert!(!availability.available);
        assert!(availability.reason.unwrap().contains("sms"));

        let ctx = ctx.with_field("inbox", "channel", "email");
        assert!(definition_availability(def, &ctx).available);
    }

    #[test]
    fn test_availability_without_predicate() {
        let ctx = ActionContext::new("inbox").with_field("inbox", "itemId", "i-1");
        assert_eq!(
            get_action_availability("inbox.summarize", &ctx),
            Availability::available()
        );
    }

    #[test]
    fn test_availability_unknown_id() {
        let availability = get_action_availability("inbox.nope", &ActionContext::new("inbox"));
        assert!(!availability.available);
        assert!(availability.reason.unwrap().contains("inbox.nope"));
    }

    #[test]
    fn test_annotate_keeps_unavailable_entries() {
        let actions = get_actions_for_ui(&SelectOptions::for_module("inbox"));
        let count = actions.len();
        let annotated = annotate(actions, &ActionContext::new("inbox"));
        assert_eq!(annotated.len(), count);
        assert!(annotated.iter().all(|a| !a.availability.available));
        assert!(annotated.iter().all(|a| !a.icon.glyph.is_empty()));
    }

    #[test]
    fn test_bucket_by_placement_drops_hidden() {
        let actions = get_actions_for_ui(
            &SelectOptions::for_module("inbox").with_placement(&UiPlacement::ALL),
        );
        let total = actions.len();
        let hidden = actions
            .iter()
            .filter(|a| a.ui_placement == UiPlacement::Hidden)
            .count();
        assert!(hidden > 0);
        let buckets = bucket_by_placement(actions);
        assert_eq!(
            buckets.primary.len() + buckets.secondary.len() + buckets.menu.len(),
            total - hidden
        );
        assert!(buckets.menu.iter().all(|a| a.ui_placement == UiPlacement::Menu));
    }

    #[test]
    fn test_split_primary() {
        let actions = get_actions_for_ui(&SelectOptions::for_module("inbox"));
        let total = actions.len();
        let (head, tail) = split_primary(actions.clone(), 2);
        assert_eq!(head.len(), 2);
        assert_eq!(tail.len(), total - 2);
        assert_eq!(head[0].id, actions[0].id);

        let (head, tail) = split_primary(actions, 100);
        assert_eq!(head.len(), total);
        assert!(tail.is_empty());
    }
}
