//! The action catalog.
//!
//! Declarative data: every action a screen can offer, keyed by its
//! namespaced id. The catalog carries no behaviour beyond lookup; selection,
//! validation and execution live in their own modules.

use std::sync::OnceLock;

use actiondeck_core::types::modules::{CRM, DOCUMENTS, INBOX, MARKETING, REVIEWS, TELEPHONY};

use crate::types::{ActionContext, ActionDefinition, Availability, UiPlacement};

/// Ordered collection of action definitions.
#[derive(Debug, Clone, Default)]
pub struct ActionCatalog {
    entries: Vec<ActionDefinition>,
}

impl ActionCatalog {
    /// Build a catalog from raw entries. Duplicates are kept so that the
    /// registry validator can report them.
    pub fn new(entries: Vec<ActionDefinition>) -> Self {
        Self { entries }
    }

    /// The catalog shipped with the product.
    pub fn shipped() -> Self {
        Self::new(shipped_entries())
    }

    /// Look up a definition by id. First match wins.
    pub fn get(&self, id: &str) -> Option<&ActionDefinition> {
        self.entries.iter().find(|d| d.id == id)
    }

    pub fn entries(&self) -> &[ActionDefinition] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActionDefinition> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Process-wide shipped catalog, built on first use.
pub fn shipped_catalog() -> &'static ActionCatalog {
    static CATALOG: OnceLock<ActionCatalog> = OnceLock::new();
    CATALOG.get_or_init(ActionCatalog::shipped)
}

/// Look up a definition in the shipped catalog.
pub fn get_action_definition(id: &str) -> Option<&'static ActionDefinition> {
    shipped_catalog().get(id)
}

// =============================================================================
// Availability predicates
// =============================================================================

const REPLY_CHANNELS: &[&str] = &["email", "whatsapp", "chat"];

fn reply_channel_supported(ctx: &ActionContext) -> Availability {
    match ctx.field_str(INBOX, "channel") {
        Some(channel) if REPLY_CHANNELS.contains(&channel) => Availability::available(),
        Some(channel) => {
            Availability::unavailable(format!("Replies are not supported on channel '{}'", channel))
        }
        None => Availability::unavailable("Conversation has no channel"),
    }
}

fn two_documents_selected(ctx: &ActionContext) -> Availability {
    if ctx.selection.len() >= 2 {
        Availability::available()
    } else {
        Availability::unavailable("Select at least two documents to compare")
    }
}

fn review_has_draft(ctx: &ActionContext) -> Availability {
    let has_draft = ctx
        .field(REVIEWS, "hasDraft")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    if has_draft {
        Availability::available()
    } else {
        Availability::unavailable("Draft a response before publishing")
    }
}

fn campaign_has_audience(ctx: &ActionContext) -> Availability {
    let audience = ctx
        .field(MARKETING, "audienceSize")
        .and_then(|v| v.as_u64())
        .unwrap_or(0);
    if audience > 0 {
        Availability::available()
    } else {
        Availability::unavailable("Campaign has no recipients")
    }
}

// =============================================================================
// Shipped entries
// =============================================================================

fn shipped_entries() -> Vec<ActionDefinition> {
    use UiPlacement::{Hidden, Menu, Primary, Secondary};

    vec![
        // ---- inbox ----
        ActionDefinition::new(
            "inbox.summarize",
            "Summarize",
            "Summarize the conversation into a few key points",
        )
        .icon("SparklesIcon")
        .modules(&[INBOX])
        .placement(Primary)
        .order(10),
        ActionDefinition::new(
            "inbox.draft_reply",
            "Draft reply",
            "Draft a reply in the tone of previous messages",
        )
        .icon("PencilSquareIcon")
        .modules(&[INBOX])
        .placement(Primary)
        .order(20)
        .default_config(serde_json::json!({"tone": "friendly"})),
        ActionDefinition::new(
            "inbox.extract_fields",
            "Extract fields",
            "Pull contact details, dates and amounts out of the message",
        )
        .icon("TableCellsIcon")
        .modules(&[INBOX])
        .placement(Secondary)
        .order(30),
        ActionDefinition::new(
            "inbox.translate",
            "Translate",
            "Translate the conversation into the workspace language",
        )
        .icon("LanguageIcon")
        .modules(&[INBOX])
        .placement(Secondary)
        .order(40),
        ActionDefinition::new(
            "inbox.send_reply",
            "Send reply",
            "Send the drafted reply to the customer",
        )
        .icon("PaperAirplaneIcon")
        .modules(&[INBOX])
        .placement(Secondary)
        .order(50)
        .requires_approval()
        .availability(reply_channel_supported),
        ActionDefinition::new(
            "inbox.classify",
            "Classify",
            "Tag the conversation by topic and urgency",
        )
        .icon("TagIcon")
        .modules(&[INBOX])
        .placement(Menu)
        .order(60),
        ActionDefinition::new(
            "inbox.create_task",
            "Create task",
            "Turn the conversation into a follow-up task",
        )
        .icon("ClipboardDocumentListIcon")
        .modules(&[INBOX])
        .placement(Menu)
        .order(70),
        // ---- documents ----
        ActionDefinition::new(
            "documents.summarize",
            "Summarize",
            "Summarize the document",
        )
        .icon("SparklesIcon")
        .modules(&[DOCUMENTS])
        .placement(Primary)
        .order(10),
        ActionDefinition::new(
            "documents.extract_fields",
            "Extract fields",
            "Extract invoice numbers, parties and due dates",
        )
        .icon("TableCellsIcon")
        .modules(&[DOCUMENTS])
        .placement(Primary)
        .order(20),
        ActionDefinition::new(
            "documents.ask",
            "Ask a question",
            "Answer questions grounded in the document",
        )
        .icon("ChatBubbleLeftRightIcon")
        .modules(&[DOCUMENTS])
        .placement(Secondary)
        .order(30),
        ActionDefinition::new(
            "documents.compare",
            "Compare",
            "Highlight differences between the selected documents",
        )
        .icon("DocumentDuplicateIcon")
        .modules(&[DOCUMENTS])
        .placement(Menu)
        .order(40)
        .availability(two_documents_selected),
        ActionDefinition::new(
            "documents.delete",
            "Delete",
            "Permanently delete the document",
        )
        .icon("TrashIcon")
        .modules(&[DOCUMENTS])
        .placement(Menu)
        .order(90)
        .requires_approval(),
        // ---- crm ----
        ActionDefinition::new(
            "crm.summarize",
            "Summarize customer",
            "Summarize recent activity for this customer",
        )
        .icon("UserCircleIcon")
        .modules(&[CRM])
        .placement(Primary)
        .order(10),
        ActionDefinition::new(
            "crm.draft_email",
            "Draft email",
            "Draft a personalised email to the customer",
        )
        .icon("EnvelopeIcon")
        .modules(&[CRM])
        .placement(Primary)
        .order(20),
        ActionDefinition::new(
            "crm.next_best_action",
            "Next best action",
            "Suggest what to do next with this customer",
        )
        .icon("LightBulbIcon")
        .modules(&[CRM])
        .placement(Secondary)
        .order(30),
        ActionDefinition::new(
            "crm.update_record",
            "Update record",
            "Write extracted details back to the customer record",
        )
        .icon("ArrowPathIcon")
        .modules(&[CRM])
        .placement(Secondary)
        .order(40)
        .requires_approval(),
        ActionDefinition::new(
            "crm.merge_duplicates",
            "Merge duplicates",
            "Merge records that belong to the same customer",
        )
        .icon("UsersIcon")
        .modules(&[CRM])
        .placement(Menu)
        .order(50)
        .requires_approval(),
        // ---- reviews ----
        ActionDefinition::new(
            "reviews.summarize",
            "Summarize reviews",
            "Summarize what customers say across reviews",
        )
        .icon("StarIcon")
        .modules(&[REVIEWS])
        .placement(Primary)
        .order(10),
        ActionDefinition::new(
            "reviews.draft_response",
            "Draft response",
            "Draft a public response to the review",
        )
        .icon("PencilSquareIcon")
        .modules(&[REVIEWS])
        .placement(Primary)
        .order(20),
        ActionDefinition::new(
            "reviews.publish_response",
            "Publish response",
            "Publish the drafted response on the review platform",
        )
        .icon("PaperAirplaneIcon")
        .modules(&[REVIEWS])
        .placement(Secondary)
        .order(30)
        .requires_approval()
        .availability(review_has_draft),
        ActionDefinition::new(
            "reviews.analyze_sentiment",
            "Analyze sentiment",
            "Score the sentiment of the review",
        )
        .icon("FaceSmileIcon")
        .modules(&[REVIEWS])
        .placement(Menu)
        .order(40),
        // ---- telephony ----
        ActionDefinition::new(
            "telephony.summarize_call",
            "Summarize call",
            "Summarize the call transcript",
        )
        .icon("PhoneIcon")
        .modules(&[TELEPHONY])
        .placement(Primary)
        .order(10),
        ActionDefinition::new(
            "telephony.extract_action_items",
            "Action items",
            "List the follow-ups agreed on the call",
        )
        .icon("ListBulletIcon")
        .modules(&[TELEPHONY])
        .placement(Secondary)
        .order(20),
        // ---- marketing ----
        ActionDefinition::new(
            "marketing.generate_campaign",
            "Generate campaign",
            "Generate copy for a new campaign",
        )
        .icon("MegaphoneIcon")
        .modules(&[MARKETING])
        .placement(Primary)
        .order(10),
        ActionDefinition::new(
            "marketing.send_campaign",
            "Send campaign",
            "Send the campaign to its audience",
        )
        .icon("RocketLaunchIcon")
        .modules(&[MARKETING])
        .placement(Secondary)
        .order(20)
        .requires_approval()
        .availability(campaign_has_audience),
        // ---- cross-module ----
        ActionDefinition::new(
            "assistant.explain",
            "Explain",
            "Explain the current item in plain language",
        )
        .icon("QuestionMarkCircleIcon")
        .modules(&[INBOX, DOCUMENTS, CRM, REVIEWS])
        .placement(Menu)
        .order(900),
        ActionDefinition::new(
            "assistant.ask",
            "Ask assistant",
            "Open the assistant with the current item attached",
        )
        .icon("ChatBubbleLeftRightIcon")
        .modules(&[INBOX, DOCUMENTS, CRM, REVIEWS, TELEPHONY, MARKETING])
        .placement(Menu)
        .order(900),
        ActionDefinition::new(
            "assistant.debug_context",
            "Debug context",
            "Dump the action context for support",
        )
        .icon("BugAntIcon")
        .modules(&[INBOX, DOCUMENTS, CRM, REVIEWS, TELEPHONY, MARKETING])
        .placement(Hidden)
        .order(999),
    ]
}
