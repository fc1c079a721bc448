//! Migration table for historical camelCase action ids.

/// `(legacy, canonical)` pairs. Canonical ids are `<module>.<snake_verb>`.
pub const LEGACY_ACTION_IDS: &[(&str, &str)] = &[
    ("inbox.draftReply", "inbox.draft_reply"),
    ("inbox.extractFields", "inbox.extract_fields"),
    ("documents.extractFields", "documents.extract_fields"),
    ("crm.draftEmail", "crm.draft_email"),
    ("reviews.draftResponse", "reviews.draft_response"),
];

/// Map a legacy id to its canonical form. Unmapped ids pass through.
pub fn canonical_action_id(id: &str) -> &str {
    LEGACY_ACTION_IDS
        .iter()
        .find(|(legacy, _)| *legacy == id)
        .map(|(_, canonical)| *canonical)
        .unwrap_or(id)
}
