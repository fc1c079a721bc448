use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Module tokens
// =============================================================================

/// Well-known module tokens.
///
/// Modules are an open set: any string is a valid module token, these are
/// just the ones the shipped catalog and context rules refer to.
pub mod modules {
    pub const INBOX: &str = "inbox";
    pub const DOCUMENTS: &str = "documents";
    pub const CRM: &str = "crm";
    pub const REVIEWS: &str = "reviews";
    pub const TELEPHONY: &str = "telephony";
    pub const MARKETING: &str = "marketing";
    pub const DASHBOARD: &str = "dashboard";

    /// Every module token the product ships with.
    pub const ALL: &[&str] = &[INBOX, DOCUMENTS, CRM, REVIEWS, TELEPHONY, MARKETING, DASHBOARD];
}

// =============================================================================
// Enums
// =============================================================================

/// Lifecycle of an approval request.
///
/// Created `Pending`, decided exactly once, immutable afterwards.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    #[default]
    Pending,
    Approved,
    Denied,
}

impl ApprovalStatus {
    pub fn is_decided(&self) -> bool {
        !matches!(self, ApprovalStatus::Pending)
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApprovalStatus::Pending => write!(f, "pending"),
            ApprovalStatus::Approved => write!(f, "approved"),
            ApprovalStatus::Denied => write!(f, "denied"),
        }
    }
}

impl std::str::FromStr for ApprovalStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ApprovalStatus::Pending),
            "approved" => Ok(ApprovalStatus::Approved),
            "denied" => Ok(ApprovalStatus::Denied),
            _ => Err(format!("Unknown approval status: {}", s)),
        }
    }
}

// =============================================================================
// Value objects
// =============================================================================

/// Reference to the entity an action operates on (an inbox item, a
/// document, a customer record, ...).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: String,
    pub id: String,
}

impl EntityRef {
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
        }
    }
}

/// Unix timestamp in milliseconds since epoch.
///
/// Compared by value. Two Timestamps with the same inner value are equal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn now() -> Self {
        Self(Utc::now().timestamp_millis())
    }

    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt.timestamp_millis())
    }

    pub fn to_datetime(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.0).unwrap_or_default()
    }

    /// Milliseconds elapsed since this timestamp, clamped at zero.
    pub fn elapsed_ms(&self) -> u64 {
        (Timestamp::now().0 - self.0).max(0) as u64
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_datetime().to_rfc3339())
    }
}
