use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What kind of mutation an activity entry records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityAction {
    Created,
    Updated,
    StatusChanged,
    Deleted,
    Commented,
    Shared,
    Converted,
    Posted,
    Reacted,
}

impl fmt::Display for ActivityAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ActivityAction::Created => "created",
            ActivityAction::Updated => "updated",
            ActivityAction::StatusChanged => "status_changed",
            ActivityAction::Deleted => "deleted",
            ActivityAction::Commented => "commented",
            ActivityAction::Shared => "shared",
            ActivityAction::Converted => "converted",
            ActivityAction::Posted => "posted",
            ActivityAction::Reacted => "reacted",
        };
        write!(f, "{}", s)
    }
}

/// Append-only audit record, one per mutating action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityLogEntry {
    pub timestamp: DateTime<Utc>,
    /// User id of the actor
    pub user: String,
    pub action: ActivityAction,
    /// Human-facing target, e.g. `order OS-004`
    pub target: String,
    #[serde(default)]
    pub details: String,
}
