use std::fmt;

use serde::{Deserialize, Serialize};

/// Authorization role of a staff member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Assistant,
    Viewer,
}

impl Role {
    /// Create and update documents
    pub fn can_edit(self) -> bool {
        matches!(self, Role::Admin | Role::Assistant)
    }

    /// Hard-delete documents and manage users
    pub fn can_delete(self) -> bool {
        self == Role::Admin
    }

    pub fn parse_role(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "assistant" => Some(Role::Assistant),
            "viewer" => Some(Role::Viewer),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::Assistant => write!(f, "assistant"),
            Role::Viewer => write!(f, "viewer"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub role: Role,
}
