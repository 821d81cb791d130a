use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatChannel {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub channel_id: String,
    /// User id of the author
    pub author: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    /// Emoji → user ids who reacted with it, in first-use order
    #[serde(default)]
    pub reactions: IndexMap<String, Vec<String>>,
}
