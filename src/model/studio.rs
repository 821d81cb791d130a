use std::path::PathBuf;

use super::activity::ActivityLogEntry;
use super::chat::{ChatChannel, ChatMessage};
use super::config::StudioConfig;
use super::finance::FinancialEntry;
use super::order::ServiceOrder;
use super::sales::{CommercialQuote, Opportunity};
use super::user::User;

/// A fully loaded studio store
#[derive(Debug)]
pub struct Studio {
    /// Root directory (parent of `studio/`)
    pub root: PathBuf,
    /// Path to the `studio/` directory
    pub store_dir: PathBuf,
    /// Parsed studio.toml
    pub config: StudioConfig,
    pub orders: Vec<ServiceOrder>,
    pub users: Vec<User>,
    pub quotes: Vec<CommercialQuote>,
    pub opportunities: Vec<Opportunity>,
    pub finance: Vec<FinancialEntry>,
    pub channels: Vec<ChatChannel>,
    pub messages: Vec<ChatMessage>,
    /// Activity log, oldest first
    pub activity: Vec<ActivityLogEntry>,
}

impl Studio {
    /// Look an order up by document id or by order number (case-insensitive)
    pub fn find_order(&self, key: &str) -> Option<&ServiceOrder> {
        self.orders
            .iter()
            .find(|o| o.id == key || o.number.eq_ignore_ascii_case(key))
    }

    pub fn find_user(&self, id: &str) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    pub fn find_channel(&self, key: &str) -> Option<&ChatChannel> {
        self.channels.iter().find(|c| c.id == key || c.name == key)
    }
}
