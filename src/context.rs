//! The data context: single mutator of the loaded studio.
//!
//! Every write goes to the store first and is mirrored into the in-memory
//! collections only after it succeeds. Each mutating action appends one
//! activity log entry and may queue a transient notification. Nothing is
//! retried: a failed write surfaces as an error to the caller.

use std::path::Path;

use chrono::{NaiveDate, Utc};
use serde::Serialize;

use crate::io::config_io;
use crate::io::lock::StoreLock;
use crate::io::store_io::{self, Collection, StoreError};
use crate::io::watcher::StoreEvent;
use crate::model::activity::{ActivityAction, ActivityLogEntry};
use crate::model::chat::{ChatChannel, ChatMessage};
use crate::model::config::SavedView;
use crate::model::finance::{EntryKind, FinancialEntry};
use crate::model::order::{Comment, ServiceOrder, next_order_number};
use crate::model::sales::{
    CommercialQuote, Opportunity, OpportunityStatus, QuoteItem, QuoteStatus,
};
use crate::model::studio::Studio;
use crate::model::user::{Role, User};
use crate::model::workflow::{KanbanColumn, Workflow};
use crate::ops::autosave::OrderSink;
use crate::ops::portal::{self, PortalError, PortalView};
use crate::ops::status::{self, StatusError, Transition};
use crate::ops::{chat_ops, sales_ops};

/// Error type for data context operations
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Status(#[from] StatusError),
    #[error(transparent)]
    Portal(#[from] PortalError),
    #[error("no acting user: pass --as <user> or set [session] user in studio.toml")]
    NoActor,
    #[error("unknown user: {0}")]
    UnknownUser(String),
    #[error("{user} ({role}) is not allowed to {action}")]
    PermissionDenied {
        user: String,
        role: Role,
        action: &'static str,
    },
    #[error("{kind} not found: {key}")]
    NotFound { kind: &'static str, key: String },
    #[error("{0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Info,
    Success,
    Mention,
}

/// A transient message for the user, never persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
}

/// Fields for a new order; everything else starts empty
#[derive(Debug, Clone, Default)]
pub struct NewOrder {
    pub client: String,
    pub title: String,
    pub value: f64,
    pub costs: f64,
    pub responsible: Option<String>,
    pub expected_delivery_date: Option<NaiveDate>,
    /// Defaults to the first workflow column
    pub status: Option<String>,
}

fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

fn not_found(kind: &'static str, key: &str) -> ContextError {
    ContextError::NotFound {
        kind,
        key: key.to_string(),
    }
}

pub struct DataContext {
    studio: Studio,
    workflow: Workflow,
    actor: Option<String>,
    notifications: Vec<Notification>,
}

impl DataContext {
    /// Load the studio under `root`. The actor defaults to the session user.
    pub fn open(root: &Path, actor: Option<&str>) -> Result<Self, ContextError> {
        let studio = store_io::load_studio(root)?;
        Self::from_studio(studio, actor)
    }

    pub fn from_studio(studio: Studio, actor: Option<&str>) -> Result<Self, ContextError> {
        let workflow = studio.config.workflow().map_err(StoreError::from)?;
        let actor = actor
            .map(str::to_string)
            .or_else(|| studio.config.session.user.clone());
        Ok(DataContext {
            studio,
            workflow,
            actor,
            notifications: Vec::new(),
        })
    }

    pub fn studio(&self) -> &Studio {
        &self.studio
    }

    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    pub fn store_dir(&self) -> &Path {
        &self.studio.store_dir
    }

    /// The acting user, if one is configured and exists
    pub fn actor(&self) -> Option<&User> {
        self.actor.as_deref().and_then(|id| self.studio.find_user(id))
    }

    /// Take all queued notifications
    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    fn notify(&mut self, kind: NotificationKind, message: String) {
        self.notifications.push(Notification { kind, message });
    }

    /// Resolve the actor and check `allowed` against their role
    fn require(&self, action: &'static str, allowed: fn(Role) -> bool) -> Result<String, ContextError> {
        let id = self.actor.as_deref().ok_or(ContextError::NoActor)?;
        let user = self
            .studio
            .find_user(id)
            .ok_or_else(|| ContextError::UnknownUser(id.to_string()))?;
        if !allowed(user.role) {
            tracing::info!(user = %user.id, action, "permission denied");
            return Err(ContextError::PermissionDenied {
                user: user.id.clone(),
                role: user.role,
                action,
            });
        }
        Ok(user.id.clone())
    }

    fn persist<T: Serialize>(&self, collection: Collection, id: &str, doc: &T) -> Result<(), ContextError> {
        let _lock = StoreLock::acquire_default(&self.studio.store_dir).map_err(StoreError::from)?;
        store_io::save_document(&self.studio.store_dir, collection, id, doc)?;
        Ok(())
    }

    fn log(
        &mut self,
        user: &str,
        action: ActivityAction,
        target: String,
        details: String,
    ) -> Result<(), ContextError> {
        let entry = ActivityLogEntry {
            timestamp: Utc::now(),
            user: user.to_string(),
            action,
            target,
            details,
        };
        {
            let _lock = StoreLock::acquire_default(&self.studio.store_dir).map_err(StoreError::from)?;
            store_io::append_activity(&self.studio.store_dir, &entry)?;
        }
        self.studio.activity.push(entry);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Subscription
    // -----------------------------------------------------------------------

    /// Re-read whatever a store event says changed on disk
    pub fn apply_event(&mut self, event: &StoreEvent) -> Result<(), ContextError> {
        let dir = self.studio.store_dir.clone();
        match event {
            StoreEvent::Config => {
                let config = store_io::load_config(&dir)?;
                self.workflow = config.workflow().map_err(StoreError::from)?;
                self.studio.config = config;
            }
            StoreEvent::Activity => {
                self.studio.activity = store_io::load_activity(&dir)?;
            }
            StoreEvent::Collections(collections) => {
                for collection in collections {
                    match collection {
                        Collection::Orders => {
                            self.studio.orders = store_io::load_collection(&dir, *collection)?
                        }
                        Collection::Users => {
                            self.studio.users = store_io::load_collection(&dir, *collection)?
                        }
                        Collection::Quotes => {
                            self.studio.quotes = store_io::load_collection(&dir, *collection)?
                        }
                        Collection::Opportunities => {
                            self.studio.opportunities = store_io::load_collection(&dir, *collection)?
                        }
                        Collection::Finance => {
                            self.studio.finance = store_io::load_collection(&dir, *collection)?
                        }
                        Collection::Channels => {
                            self.studio.channels = store_io::load_collection(&dir, *collection)?
                        }
                        Collection::Messages => {
                            self.studio.messages = store_io::load_collection(&dir, *collection)?
                        }
                    }
                }
            }
        }
        tracing::debug!(?event, "applied store event");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Orders
    // -----------------------------------------------------------------------

    pub fn order(&self, key: &str) -> Result<&ServiceOrder, ContextError> {
        self.studio.find_order(key).ok_or_else(|| not_found("order", key))
    }

    fn order_index(&self, key: &str) -> Result<usize, ContextError> {
        self.studio
            .orders
            .iter()
            .position(|o| o.id == key || o.number.eq_ignore_ascii_case(key))
            .ok_or_else(|| not_found("order", key))
    }

    fn validate_responsible(&self, responsible: Option<&str>) -> Result<(), ContextError> {
        match responsible {
            Some(id) if self.studio.find_user(id).is_none() => Err(ContextError::UnknownUser(id.to_string())),
            _ => Ok(()),
        }
    }

    /// Insert a prepared order: persist, mirror, log, notify
    fn insert_order(&mut self, actor: &str, order: ServiceOrder, details: String) -> Result<ServiceOrder, ContextError> {
        self.persist(Collection::Orders, &order.id, &order)?;
        self.studio.orders.push(order.clone());
        self.log(actor, ActivityAction::Created, format!("order {}", order.number), details)?;
        self.notify(NotificationKind::Success, format!("Order {} created", order.number));
        tracing::info!(order = %order.number, client = %order.client, "order created");
        Ok(order)
    }

    pub fn create_order(&mut self, draft: NewOrder) -> Result<ServiceOrder, ContextError> {
        let actor = self.require("create orders", Role::can_edit)?;
        if draft.client.trim().is_empty() {
            return Err(ContextError::Invalid("client name is required".into()));
        }
        self.validate_responsible(draft.responsible.as_deref())?;
        let status = match draft.status {
            Some(s) if !self.workflow.contains(&s) => return Err(StatusError::UnknownStatus(s).into()),
            Some(s) => s,
            None => self.workflow.initial_status().to_string(),
        };

        let now = Utc::now();
        let mut order = ServiceOrder::new(
            new_id(),
            next_order_number(&self.studio.orders),
            draft.client.trim().to_string(),
            draft.title,
            status,
            now,
        );
        order.progress = status::progress_for(&order.status, &self.workflow);
        order.value = draft.value;
        order.costs = draft.costs;
        order.responsible = draft.responsible;
        order.expected_delivery_date = draft.expected_delivery_date;
        if self.workflow.is_terminal(&order.status) {
            order.delivery_date = Some(now);
        }
        let details = order.client.clone();
        self.insert_order(&actor, order, details)
    }

    /// Replace a whole order document (last write wins).
    ///
    /// Progress is re-derived from the status; status-change side effects
    /// belong to [`DataContext::change_status`].
    pub fn update_order(&mut self, mut order: ServiceOrder) -> Result<(), ContextError> {
        let actor = self.require("edit orders", Role::can_edit)?;
        let idx = self.order_index(&order.id)?;
        self.validate_responsible(order.responsible.as_deref())?;
        order.progress = status::progress_for(&order.status, &self.workflow);
        if self.studio.orders[idx] == order {
            return Ok(());
        }
        self.persist(Collection::Orders, &order.id, &order)?;
        let target = format!("order {}", order.number);
        self.studio.orders[idx] = order;
        self.log(&actor, ActivityAction::Updated, target, String::new())
    }

    /// Move an order to another workflow stage. Returns `None` when it is
    /// already there, in which case nothing is written, logged or notified.
    pub fn change_status(&mut self, key: &str, to: &str) -> Result<Option<Transition>, ContextError> {
        let actor = self.require("change order status", Role::can_edit)?;
        let idx = self.order_index(key)?;

        let mut order = self.studio.orders[idx].clone();
        let Some(transition) = status::transition(&mut order, to, &self.workflow, Utc::now())? else {
            return Ok(None);
        };
        self.persist(Collection::Orders, &order.id, &order)?;

        let number = order.number.clone();
        self.studio.orders[idx] = order;
        self.log(
            &actor,
            ActivityAction::StatusChanged,
            format!("order {}", number),
            transition.describe(),
        )?;
        self.notify(
            NotificationKind::Info,
            format!("{}: {} ({}%)", number, transition.describe(), transition.progress),
        );
        tracing::info!(order = %number, from = %transition.from, to = %transition.to, "status changed");
        Ok(Some(transition))
    }

    pub fn add_comment(&mut self, key: &str, text: &str) -> Result<(), ContextError> {
        let actor = self.require("comment on orders", Role::can_edit)?;
        if text.trim().is_empty() {
            return Err(ContextError::Invalid("comment is empty".into()));
        }
        let idx = self.order_index(key)?;
        let mut order = self.studio.orders[idx].clone();
        order.comments.push(Comment {
            author: actor.clone(),
            text: text.trim().to_string(),
            timestamp: Utc::now(),
        });
        self.persist(Collection::Orders, &order.id, &order)?;
        let target = format!("order {}", order.number);
        self.studio.orders[idx] = order;
        self.log(&actor, ActivityAction::Commented, target, String::new())
    }

    /// Shareable token of an order, creating one on first use
    pub fn share_order(&mut self, key: &str) -> Result<String, ContextError> {
        let idx = self.order_index(key)?;
        if let Some(token) = &self.studio.orders[idx].shareable_token {
            return Ok(token.clone());
        }
        let actor = self.require("share orders", Role::can_edit)?;
        let mut order = self.studio.orders[idx].clone();
        let token = portal::generate_token();
        order.shareable_token = Some(token.clone());
        self.persist(Collection::Orders, &order.id, &order)?;
        let target = format!("order {}", order.number);
        self.studio.orders[idx] = order;
        self.log(&actor, ActivityAction::Shared, target, String::new())?;
        Ok(token)
    }

    /// Read-only client view; needs no acting user
    pub fn portal(&self, token: &str) -> Result<PortalView, ContextError> {
        Ok(portal::portal_view(&self.studio.orders, token)?)
    }

    /// Hard delete, Admin only
    pub fn delete_order(&mut self, key: &str) -> Result<ServiceOrder, ContextError> {
        let actor = self.require("delete orders", Role::can_delete)?;
        let idx = self.order_index(key)?;
        let id = self.studio.orders[idx].id.clone();
        {
            let _lock = StoreLock::acquire_default(&self.studio.store_dir).map_err(StoreError::from)?;
            store_io::delete_document(&self.studio.store_dir, Collection::Orders, &id)?;
        }
        let order = self.studio.orders.remove(idx);
        self.log(
            &actor,
            ActivityAction::Deleted,
            format!("order {}", order.number),
            order.client.clone(),
        )?;
        tracing::info!(order = %order.number, "order deleted");
        Ok(order)
    }

    // -----------------------------------------------------------------------
    // Sales pipeline
    // -----------------------------------------------------------------------

    pub fn create_quote(
        &mut self,
        client: &str,
        description: &str,
        items: Vec<QuoteItem>,
    ) -> Result<CommercialQuote, ContextError> {
        let actor = self.require("create quotes", Role::can_edit)?;
        let quote = CommercialQuote {
            id: new_id(),
            client: client.to_string(),
            description: description.to_string(),
            items,
            status: QuoteStatus::Draft,
            created: Utc::now(),
        };
        self.persist(Collection::Quotes, &quote.id, &quote)?;
        self.studio.quotes.push(quote.clone());
        self.log(
            &actor,
            ActivityAction::Created,
            format!("quote {}", quote.id),
            format!("{} ({:.2})", quote.client, quote.total()),
        )?;
        Ok(quote)
    }

    fn quote_index(&self, id: &str) -> Result<usize, ContextError> {
        self.studio
            .quotes
            .iter()
            .position(|q| q.id == id)
            .ok_or_else(|| not_found("quote", id))
    }

    pub fn set_quote_status(&mut self, id: &str, status: QuoteStatus) -> Result<(), ContextError> {
        let actor = self.require("edit quotes", Role::can_edit)?;
        let idx = self.quote_index(id)?;
        let mut quote = self.studio.quotes[idx].clone();
        if quote.status == status {
            return Ok(());
        }
        let details = format!("{} → {}", quote.status.as_str(), status.as_str());
        quote.status = status;
        self.persist(Collection::Quotes, &quote.id, &quote)?;
        self.studio.quotes[idx] = quote;
        self.log(&actor, ActivityAction::StatusChanged, format!("quote {}", id), details)
    }

    /// Copy a quote into a new order. The quote itself is left untouched.
    pub fn convert_quote(&mut self, id: &str) -> Result<ServiceOrder, ContextError> {
        let actor = self.require("create orders", Role::can_edit)?;
        let quote = self.studio.quotes[self.quote_index(id)?].clone();
        let order = sales_ops::quote_to_order(
            &quote,
            new_id(),
            next_order_number(&self.studio.orders),
            self.workflow.initial_status(),
            Utc::now(),
        );
        let order = self.finish_conversion(&actor, order, format!("quote {}", id))?;
        Ok(order)
    }

    pub fn create_opportunity(
        &mut self,
        client: &str,
        title: &str,
        estimated_value: f64,
    ) -> Result<Opportunity, ContextError> {
        let actor = self.require("create opportunities", Role::can_edit)?;
        let opportunity = Opportunity {
            id: new_id(),
            client: client.to_string(),
            title: title.to_string(),
            estimated_value,
            status: OpportunityStatus::Lead,
            created: Utc::now(),
        };
        self.persist(Collection::Opportunities, &opportunity.id, &opportunity)?;
        self.studio.opportunities.push(opportunity.clone());
        self.log(
            &actor,
            ActivityAction::Created,
            format!("opportunity {}", opportunity.id),
            opportunity.client.clone(),
        )?;
        Ok(opportunity)
    }

    fn opportunity_index(&self, id: &str) -> Result<usize, ContextError> {
        self.studio
            .opportunities
            .iter()
            .position(|o| o.id == id)
            .ok_or_else(|| not_found("opportunity", id))
    }

    pub fn set_opportunity_status(&mut self, id: &str, status: OpportunityStatus) -> Result<(), ContextError> {
        let actor = self.require("edit opportunities", Role::can_edit)?;
        let idx = self.opportunity_index(id)?;
        let mut opportunity = self.studio.opportunities[idx].clone();
        if opportunity.status == status {
            return Ok(());
        }
        let details = format!("{} → {}", opportunity.status.as_str(), status.as_str());
        opportunity.status = status;
        self.persist(Collection::Opportunities, &opportunity.id, &opportunity)?;
        self.studio.opportunities[idx] = opportunity;
        self.log(&actor, ActivityAction::StatusChanged, format!("opportunity {}", id), details)
    }

    /// Copy an opportunity into a new order. The opportunity is left untouched.
    pub fn convert_opportunity(&mut self, id: &str) -> Result<ServiceOrder, ContextError> {
        let actor = self.require("create orders", Role::can_edit)?;
        let opportunity = self.studio.opportunities[self.opportunity_index(id)?].clone();
        let order = sales_ops::opportunity_to_order(
            &opportunity,
            new_id(),
            next_order_number(&self.studio.orders),
            self.workflow.initial_status(),
            Utc::now(),
        );
        self.finish_conversion(&actor, order, format!("opportunity {}", id))
    }

    fn finish_conversion(
        &mut self,
        actor: &str,
        mut order: ServiceOrder,
        source: String,
    ) -> Result<ServiceOrder, ContextError> {
        order.progress = status::progress_for(&order.status, &self.workflow);
        self.persist(Collection::Orders, &order.id, &order)?;
        self.studio.orders.push(order.clone());
        self.log(
            actor,
            ActivityAction::Converted,
            source.clone(),
            format!("into order {}", order.number),
        )?;
        self.notify(
            NotificationKind::Success,
            format!("Order {} created from {}", order.number, source),
        );
        Ok(order)
    }

    // -----------------------------------------------------------------------
    // Finance
    // -----------------------------------------------------------------------

    pub fn add_financial_entry(
        &mut self,
        kind: EntryKind,
        amount: f64,
        description: &str,
        date: NaiveDate,
        order_key: Option<&str>,
    ) -> Result<FinancialEntry, ContextError> {
        let actor = self.require("record finances", Role::can_edit)?;
        if !(amount.is_finite() && amount >= 0.0) {
            return Err(ContextError::Invalid(format!("invalid amount: {}", amount)));
        }
        let order_id = match order_key {
            Some(key) => Some(self.order(key)?.id.clone()),
            None => None,
        };
        let entry = FinancialEntry {
            id: new_id(),
            kind,
            description: description.to_string(),
            amount,
            date,
            order_id,
        };
        self.persist(Collection::Finance, &entry.id, &entry)?;
        self.studio.finance.push(entry.clone());
        self.log(
            &actor,
            ActivityAction::Created,
            format!("finance entry {}", entry.id),
            format!("{:?} {:.2}", entry.kind, entry.amount),
        )?;
        Ok(entry)
    }

    // -----------------------------------------------------------------------
    // Chat
    // -----------------------------------------------------------------------

    pub fn create_channel(&mut self, name: &str) -> Result<ChatChannel, ContextError> {
        let actor = self.require("create channels", Role::can_edit)?;
        if self.studio.find_channel(name).is_some() {
            return Err(ContextError::Invalid(format!("channel already exists: {}", name)));
        }
        let channel = ChatChannel {
            id: new_id(),
            name: name.to_string(),
        };
        self.persist(Collection::Channels, &channel.id, &channel)?;
        self.studio.channels.push(channel.clone());
        self.log(&actor, ActivityAction::Created, format!("channel #{}", name), String::new())?;
        Ok(channel)
    }

    /// Post to a channel. Mentioned users each get a notification.
    pub fn post_message(&mut self, channel_key: &str, text: &str) -> Result<ChatMessage, ContextError> {
        let actor = self.require("post messages", |_| true)?;
        if text.trim().is_empty() {
            return Err(ContextError::Invalid("message is empty".into()));
        }
        let channel = self
            .studio
            .find_channel(channel_key)
            .ok_or_else(|| not_found("channel", channel_key))?
            .clone();
        let message = ChatMessage {
            id: new_id(),
            channel_id: channel.id.clone(),
            author: actor.clone(),
            text: text.to_string(),
            timestamp: Utc::now(),
            reactions: Default::default(),
        };
        self.persist(Collection::Messages, &message.id, &message)?;
        self.studio.messages.push(message.clone());

        let mentioned: Vec<String> = chat_ops::extract_mentions(&message.text, &self.studio.users)
            .into_iter()
            .map(|u| u.id.clone())
            .collect();
        for user in mentioned {
            self.notify(
                NotificationKind::Mention,
                format!("@{} mentioned in #{} by {}", user, channel.name, actor),
            );
        }
        self.log(&actor, ActivityAction::Posted, format!("channel #{}", channel.name), String::new())?;
        Ok(message)
    }

    /// Find a message by id or by an unambiguous id prefix
    fn message_index(&self, key: &str) -> Result<usize, ContextError> {
        if let Some(idx) = self.studio.messages.iter().position(|m| m.id == key) {
            return Ok(idx);
        }
        let mut matches = self
            .studio
            .messages
            .iter()
            .enumerate()
            .filter(|(_, m)| !key.is_empty() && m.id.starts_with(key));
        match (matches.next(), matches.next()) {
            (Some((idx, _)), None) => Ok(idx),
            (Some(_), Some(_)) => Err(ContextError::Invalid(format!("ambiguous message id: {}", key))),
            _ => Err(not_found("message", key)),
        }
    }

    /// Toggle the actor's reaction; returns true when added
    pub fn toggle_reaction(&mut self, message_id: &str, emoji: &str) -> Result<bool, ContextError> {
        let actor = self.require("react to messages", |_| true)?;
        let idx = self.message_index(message_id)?;
        let mut message = self.studio.messages[idx].clone();
        let added = chat_ops::toggle_reaction(&mut message, emoji, &actor);
        self.persist(Collection::Messages, &message.id, &message)?;
        self.studio.messages[idx] = message;
        let details = format!("{} {}", if added { "+" } else { "-" }, emoji);
        let target = format!("message {}", self.studio.messages[idx].id);
        self.log(&actor, ActivityAction::Reacted, target, details)?;
        Ok(added)
    }

    // -----------------------------------------------------------------------
    // Users
    // -----------------------------------------------------------------------

    pub fn add_user(&mut self, id: &str, name: &str, role: Role) -> Result<User, ContextError> {
        let actor = self.require("manage users", Role::can_delete)?;
        store_io::validate_id(id)?;
        if self.studio.find_user(id).is_some() {
            return Err(ContextError::Invalid(format!("user already exists: {}", id)));
        }
        let user = User {
            id: id.to_string(),
            name: name.to_string(),
            role,
        };
        self.persist(Collection::Users, &user.id, &user)?;
        self.studio.users.push(user.clone());
        self.log(&actor, ActivityAction::Created, format!("user {}", id), role.to_string())?;
        Ok(user)
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

impl DataContext {
    /// Add a workflow stage just before the terminal column (Admin only).
    /// Orders whose stored progress no longer matches the new scale are
    /// rewritten.
    pub fn add_column(&mut self, column: KanbanColumn) -> Result<(), ContextError> {
        let actor = self.require("change the workflow", Role::can_delete)?;
        let dir = self.studio.store_dir.clone();
        {
            let _lock = StoreLock::acquire_default(&dir).map_err(StoreError::from)?;
            let (config, mut doc) = config_io::read_config(&dir)?;
            config_io::insert_column(&mut doc, &config.columns, &config.workflow.terminal, &column);
            let updated: crate::model::config::StudioConfig =
                toml::from_str(&doc.to_string()).map_err(StoreError::from)?;
            let workflow = updated.workflow().map_err(StoreError::from)?;
            config_io::write_config(&dir, &doc)?;
            self.workflow = workflow;
            self.studio.config = updated;
        }
        let rescaled = self.rescale_progress()?;
        let mut details = format!("added column {}", column.status);
        if rescaled > 0 {
            details.push_str(&format!(", {} orders rescaled", rescaled));
        }
        self.log(&actor, ActivityAction::Updated, "workflow".to_string(), details)?;
        tracing::info!(status = %column.status, rescaled, "workflow column added");
        Ok(())
    }

    /// Re-derive every order's progress from the current workflow and
    /// persist the ones that changed. Returns how many changed.
    fn rescale_progress(&mut self) -> Result<usize, ContextError> {
        let mut changed = 0;
        for idx in 0..self.studio.orders.len() {
            let progress = status::progress_for(&self.studio.orders[idx].status, &self.workflow);
            if self.studio.orders[idx].progress == progress {
                continue;
            }
            let mut order = self.studio.orders[idx].clone();
            order.progress = progress;
            self.persist(Collection::Orders, &order.id, &order)?;
            self.studio.orders[idx] = order;
            changed += 1;
        }
        Ok(changed)
    }

    /// Make `user_id` the default actor recorded in studio.toml
    pub fn set_session_user(&mut self, user_id: &str) -> Result<(), ContextError> {
        let actor = self.require("change the session user", |_| true)?;
        if self.studio.find_user(user_id).is_none() {
            return Err(ContextError::UnknownUser(user_id.to_string()));
        }
        if self.studio.config.session.user.as_deref() == Some(user_id) {
            return Ok(());
        }
        let dir = self.studio.store_dir.clone();
        {
            let _lock = StoreLock::acquire_default(&dir).map_err(StoreError::from)?;
            let (_config, mut doc) = config_io::read_config(&dir)?;
            config_io::set_session_user(&mut doc, user_id);
            config_io::write_config(&dir, &doc)?;
            self.studio.config = store_io::load_config(&dir)?;
        }
        self.log(&actor, ActivityAction::Updated, "session".to_string(), format!("user {}", user_id))
    }

    /// Save a named filter combination, replacing one of the same name
    pub fn save_view(&mut self, view: SavedView) -> Result<(), ContextError> {
        let actor = self.require("save views", Role::can_edit)?;
        if view.name.trim().is_empty() {
            return Err(ContextError::Invalid("view name is required".into()));
        }
        let dir = self.studio.store_dir.clone();
        {
            let _lock = StoreLock::acquire_default(&dir).map_err(StoreError::from)?;
            let (_config, mut doc) = config_io::read_config(&dir)?;
            config_io::save_view(&mut doc, &view);
            config_io::write_config(&dir, &doc)?;
            self.studio.config = store_io::load_config(&dir)?;
        }
        self.log(&actor, ActivityAction::Updated, format!("view {}", view.name), String::new())
    }
}

impl OrderSink for DataContext {
    type Error = ContextError;

    fn write_order(&mut self, order: &ServiceOrder) -> Result<(), ContextError> {
        self.update_order(order.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::store_io::{CONFIG_FILE, STORE_DIR};
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn create_store(root: &Path) {
        let store_dir = root.join(STORE_DIR);
        fs::create_dir_all(&store_dir).unwrap();
        fs::write(
            store_dir.join(CONFIG_FILE),
            "[studio]\nname = \"Test\"\n\n[session]\nuser = \"ana\"\n",
        )
        .unwrap();
        for user in [
            User {
                id: "ana".into(),
                name: "Ana Souza".into(),
                role: Role::Admin,
            },
            User {
                id: "bm".into(),
                name: "Bruno Mattos".into(),
                role: Role::Assistant,
            },
            User {
                id: "vi".into(),
                name: "Vi".into(),
                role: Role::Viewer,
            },
        ] {
            store_io::save_document(&store_dir, Collection::Users, &user.id.clone(), &user).unwrap();
        }
    }

    fn open(tmp: &TempDir, actor: Option<&str>) -> DataContext {
        DataContext::open(tmp.path(), actor).unwrap()
    }

    fn draft(client: &str) -> NewOrder {
        NewOrder {
            client: client.into(),
            title: "Shoot".into(),
            value: 1000.0,
            ..Default::default()
        }
    }

    #[test]
    fn create_order_persists_and_logs() {
        let tmp = TempDir::new().unwrap();
        create_store(tmp.path());
        let mut ctx = open(&tmp, None);

        let order = ctx.create_order(draft("Acme")).unwrap();
        assert_eq!(order.number, "OS-001");
        assert_eq!(order.status, "Waiting");
        assert_eq!(order.progress, 17);

        let reloaded = open(&tmp, None);
        assert_eq!(reloaded.order("os-001").unwrap(), &order);
        assert_eq!(reloaded.studio().activity.len(), 1);
        assert_eq!(reloaded.studio().activity[0].action, ActivityAction::Created);
        assert_eq!(ctx.drain_notifications().len(), 1);
        assert!(ctx.drain_notifications().is_empty());
    }

    #[test]
    fn status_change_logs_and_notifies_once() {
        let tmp = TempDir::new().unwrap();
        create_store(tmp.path());
        let mut ctx = open(&tmp, Some("bm"));
        ctx.create_order(draft("Acme")).unwrap();
        ctx.drain_notifications();

        let t = ctx.change_status("OS-001", "Approval").unwrap().unwrap();
        assert_eq!(t.progress, 99);
        let log = &ctx.studio().activity;
        assert_eq!(log.last().unwrap().details, "Waiting → Approval");
        assert_eq!(ctx.drain_notifications().len(), 1);

        let stamp = ctx.order("OS-001").unwrap().last_status_update;
        let log_len = ctx.studio().activity.len();
        assert!(ctx.change_status("OS-001", "Approval").unwrap().is_none());
        assert_eq!(ctx.order("OS-001").unwrap().last_status_update, stamp);
        assert_eq!(ctx.studio().activity.len(), log_len);
        assert!(ctx.drain_notifications().is_empty());
    }

    #[test]
    fn delivery_date_set_once() {
        let tmp = TempDir::new().unwrap();
        create_store(tmp.path());
        let mut ctx = open(&tmp, None);
        ctx.create_order(draft("Acme")).unwrap();

        ctx.change_status("OS-001", "Delivered").unwrap();
        let first = ctx.order("OS-001").unwrap().delivery_date.unwrap();
        ctx.change_status("OS-001", "PostProd").unwrap();
        ctx.change_status("OS-001", "Delivered").unwrap();
        assert_eq!(ctx.order("OS-001").unwrap().delivery_date, Some(first));
        assert_eq!(open(&tmp, None).order("OS-001").unwrap().delivery_date, Some(first));
    }

    #[test]
    fn viewer_cannot_mutate() {
        let tmp = TempDir::new().unwrap();
        create_store(tmp.path());
        let mut ctx = open(&tmp, Some("vi"));
        let err = ctx.create_order(draft("Acme")).unwrap_err();
        assert!(matches!(err, ContextError::PermissionDenied { .. }));
        assert!(ctx.studio().activity.is_empty());
    }

    #[test]
    fn only_admin_deletes() {
        let tmp = TempDir::new().unwrap();
        create_store(tmp.path());
        let mut ctx = open(&tmp, Some("bm"));
        ctx.create_order(draft("Acme")).unwrap();
        assert!(matches!(
            ctx.delete_order("OS-001"),
            Err(ContextError::PermissionDenied { .. })
        ));

        let mut admin = open(&tmp, Some("ana"));
        admin.delete_order("OS-001").unwrap();
        assert!(open(&tmp, None).studio().orders.is_empty());
        let actions: Vec<_> = open(&tmp, None)
            .studio()
            .activity
            .iter()
            .map(|e| e.action)
            .collect();
        assert_eq!(actions, vec![ActivityAction::Created, ActivityAction::Deleted]);
    }

    #[test]
    fn unknown_actor_is_rejected() {
        let tmp = TempDir::new().unwrap();
        create_store(tmp.path());
        let mut ctx = open(&tmp, Some("ghost"));
        assert!(matches!(
            ctx.create_order(draft("Acme")),
            Err(ContextError::UnknownUser(_))
        ));
    }

    #[test]
    fn update_is_last_write_wins() {
        let tmp = TempDir::new().unwrap();
        create_store(tmp.path());
        let mut first = open(&tmp, Some("ana"));
        first.create_order(draft("Acme")).unwrap();
        let mut second = open(&tmp, Some("bm"));

        let mut a = first.order("OS-001").unwrap().clone();
        a.title = "From first".into();
        let mut b = second.order("OS-001").unwrap().clone();
        b.value = 5.0;

        first.update_order(a).unwrap();
        second.update_order(b).unwrap();

        let on_disk = open(&tmp, None).order("OS-001").unwrap().clone();
        assert_eq!(on_disk.title, "Shoot");
        assert_eq!(on_disk.value, 5.0);
    }

    #[test]
    fn unchanged_update_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        create_store(tmp.path());
        let mut ctx = open(&tmp, None);
        let order = ctx.create_order(draft("Acme")).unwrap();
        ctx.update_order(order).unwrap();
        assert_eq!(ctx.studio().activity.len(), 1);
    }

    #[test]
    fn conversion_is_one_way() {
        let tmp = TempDir::new().unwrap();
        create_store(tmp.path());
        let mut ctx = open(&tmp, None);
        let items = vec![sales_ops::parse_quote_item("Day:2:500").unwrap()];
        let quote = ctx.create_quote("Bistro", "Menu", items).unwrap();

        let order = ctx.convert_quote(&quote.id).unwrap();
        assert_eq!(order.value, 1000.0);
        assert_eq!(order.client, "Bistro");
        assert_eq!(ctx.studio().quotes[0], quote);

        let opp = ctx.create_opportunity("Hotel", "Rooms", 300.0).unwrap();
        let order = ctx.convert_opportunity(&opp.id).unwrap();
        assert_eq!(order.number, "OS-002");
        assert_eq!(ctx.studio().opportunities[0].status, OpportunityStatus::Lead);
    }

    #[test]
    fn share_then_portal() {
        let tmp = TempDir::new().unwrap();
        create_store(tmp.path());
        let mut ctx = open(&tmp, None);
        ctx.create_order(draft("Acme")).unwrap();
        let token = ctx.share_order("OS-001").unwrap();
        assert_eq!(ctx.share_order("OS-001").unwrap(), token);

        let viewer = open(&tmp, Some("nobody"));
        assert_eq!(viewer.portal(&token).unwrap().client, "Acme");
        assert!(matches!(
            viewer.portal("bogus"),
            Err(ContextError::Portal(PortalError::NotFound))
        ));
    }

    #[test]
    fn mentions_notify() {
        let tmp = TempDir::new().unwrap();
        create_store(tmp.path());
        let mut ctx = open(&tmp, Some("vi"));
        let mut admin = open(&tmp, None);
        admin.create_channel("general").unwrap();
        ctx.apply_event(&StoreEvent::Collections(vec![Collection::Channels]))
            .unwrap();

        let msg = ctx.post_message("general", "@BrunoMattos check OS-001").unwrap();
        let notes = ctx.drain_notifications();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].kind, NotificationKind::Mention);

        assert!(ctx.toggle_reaction(&msg.id, "🎉").unwrap());
        assert!(!ctx.toggle_reaction(&msg.id, "🎉").unwrap());
    }

    #[test]
    fn apply_event_picks_up_external_writes() {
        let tmp = TempDir::new().unwrap();
        create_store(tmp.path());
        let mut watcher_side = open(&tmp, None);
        let mut writer = open(&tmp, Some("bm"));
        writer.create_order(draft("Acme")).unwrap();

        assert!(watcher_side.studio().orders.is_empty());
        watcher_side
            .apply_event(&StoreEvent::Collections(vec![Collection::Orders]))
            .unwrap();
        watcher_side.apply_event(&StoreEvent::Activity).unwrap();
        assert_eq!(watcher_side.studio().orders.len(), 1);
        assert_eq!(watcher_side.studio().activity.len(), 1);
    }

    #[test]
    fn add_column_lands_before_terminal() {
        let tmp = TempDir::new().unwrap();
        create_store(tmp.path());
        let mut ctx = open(&tmp, None);
        ctx.add_column(KanbanColumn::new("Printing", "Printing", "#000000"))
            .unwrap();
        let statuses: Vec<_> = ctx.workflow().columns().iter().map(|c| c.status.clone()).collect();
        assert_eq!(statuses[statuses.len() - 2], "Printing");
        assert_eq!(statuses.last().unwrap(), "Delivered");

        let err = ctx
            .add_column(KanbanColumn::new("Again", "Printing", "#000000"))
            .unwrap_err();
        assert!(matches!(err, ContextError::Store(StoreError::Workflow(_))));
        assert_eq!(open(&tmp, None).workflow().columns().len(), 8);
    }

    #[test]
    fn add_column_rescales_existing_orders() {
        let tmp = TempDir::new().unwrap();
        create_store(tmp.path());
        let mut ctx = open(&tmp, None);
        ctx.create_order(draft("Acme")).unwrap();
        ctx.create_order(NewOrder {
            status: Some("Approval".into()),
            ..draft("Bistro")
        })
        .unwrap();
        ctx.create_order(NewOrder {
            status: Some("Delivered".into()),
            ..draft("Hotel")
        })
        .unwrap();

        ctx.add_column(KanbanColumn::new("Printing", "Printing", "#000000"))
            .unwrap();
        let progress: Vec<u8> = ctx.studio().orders.iter().map(|o| o.progress).collect();
        assert_eq!(progress, vec![14, 85, 100]);

        let mut reloaded = open(&tmp, None);
        assert_eq!(reloaded.order("OS-002").unwrap().progress, 85);
        let last = reloaded.studio().activity.last().unwrap();
        assert_eq!(last.details, "added column Printing, 2 orders rescaled");

        let token = reloaded.share_order("OS-002").unwrap();
        assert_eq!(reloaded.portal(&token).unwrap().progress, 85);
    }

    #[test]
    fn session_user_change_is_logged() {
        let tmp = TempDir::new().unwrap();
        create_store(tmp.path());
        let mut ctx = open(&tmp, None);
        ctx.set_session_user("bm").unwrap();

        let reloaded = open(&tmp, None);
        assert_eq!(reloaded.studio().config.session.user.as_deref(), Some("bm"));
        assert_eq!(reloaded.actor().map(|u| u.id.as_str()), Some("bm"));
        let entry = reloaded.studio().activity.last().unwrap();
        assert_eq!(entry.action, ActivityAction::Updated);
        assert_eq!(entry.target, "session");
        assert_eq!(entry.user, "ana");

        // already the session user: nothing written
        ctx.set_session_user("bm").unwrap();
        assert_eq!(ctx.studio().activity.len(), 1);
        assert!(matches!(
            ctx.set_session_user("ghost"),
            Err(ContextError::UnknownUser(_))
        ));
    }

    #[test]
    fn concurrent_writers_keep_every_log_line() {
        let tmp = TempDir::new().unwrap();
        create_store(tmp.path());
        let root = tmp.path().to_path_buf();
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let root = root.clone();
                std::thread::spawn(move || {
                    let mut ctx = DataContext::open(&root, Some("bm")).unwrap();
                    for i in 0..10 {
                        ctx.create_quote(&format!("client {}-{}", t, i), "Menu", Vec::new())
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let reloaded = open(&tmp, None);
        assert_eq!(reloaded.studio().quotes.len(), 40);
        assert_eq!(reloaded.studio().activity.len(), 40);
    }

    #[test]
    fn saved_view_round_trips() {
        let tmp = TempDir::new().unwrap();
        create_store(tmp.path());
        let mut ctx = open(&tmp, Some("bm"));
        let view = SavedView {
            name: "mine".into(),
            responsible: Some("bm".into()),
            ..Default::default()
        };
        ctx.save_view(view.clone()).unwrap();
        assert_eq!(open(&tmp, None).studio().config.view("mine"), Some(&view));
    }

    #[test]
    fn finance_entry_links_order() {
        let tmp = TempDir::new().unwrap();
        create_store(tmp.path());
        let mut ctx = open(&tmp, None);
        let order = ctx.create_order(draft("Acme")).unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 5, 1).unwrap();
        let entry = ctx
            .add_financial_entry(EntryKind::Expense, 120.0, "Props", date, Some("OS-001"))
            .unwrap();
        assert_eq!(entry.order_id, Some(order.id));
        assert!(ctx
            .add_financial_entry(EntryKind::Income, -1.0, "x", date, None)
            .is_err());
    }
}
