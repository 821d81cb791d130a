//! Debounced background persistence for the order editor.
//!
//! The editor owns an [`AutoSave`] holding the live form and a snapshot of
//! what was last persisted. Edits arm a debounce timer; `tick` fires the
//! write once the timer lapses. Time is passed in explicitly so the owning
//! loop decides the clock.

use std::fmt;
use std::time::{Duration, Instant};

use crate::model::config::AutosaveConfig;
use crate::model::order::ServiceOrder;

/// Destination of auto-saved forms
pub trait OrderSink {
    type Error: fmt::Display;

    /// Persist the whole order document
    fn write_order(&mut self, order: &ServiceOrder) -> Result<(), Self::Error>;
}

/// Save indicator shown next to the form
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveStatus {
    Idle,
    Typing,
    Saving,
    Saved,
    /// The last write failed; no retry until the next edit or explicit save
    Error(String),
}

impl fmt::Display for SaveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SaveStatus::Idle => write!(f, "idle"),
            SaveStatus::Typing => write!(f, "typing…"),
            SaveStatus::Saving => write!(f, "saving…"),
            SaveStatus::Saved => write!(f, "saved"),
            SaveStatus::Error(e) => write!(f, "error: {}", e),
        }
    }
}

/// Result of offering a remotely changed order to the editor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternalUpdate {
    /// Local form replaced with the remote version
    Merged,
    /// Remote version equals what we already have
    Unchanged,
    /// Local edits are unsaved; the remote version was ignored
    Deferred,
}

pub struct AutoSave {
    form: ServiceOrder,
    last_saved: ServiceOrder,
    status: SaveStatus,
    /// Debounce deadline while an edit is pending
    deadline: Option<Instant>,
    /// When the Saved indicator goes back to Idle
    idle_at: Option<Instant>,
    debounce: Duration,
    saved_display: Duration,
}

impl AutoSave {
    pub fn new(order: ServiceOrder, config: &AutosaveConfig) -> Self {
        AutoSave {
            last_saved: order.clone(),
            form: order,
            status: SaveStatus::Idle,
            deadline: None,
            idle_at: None,
            debounce: Duration::from_millis(config.debounce_ms),
            saved_display: Duration::from_millis(config.saved_display_ms),
        }
    }

    pub fn form(&self) -> &ServiceOrder {
        &self.form
    }

    pub fn last_saved(&self) -> &ServiceOrder {
        &self.last_saved
    }

    pub fn status(&self) -> &SaveStatus {
        &self.status
    }

    /// A debounce timer is armed
    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// The form differs from the last persisted snapshot
    pub fn is_dirty(&self) -> bool {
        self.form != self.last_saved
    }

    /// Apply an edit to the form.
    ///
    /// If the result equals the snapshot the timer is disarmed and nothing
    /// will be written; otherwise the debounce restarts from `now`.
    pub fn edit<F>(&mut self, now: Instant, f: F)
    where
        F: FnOnce(&mut ServiceOrder),
    {
        f(&mut self.form);
        self.idle_at = None;
        if self.is_dirty() {
            self.deadline = Some(now + self.debounce);
            self.status = SaveStatus::Typing;
        } else {
            self.deadline = None;
            self.status = SaveStatus::Idle;
        }
    }

    /// Advance the clock. Issues at most one write, when the debounce has
    /// lapsed. Returns true if a write was attempted.
    pub fn tick<S: OrderSink>(&mut self, now: Instant, sink: &mut S) -> bool {
        if let Some(deadline) = self.deadline
            && now >= deadline
        {
            self.deadline = None;
            return self.write(now, sink);
        }
        if self.status == SaveStatus::Saved
            && let Some(idle_at) = self.idle_at
            && now >= idle_at
        {
            self.status = SaveStatus::Idle;
            self.idle_at = None;
        }
        false
    }

    /// Write immediately, bypassing the debounce. Skipped when the form
    /// equals the snapshot. Returns true if a write was attempted.
    pub fn save_now<S: OrderSink>(&mut self, now: Instant, sink: &mut S) -> bool {
        self.deadline = None;
        self.write(now, sink)
    }

    fn write<S: OrderSink>(&mut self, now: Instant, sink: &mut S) -> bool {
        if !self.is_dirty() {
            return false;
        }
        self.status = SaveStatus::Saving;
        match sink.write_order(&self.form) {
            Ok(()) => {
                self.last_saved = self.form.clone();
                self.status = SaveStatus::Saved;
                self.idle_at = Some(now + self.saved_display);
                tracing::debug!(order = %self.form.number, "auto-saved");
            }
            Err(e) => {
                tracing::warn!(order = %self.form.number, error = %e, "auto-save failed");
                self.status = SaveStatus::Error(e.to_string());
            }
        }
        true
    }

    /// Offer a version of the order written by someone else.
    ///
    /// Merged only when the form has no unsaved local changes, so in-flight
    /// typing is never clobbered. This is not conflict resolution: whichever
    /// side writes last still wins.
    pub fn external_update(&mut self, remote: ServiceOrder) -> ExternalUpdate {
        if remote == self.form {
            self.last_saved = remote;
            return ExternalUpdate::Unchanged;
        }
        if self.is_dirty() || self.is_pending() {
            return ExternalUpdate::Deferred;
        }
        self.form = remote.clone();
        self.last_saved = remote;
        ExternalUpdate::Merged
    }
}
