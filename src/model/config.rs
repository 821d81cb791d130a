use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::workflow::{DEFAULT_TERMINAL, KanbanColumn, Workflow, WorkflowError, default_columns};

/// Configuration from studio.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudioConfig {
    pub studio: StudioInfo,
    #[serde(default)]
    pub workflow: WorkflowConfig,
    #[serde(default = "default_columns")]
    pub columns: Vec<KanbanColumn>,
    #[serde(default)]
    pub autosave: AutosaveConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub timeline: TimelineConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub views: Vec<SavedView>,
}

impl StudioConfig {
    /// Validate the configured columns into a workflow
    pub fn workflow(&self) -> Result<Workflow, WorkflowError> {
        Workflow::new(self.columns.clone(), &self.workflow.terminal)
    }

    pub fn view(&self, name: &str) -> Option<&SavedView> {
        self.views.iter().find(|v| v.name == name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudioInfo {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Status of the final column, fixed at 100% progress
    #[serde(default = "default_terminal")]
    pub terminal: String,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        WorkflowConfig {
            terminal: default_terminal(),
        }
    }
}

fn default_terminal() -> String {
    DEFAULT_TERMINAL.to_string()
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AutosaveConfig {
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// How long the "saved" indicator stays up before going idle
    #[serde(default = "default_saved_display_ms")]
    pub saved_display_ms: u64,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        AutosaveConfig {
            debounce_ms: default_debounce_ms(),
            saved_display_ms: default_saved_display_ms(),
        }
    }
}

fn default_debounce_ms() -> u64 {
    1500
}

fn default_saved_display_ms() -> u64 {
    2000
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ChatConfig {
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        ChatConfig {
            page_size: default_page_size(),
        }
    }
}

fn default_page_size() -> usize {
    20
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TimelineConfig {
    /// Pixels per day
    #[serde(default = "default_day_width")]
    pub day_width: u32,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        TimelineConfig {
            day_width: default_day_width(),
        }
    }
}

fn default_day_width() -> u32 {
    24
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    /// User id acting when no `--as` flag is given
    #[serde(default)]
    pub user: Option<String>,
}

/// A named combination of board filters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedView {
    pub name: String,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub responsible: Option<String>,
    #[serde(default)]
    pub from: Option<NaiveDate>,
    #[serde(default)]
    pub to: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_uses_defaults() {
        let config: StudioConfig = toml::from_str("[studio]\nname = \"Lumen\"\n").unwrap();
        assert_eq!(config.studio.name, "Lumen");
        assert_eq!(config.columns.len(), 7);
        assert_eq!(config.workflow.terminal, "Delivered");
        assert_eq!(config.autosave.debounce_ms, 1500);
        assert_eq!(config.autosave.saved_display_ms, 2000);
        assert_eq!(config.chat.page_size, 20);
        assert!(config.session.user.is_none());
        assert!(config.workflow().is_ok());
    }

    #[test]
    fn custom_columns_and_views() {
        let config: StudioConfig = toml::from_str(
            r##"
[studio]
name = "Lumen"

[workflow]
terminal = "Done"

[[columns]]
title = "Inbox"
status = "Inbox"

[[columns]]
title = "Done"
status = "Done"
color = "#00FF00"

[[views]]
name = "march"
from = "2025-03-01"
to = "2025-03-31"
"##,
        )
        .unwrap();
        let wf = config.workflow().unwrap();
        assert_eq!(wf.non_terminal().count(), 1);
        assert_eq!(wf.columns()[0].color, "#888888");
        let view = config.view("march").unwrap();
        assert_eq!(view.from, NaiveDate::from_ymd_opt(2025, 3, 1));
        assert!(config.view("april").is_none());
    }

    #[test]
    fn duplicate_columns_fail_validation() {
        let config: StudioConfig = toml::from_str(
            r#"
[studio]
name = "Lumen"

[[columns]]
title = "A"
status = "Delivered"

[[columns]]
title = "B"
status = "Delivered"
"#,
        )
        .unwrap();
        assert_eq!(
            config.workflow(),
            Err(WorkflowError::DuplicateStatus("Delivered".into()))
        );
    }
}
