use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Name of the terminal stage when none is configured
pub const DEFAULT_TERMINAL: &str = "Delivered";

/// One column of the Kanban board. The position of a column in the
/// configured list is its place on the progress scale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KanbanColumn {
    pub title: String,
    pub status: String,
    #[serde(default = "default_color")]
    pub color: String,
}

fn default_color() -> String {
    "#888888".to_string()
}

impl KanbanColumn {
    pub fn new(title: &str, status: &str, color: &str) -> Self {
        KanbanColumn {
            title: title.to_string(),
            status: status.to_string(),
            color: color.to_string(),
        }
    }
}

/// Error type for workflow validation
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("workflow has no columns")]
    Empty,
    #[error("duplicate status in workflow: {0}")]
    DuplicateStatus(String),
    #[error("terminal status {0:?} is not one of the workflow columns")]
    MissingTerminal(String),
}

/// The default production workflow of a photo/video studio
pub fn default_columns() -> Vec<KanbanColumn> {
    vec![
        KanbanColumn::new("Waiting", "Waiting", "#9CA3AF"),
        KanbanColumn::new("Shooting", "Shooting", "#F59E0B"),
        KanbanColumn::new("Development", "Development", "#3B82F6"),
        KanbanColumn::new("Post-production", "PostProd", "#8B5CF6"),
        KanbanColumn::new("Color grading", "ColorGrading", "#EC4899"),
        KanbanColumn::new("Client approval", "Approval", "#14B8A6"),
        KanbanColumn::new("Delivered", DEFAULT_TERMINAL, "#22C55E"),
    ]
}

/// A validated, ordered list of workflow columns with one terminal status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workflow {
    columns: Vec<KanbanColumn>,
    terminal: String,
}

impl Workflow {
    /// Build a workflow, rejecting empty lists, repeated status names and a
    /// terminal status that no column carries.
    pub fn new(columns: Vec<KanbanColumn>, terminal: &str) -> Result<Self, WorkflowError> {
        if columns.is_empty() {
            return Err(WorkflowError::Empty);
        }
        let mut seen = HashSet::new();
        for col in &columns {
            if !seen.insert(col.status.as_str()) {
                return Err(WorkflowError::DuplicateStatus(col.status.clone()));
            }
        }
        if !seen.contains(terminal) {
            return Err(WorkflowError::MissingTerminal(terminal.to_string()));
        }
        Ok(Workflow {
            columns,
            terminal: terminal.to_string(),
        })
    }

    pub fn columns(&self) -> &[KanbanColumn] {
        &self.columns
    }

    pub fn terminal(&self) -> &str {
        &self.terminal
    }

    pub fn is_terminal(&self, status: &str) -> bool {
        status == self.terminal
    }

    pub fn contains(&self, status: &str) -> bool {
        self.columns.iter().any(|c| c.status == status)
    }

    /// Columns that count toward the progress fraction, in order
    pub fn non_terminal(&self) -> impl Iterator<Item = &KanbanColumn> {
        self.columns.iter().filter(|c| c.status != self.terminal)
    }

    /// The first column, where new orders start
    pub fn initial_status(&self) -> &str {
        self.non_terminal()
            .next()
            .map(|c| c.status.as_str())
            .unwrap_or(self.terminal.as_str())
    }

    pub fn column(&self, status: &str) -> Option<&KanbanColumn> {
        self.columns.iter().find(|c| c.status == status)
    }
}

impl Default for Workflow {
    fn default() -> Self {
        Workflow {
            columns: default_columns(),
            terminal: DEFAULT_TERMINAL.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_workflow_is_valid() {
        let wf = Workflow::new(default_columns(), DEFAULT_TERMINAL).unwrap();
        assert_eq!(wf.non_terminal().count(), 6);
        assert_eq!(wf.initial_status(), "Waiting");
        assert!(wf.is_terminal("Delivered"));
    }

    #[test]
    fn rejects_duplicate_status() {
        let mut cols = default_columns();
        cols.push(KanbanColumn::new("Again", "Shooting", "#000000"));
        assert_eq!(
            Workflow::new(cols, DEFAULT_TERMINAL),
            Err(WorkflowError::DuplicateStatus("Shooting".into()))
        );
    }

    #[test]
    fn rejects_missing_terminal() {
        let cols = vec![KanbanColumn::new("A", "A", "#000000")];
        assert_eq!(
            Workflow::new(cols, "Done"),
            Err(WorkflowError::MissingTerminal("Done".into()))
        );
    }

    #[test]
    fn rejects_empty() {
        assert_eq!(Workflow::new(vec![], "Done"), Err(WorkflowError::Empty));
    }

    #[test]
    fn terminal_can_sit_anywhere() {
        let cols = vec![
            KanbanColumn::new("Shipped", "Shipped", "#000000"),
            KanbanColumn::new("Todo", "Todo", "#000000"),
        ];
        let wf = Workflow::new(cols, "Shipped").unwrap();
        let rest: Vec<_> = wf.non_terminal().map(|c| c.status.as_str()).collect();
        assert_eq!(rest, vec!["Todo"]);
        assert_eq!(wf.initial_status(), "Todo");
    }
}
