use std::fs;
use std::path::Path;

use crate::io::store_io::{CONFIG_FILE, StoreError, atomic_write};
use crate::model::config::{SavedView, StudioConfig};
use crate::model::workflow::KanbanColumn;

/// Read studio.toml, returning both the parsed config and the toml_edit
/// document for round-trip-safe editing.
pub fn read_config(store_dir: &Path) -> Result<(StudioConfig, toml_edit::DocumentMut), StoreError> {
    let path = store_dir.join(CONFIG_FILE);
    let text = fs::read_to_string(&path).map_err(|e| StoreError::ReadError { path, source: e })?;
    let config: StudioConfig = toml::from_str(&text)?;
    let doc: toml_edit::DocumentMut = text.parse()?;
    Ok((config, doc))
}

/// Write the config document back to disk, preserving formatting.
pub fn write_config(store_dir: &Path, doc: &toml_edit::DocumentMut) -> Result<(), StoreError> {
    let path = store_dir.join(CONFIG_FILE);
    atomic_write(&path, doc.to_string().as_bytes())
        .map_err(|e| StoreError::WriteError { path, source: e })
}

/// Set the default acting user
pub fn set_session_user(doc: &mut toml_edit::DocumentMut, user_id: &str) {
    if !doc.contains_key("session") {
        doc["session"] = toml_edit::Item::Table(toml_edit::Table::new());
    }
    doc["session"]["user"] = toml_edit::value(user_id);
}

/// Add a saved view, replacing one with the same name
pub fn save_view(doc: &mut toml_edit::DocumentMut, view: &SavedView) {
    let mut table = toml_edit::Table::new();
    table["name"] = toml_edit::value(&view.name);
    if let Some(search) = &view.search {
        table["search"] = toml_edit::value(search);
    }
    if let Some(responsible) = &view.responsible {
        table["responsible"] = toml_edit::value(responsible);
    }
    if let Some(from) = view.from {
        table["from"] = toml_edit::value(from.format("%Y-%m-%d").to_string());
    }
    if let Some(to) = view.to {
        table["to"] = toml_edit::value(to.format("%Y-%m-%d").to_string());
    }

    if !doc.contains_key("views") {
        doc["views"] = toml_edit::Item::ArrayOfTables(toml_edit::ArrayOfTables::new());
    }
    if let Some(views) = doc["views"].as_array_of_tables_mut() {
        views.retain(|t| t.get("name").and_then(|v| v.as_str()) != Some(view.name.as_str()));
        views.push(table);
    }
}

/// Insert a workflow column just before the terminal column. When the file
/// carries no explicit columns, the current (default) list is written out
/// first so the new column lands inside it.
pub fn insert_column(
    doc: &mut toml_edit::DocumentMut,
    current: &[KanbanColumn],
    terminal: &str,
    column: &KanbanColumn,
) {
    let mut columns: Vec<KanbanColumn> = current.to_vec();
    let pos = columns
        .iter()
        .position(|c| c.status == terminal)
        .unwrap_or(columns.len());
    columns.insert(pos, column.clone());

    let mut tables = toml_edit::ArrayOfTables::new();
    for col in &columns {
        let mut table = toml_edit::Table::new();
        table["title"] = toml_edit::value(&col.title);
        table["status"] = toml_edit::value(&col.status);
        table["color"] = toml_edit::value(&col.color);
        tables.push(table);
    }
    doc["columns"] = toml_edit::Item::ArrayOfTables(tables);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn sample_config() -> &'static str {
        r##"[studio]
name = "Lumen"

# team defaults
[session]
user = "ana"

[[columns]]
title = "Waiting"
status = "Waiting"
color = "#9CA3AF"

[[columns]]
title = "Delivered"
status = "Delivered"
color = "#22C55E"
"##
    }

    #[test]
    fn round_trip_preserves_text() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILE);
        fs::write(&path, sample_config()).unwrap();

        let (_config, doc) = read_config(tmp.path()).unwrap();
        write_config(tmp.path(), &doc).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), sample_config());
    }

    #[test]
    fn session_user_is_replaced() {
        let mut doc: toml_edit::DocumentMut = sample_config().parse().unwrap();
        set_session_user(&mut doc, "bruno");
        let config: StudioConfig = toml::from_str(&doc.to_string()).unwrap();
        assert_eq!(config.session.user.as_deref(), Some("bruno"));
        assert!(doc.to_string().contains("# team defaults"));
    }

    #[test]
    fn saved_view_replaces_same_name() {
        let mut doc: toml_edit::DocumentMut = sample_config().parse().unwrap();
        let mut view = SavedView {
            name: "mine".into(),
            responsible: Some("ana".into()),
            ..Default::default()
        };
        save_view(&mut doc, &view);
        view.from = NaiveDate::from_ymd_opt(2025, 1, 1);
        save_view(&mut doc, &view);

        let config: StudioConfig = toml::from_str(&doc.to_string()).unwrap();
        assert_eq!(config.views.len(), 1);
        assert_eq!(config.views[0], view);
    }

    #[test]
    fn column_goes_before_terminal() {
        let mut doc: toml_edit::DocumentMut = sample_config().parse().unwrap();
        let config: StudioConfig = toml::from_str(sample_config()).unwrap();
        insert_column(
            &mut doc,
            &config.columns,
            "Delivered",
            &KanbanColumn::new("Editing", "Editing", "#123456"),
        );
        let config: StudioConfig = toml::from_str(&doc.to_string()).unwrap();
        let statuses: Vec<_> = config.columns.iter().map(|c| c.status.as_str()).collect();
        assert_eq!(statuses, vec!["Waiting", "Editing", "Delivered"]);
        assert!(config.workflow().is_ok());
    }
}
