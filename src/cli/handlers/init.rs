use std::fs;
use std::path::Path;

use chrono::Utc;

use crate::cli::commands::InitArgs;
use crate::io::store_io::{self, CONFIG_FILE, Collection, STORE_DIR};
use crate::model::activity::{ActivityAction, ActivityLogEntry};
use crate::model::user::{Role, User};
use crate::model::workflow::{DEFAULT_TERMINAL, KanbanColumn, default_columns};

const STUDIO_TOML_TEMPLATE: &str = r##"[studio]
name = "{name}"

[workflow]
# Orders in this stage count as delivered (100%). It must be one of the
# columns below.
terminal = "{terminal}"

# --- Columns ---
# Order is the progress scale: stage i of n non-terminal stages shows
# round((i + 1) / n * 99)%. Add stages with: studio column add <title> <status>
{columns}

[autosave]
debounce_ms = 1500
saved_display_ms = 2000

[chat]
page_size = 20

[timeline]
day_width = 24

[session]
user = "{user}"

# --- Saved views ---
# Create with: studio view save <name> --search ... --responsible ...
#
# [[views]]
# name = "mine"
# responsible = "{user}"
"##;

/// Infer a studio name from a directory name: hyphens to spaces, title-case.
fn infer_name(dir_name: &str) -> String {
    dir_name
        .split(['-', '_'])
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                None => String::new(),
                Some(c) => c.to_uppercase().collect::<String>() + chars.as_str(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn toml_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

fn render_columns(columns: &[KanbanColumn]) -> String {
    columns
        .iter()
        .map(|c| {
            format!(
                "[[columns]]\ntitle = \"{}\"\nstatus = \"{}\"\ncolor = \"{}\"\n",
                toml_string(&c.title),
                toml_string(&c.status),
                toml_string(&c.color)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
        .trim_end()
        .to_string()
}

fn render_studio_toml(name: &str, user: &str) -> String {
    STUDIO_TOML_TEMPLATE
        .replace("{name}", &toml_string(name))
        .replace("{terminal}", DEFAULT_TERMINAL)
        .replace("{columns}", &render_columns(&default_columns()))
        .replace("{user}", &toml_string(user))
}

pub fn cmd_init(args: InitArgs, dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let store_dir = dir.join(STORE_DIR);
    if store_dir.is_dir() {
        return Err(format!("studio already exists in {}/", store_dir.display()).into());
    }
    store_io::validate_id(&args.admin)?;

    let name = args.name.unwrap_or_else(|| {
        dir.file_name()
            .and_then(|n| n.to_str())
            .map(infer_name)
            .unwrap_or_else(|| "Studio".to_string())
    });

    fs::create_dir_all(&store_dir)?;
    for collection in Collection::ALL {
        fs::create_dir_all(store_dir.join(collection.dir_name()))?;
    }
    fs::write(store_dir.join(CONFIG_FILE), render_studio_toml(&name, &args.admin))?;

    let admin = User {
        id: args.admin.clone(),
        name: args.admin_name,
        role: Role::Admin,
    };
    store_io::save_document(&store_dir, Collection::Users, &admin.id, &admin)?;
    store_io::append_activity(
        &store_dir,
        &ActivityLogEntry {
            timestamp: Utc::now(),
            user: admin.id.clone(),
            action: ActivityAction::Created,
            target: format!("user {}", admin.id),
            details: Role::Admin.to_string(),
        },
    )?;
    tracing::info!(studio = %name, admin = %admin.id, "studio initialized");

    println!("Initialized studio: {}", name);
    println!("  admin: {} ({})", admin.name, admin.id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::config::StudioConfig;

    #[test]
    fn infer_name_title_cases() {
        assert_eq!(infer_name("lumen-studio"), "Lumen Studio");
        assert_eq!(infer_name("foto_arte"), "Foto Arte");
        assert_eq!(infer_name("acme"), "Acme");
    }

    #[test]
    fn rendered_config_parses() {
        let text = render_studio_toml("Lumen \"Foto\"", "ana");
        let config: StudioConfig = toml::from_str(&text).unwrap();
        assert_eq!(config.studio.name, "Lumen \"Foto\"");
        assert_eq!(config.session.user.as_deref(), Some("ana"));
        assert_eq!(config.columns, default_columns());
        assert!(config.views.is_empty());
        assert!(config.workflow().is_ok());
    }

    #[test]
    fn init_refuses_existing_store() {
        let tmp = tempfile::TempDir::new().unwrap();
        let args = || InitArgs {
            name: None,
            admin: "ana".into(),
            admin_name: "Ana".into(),
        };
        cmd_init(args(), tmp.path()).unwrap();
        assert!(cmd_init(args(), tmp.path()).is_err());

        let studio = store_io::load_studio(tmp.path()).unwrap();
        assert_eq!(studio.users.len(), 1);
        assert_eq!(studio.users[0].role, Role::Admin);
        assert_eq!(studio.activity.len(), 1);
    }
}
