use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;

use crate::io::lock::LockError;
use crate::model::activity::ActivityLogEntry;
use crate::model::config::StudioConfig;
use crate::model::studio::Studio;
use crate::model::workflow::WorkflowError;

/// Name of the store directory inside a studio root
pub const STORE_DIR: &str = "studio";
/// Config file inside the store directory
pub const CONFIG_FILE: &str = "studio.toml";
/// Append-only activity log inside the store directory
pub const ACTIVITY_FILE: &str = "activity.jsonl";

/// Error type for store I/O
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("not a studio store: no studio/ directory found")]
    NotAStore,
    #[error("could not read {path}: {source}")]
    ReadError { path: PathBuf, source: io::Error },
    #[error("could not write {path}: {source}")]
    WriteError { path: PathBuf, source: io::Error },
    #[error("malformed document {path}: {source}")]
    DocumentError {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("could not parse studio.toml: {0}")]
    ConfigParseError(#[from] toml::de::Error),
    #[error("could not edit studio.toml: {0}")]
    ConfigEditError(#[from] toml_edit::TomlError),
    #[error("invalid workflow in studio.toml: {0}")]
    Workflow(#[from] WorkflowError),
    #[error("invalid document id {0:?}")]
    InvalidId(String),
    #[error(transparent)]
    Lock(#[from] LockError),
    #[error("io error: {0}")]
    IoError(#[from] io::Error),
}

/// The document collections kept in the store, one directory each
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Orders,
    Users,
    Quotes,
    Opportunities,
    Finance,
    Channels,
    Messages,
}

impl Collection {
    pub const ALL: [Collection; 7] = [
        Collection::Orders,
        Collection::Users,
        Collection::Quotes,
        Collection::Opportunities,
        Collection::Finance,
        Collection::Channels,
        Collection::Messages,
    ];

    pub fn dir_name(self) -> &'static str {
        match self {
            Collection::Orders => "orders",
            Collection::Users => "users",
            Collection::Quotes => "quotes",
            Collection::Opportunities => "opportunities",
            Collection::Finance => "finance",
            Collection::Channels => "channels",
            Collection::Messages => "messages",
        }
    }

    pub fn from_dir_name(name: &str) -> Option<Self> {
        Collection::ALL.into_iter().find(|c| c.dir_name() == name)
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.dir_name())
    }
}

/// Discover the studio root by walking up from `start`, looking for a
/// `studio/` directory holding a studio.toml.
pub fn discover_store(start: &Path) -> Result<PathBuf, StoreError> {
    let mut current = start.to_path_buf();
    loop {
        let store_dir = current.join(STORE_DIR);
        if store_dir.is_dir() && store_dir.join(CONFIG_FILE).exists() {
            return Ok(current);
        }
        if !current.pop() {
            return Err(StoreError::NotAStore);
        }
    }
}

/// Read and parse studio.toml, validating the workflow it declares
pub fn load_config(store_dir: &Path) -> Result<StudioConfig, StoreError> {
    let path = store_dir.join(CONFIG_FILE);
    let text = fs::read_to_string(&path).map_err(|e| StoreError::ReadError { path, source: e })?;
    let config: StudioConfig = toml::from_str(&text)?;
    config.workflow()?;
    Ok(config)
}

/// Load a complete studio from the given root directory.
pub fn load_studio(root: &Path) -> Result<Studio, StoreError> {
    let store_dir = root.join(STORE_DIR);
    if !store_dir.is_dir() {
        return Err(StoreError::NotAStore);
    }
    let config = load_config(&store_dir)?;

    let studio = Studio {
        root: root.to_path_buf(),
        orders: load_collection(&store_dir, Collection::Orders)?,
        users: load_collection(&store_dir, Collection::Users)?,
        quotes: load_collection(&store_dir, Collection::Quotes)?,
        opportunities: load_collection(&store_dir, Collection::Opportunities)?,
        finance: load_collection(&store_dir, Collection::Finance)?,
        channels: load_collection(&store_dir, Collection::Channels)?,
        messages: load_collection(&store_dir, Collection::Messages)?,
        activity: load_activity(&store_dir)?,
        store_dir,
        config,
    };
    tracing::debug!(
        root = %studio.root.display(),
        orders = studio.orders.len(),
        users = studio.users.len(),
        "studio loaded"
    );
    Ok(studio)
}

/// Load every document of a collection, ordered by file name.
/// A missing collection directory is an empty collection.
pub fn load_collection<T: DeserializeOwned>(
    store_dir: &Path,
    collection: Collection,
) -> Result<Vec<T>, StoreError> {
    let dir = store_dir.join(collection.dir_name());
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut paths = Vec::new();
    let entries = fs::read_dir(&dir).map_err(|e| StoreError::ReadError {
        path: dir.clone(),
        source: e,
    })?;
    for entry in entries {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) == Some("json") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut docs = Vec::with_capacity(paths.len());
    for path in paths {
        let text = fs::read_to_string(&path).map_err(|e| StoreError::ReadError {
            path: path.clone(),
            source: e,
        })?;
        let doc = serde_json::from_str(&text)
            .map_err(|e| StoreError::DocumentError { path, source: e })?;
        docs.push(doc);
    }
    Ok(docs)
}

/// Document ids become file names, so they are restricted to a safe alphabet
pub fn validate_id(id: &str) -> Result<(), StoreError> {
    let ok = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if ok {
        Ok(())
    } else {
        Err(StoreError::InvalidId(id.to_string()))
    }
}

fn document_path(store_dir: &Path, collection: Collection, id: &str) -> PathBuf {
    store_dir
        .join(collection.dir_name())
        .join(format!("{}.json", id))
}

/// Write a whole document, replacing any previous version (last write wins).
pub fn save_document<T: Serialize>(
    store_dir: &Path,
    collection: Collection,
    id: &str,
    doc: &T,
) -> Result<(), StoreError> {
    validate_id(id)?;
    let dir = store_dir.join(collection.dir_name());
    fs::create_dir_all(&dir)?;
    let path = document_path(store_dir, collection, id);
    let content = serde_json::to_string_pretty(doc).map_err(|e| StoreError::DocumentError {
        path: path.clone(),
        source: e,
    })?;
    if let Err(e) = atomic_write(&path, content.as_bytes()) {
        tracing::error!(path = %path.display(), error = %e, "document write failed");
        return Err(StoreError::WriteError { path, source: e });
    }
    tracing::debug!(%collection, id, "document saved");
    Ok(())
}

/// Remove a document. Removing a missing document is not an error.
pub fn delete_document(store_dir: &Path, collection: Collection, id: &str) -> Result<(), StoreError> {
    validate_id(id)?;
    let path = document_path(store_dir, collection, id);
    match fs::remove_file(&path) {
        Ok(()) => {
            tracing::debug!(%collection, id, "document deleted");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StoreError::WriteError { path, source: e }),
    }
}

/// Append one entry to the activity log
pub fn append_activity(store_dir: &Path, entry: &ActivityLogEntry) -> Result<(), StoreError> {
    let path = store_dir.join(ACTIVITY_FILE);
    let mut line = serde_json::to_string(entry).map_err(|e| StoreError::DocumentError {
        path: path.clone(),
        source: e,
    })?;
    line.push('\n');
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| StoreError::WriteError {
            path: path.clone(),
            source: e,
        })?;
    file.write_all(line.as_bytes())
        .map_err(|e| StoreError::WriteError { path, source: e })?;
    Ok(())
}

/// Read the activity log, oldest first. Malformed lines are skipped.
pub fn load_activity(store_dir: &Path) -> Result<Vec<ActivityLogEntry>, StoreError> {
    let path = store_dir.join(ACTIVITY_FILE);
    if !path.exists() {
        return Ok(Vec::new());
    }
    let text = fs::read_to_string(&path).map_err(|e| StoreError::ReadError {
        path: path.clone(),
        source: e,
    })?;
    let mut entries = Vec::new();
    for (n, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(line) {
            Ok(entry) => entries.push(entry),
            Err(e) => tracing::warn!(line = n + 1, error = %e, "skipping malformed activity entry"),
        }
    }
    Ok(entries)
}

/// Write `content` to `path` atomically using a temp file + rename.
pub fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
