use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::io::store_io::{ACTIVITY_FILE, CONFIG_FILE, Collection};

/// What changed on disk, as seen by a subscriber
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// Documents of these collections were created, modified or removed
    Collections(Vec<Collection>),
    /// The activity log grew
    Activity,
    /// studio.toml changed
    Config,
}

/// Map a changed path to the store event it implies, if any
pub fn classify_path(store_dir: &Path, path: &Path) -> Option<StoreEvent> {
    let rel = path.strip_prefix(store_dir).ok()?;
    let name = rel.file_name()?.to_str()?;
    let mut components = rel.components();
    let first = components.next()?.as_os_str().to_str()?;

    if components.next().is_none() {
        return match name {
            ACTIVITY_FILE => Some(StoreEvent::Activity),
            CONFIG_FILE => Some(StoreEvent::Config),
            _ => None,
        };
    }
    // skip temp files from atomic writes
    if !name.ends_with(".json") {
        return None;
    }
    Collection::from_dir_name(first).map(|c| StoreEvent::Collections(vec![c]))
}

/// Collapse a burst of events into one event per kind
pub fn coalesce(events: Vec<StoreEvent>) -> Vec<StoreEvent> {
    let mut collections = Vec::new();
    let mut seen = HashSet::new();
    let mut activity = false;
    let mut config = false;
    for event in events {
        match event {
            StoreEvent::Collections(cs) => {
                for c in cs {
                    if seen.insert(c) {
                        collections.push(c);
                    }
                }
            }
            StoreEvent::Activity => activity = true,
            StoreEvent::Config => config = true,
        }
    }
    let mut out = Vec::new();
    if config {
        out.push(StoreEvent::Config);
    }
    if !collections.is_empty() {
        out.push(StoreEvent::Collections(collections));
    }
    if activity {
        out.push(StoreEvent::Activity);
    }
    out
}

/// Push subscription over the store directory.
pub struct StoreWatcher {
    _watcher: RecommendedWatcher,
    rx: mpsc::Receiver<StoreEvent>,
}

impl StoreWatcher {
    /// Start watching the given `studio/` directory.
    /// Call `poll()` each tick of the owning loop.
    pub fn start(store_dir: &Path) -> Result<Self, notify::Error> {
        let (tx, rx) = mpsc::channel();
        let store_dir_owned: PathBuf = store_dir.to_path_buf();

        let mut watcher = RecommendedWatcher::new(
            move |result: Result<Event, notify::Error>| {
                let event = match result {
                    Ok(e) => e,
                    Err(e) => {
                        tracing::warn!(error = %e, "store watcher error");
                        return;
                    }
                };
                match event.kind {
                    EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) => {}
                    _ => return,
                }
                for path in &event.paths {
                    if let Some(evt) = classify_path(&store_dir_owned, path) {
                        let _ = tx.send(evt);
                    }
                }
            },
            Config::default(),
        )?;

        watcher.watch(store_dir, RecursiveMode::Recursive)?;
        Ok(StoreWatcher {
            _watcher: watcher,
            rx,
        })
    }

    /// Non-blocking poll for pending events, coalesced.
    pub fn poll(&self) -> Vec<StoreEvent> {
        let mut events = Vec::new();
        while let Ok(evt) = self.rx.try_recv() {
            events.push(evt);
        }
        coalesce(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_documents() {
        let store = Path::new("/s/studio");
        assert_eq!(
            classify_path(store, Path::new("/s/studio/orders/abc.json")),
            Some(StoreEvent::Collections(vec![Collection::Orders]))
        );
        assert_eq!(
            classify_path(store, Path::new("/s/studio/activity.jsonl")),
            Some(StoreEvent::Activity)
        );
        assert_eq!(
            classify_path(store, Path::new("/s/studio/studio.toml")),
            Some(StoreEvent::Config)
        );
    }

    #[test]
    fn ignores_noise() {
        let store = Path::new("/s/studio");
        assert_eq!(classify_path(store, Path::new("/s/studio/.lock")), None);
        assert_eq!(classify_path(store, Path::new("/s/studio/orders/.tmpX1y2")), None);
        assert_eq!(classify_path(store, Path::new("/s/studio/attic/a.json")), None);
        assert_eq!(classify_path(store, Path::new("/elsewhere/orders/a.json")), None);
    }

    #[test]
    fn coalesces_bursts() {
        let events = vec![
            StoreEvent::Collections(vec![Collection::Orders]),
            StoreEvent::Activity,
            StoreEvent::Collections(vec![Collection::Orders, Collection::Users]),
            StoreEvent::Activity,
        ];
        assert_eq!(
            coalesce(events),
            vec![
                StoreEvent::Collections(vec![Collection::Orders, Collection::Users]),
                StoreEvent::Activity,
            ]
        );
    }
}
