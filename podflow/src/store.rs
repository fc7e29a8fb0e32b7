//! Last-selection store.
//!
//! `ls` remembers the executors it listed so that later commands can refer to
//! them by 1-based index. The store is injected explicitly; there is no
//! process-global cache.

use crate::errors::{PodflowError, Result};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Order in which a listing was displayed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingOrder {
    /// Pareto-optimal first, then by price per GPU hour.
    #[default]
    Price,
    /// GPU type, then count descending.
    Gpu,
    /// Executor huid.
    Id,
}

/// Executors shown by the most recent listing, in display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastSelection {
    /// Executor ids in display order.
    pub executor_ids: Vec<String>,
    /// GPU filter that produced the listing.
    #[serde(default)]
    pub gpu_type: Option<String>,
    /// Sort order of the listing; refreshes reuse it so indices keep their meaning.
    #[serde(default)]
    pub order: ListingOrder,
    /// When the listing was stored.
    pub stored_at: DateTime<Utc>,
}

impl LastSelection {
    /// Creates a selection stamped with the current time.
    #[must_use]
    pub fn new(executor_ids: Vec<String>, gpu_type: Option<String>) -> Self {
        Self {
            executor_ids,
            gpu_type,
            order: ListingOrder::default(),
            stored_at: Utc::now(),
        }
    }

    /// Records the order the listing was shown in.
    #[must_use]
    pub fn with_order(mut self, order: ListingOrder) -> Self {
        self.order = order;
        self
    }
}

/// Get/set access to the last selection.
pub trait SelectionStore: Send + Sync {
    /// Reads the stored selection, if any.
    fn get(&self) -> Result<Option<LastSelection>>;

    /// Replaces the stored selection.
    fn set(&self, selection: &LastSelection) -> Result<()>;
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemorySelectionStore {
    inner: RwLock<Option<LastSelection>>,
}

impl MemorySelectionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding `selection`.
    #[must_use]
    pub fn with(selection: LastSelection) -> Self {
        Self {
            inner: RwLock::new(Some(selection)),
        }
    }
}

impl SelectionStore for MemorySelectionStore {
    fn get(&self) -> Result<Option<LastSelection>> {
        Ok(self.inner.read().clone())
    }

    fn set(&self, selection: &LastSelection) -> Result<()> {
        *self.inner.write() = Some(selection.clone());
        Ok(())
    }
}

/// YAML file store.
#[derive(Debug, Clone)]
pub struct FileSelectionStore {
    path: PathBuf,
}

impl FileSelectionStore {
    /// Store backed by `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `last_selection.yaml` in the podflow home directory.
    pub fn default_location() -> Result<Self> {
        Ok(Self::new(crate::config::config_dir()?.join("last_selection.yaml")))
    }

    /// Backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SelectionStore for FileSelectionStore {
    fn get(&self) -> Result<Option<LastSelection>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(&self.path)?;
        match serde_yaml::from_str(&text) {
            Ok(selection) => Ok(Some(selection)),
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "Ignoring unreadable selection file");
                Ok(None)
            }
        }
    }

    fn set(&self, selection: &LastSelection) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_yaml::to_string(selection)?)?;
        Ok(())
    }
}

/// Parses a 1-based index; `None` for anything that is not a positive integer.
#[must_use]
pub fn parse_index(target: &str) -> Option<usize> {
    target.trim().parse::<usize>().ok().filter(|n| *n > 0)
}

/// Maps a 1-based index onto the stored selection.
///
/// Non-numeric targets are returned unchanged.
pub fn resolve_index(target: &str, store: &dyn SelectionStore) -> Result<String> {
    let Some(index) = parse_index(target) else {
        return Ok(target.to_string());
    };
    let selection = store.get()?.ok_or_else(|| {
        PodflowError::Unresolved(format!(
            "No previous listing to resolve index {index}; run 'podflow ls' first"
        ))
    })?;
    selection
        .executor_ids
        .get(index - 1)
        .cloned()
        .ok_or_else(|| {
            PodflowError::Unresolved(format!(
                "Index {index} is out of range (last listing had {} executors)",
                selection.executor_ids.len()
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tokio_test::{assert_err, assert_ok};

    fn selection() -> LastSelection {
        LastSelection::new(vec!["e1".into(), "e2".into(), "e3".into()], Some("H100".into()))
    }

    #[test]
    fn test_resolve_index() {
        let store = MemorySelectionStore::with(selection());
        assert_eq!(resolve_index("2", &store).unwrap(), "e2");
        assert_eq!(resolve_index("calm-eagle-1a", &store).unwrap(), "calm-eagle-1a");
        let err = assert_err!(resolve_index("4", &store));
        assert!(err.is_resolution_failure());
    }

    #[test]
    fn test_index_without_listing() {
        let store = MemorySelectionStore::new();
        assert!(matches!(resolve_index("1", &store), Err(PodflowError::Unresolved(_))));
        // Zero is not an index.
        assert_eq!(resolve_index("0", &store).unwrap(), "0");
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSelectionStore::new(dir.path().join("nested").join("last.yaml"));
        assert_eq!(store.get().unwrap(), None);

        let stored = selection();
        assert_ok!(store.set(&stored));
        assert_eq!(store.get().unwrap(), Some(stored));
    }

    #[test]
    fn test_file_store_ignores_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("last.yaml");
        std::fs::write(&path, "{{{ not yaml").unwrap();
        assert_eq!(FileSelectionStore::new(path).get().unwrap(), None);
    }

    #[test]
    fn test_file_without_order_reads_as_price() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("last.yaml");
        std::fs::write(
            &path,
            "executor_ids: [a, b]\ngpu_type: H100\nstored_at: 2025-03-01T10:00:00Z\n",
        )
        .unwrap();
        let stored = FileSelectionStore::new(path).get().unwrap().unwrap();
        assert_eq!(stored.order, ListingOrder::Price);
        assert_eq!(stored.executor_ids, vec!["a".to_string(), "b".to_string()]);

        let by_id = stored.with_order(ListingOrder::Id);
        assert_eq!(serde_yaml::to_string(&by_id.order).unwrap().trim(), "id");
    }
}
