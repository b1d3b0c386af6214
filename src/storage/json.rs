//! JSON file-based storage backend.
//!
//! Keeps the saved-set and report log in one human-readable JSON file, written
//! atomically (write-to-temp + rename) so a crash never leaves it half written.
//!
//! # File Format
//!
//! ```json
//! {
//!   "version": 1,
//!   "saved": {
//!     "c-101": { "item_id": "c-101", "saved_at": 1718000000 }
//!   },
//!   "reports": [
//!     { "item_id": "c-77", "reason": "spam", "reported_at": 1718000100 }
//!   ]
//! }
//! ```

use crate::domain::error::{FeedError, Result};
use crate::domain::ItemId;
use crate::storage::backend::Storage;
use crate::storage::models::{ReportRecord, SavedRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Top-level container serialized to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StorageData {
    /// Format version for future migrations.
    version: u32,

    #[serde(default)]
    saved: BTreeMap<ItemId, SavedRecord>,

    #[serde(default)]
    reports: Vec<ReportRecord>,
}

impl Default for StorageData {
    fn default() -> Self {
        Self {
            version: 1,
            saved: BTreeMap::new(),
            reports: Vec::new(),
        }
    }
}

/// JSON file storage backend.
///
/// The whole dataset is held in memory and persisted on every modification.
/// `Send` but not `Sync`: it is meant to be owned by the single worker.
pub struct JsonStorage {
    file_path: PathBuf,
    data: StorageData,
    dirty: bool,
}

impl JsonStorage {
    /// Creates or opens a JSON storage file. Parent directories are created.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created, or the file exists
    /// but cannot be read or parsed.
    pub fn new(file_path: PathBuf) -> Result<Self> {
        tracing::debug!(path = ?file_path, "initializing JSON storage");

        if let Some(parent) = file_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let data = if file_path.exists() {
            Self::load_from_file(&file_path)?
        } else {
            tracing::debug!("initializing new empty storage");
            StorageData::default()
        };

        tracing::debug!(
            saved_count = data.saved.len(),
            report_count = data.reports.len(),
            "storage initialized"
        );

        Ok(Self {
            file_path,
            data,
            dirty: false,
        })
    }

    fn load_from_file(path: &Path) -> Result<StorageData> {
        let contents = std::fs::read_to_string(path)?;
        let data: StorageData = serde_json::from_str(&contents)
            .map_err(|e| FeedError::Storage(format!("failed to parse JSON: {e}")))?;
        tracing::debug!(version = data.version, "loaded storage data");
        Ok(data)
    }

    /// Writes to a sibling temp file, then renames over the target.
    fn save_to_file(&mut self) -> Result<()> {
        if !self.dirty {
            tracing::trace!("skipping save, no changes");
            return Ok(());
        }

        let json = serde_json::to_string_pretty(&self.data)
            .map_err(|e| FeedError::Storage(format!("failed to serialize JSON: {e}")))?;

        let tmp_path = self.file_path.with_extension("tmp");
        std::fs::write(&tmp_path, json)?;
        std::fs::rename(&tmp_path, &self.file_path)?;

        self.dirty = false;
        tracing::debug!(path = ?self.file_path, "storage saved");
        Ok(())
    }
}

impl Storage for JsonStorage {
    fn get_saved(&self) -> Result<Vec<SavedRecord>> {
        let _span = tracing::debug_span!("json_get_saved").entered();
        let saved: Vec<SavedRecord> = self.data.saved.values().cloned().collect();
        tracing::debug!(count = saved.len(), "retrieved saved items");
        Ok(saved)
    }

    fn set_saved(&mut self, item_id: &ItemId, saved: bool) -> Result<bool> {
        let _span = tracing::debug_span!("json_set_saved", item_id = %item_id, saved).entered();

        let changed = if saved {
            if self.data.saved.contains_key(item_id) {
                false
            } else {
                self.data
                    .saved
                    .insert(item_id.clone(), SavedRecord::new(item_id.clone()));
                true
            }
        } else {
            self.data.saved.remove(item_id).is_some()
        };

        if !changed {
            tracing::debug!("saved state unchanged, skipping write");
            return Ok(false);
        }

        self.dirty = true;
        self.save_to_file()?;
        Ok(true)
    }

    fn record_report(&mut self, report: &ReportRecord) -> Result<()> {
        let _span = tracing::debug_span!("json_record_report", item_id = %report.item_id).entered();

        self.data.reports.push(report.clone());
        self.dirty = true;
        self.save_to_file()?;

        tracing::debug!(total_reports = self.data.reports.len(), "report recorded");
        Ok(())
    }
}

impl Drop for JsonStorage {
    fn drop(&mut self) {
        if self.dirty {
            tracing::debug!("saving dirty data on drop");
            if let Err(e) = self.save_to_file() {
                tracing::error!(error = %e, "failed to save on drop");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saved_set_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("reelfeed.json");

        let mut storage = JsonStorage::new(path.clone()).unwrap();
        assert!(storage.set_saved(&ItemId::new("a"), true).unwrap());
        assert!(!storage.set_saved(&ItemId::new("a"), true).unwrap());
        assert!(storage.set_saved(&ItemId::new("b"), true).unwrap());
        assert!(storage.set_saved(&ItemId::new("b"), false).unwrap());
        drop(storage);

        let reopened = JsonStorage::new(path).unwrap();
        let ids: Vec<ItemId> = reopened.get_saved().unwrap().into_iter().map(|r| r.item_id).collect();
        assert_eq!(ids, vec![ItemId::new("a")]);
    }

    #[test]
    fn reports_are_appended() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reelfeed.json");
        let mut storage = JsonStorage::new(path.clone()).unwrap();
        storage
            .record_report(&ReportRecord::new(ItemId::new("a"), "spam"))
            .unwrap();

        let raw = std::fs::read_to_string(path).unwrap();
        assert!(raw.contains("\"spam\""));
        assert!(!dir.path().join("reelfeed.tmp").exists());
    }

    #[test]
    fn corrupt_file_is_a_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reelfeed.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(JsonStorage::new(path), Err(FeedError::Storage(_))));
    }
}
