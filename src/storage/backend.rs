//! Storage backend abstraction.
//!
//! The [`Storage`] trait covers exactly what the worker needs: the saved-set
//! and report submissions. Each method maps to one worker message.

use crate::domain::error::Result;
use crate::domain::ItemId;
use crate::storage::models::{ReportRecord, SavedRecord};

/// Abstraction over persistent storage backends.
///
/// # Implementations
///
/// - [`crate::storage::JsonStorage`]: JSON file with atomic writes (default)
///
/// # Examples
///
/// ```no_run
/// use reelfeed::storage::{JsonStorage, Storage};
/// use reelfeed::ItemId;
/// use std::path::PathBuf;
///
/// let mut storage = JsonStorage::new(PathBuf::from("/tmp/reelfeed.json"))?;
/// storage.set_saved(&ItemId::new("c-1"), true)?;
/// assert_eq!(storage.get_saved()?.len(), 1);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub trait Storage: Send {
    /// Retrieves the saved-set.
    ///
    /// # Errors
    ///
    /// Returns an error if the read operation fails.
    fn get_saved(&self) -> Result<Vec<SavedRecord>>;

    /// Adds or removes an item from the saved-set.
    ///
    /// Idempotent: returns `Ok(false)` without writing if the item is already
    /// in the requested state, `Ok(true)` if the set changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn set_saved(&mut self, item_id: &ItemId, saved: bool) -> Result<bool>;

    /// Appends a report submission.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn record_report(&mut self, report: &ReportRecord) -> Result<()>;
}
