//! File-backed content catalog.
//!
//! Serves a JSON array of [`CatalogRecord`]s as a [`ContentStore`]. Cursors are
//! decimal offsets into the array. Used by the replay binary and as a simple
//! local content source.

use crate::domain::error::{FeedError, Result};
use crate::domain::FeedItem;
use crate::feed::{ContentPage, ContentStore};
use crate::storage::models::CatalogRecord;
use std::path::Path;

/// In-memory catalog loaded from a JSON file.
#[derive(Debug, Clone, Default)]
pub struct JsonCatalog {
    records: Vec<CatalogRecord>,
}

impl JsonCatalog {
    /// Loads a catalog file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a JSON array of records.
    pub fn open(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let records: Vec<CatalogRecord> = serde_json::from_str(&contents)
            .map_err(|e| FeedError::Storage(format!("failed to parse catalog {}: {e}", path.display())))?;
        tracing::debug!(path = %path.display(), count = records.len(), "catalog loaded");
        Ok(Self { records })
    }

    #[must_use]
    pub const fn from_records(records: Vec<CatalogRecord>) -> Self {
        Self { records }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl ContentStore for JsonCatalog {
    fn load_page(&mut self, cursor: Option<&str>, limit: usize) -> Result<ContentPage> {
        let start = match cursor {
            None => 0,
            Some(raw) => raw
                .parse::<usize>()
                .map_err(|_| FeedError::Storage(format!("invalid catalog cursor: {raw}")))?,
        };
        let start = start.min(self.records.len());
        let end = start.saturating_add(limit.max(1)).min(self.records.len());

        let items: Vec<FeedItem> = self.records[start..end]
            .iter()
            .cloned()
            .map(FeedItem::from)
            .collect();
        let next_cursor = (end < self.records.len()).then(|| end.to_string());

        tracing::debug!(start, end, has_more = next_cursor.is_some(), "catalog page served");
        Ok(ContentPage { items, next_cursor })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ItemKind;

    fn catalog(n: usize) -> JsonCatalog {
        JsonCatalog::from_records(
            (0..n)
                .map(|i| CatalogRecord {
                    id: format!("c-{i}"),
                    media: format!("media://{i}"),
                    kind: ItemKind::Video,
                    caption: String::new(),
                })
                .collect(),
        )
    }

    #[test]
    fn pages_until_exhausted() {
        let mut c = catalog(5);
        let first = c.load_page(None, 2).unwrap();
        assert_eq!(first.items.len(), 2);
        assert_eq!(first.next_cursor.as_deref(), Some("2"));

        let last = c.load_page(Some("4"), 2).unwrap();
        assert_eq!(last.items[0].id.as_str(), "c-4");
        assert_eq!(last.next_cursor, None);
    }

    #[test]
    fn rejects_garbage_cursor() {
        let mut c = catalog(1);
        assert!(c.load_page(Some("abc"), 2).is_err());
    }

    #[test]
    fn opens_catalog_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        std::fs::write(
            &path,
            r#"[{"id":"a","media":"m://a","kind":"video"},{"id":"b","kind":"text"}]"#,
        )
        .unwrap();
        let c = JsonCatalog::open(&path).unwrap();
        assert_eq!(c.len(), 2);
    }
}
