//! Storage record models for the persistence layer.
//!
//! These are kept separate from the domain types so the on-disk format can
//! evolve without touching scheduler code.

use crate::domain::{FeedItem, ItemId, ItemKind};
use serde::{Deserialize, Serialize};

/// A saved item in the user's saved-set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedRecord {
    pub item_id: ItemId,
    /// Unix timestamp when the item was saved.
    pub saved_at: i64,
}

impl SavedRecord {
    /// Creates a record stamped with the current time.
    pub fn new(item_id: ItemId) -> Self {
        Self {
            item_id,
            saved_at: chrono::Utc::now().timestamp(),
        }
    }
}

/// A submitted report awaiting moderation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRecord {
    pub item_id: ItemId,
    pub reason: String,
    /// Unix timestamp of submission.
    pub reported_at: i64,
}

impl ReportRecord {
    pub fn new(item_id: ItemId, reason: impl Into<String>) -> Self {
        Self {
            item_id,
            reason: reason.into(),
            reported_at: chrono::Utc::now().timestamp(),
        }
    }
}

/// One entry of a content catalog file.
///
/// # Example
///
/// ```json
/// { "id": "c-101", "media": "https://cdn.example/c-101.m3u8", "kind": "video", "caption": "..." }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogRecord {
    pub id: String,
    #[serde(default)]
    pub media: String,
    pub kind: ItemKind,
    #[serde(default)]
    pub caption: String,
}

impl From<CatalogRecord> for FeedItem {
    fn from(record: CatalogRecord) -> Self {
        Self {
            id: ItemId(record.id),
            ordinal: 0,
            media: record.media,
            kind: record.kind,
            caption: record.caption,
        }
    }
}
