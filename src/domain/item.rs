//! Feed item domain model.
//!
//! A [`FeedItem`] is one playable entry in the ordered feed. Items are immutable
//! once placed in the sequence and are replaced wholesale when the feed reloads.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of a feed item.
///
/// Unique within a feed and stable across reloads, so it is the key used for
/// controllers, interaction targets, and the saved-set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub String);

impl ItemId {
    /// Creates an identifier from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Kind tag distinguishing playable videos from other feed entries.
///
/// Only [`ItemKind::Video`] survives into the scheduled sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    /// A playable video.
    Video,
    /// A text-only entry.
    Text,
    /// An advertisement slot.
    Ad,
}

/// One entry of the ordered feed.
///
/// # Fields
///
/// - `id`: Stable identifier
/// - `ordinal`: Zero-based position in the current sequence
/// - `media`: Playable media reference (URI or opaque handle)
/// - `kind`: Entry kind, always `Video` once scheduled
/// - `caption`: Display text captured for interaction targets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedItem {
    pub id: ItemId,
    pub ordinal: usize,
    pub media: String,
    pub kind: ItemKind,
    #[serde(default)]
    pub caption: String,
}

impl FeedItem {
    /// Creates a video item. The ordinal is assigned when the item is placed.
    pub fn video(id: impl Into<String>, media: impl Into<String>) -> Self {
        Self {
            id: ItemId::new(id),
            ordinal: 0,
            media: media.into(),
            kind: ItemKind::Video,
            caption: String::new(),
        }
    }

    /// Sets the caption used as display text for interactions.
    #[must_use]
    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = caption.into();
        self
    }

    /// Returns `true` if the item can be scheduled for playback.
    #[must_use]
    pub fn is_playable(&self) -> bool {
        self.kind == ItemKind::Video && !self.media.is_empty()
    }
}
