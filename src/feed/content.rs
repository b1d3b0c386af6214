//! Content store abstraction.
//!
//! The confession store is an external collaborator. The scheduler only needs
//! paged reads, expressed by [`ContentStore`].

use crate::domain::{FeedItem, Result};
use serde::{Deserialize, Serialize};

/// One page of content as returned by the store.
///
/// Items may include non-video entries; the data source filters them.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ContentPage {
    pub items: Vec<FeedItem>,
    /// Cursor for the following page, `None` when exhausted.
    pub next_cursor: Option<String>,
}

/// Paged access to the content backing the feed.
pub trait ContentStore: Send {
    /// Loads up to `limit` items starting at `cursor` (`None` = first page).
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or the cursor is invalid.
    fn load_page(&mut self, cursor: Option<&str>, limit: usize) -> Result<ContentPage>;
}
