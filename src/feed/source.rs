//! The filtered, ordered sequence of playable items.
//!
//! [`FeedDataSource`] assigns ordinals, drops non-video entries and
//! duplicates, and decides when another page should be requested.

use super::content::ContentPage;
use crate::domain::{FeedItem, ItemId};
use std::collections::HashSet;

/// Ordered playable items plus pagination state.
#[derive(Debug, Clone)]
pub struct FeedDataSource {
    items: Vec<FeedItem>,
    cursor: Option<String>,
    has_more: bool,
    loading: bool,
    page_size: usize,
    load_more_threshold: usize,
}

impl FeedDataSource {
    #[must_use]
    pub const fn new(page_size: usize, load_more_threshold: usize) -> Self {
        Self {
            items: Vec::new(),
            cursor: None,
            has_more: true,
            loading: false,
            page_size,
            load_more_threshold,
        }
    }

    #[must_use]
    pub fn items(&self) -> &[FeedItem] {
        &self.items
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn get(&self, ordinal: usize) -> Option<&FeedItem> {
        self.items.get(ordinal)
    }

    #[must_use]
    pub fn find(&self, item_id: &ItemId) -> Option<&FeedItem> {
        self.items.iter().find(|item| &item.id == item_id)
    }

    #[must_use]
    pub fn position(&self, item_id: &ItemId) -> Option<usize> {
        self.items.iter().position(|item| &item.id == item_id)
    }

    #[must_use]
    pub fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref()
    }

    #[must_use]
    pub const fn page_size(&self) -> usize {
        self.page_size
    }

    #[must_use]
    pub const fn is_loading(&self) -> bool {
        self.loading
    }

    #[must_use]
    pub const fn has_more(&self) -> bool {
        self.has_more
    }

    /// Replaces the whole sequence with the first page of a reload.
    pub fn replace(&mut self, page: ContentPage) {
        let before = self.items.len();
        self.items.clear();
        self.loading = false;
        self.absorb(page);
        tracing::debug!(before, after = self.items.len(), has_more = self.has_more, "feed replaced");
    }

    /// Appends the next page. Returns the number of items added.
    pub fn append(&mut self, page: ContentPage) -> usize {
        let before = self.items.len();
        self.loading = false;
        self.absorb(page);
        let added = self.items.len() - before;
        tracing::debug!(added, total = self.items.len(), has_more = self.has_more, "feed page appended");
        added
    }

    /// Removes an item. Returns its former ordinal.
    pub fn remove(&mut self, item_id: &ItemId) -> Option<usize> {
        let ordinal = self.position(item_id)?;
        self.items.remove(ordinal);
        self.renumber();
        tracing::debug!(item_id = %item_id, ordinal, "item removed from feed");
        Some(ordinal)
    }

    /// Returns `true` if a page should be requested given the active ordinal.
    ///
    /// The first page is never requested from here; hosts ask for it with a reload.
    #[must_use]
    pub fn should_load_more(&self, active: Option<usize>) -> bool {
        if self.loading || !self.has_more {
            return false;
        }
        active.is_some_and(|ordinal| {
            ordinal.saturating_add(self.load_more_threshold).saturating_add(1) >= self.items.len()
        })
    }

    /// Marks a page request as in flight.
    pub fn begin_load(&mut self) {
        self.loading = true;
    }

    /// Clears the in-flight flag after a failed load so it can be retried.
    pub fn fail_load(&mut self) {
        self.loading = false;
    }

    fn absorb(&mut self, page: ContentPage) {
        let mut seen: HashSet<ItemId> = self.items.iter().map(|item| item.id.clone()).collect();
        let incoming = page.items.len();
        let before = self.items.len();
        self.items.extend(
            page.items
                .into_iter()
                .filter(FeedItem::is_playable)
                .filter(|item| seen.insert(item.id.clone())),
        );
        let kept = self.items.len() - before;
        if kept < incoming {
            tracing::trace!(skipped = incoming - kept, "dropped non-playable or duplicate entries");
        }
        self.has_more = page.next_cursor.is_some();
        self.cursor = page.next_cursor;
        self.renumber();
    }

    fn renumber(&mut self) {
        for (ordinal, item) in self.items.iter_mut().enumerate() {
            item.ordinal = ordinal;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ItemKind;

    fn page(ids: &[&str], next: Option<&str>) -> ContentPage {
        ContentPage {
            items: ids.iter().map(|id| FeedItem::video(*id, format!("media://{id}"))).collect(),
            next_cursor: next.map(String::from),
        }
    }

    #[test]
    fn filters_non_video_and_assigns_ordinals() {
        let mut source = FeedDataSource::new(10, 2);
        let mut p = page(&["a", "b", "c"], None);
        p.items[1].kind = ItemKind::Ad;
        source.replace(p);

        let ids: Vec<&str> = source.items().iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert_eq!(source.get(1).map(|i| i.ordinal), Some(1));
        assert!(!source.has_more());
    }

    #[test]
    fn append_drops_duplicates() {
        let mut source = FeedDataSource::new(10, 2);
        source.replace(page(&["a", "b"], Some("2")));
        assert_eq!(source.append(page(&["b", "c"], None)), 1);
        assert_eq!(source.len(), 3);
        assert_eq!(source.position(&ItemId::new("c")), Some(2));
    }

    #[test]
    fn remove_renumbers() {
        let mut source = FeedDataSource::new(10, 2);
        source.replace(page(&["a", "b", "c"], None));
        assert_eq!(source.remove(&ItemId::new("a")), Some(0));
        assert_eq!(source.find(&ItemId::new("c")).map(|i| i.ordinal), Some(1));
        assert_eq!(source.remove(&ItemId::new("zzz")), None);
    }

    #[test]
    fn load_more_near_end_only_once() {
        let mut source = FeedDataSource::new(10, 2);
        source.replace(page(&["a", "b", "c", "d", "e"], Some("5")));
        assert!(!source.should_load_more(Some(1)));
        assert!(source.should_load_more(Some(2)));
        source.begin_load();
        assert!(!source.should_load_more(Some(4)));
        source.fail_load();
        assert!(source.should_load_more(Some(4)));
    }

    #[test]
    fn huge_threshold_saturates() {
        let mut source = FeedDataSource::new(10, usize::MAX);
        source.replace(page(&["a"], Some("1")));
        assert!(source.should_load_more(Some(0)));
        assert!(source.should_load_more(Some(usize::MAX)));
    }
}
