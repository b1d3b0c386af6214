//! The authoritative "which single item may play" decision.
//!
//! [`ActiveItemResolver`] owns the one shared mutable slot of the scheduler.
//! It is written only here; everything else reads it through
//! [`ActiveItemResolver::active`]. Each change is stamped with a strictly
//! increasing generation so no two updates share a timestamp.

use serde::Serialize;

/// Snapshot of the active slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ActiveIndex {
    /// Ordinal allowed to play, if any.
    pub ordinal: Option<usize>,
    /// Incremented on every change.
    pub generation: u64,
}

/// A change of the active slot, reported to the caller for synchronous fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveChange {
    pub previous: Option<usize>,
    pub current: ActiveIndex,
}

/// `ActiveIndex = has_focus ? viewable : None`, clamped to the feed length.
#[must_use]
pub fn resolve(viewable: Option<usize>, has_focus: bool, feed_len: usize) -> Option<usize> {
    if !has_focus {
        return None;
    }
    viewable.filter(|ordinal| *ordinal < feed_len)
}

/// Combines the latest viewability reading, focus, and feed length.
#[derive(Debug, Clone)]
pub struct ActiveItemResolver {
    viewable: Option<usize>,
    has_focus: bool,
    feed_len: usize,
    active: ActiveIndex,
}

impl ActiveItemResolver {
    #[must_use]
    pub fn new(has_focus: bool) -> Self {
        Self {
            viewable: None,
            has_focus,
            feed_len: 0,
            active: ActiveIndex::default(),
        }
    }

    /// Current active ordinal.
    #[must_use]
    pub const fn active(&self) -> Option<usize> {
        self.active.ordinal
    }

    /// Current active slot with its generation.
    #[must_use]
    pub const fn active_index(&self) -> ActiveIndex {
        self.active
    }

    #[must_use]
    pub fn is_active(&self, ordinal: usize) -> bool {
        self.active.ordinal == Some(ordinal)
    }

    /// Updates the viewability input.
    pub fn set_viewable(&mut self, viewable: Option<usize>) -> Option<ActiveChange> {
        self.viewable = viewable;
        self.recompute()
    }

    /// Updates the focus input.
    pub fn set_focus(&mut self, has_focus: bool) -> Option<ActiveChange> {
        self.has_focus = has_focus;
        self.recompute()
    }

    /// Updates viewability and feed length together after a feed mutation,
    /// so the slot moves at most once per mutation.
    pub fn set_feed(&mut self, viewable: Option<usize>, feed_len: usize) -> Option<ActiveChange> {
        self.viewable = viewable;
        self.feed_len = feed_len;
        self.recompute()
    }

    fn recompute(&mut self) -> Option<ActiveChange> {
        let next = resolve(self.viewable, self.has_focus, self.feed_len);
        if next == self.active.ordinal {
            return None;
        }
        if self.viewable.is_some() && self.has_focus && next.is_none() {
            tracing::debug!(
                viewable = ?self.viewable,
                feed_len = self.feed_len,
                "viewable ordinal past end of feed, clamping to none"
            );
        }
        let previous = self.active.ordinal;
        self.active = ActiveIndex {
            ordinal: next,
            generation: self.active.generation + 1,
        };
        tracing::debug!(
            ?previous,
            current = ?next,
            generation = self.active.generation,
            "active index changed"
        );
        Some(ActiveChange {
            previous,
            current: self.active,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_truth_table() {
        assert_eq!(resolve(Some(1), true, 3), Some(1));
        assert_eq!(resolve(Some(1), false, 3), None);
        assert_eq!(resolve(None, true, 3), None);
        assert_eq!(resolve(Some(3), true, 3), None);
        assert_eq!(resolve(Some(0), true, 0), None);
    }

    #[test]
    fn focus_loss_clears_immediately() {
        let mut r = ActiveItemResolver::new(true);
        r.set_feed(None, 3);
        r.set_viewable(Some(1));
        assert_eq!(r.active(), Some(1));

        let change = r.set_focus(false).expect("focus loss must change the slot");
        assert_eq!(change.previous, Some(1));
        assert_eq!(change.current.ordinal, None);

        let change = r.set_focus(true).expect("focus return must restore the slot");
        assert_eq!(change.current.ordinal, Some(1));
    }

    #[test]
    fn generations_strictly_increase() {
        let mut r = ActiveItemResolver::new(true);
        let mut seen = vec![];
        seen.extend(r.set_feed(Some(0), 3));
        seen.extend(r.set_viewable(Some(1)));
        seen.extend(r.set_viewable(Some(1)));
        seen.extend(r.set_focus(false));
        seen.extend(r.set_focus(true));

        let generations: Vec<u64> = seen.iter().map(|c| c.current.generation).collect();
        assert_eq!(generations, vec![1, 2, 3, 4]);
    }

    #[test]
    fn shrinking_feed_clamps_to_none() {
        let mut r = ActiveItemResolver::new(true);
        r.set_feed(Some(2), 3);
        assert_eq!(r.active(), Some(2));
        r.set_feed(Some(2), 2);
        assert_eq!(r.active(), None);
    }
}
