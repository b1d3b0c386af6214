//! Reduction of raw viewability events to a single confirmed ordinal.
//!
//! The virtualization engine reports visible items at high frequency. The
//! tracker keeps, per ordinal, the timestamp since which the item has been
//! continuously above the visibility threshold, and confirms an ordinal once
//! that dwell reaches the configured minimum.
//!
//! When nothing qualifies the previous confirmation is held. This avoids
//! pause/resume thrash during brief occlusions; only an emptied feed, an
//! unmount of the confirmed item, or an explicit [`ViewabilityTracker::forget`]
//! clears it.

use crate::domain::ViewabilityEvent;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Continuous visibility bookkeeping for one ordinal.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Sighting {
    since_ms: u64,
    fraction: f64,
}

/// Stateful reducer from [`ViewabilityEvent`]s to a confirmed ordinal.
#[derive(Debug, Clone)]
pub struct ViewabilityTracker {
    threshold: f64,
    min_dwell_ms: u64,
    sightings: BTreeMap<usize, Sighting>,
    confirmed: Option<usize>,
    last_timestamp_ms: Option<u64>,
}

impl ViewabilityTracker {
    /// Creates a tracker.
    ///
    /// * `threshold` - visible fraction an entry must exceed to qualify
    /// * `min_dwell_ms` - continuous qualifying time before confirmation
    #[must_use]
    pub const fn new(threshold: f64, min_dwell_ms: u64) -> Self {
        Self {
            threshold,
            min_dwell_ms,
            sightings: BTreeMap::new(),
            confirmed: None,
            last_timestamp_ms: None,
        }
    }

    /// Last confirmed ordinal.
    #[must_use]
    pub const fn confirmed(&self) -> Option<usize> {
        self.confirmed
    }

    /// Consumes one engine event and returns the confirmed ordinal afterwards.
    ///
    /// Malformed events (negative ordinal, fraction outside `[0, 1]`, or a
    /// timestamp earlier than the last accepted one) are dropped and the
    /// previous confirmation is returned unchanged.
    pub fn on_viewability_event(&mut self, event: &ViewabilityEvent) -> Option<usize> {
        if !event.is_well_formed() {
            tracing::debug!(timestamp_ms = event.timestamp_ms, "dropping malformed viewability event");
            return self.confirmed;
        }
        if self.is_stale(event.timestamp_ms) {
            tracing::debug!(
                timestamp_ms = event.timestamp_ms,
                last_timestamp_ms = ?self.last_timestamp_ms,
                "dropping out-of-order viewability event"
            );
            return self.confirmed;
        }
        self.last_timestamp_ms = Some(event.timestamp_ms);

        let mut next = BTreeMap::new();
        for entry in &event.entries {
            if entry.fraction <= self.threshold {
                continue;
            }
            let Ok(ordinal) = usize::try_from(entry.ordinal) else {
                continue;
            };
            let since_ms = self
                .sightings
                .get(&ordinal)
                .map_or(event.timestamp_ms, |s| s.since_ms);
            next.entry(ordinal)
                .and_modify(|s: &mut Sighting| s.fraction = s.fraction.max(entry.fraction))
                .or_insert(Sighting {
                    since_ms,
                    fraction: entry.fraction,
                });
        }
        self.sightings = next;

        self.evaluate(event.timestamp_ms)
    }

    /// Re-evaluates dwell at `now_ms` against the last accepted visible set.
    ///
    /// Engines that only report on change never send a second event for an
    /// item that simply stays on screen; the host ticks at
    /// [`next_deadline`](Self::next_deadline) so the item still gets confirmed.
    pub fn on_tick(&mut self, now_ms: u64) -> Option<usize> {
        if self.is_stale(now_ms) {
            return self.confirmed;
        }
        self.last_timestamp_ms = Some(now_ms);
        self.evaluate(now_ms)
    }

    /// Earliest timestamp at which an unconfirmed sighting would satisfy dwell.
    #[must_use]
    pub fn next_deadline(&self) -> Option<u64> {
        let last = self.last_timestamp_ms.unwrap_or(0);
        self.sightings
            .iter()
            .filter(|(ordinal, _)| Some(**ordinal) != self.confirmed)
            .map(|(_, s)| s.since_ms.saturating_add(self.min_dwell_ms))
            .filter(|deadline| *deadline > last)
            .min()
    }

    /// Clears the confirmation and all sightings.
    ///
    /// Used when the feed empties or the user has scrolled far away from the
    /// confirmed item. The clock watermark is kept so stale events stay dropped.
    pub fn forget(&mut self) {
        if self.confirmed.is_some() {
            tracing::debug!(previous = ?self.confirmed, "viewability confirmation cleared");
        }
        self.confirmed = None;
        self.sightings.clear();
    }

    /// Forgets a single ordinal, clearing the confirmation if it pointed there.
    pub fn forget_ordinal(&mut self, ordinal: usize) {
        self.sightings.remove(&ordinal);
        if self.confirmed == Some(ordinal) {
            tracing::debug!(ordinal, "confirmed item left the render window");
            self.confirmed = None;
        }
    }

    /// Adjusts for an item removed at `removed`.
    ///
    /// Later ordinals shift down by one so the confirmation keeps following the
    /// same item. Removing the confirmed item itself clears the confirmation.
    pub fn on_item_removed(&mut self, removed: usize) {
        self.confirmed = match self.confirmed {
            Some(c) if c == removed => None,
            Some(c) if c > removed => Some(c - 1),
            other => other,
        };
        self.sightings = std::mem::take(&mut self.sightings)
            .into_iter()
            .filter(|(ordinal, _)| *ordinal != removed)
            .map(|(ordinal, s)| if ordinal > removed { (ordinal - 1, s) } else { (ordinal, s) })
            .collect();
    }

    fn is_stale(&self, timestamp_ms: u64) -> bool {
        self.last_timestamp_ms.is_some_and(|last| timestamp_ms < last)
    }

    fn evaluate(&mut self, now_ms: u64) -> Option<usize> {
        let candidate = self
            .sightings
            .iter()
            .filter(|(_, s)| now_ms.saturating_sub(s.since_ms) >= self.min_dwell_ms)
            .map(|(ordinal, s)| (*ordinal, s.fraction))
            .min_by(|a, b| self.rank(*a, *b));

        if let Some((ordinal, fraction)) = candidate {
            if self.confirmed != Some(ordinal) {
                tracing::debug!(
                    previous = ?self.confirmed,
                    ordinal,
                    fraction,
                    now_ms,
                    "viewability confirmed"
                );
                self.confirmed = Some(ordinal);
            }
        }

        self.confirmed
    }

    /// Orders candidates: nearest to the last confirmation, then most visible,
    /// then lowest ordinal.
    fn rank(&self, a: (usize, f64), b: (usize, f64)) -> Ordering {
        let distance = |ordinal: usize| self.confirmed.map_or(0, |c| c.abs_diff(ordinal));
        distance(a.0)
            .cmp(&distance(b.0))
            .then_with(|| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal))
            .then_with(|| a.0.cmp(&b.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::VisibleEntry;

    fn tracker() -> ViewabilityTracker {
        ViewabilityTracker::new(0.5, 100)
    }

    fn event(ts: u64, entries: &[(i64, f64)]) -> ViewabilityEvent {
        ViewabilityEvent::new(
            ts,
            entries.iter().map(|(o, f)| VisibleEntry::new(*o, *f)).collect(),
        )
    }

    #[test]
    fn confirms_only_after_dwell() {
        let mut t = tracker();
        assert_eq!(t.on_viewability_event(&event(0, &[(0, 0.6)])), None);
        assert_eq!(t.on_viewability_event(&event(50, &[(0, 0.6)])), None);
        assert_eq!(t.on_viewability_event(&event(150, &[(0, 0.6)])), Some(0));
    }

    #[test]
    fn threshold_is_strict() {
        let mut t = tracker();
        t.on_viewability_event(&event(0, &[(0, 0.5)]));
        assert_eq!(t.on_viewability_event(&event(200, &[(0, 0.5)])), None);
    }

    #[test]
    fn brief_occlusion_holds_previous_value() {
        let mut t = tracker();
        t.on_viewability_event(&event(0, &[(0, 0.9)]));
        assert_eq!(t.on_viewability_event(&event(150, &[(0, 0.9)])), Some(0));

        // Item 1 flashes past while item 0 is occluded, then item 0 returns.
        assert_eq!(t.on_viewability_event(&event(170, &[(0, 0.2), (1, 0.8)])), Some(0));
        assert_eq!(t.on_viewability_event(&event(220, &[(0, 0.9)])), Some(0));
        assert_eq!(t.on_viewability_event(&event(260, &[])), Some(0));
    }

    #[test]
    fn continuity_resets_after_dropping_below_threshold() {
        let mut t = tracker();
        t.on_viewability_event(&event(0, &[(1, 0.8)]));
        t.on_viewability_event(&event(60, &[(1, 0.1)]));
        assert_eq!(t.on_viewability_event(&event(120, &[(1, 0.8)])), None);
        assert_eq!(t.on_viewability_event(&event(220, &[(1, 0.8)])), Some(1));
    }

    #[test]
    fn prefers_candidate_nearest_to_previous_confirmation() {
        let mut t = tracker();
        t.on_viewability_event(&event(0, &[(3, 0.9)]));
        assert_eq!(t.on_viewability_event(&event(100, &[(3, 0.9)])), Some(3));

        // Both 4 and 7 qualify; 4 is nearer even though 7 is more visible.
        t.on_viewability_event(&event(200, &[(4, 0.6), (7, 0.95)]));
        assert_eq!(t.on_viewability_event(&event(300, &[(4, 0.6), (7, 0.95)])), Some(4));
    }

    #[test]
    fn equal_distance_falls_back_to_visible_fraction() {
        let mut t = tracker();
        t.on_viewability_event(&event(0, &[(2, 0.9)]));
        t.on_viewability_event(&event(100, &[(2, 0.9)]));

        t.on_viewability_event(&event(200, &[(1, 0.55), (3, 0.75)]));
        assert_eq!(t.on_viewability_event(&event(300, &[(1, 0.55), (3, 0.75)])), Some(3));
    }

    #[test]
    fn malformed_and_out_of_order_events_are_dropped() {
        let mut t = tracker();
        t.on_viewability_event(&event(0, &[(0, 0.9)]));
        t.on_viewability_event(&event(100, &[(0, 0.9)]));

        assert_eq!(t.on_viewability_event(&event(200, &[(-1, 0.9), (1, 0.9)])), Some(0));
        assert_eq!(t.on_viewability_event(&event(300, &[(1, 1.4)])), Some(0));
        assert_eq!(t.on_viewability_event(&event(50, &[(1, 0.9)])), Some(0));
        assert_eq!(t.next_deadline(), None);
    }

    #[test]
    fn tick_confirms_item_that_stays_on_screen() {
        let mut t = tracker();
        t.on_viewability_event(&event(1_000, &[(5, 0.8)]));
        assert_eq!(t.next_deadline(), Some(1_100));
        assert_eq!(t.on_tick(1_050), None);
        assert_eq!(t.on_tick(1_100), Some(5));
        assert_eq!(t.next_deadline(), None);
    }

    #[test]
    fn removal_shifts_confirmation_to_follow_same_item() {
        let mut t = tracker();
        t.on_viewability_event(&event(0, &[(2, 0.9)]));
        t.on_viewability_event(&event(100, &[(2, 0.9)]));

        t.on_item_removed(0);
        assert_eq!(t.confirmed(), Some(1));

        t.on_item_removed(1);
        assert_eq!(t.confirmed(), None);
    }

    #[test]
    fn forget_ordinal_only_clears_matching_confirmation() {
        let mut t = tracker();
        t.on_viewability_event(&event(0, &[(0, 0.9)]));
        t.on_viewability_event(&event(100, &[(0, 0.9)]));

        t.forget_ordinal(4);
        assert_eq!(t.confirmed(), Some(0));
        t.forget_ordinal(0);
        assert_eq!(t.confirmed(), None);
    }
}
