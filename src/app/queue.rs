//! Serialized event delivery.
//!
//! Hosts may receive engine callbacks, focus changes and worker completions
//! from different sources. They push them here and drain on one thread, so
//! each event is applied completely before the next one is looked at.

use super::{handle_event, Action, Event, FeedState};
use crate::domain::FeedError;
use std::collections::VecDeque;

/// FIFO of events awaiting processing.
#[derive(Debug, Default)]
pub struct EventQueue {
    pending: VecDeque<Event>,
}

/// Outcome of one [`EventQueue::drain`].
#[derive(Debug, Default)]
pub struct DrainReport {
    /// Number of events applied.
    pub processed: usize,
    /// `true` if any event reported a visible change.
    pub changed: bool,
    /// Actions from every event, in event order. Includes actions a failed
    /// step produced before it failed closed.
    pub actions: Vec<Action>,
    /// Errors from individual events. Processing continues past them.
    pub errors: Vec<FeedError>,
}

impl EventQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: Event) {
        self.pending.push_back(event);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Applies every queued event in arrival order.
    ///
    /// Events pushed while draining are not possible (the queue is borrowed),
    /// so follow-ups such as worker completions are pushed by the caller and
    /// picked up by the next drain.
    pub fn drain(&mut self, state: &mut FeedState) -> DrainReport {
        let mut report = DrainReport::default();
        while let Some(event) = self.pending.pop_front() {
            report.processed += 1;
            match handle_event(state, &event) {
                Ok((changed, actions)) => {
                    report.changed |= changed;
                    report.actions.extend(actions);
                }
                Err(e) => {
                    tracing::error!(event = event.name(), error = %e, "event failed");
                    report.errors.push(e);
                    report.actions.extend(state.take_stranded_actions());
                }
            }
        }
        report
    }
}

impl Extend<Event> for EventQueue {
    fn extend<T: IntoIterator<Item = Event>>(&mut self, iter: T) {
        self.pending.extend(iter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FeedItem;
    use crate::player::{PlayerFactory, PlayerResource, PlayerResult};
    use crate::Config;

    struct Silent;

    impl PlayerResource for Silent {
        fn play(&mut self) -> PlayerResult {
            Ok(())
        }
        fn pause(&mut self) -> PlayerResult {
            Ok(())
        }
        fn set_muted(&mut self, _muted: bool) -> PlayerResult {
            Ok(())
        }
        fn is_ready(&self) -> bool {
            true
        }
        fn release(&mut self) {}
    }

    struct SilentFactory;

    impl PlayerFactory for SilentFactory {
        fn create(&mut self, _item: &FeedItem, _generation: u64) -> Box<dyn PlayerResource> {
            Box::new(Silent)
        }
    }

    #[test]
    fn drains_in_arrival_order() {
        let config = Config {
            min_dwell_ms: 0,
            ..Config::default()
        };
        let mut state = FeedState::new(&config, Box::new(SilentFactory));
        let mut queue = EventQueue::new();
        queue.extend([
            Event::FeedReloaded {
                items: vec![FeedItem::video("a", "a.mp4"), FeedItem::video("b", "b.mp4")],
                next_cursor: None,
            },
            Event::Viewability(crate::ViewabilityEvent::single(10, 0, 1.0)),
            Event::FocusChanged { has_focus: false },
        ]);
        assert_eq!(queue.len(), 3);

        let report = queue.drain(&mut state);

        assert_eq!(report.processed, 3);
        assert!(report.changed);
        assert!(report.errors.is_empty());
        assert!(queue.is_empty());
        // Focus loss was applied after the viewability confirmation.
        assert_eq!(state.active(), None);
        let changes: Vec<_> = report
            .actions
            .iter()
            .filter_map(|a| match a {
                Action::ActiveChanged(index) => Some(index.ordinal),
                _ => None,
            })
            .collect();
        assert_eq!(changes, vec![Some(0), None]);
    }
}
