//! Routing of user intents to the item they target.
//!
//! The router captures an [`InteractionTarget`] at the moment the user taps
//! comment, share, or report, so a sheet opened against item A stays bound to
//! A even if the feed scrolls underneath it. Save and unsave go through the
//! saved-set instead of a sheet and are deduplicated against both the
//! confirmed set and in-flight requests.

use crate::domain::ItemId;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// A user action on a feed item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Comment,
    Share,
    Save,
    Unsave,
    Report,
}

impl Intent {
    /// Returns `true` for intents that open a sheet or modal.
    #[must_use]
    pub const fn presents_sheet(self) -> bool {
        matches!(self, Self::Comment | Self::Share | Self::Report)
    }
}

/// The item a sheet or modal was opened against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionTarget {
    pub intent: Intent,
    pub item_id: ItemId,
    pub display_text: String,
}

/// What the caller must do after routing an intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Open the collaborator for this intent against the target.
    Present(InteractionTarget),
    /// Persist the saved flag for the item.
    Persist { item_id: ItemId, saved: bool },
    /// Nothing to do; the request matched the current state.
    Unchanged,
}

/// Owns the current interaction target and the saved-set.
#[derive(Debug, Clone, Default)]
pub struct InteractionRouter {
    target: Option<InteractionTarget>,
    saved: HashSet<ItemId>,
    in_flight: HashMap<ItemId, bool>,
}

impl InteractionRouter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The target of the currently open sheet, if any.
    #[must_use]
    pub const fn target(&self) -> Option<&InteractionTarget> {
        self.target.as_ref()
    }

    /// Confirmed saved state.
    #[must_use]
    pub fn is_saved(&self, item_id: &ItemId) -> bool {
        self.saved.contains(item_id)
    }

    /// Saved state as the UI should show it, including unconfirmed requests.
    #[must_use]
    pub fn is_saved_displayed(&self, item_id: &ItemId) -> bool {
        self.in_flight
            .get(item_id)
            .copied()
            .unwrap_or_else(|| self.is_saved(item_id))
    }

    /// Returns `true` while a save or unsave for the item awaits confirmation.
    #[must_use]
    pub fn is_in_flight(&self, item_id: &ItemId) -> bool {
        self.in_flight.contains_key(item_id)
    }

    /// Replaces the confirmed saved-set with what storage reported.
    pub fn load_saved(&mut self, ids: impl IntoIterator<Item = ItemId>) {
        self.saved = ids.into_iter().collect();
        tracing::debug!(count = self.saved.len(), "saved set loaded");
    }

    /// Routes `intent` to `item_id`.
    pub fn route(&mut self, intent: Intent, item_id: ItemId, display_text: String) -> RouteOutcome {
        match intent {
            Intent::Save => self.request_saved(item_id, true),
            Intent::Unsave => self.request_saved(item_id, false),
            Intent::Comment | Intent::Share | Intent::Report => {
                let target = InteractionTarget {
                    intent,
                    item_id,
                    display_text,
                };
                if let Some(previous) = self.target.replace(target.clone()) {
                    tracing::debug!(
                        previous_intent = ?previous.intent,
                        previous_item = %previous.item_id,
                        "replacing open interaction target"
                    );
                }
                tracing::debug!(intent = ?intent, item_id = %target.item_id, "interaction target captured");
                RouteOutcome::Present(target)
            }
        }
    }

    /// Clears the target when its sheet closes.
    pub fn dismiss(&mut self) -> Option<InteractionTarget> {
        self.target.take()
    }

    /// Clears the target if it is the open report sheet for `item_id`.
    pub fn close_report(&mut self, item_id: &ItemId) -> bool {
        let is_open_report = self
            .target
            .as_ref()
            .is_some_and(|t| t.intent == Intent::Report && &t.item_id == item_id);
        if is_open_report {
            self.target = None;
        }
        is_open_report
    }

    /// Records a confirmed save/unsave from storage.
    pub fn on_persisted(&mut self, item_id: &ItemId, saved: bool) {
        if self.in_flight.get(item_id) == Some(&saved) {
            self.in_flight.remove(item_id);
        }
        if saved {
            self.saved.insert(item_id.clone());
        } else {
            self.saved.remove(item_id);
        }
    }

    /// Drops a failed request. The confirmed state is left as it was.
    pub fn on_persist_failed(&mut self, item_id: &ItemId, saved: bool) {
        if self.in_flight.get(item_id) == Some(&saved) {
            self.in_flight.remove(item_id);
        }
    }

    fn request_saved(&mut self, item_id: ItemId, saved: bool) -> RouteOutcome {
        if self.is_saved_displayed(&item_id) == saved {
            tracing::debug!(item_id = %item_id, saved, "saved state already requested, skipping");
            return RouteOutcome::Unchanged;
        }
        self.in_flight.insert(item_id.clone(), saved);
        RouteOutcome::Persist { item_id, saved }
    }
}
