//! Scheduler state and the step operations that mutate it.
//!
//! [`FeedState`] wires the scheduler components together. Every public
//! mutating method is one complete step: it updates the inputs, recomputes
//! the active slot, fans the result out to every mounted controller, and
//! checks that at most one controller is playing before it returns.
//!
//! # Ordering Within a Step
//!
//! Fan-out deactivates before it activates, so the outgoing item is paused
//! before the incoming one is told to play. There is no window in which two
//! controllers are both instructed to play.

use super::actions::Action;
use crate::domain::{FeedError, FeedItem, ItemId, Result, ViewabilityEvent};
use crate::feed::{ContentPage, FeedDataSource};
use crate::player::{PlayerFactory, PlayerSignal};
use crate::scheduler::{
    ActiveChange, ActiveIndex, ActiveItemResolver, FocusGate, Intent, InteractionRouter, PlaybackController,
    PlaybackState, RouteOutcome, ViewabilityTracker,
};
use crate::worker::{WorkerMessage, WorkerResponse};
use crate::Config;
use std::collections::BTreeMap;

/// Central scheduler state for one feed instance.
///
/// Collaborators (the player factory) are injected at construction; nothing
/// is looked up ambiently.
pub struct FeedState {
    source: FeedDataSource,
    tracker: ViewabilityTracker,
    focus: FocusGate,
    resolver: ActiveItemResolver,
    router: InteractionRouter,
    controllers: BTreeMap<ItemId, PlaybackController>,
    players: Box<dyn PlayerFactory>,
    sound_enabled: bool,
    next_generation: u64,
    stranded: Vec<Action>,
}

impl FeedState {
    /// Creates an empty feed state.
    #[must_use]
    pub fn new(config: &Config, players: Box<dyn PlayerFactory>) -> Self {
        Self {
            source: FeedDataSource::new(config.page_size, config.load_more_threshold),
            tracker: ViewabilityTracker::new(config.visibility_threshold, config.min_dwell_ms),
            focus: FocusGate::new(config.start_focused),
            resolver: ActiveItemResolver::new(config.start_focused),
            router: InteractionRouter::new(),
            controllers: BTreeMap::new(),
            players,
            sound_enabled: config.sound_enabled,
            next_generation: 0,
            stranded: Vec::new(),
        }
    }

    // ── Read access ──────────────────────────────────────────────────────

    #[must_use]
    pub const fn source(&self) -> &FeedDataSource {
        &self.source
    }

    #[must_use]
    pub const fn router(&self) -> &InteractionRouter {
        &self.router
    }

    #[must_use]
    pub const fn active(&self) -> Option<usize> {
        self.resolver.active()
    }

    #[must_use]
    pub const fn active_index(&self) -> ActiveIndex {
        self.resolver.active_index()
    }

    #[must_use]
    pub fn active_item(&self) -> Option<&FeedItem> {
        self.active().and_then(|ordinal| self.source.get(ordinal))
    }

    /// `isActive` as a controller for `ordinal` would observe it.
    #[must_use]
    pub fn is_active(&self, ordinal: usize) -> bool {
        self.resolver.is_active(ordinal)
    }

    #[must_use]
    pub const fn has_focus(&self) -> bool {
        self.focus.has_focus()
    }

    #[must_use]
    pub const fn sound_enabled(&self) -> bool {
        self.sound_enabled
    }

    #[must_use]
    pub fn controller(&self, item_id: &ItemId) -> Option<&PlaybackController> {
        self.controllers.get(item_id)
    }

    pub fn controllers(&self) -> impl Iterator<Item = &PlaybackController> {
        self.controllers.values()
    }

    #[must_use]
    pub fn playing_count(&self) -> usize {
        self.controllers
            .values()
            .filter(|c| c.state() == PlaybackState::Playing)
            .count()
    }

    /// Takes the actions of a step that failed closed.
    ///
    /// A step that returns [`FeedError::InvariantViolation`] has still moved
    /// the active slot or requested a page. Those actions are kept here
    /// until the host collects them.
    pub fn take_stranded_actions(&mut self) -> Vec<Action> {
        std::mem::take(&mut self.stranded)
    }

    /// When the host should deliver the next [`crate::Event::Tick`], if ever.
    #[must_use]
    pub fn next_tick_deadline(&self) -> Option<u64> {
        self.tracker.next_deadline()
    }

    // ── Startup ──────────────────────────────────────────────────────────

    /// Requests the saved-set and the first page.
    pub fn startup_actions(&mut self) -> Vec<Action> {
        self.source.begin_load();
        vec![
            Action::PostToWorker(WorkerMessage::load_saved()),
            Action::PostToWorker(WorkerMessage::reload(self.source.page_size())),
        ]
    }

    // ── Viewability & focus ──────────────────────────────────────────────

    /// Applies one engine viewability report.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::InvariantViolation`] if fan-out left more than one
    /// controller playing (everything is paused first).
    pub fn apply_viewability(&mut self, event: &ViewabilityEvent) -> Result<Vec<Action>> {
        let viewable = self.tracker.on_viewability_event(event);
        let change = self.resolver.set_viewable(viewable);
        let (mut actions, synced) = self.step(change);
        actions.extend(self.tracker.next_deadline().map(|at_ms| Action::ScheduleTick { at_ms }));
        self.conclude(synced, actions)
    }

    /// Re-evaluates dwell at `now_ms`.
    ///
    /// # Errors
    ///
    /// See [`apply_viewability`](Self::apply_viewability).
    pub fn apply_tick(&mut self, now_ms: u64) -> Result<Vec<Action>> {
        let viewable = self.tracker.on_tick(now_ms);
        let change = self.resolver.set_viewable(viewable);
        let (mut actions, synced) = self.step(change);
        actions.extend(self.tracker.next_deadline().map(|at_ms| Action::ScheduleTick { at_ms }));
        self.conclude(synced, actions)
    }

    /// The engine reports the list scrolled far from every tracked item.
    ///
    /// # Errors
    ///
    /// See [`apply_viewability`](Self::apply_viewability).
    pub fn scrolled_away(&mut self) -> Result<Vec<Action>> {
        self.tracker.forget();
        let change = self.resolver.set_viewable(None);
        self.settle(change)
    }

    /// Applies a focus or blur. A blur pauses the active item within this call.
    ///
    /// # Errors
    ///
    /// See [`apply_viewability`](Self::apply_viewability).
    pub fn apply_focus(&mut self, has_focus: bool) -> Result<Vec<Action>> {
        if !self.focus.on_focus_changed(has_focus) {
            return Ok(vec![]);
        }
        let change = self.resolver.set_focus(has_focus);
        self.settle(change)
    }

    // ── Mount lifecycle ──────────────────────────────────────────────────

    /// Creates a controller for a newly rendered item.
    ///
    /// Mounting an item that already has a controller releases the old one
    /// first. Unknown items are ignored. Returns [`Action::Mounted`] with the
    /// generation the host must put on this item's player signals.
    ///
    /// # Errors
    ///
    /// See [`apply_viewability`](Self::apply_viewability).
    pub fn mount(&mut self, item_id: &ItemId) -> Result<Vec<Action>> {
        let Some(item) = self.source.find(item_id).cloned() else {
            tracing::debug!(item_id = %item_id, "ignoring mount for item not in feed");
            return Ok(vec![]);
        };
        if let Some(mut previous) = self.controllers.remove(item_id) {
            tracing::debug!(item_id = %item_id, "remount, releasing previous controller");
            previous.unmount();
        }

        self.next_generation += 1;
        let generation = self.next_generation;
        let player = self.players.create(&item, generation);
        let mut controller = PlaybackController::mount(&item, generation, player, !self.sound_enabled);
        let active = self.resolver.active();
        if active == Some(item.ordinal) {
            controller.set_active(true, active);
        }
        self.controllers.insert(item.id.clone(), controller);

        let mounted = vec![Action::Mounted {
            item_id: item.id,
            generation,
        }];
        let verified = self.verify_single_playing();
        self.conclude(verified, mounted)
    }

    /// Releases an item's controller when the engine stops rendering it.
    ///
    /// If the item was the confirmed viewable one, the user has scrolled far
    /// away from it and the confirmation is cleared.
    ///
    /// # Errors
    ///
    /// See [`apply_viewability`](Self::apply_viewability).
    pub fn unmount(&mut self, item_id: &ItemId) -> Result<Vec<Action>> {
        let Some(mut controller) = self.controllers.remove(item_id) else {
            tracing::debug!(item_id = %item_id, "ignoring unmount for item without controller");
            return Ok(vec![]);
        };
        let ordinal = controller.ordinal();
        controller.unmount();
        self.tracker.forget_ordinal(ordinal);
        let change = self.resolver.set_viewable(self.tracker.confirmed());
        self.settle(change)
    }

    /// Forwards a player lifecycle signal. Returns `false` if it was stale.
    ///
    /// # Errors
    ///
    /// See [`apply_viewability`](Self::apply_viewability).
    pub fn player_signal(&mut self, item_id: &ItemId, generation: u64, signal: &PlayerSignal) -> Result<bool> {
        let active = self.resolver.active();
        let Some(controller) = self.controllers.get_mut(item_id) else {
            tracing::debug!(item_id = %item_id, generation, "ignoring signal for unmounted item");
            return Ok(false);
        };
        let applied = controller.on_signal(generation, signal, active);
        self.verify_single_playing()?;
        Ok(applied)
    }

    /// Applies a pushed sound preference to every mounted controller.
    pub fn set_sound_enabled(&mut self, sound_enabled: bool) -> bool {
        if self.sound_enabled == sound_enabled {
            return false;
        }
        tracing::debug!(sound_enabled, "sound preference changed");
        self.sound_enabled = sound_enabled;
        for controller in self.controllers.values_mut() {
            controller.set_muted(!sound_enabled);
        }
        true
    }

    // ── Feed data ────────────────────────────────────────────────────────

    /// Replaces the feed wholesale.
    ///
    /// # Errors
    ///
    /// See [`apply_viewability`](Self::apply_viewability).
    pub fn replace_feed(&mut self, page: ContentPage) -> Result<Vec<Action>> {
        self.source.replace(page);
        self.tracker.forget();
        self.rebind_controllers();
        let change = self.resolver.set_feed(None, self.source.len());
        self.settle(change)
    }

    /// Appends a page.
    ///
    /// # Errors
    ///
    /// See [`apply_viewability`](Self::apply_viewability).
    pub fn append_feed(&mut self, page: ContentPage) -> Result<Vec<Action>> {
        self.source.append(page);
        let change = self.resolver.set_feed(self.tracker.confirmed(), self.source.len());
        self.settle(change)
    }

    /// Removes one item, releasing its controller.
    ///
    /// # Errors
    ///
    /// See [`apply_viewability`](Self::apply_viewability).
    pub fn remove_item(&mut self, item_id: &ItemId) -> Result<Vec<Action>> {
        let Some(removed) = self.source.remove(item_id) else {
            tracing::debug!(item_id = %item_id, "ignoring removal of unknown item");
            return Ok(vec![]);
        };
        self.tracker.on_item_removed(removed);
        if let Some(mut controller) = self.controllers.remove(item_id) {
            controller.unmount();
        }
        self.rebind_controllers();
        let change = self.resolver.set_feed(self.tracker.confirmed(), self.source.len());
        self.settle(change)
    }

    /// User asked for a fresh feed (pull to refresh).
    pub fn request_reload(&mut self) -> Vec<Action> {
        if self.source.is_loading() {
            tracing::debug!("reload requested while a load is in flight, skipping");
            return vec![];
        }
        self.source.begin_load();
        vec![Action::PostToWorker(WorkerMessage::reload(self.source.page_size()))]
    }

    // ── Interactions ─────────────────────────────────────────────────────

    /// Routes an intent to an item currently in the feed.
    ///
    /// An empty `display_text` falls back to the item's caption.
    pub fn interact(&mut self, intent: Intent, item_id: &ItemId, display_text: &str) -> Vec<Action> {
        let Some(item) = self.source.find(item_id) else {
            tracing::debug!(intent = ?intent, item_id = %item_id, "ignoring interaction for item not in feed");
            return vec![];
        };
        let display_text = if display_text.is_empty() {
            item.caption.clone()
        } else {
            display_text.to_string()
        };

        match self.router.route(intent, item_id.clone(), display_text) {
            RouteOutcome::Present(target) => vec![Action::Present { target }],
            RouteOutcome::Persist { item_id, saved } => {
                vec![Action::PostToWorker(WorkerMessage::save_item(item_id, saved))]
            }
            RouteOutcome::Unchanged => vec![],
        }
    }

    /// Routes an intent to whichever item is active right now.
    pub fn interact_with_active(&mut self, intent: Intent) -> Vec<Action> {
        let Some(item_id) = self.active_item().map(|item| item.id.clone()) else {
            tracing::debug!(intent = ?intent, "no active item to interact with");
            return vec![];
        };
        self.interact(intent, &item_id, "")
    }

    /// Clears the open sheet's target. Returns `true` if one was open.
    pub fn dismiss_sheet(&mut self) -> bool {
        self.router.dismiss().is_some()
    }

    /// Submits the open report flow.
    pub fn submit_report(&mut self, reason: &str) -> Vec<Action> {
        match self.router.target() {
            Some(target) if target.intent == Intent::Report => {
                vec![Action::PostToWorker(WorkerMessage::submit_report(
                    target.item_id.clone(),
                    reason.to_string(),
                ))]
            }
            _ => {
                tracing::debug!("report submitted with no open report flow, ignoring");
                vec![]
            }
        }
    }

    /// A comment/share/report collaborator failed; show it in the open sheet.
    pub fn interaction_failed(&mut self, intent: Intent, message: &str) -> Vec<Action> {
        match self.router.target() {
            Some(target) if target.intent == intent => vec![Action::SurfaceError {
                intent,
                item_id: target.item_id.clone(),
                message: message.to_string(),
            }],
            _ => {
                tracing::warn!(intent = ?intent, message, "interaction failed with no matching sheet open");
                vec![Action::ShowNotice {
                    message: message.to_string(),
                }]
            }
        }
    }

    // ── Worker completions ───────────────────────────────────────────────

    /// Applies a collaborator completion.
    ///
    /// # Errors
    ///
    /// See [`apply_viewability`](Self::apply_viewability).
    pub fn apply_worker_response(&mut self, response: &WorkerResponse) -> Result<Vec<Action>> {
        match response {
            WorkerResponse::SavedLoaded { item_ids } => {
                self.router.load_saved(item_ids.iter().cloned());
                Ok(vec![])
            }
            WorkerResponse::SavedChanged { item_id, saved } => {
                self.router.on_persisted(item_id, *saved);
                Ok(vec![])
            }
            WorkerResponse::SaveFailed {
                item_id,
                saved,
                message,
            } => {
                tracing::warn!(item_id = %item_id, saved, error = %message, "saved state change failed");
                self.router.on_persist_failed(item_id, *saved);
                let verb = if *saved { "save" } else { "unsave" };
                Ok(vec![Action::ShowNotice {
                    message: format!("Couldn't {verb} this video. Please try again."),
                }])
            }
            WorkerResponse::PageLoaded {
                items,
                next_cursor,
                replace,
            } => {
                let page = ContentPage {
                    items: items.clone(),
                    next_cursor: next_cursor.clone(),
                };
                if *replace {
                    self.replace_feed(page)
                } else {
                    self.append_feed(page)
                }
            }
            WorkerResponse::PageFailed { message } => {
                tracing::warn!(error = %message, "page load failed");
                self.source.fail_load();
                Ok(vec![Action::ShowNotice {
                    message: "Couldn't load more videos.".to_string(),
                }])
            }
            WorkerResponse::ReportSubmitted { item_id } => {
                if self.router.close_report(item_id) {
                    Ok(vec![Action::CloseSheet {
                        intent: Intent::Report,
                        item_id: item_id.clone(),
                    }])
                } else {
                    Ok(vec![])
                }
            }
            WorkerResponse::ReportFailed { item_id, message } => Ok(vec![Action::SurfaceError {
                intent: Intent::Report,
                item_id: item_id.clone(),
                message: message.clone(),
            }]),
            WorkerResponse::Error { message } => {
                tracing::warn!(error = %message, "worker error");
                Ok(vec![Action::ShowNotice {
                    message: message.clone(),
                }])
            }
        }
    }

    // ── Internals ────────────────────────────────────────────────────────

    /// Fans the active slot out to controllers and queues follow-up actions.
    fn settle(&mut self, change: Option<ActiveChange>) -> Result<Vec<Action>> {
        let (actions, synced) = self.step(change);
        self.conclude(synced, actions)
    }

    /// Like [`settle`](Self::settle), but leaves the outcome to the caller
    /// so it can add actions of its own first.
    fn step(&mut self, change: Option<ActiveChange>) -> (Vec<Action>, Result<()>) {
        let synced = self.sync_controllers();
        let mut actions = Vec::new();
        if let Some(change) = change {
            actions.push(Action::ActiveChanged(change.current));
        }
        actions.extend(self.maybe_load_more());
        (actions, synced)
    }

    /// Returns `actions`, or parks them for the host when the step failed closed.
    fn conclude(&mut self, outcome: Result<()>, actions: Vec<Action>) -> Result<Vec<Action>> {
        match outcome {
            Ok(()) => Ok(actions),
            Err(e) => {
                self.stranded.extend(actions);
                Err(e)
            }
        }
    }

    fn sync_controllers(&mut self) -> Result<()> {
        let active = self.resolver.active();

        for controller in self.controllers.values_mut() {
            if controller.is_active() && Some(controller.ordinal()) != active {
                controller.set_active(false, active);
            }
        }
        if let Some(ordinal) = active {
            for controller in self.controllers.values_mut() {
                if controller.ordinal() == ordinal {
                    controller.set_active(true, active);
                }
            }
        }

        self.verify_single_playing()
    }

    /// Fails closed if more than one controller plays, or one plays while not active.
    fn verify_single_playing(&mut self) -> Result<()> {
        let active = self.resolver.active();
        let playing: Vec<(ItemId, usize)> = self
            .controllers
            .values()
            .filter(|c| c.state() == PlaybackState::Playing)
            .map(|c| (c.item_id().clone(), c.ordinal()))
            .collect();

        let stray = playing.iter().any(|(_, ordinal)| Some(*ordinal) != active);
        if playing.len() <= 1 && !stray {
            return Ok(());
        }

        tracing::error!(?playing, ?active, "single-playing invariant violated, pausing all controllers");
        for controller in self.controllers.values_mut() {
            controller.force_pause();
        }
        Err(FeedError::InvariantViolation(format!(
            "{} controllers playing with active ordinal {active:?}",
            playing.len()
        )))
    }

    fn rebind_controllers(&mut self) {
        let gone: Vec<ItemId> = self
            .controllers
            .keys()
            .filter(|id| self.source.position(id).is_none())
            .cloned()
            .collect();
        for item_id in gone {
            if let Some(mut controller) = self.controllers.remove(&item_id) {
                tracing::debug!(item_id = %item_id, "item left the feed, releasing controller");
                controller.unmount();
            }
        }
        for (item_id, controller) in &mut self.controllers {
            if let Some(ordinal) = self.source.position(item_id) {
                controller.rebind(ordinal);
            }
        }
    }

    fn maybe_load_more(&mut self) -> Option<Action> {
        if !self.source.should_load_more(self.resolver.active()) {
            return None;
        }
        self.source.begin_load();
        tracing::debug!(active = ?self.resolver.active(), "requesting next page");
        Some(Action::PostToWorker(WorkerMessage::load_more(
            self.source.cursor().map(String::from),
            self.source.page_size(),
        )))
    }
}

impl std::fmt::Debug for FeedState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedState")
            .field("items", &self.source.len())
            .field("active", &self.resolver.active_index())
            .field("has_focus", &self.focus.has_focus())
            .field("controllers", &self.controllers)
            .field("sound_enabled", &self.sound_enabled)
            .finish_non_exhaustive()
    }
}
