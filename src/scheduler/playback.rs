//! Per-item playback control.
//!
//! A [`PlaybackController`] is bound to one feed item for as long as the
//! virtualization engine keeps it mounted. It turns `is_active` edges into
//! play/pause calls on its [`PlayerResource`], treating "not ready" as a
//! deferred retry rather than an error.
//!
//! # State Machine
//!
//! ```text
//! Idle --mount--> Armed --active & ready--> Playing --inactive--> Paused
//!                   ^                          | \                  |
//!                   +------ player failed -----+  \   <--active-----+
//!                                                  \
//!                                   pause refused   +--> Pausing --ready--> Paused
//!   any --unmount--> Idle (resource released, controller dead)
//! ```
//!
//! A refused pause is retried on the next `Ready` signal and on
//! [`PlaybackController::force_pause`], the same way a refused play is.

use crate::domain::{FeedItem, ItemId};
use crate::player::{PlayerResource, PlayerSignal};
use serde::Serialize;

/// Playback state of one mounted item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    /// Not mounted, or unmounted and released.
    Idle,
    /// Mounted, never confirmed playing.
    Armed,
    /// The resource is consuming playback time.
    Playing,
    /// Played before, currently paused.
    Paused,
    /// Deactivated, but the resource refused the pause; retried once ready.
    Pausing,
}

/// Drives one player resource from the derived `is_active` flag.
pub struct PlaybackController {
    item_id: ItemId,
    ordinal: usize,
    generation: u64,
    state: PlaybackState,
    is_active: bool,
    pending_play: bool,
    muted: bool,
    mute_pending: bool,
    live: bool,
    player: Box<dyn PlayerResource>,
}

impl PlaybackController {
    /// Binds a freshly created resource to `item` and applies the mute setting.
    ///
    /// `generation` tags lifecycle signals; signals carrying any other
    /// generation are ignored as stale.
    #[must_use]
    pub fn mount(item: &FeedItem, generation: u64, player: Box<dyn PlayerResource>, muted: bool) -> Self {
        let mut controller = Self {
            item_id: item.id.clone(),
            ordinal: item.ordinal,
            generation,
            state: PlaybackState::Armed,
            is_active: false,
            pending_play: false,
            muted,
            mute_pending: false,
            live: true,
            player,
        };
        controller.apply_mute();
        tracing::debug!(item_id = %controller.item_id, ordinal = controller.ordinal, generation, "controller mounted");
        controller
    }

    #[must_use]
    pub const fn item_id(&self) -> &ItemId {
        &self.item_id
    }

    #[must_use]
    pub const fn ordinal(&self) -> usize {
        self.ordinal
    }

    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub const fn state(&self) -> PlaybackState {
        self.state
    }

    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.is_active
    }

    #[must_use]
    pub const fn is_live(&self) -> bool {
        self.live
    }

    /// Returns `true` if a play was refused and will be retried.
    #[must_use]
    pub const fn has_pending_play(&self) -> bool {
        self.pending_play
    }

    /// Returns `true` if a pause was refused and will be retried.
    #[must_use]
    pub fn has_pending_pause(&self) -> bool {
        self.state == PlaybackState::Pausing
    }

    /// Moves the controller to a new ordinal after the feed shifted.
    pub fn rebind(&mut self, ordinal: usize) {
        if self.ordinal != ordinal {
            tracing::trace!(item_id = %self.item_id, from = self.ordinal, to = ordinal, "controller rebound");
            self.ordinal = ordinal;
        }
    }

    /// Applies a new `is_active` value.
    ///
    /// Only edges act: false→true plays, true→false pauses. `active` is the
    /// resolver's current slot, re-checked before any play so a controller
    /// never plays for an ordinal other than the active one.
    pub fn set_active(&mut self, is_active: bool, active: Option<usize>) {
        if !self.live || self.is_active == is_active {
            return;
        }
        self.is_active = is_active;
        if is_active {
            self.try_play(active);
        } else {
            self.stop();
        }
    }

    /// Applies the user's mute preference regardless of active state.
    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
        if self.live {
            self.apply_mute();
        }
    }

    /// Handles a lifecycle signal from the player.
    ///
    /// Returns `false` if the signal was stale (wrong generation or after unmount).
    pub fn on_signal(&mut self, generation: u64, signal: &PlayerSignal, active: Option<usize>) -> bool {
        if !self.live || generation != self.generation {
            tracing::debug!(
                item_id = %self.item_id,
                generation,
                current_generation = self.generation,
                live = self.live,
                "ignoring stale player signal"
            );
            return false;
        }

        match signal {
            PlayerSignal::Ready => {
                if self.mute_pending {
                    self.apply_mute();
                }
                if !self.is_active && self.state == PlaybackState::Pausing {
                    self.stop();
                }
                if self.is_active && self.pending_play {
                    self.try_play(active);
                }
            }
            PlayerSignal::Failed { reason } => {
                tracing::warn!(item_id = %self.item_id, reason = %reason, "player resource failed");
                if matches!(self.state, PlaybackState::Playing | PlaybackState::Pausing) {
                    self.state = PlaybackState::Armed;
                    self.pending_play = self.is_active;
                }
            }
        }
        true
    }

    /// Pauses unconditionally and drops the active flag.
    ///
    /// Also retries a pause the resource refused earlier. Used to fail closed
    /// when the single-playing invariant is found broken.
    pub fn force_pause(&mut self) {
        self.is_active = false;
        self.stop();
    }

    /// Stops and releases the resource.
    ///
    /// Releases exactly once; later calls, and any play/pause or signal
    /// afterwards, are no-ops. Returns `true` if this call released.
    pub fn unmount(&mut self) -> bool {
        if !self.live {
            return false;
        }
        self.live = false;
        self.is_active = false;
        self.pending_play = false;
        self.player.release();
        self.state = PlaybackState::Idle;
        tracing::debug!(item_id = %self.item_id, generation = self.generation, "controller unmounted, resource released");
        true
    }

    fn try_play(&mut self, active: Option<usize>) {
        if active != Some(self.ordinal) {
            tracing::warn!(
                item_id = %self.item_id,
                ordinal = self.ordinal,
                ?active,
                "refusing play for an ordinal that is not active"
            );
            self.pending_play = false;
            return;
        }
        match self.player.play() {
            Ok(()) => {
                self.pending_play = false;
                self.state = PlaybackState::Playing;
                tracing::debug!(item_id = %self.item_id, ordinal = self.ordinal, "playing");
            }
            Err(e) => {
                self.pending_play = true;
                tracing::debug!(item_id = %self.item_id, error = %e, "play deferred until ready");
            }
        }
    }

    fn stop(&mut self) {
        self.pending_play = false;
        if !matches!(self.state, PlaybackState::Playing | PlaybackState::Pausing) {
            return;
        }
        match self.player.pause() {
            Ok(()) => {
                self.state = PlaybackState::Paused;
                tracing::debug!(item_id = %self.item_id, ordinal = self.ordinal, "paused");
            }
            Err(e) => {
                self.state = PlaybackState::Pausing;
                tracing::debug!(item_id = %self.item_id, error = %e, "pause deferred until ready");
            }
        }
    }

    fn apply_mute(&mut self) {
        match self.player.set_muted(self.muted) {
            Ok(()) => self.mute_pending = false,
            Err(_) => self.mute_pending = true,
        }
    }
}

impl Drop for PlaybackController {
    /// Guarantees the resource is released even if the owner forgot to unmount.
    fn drop(&mut self) {
        if self.live {
            self.unmount();
        }
    }
}

impl std::fmt::Debug for PlaybackController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackController")
            .field("item_id", &self.item_id)
            .field("ordinal", &self.ordinal)
            .field("generation", &self.generation)
            .field("state", &self.state)
            .field("is_active", &self.is_active)
            .field("pending_play", &self.pending_play)
            .field("live", &self.live)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ResourceNotReady;
    use crate::player::PlayerResult;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Default)]
    struct Calls {
        ready: bool,
        refuse_pause: bool,
        plays: u32,
        pauses: u32,
        releases: u32,
        muted: Option<bool>,
    }

    struct FakePlayer(Arc<Mutex<Calls>>);

    impl PlayerResource for FakePlayer {
        fn play(&mut self) -> PlayerResult {
            let mut c = self.0.lock().unwrap();
            if !c.ready {
                return Err(ResourceNotReady);
            }
            c.plays += 1;
            Ok(())
        }
        fn pause(&mut self) -> PlayerResult {
            let mut c = self.0.lock().unwrap();
            if c.refuse_pause {
                return Err(ResourceNotReady);
            }
            c.pauses += 1;
            Ok(())
        }
        fn set_muted(&mut self, muted: bool) -> PlayerResult {
            let mut c = self.0.lock().unwrap();
            if !c.ready {
                return Err(ResourceNotReady);
            }
            c.muted = Some(muted);
            Ok(())
        }
        fn is_ready(&self) -> bool {
            self.0.lock().unwrap().ready
        }
        fn release(&mut self) {
            self.0.lock().unwrap().releases += 1;
        }
    }

    fn controller(ready: bool) -> (PlaybackController, Arc<Mutex<Calls>>) {
        let calls = Arc::new(Mutex::new(Calls { ready, ..Calls::default() }));
        let mut item = FeedItem::video("a", "https://cdn.example/a.mp4");
        item.ordinal = 0;
        let c = PlaybackController::mount(&item, 7, Box::new(FakePlayer(Arc::clone(&calls))), true);
        (c, calls)
    }

    #[test]
    fn edges_drive_play_and_pause() {
        let (mut c, calls) = controller(true);
        assert_eq!(c.state(), PlaybackState::Armed);

        c.set_active(true, Some(0));
        assert_eq!(c.state(), PlaybackState::Playing);
        c.set_active(true, Some(0));
        c.set_active(false, None);
        assert_eq!(c.state(), PlaybackState::Paused);

        let calls = calls.lock().unwrap();
        assert_eq!((calls.plays, calls.pauses), (1, 1));
        assert_eq!(calls.muted, Some(true));
    }

    #[test]
    fn not_ready_play_is_retried_on_ready_signal() {
        let (mut c, calls) = controller(false);
        c.set_active(true, Some(0));
        assert_eq!(c.state(), PlaybackState::Armed);
        assert!(c.has_pending_play());

        calls.lock().unwrap().ready = true;
        assert!(c.on_signal(7, &PlayerSignal::Ready, Some(0)));
        assert_eq!(c.state(), PlaybackState::Playing);
        assert_eq!(calls.lock().unwrap().muted, Some(true));
    }

    #[test]
    fn ready_after_deactivation_does_not_play() {
        let (mut c, calls) = controller(false);
        c.set_active(true, Some(0));
        c.set_active(false, None);
        calls.lock().unwrap().ready = true;
        c.on_signal(7, &PlayerSignal::Ready, None);
        assert_eq!(c.state(), PlaybackState::Armed);
        assert_eq!(calls.lock().unwrap().plays, 0);
    }

    #[test]
    fn refuses_play_when_ordinal_is_not_active() {
        let (mut c, calls) = controller(true);
        c.set_active(true, Some(3));
        assert_eq!(c.state(), PlaybackState::Armed);
        assert_eq!(calls.lock().unwrap().plays, 0);
    }

    #[test]
    fn unmount_releases_once_and_ignores_later_input() {
        let (mut c, calls) = controller(true);
        c.set_active(true, Some(0));
        assert!(c.unmount());
        assert!(!c.unmount());

        c.set_active(false, None);
        c.set_active(true, Some(0));
        assert!(!c.on_signal(7, &PlayerSignal::Ready, Some(0)));
        drop(c);

        let calls = calls.lock().unwrap();
        assert_eq!(calls.releases, 1);
        assert_eq!(calls.plays, 1);
    }

    #[test]
    fn stale_generation_signal_is_ignored() {
        let (mut c, calls) = controller(false);
        c.set_active(true, Some(0));
        calls.lock().unwrap().ready = true;
        assert!(!c.on_signal(6, &PlayerSignal::Ready, Some(0)));
        assert_eq!(c.state(), PlaybackState::Armed);
    }

    #[test]
    fn mute_applies_while_inactive() {
        let (mut c, calls) = controller(true);
        c.set_muted(false);
        assert_eq!(calls.lock().unwrap().muted, Some(false));
        assert!(!c.is_active());
    }

    #[test]
    fn refused_pause_is_retried_on_ready_signal() {
        let (mut c, calls) = controller(true);
        c.set_active(true, Some(0));
        calls.lock().unwrap().refuse_pause = true;

        c.set_active(false, None);
        assert_eq!(c.state(), PlaybackState::Pausing);
        assert!(c.has_pending_pause());

        calls.lock().unwrap().refuse_pause = false;
        assert!(c.on_signal(7, &PlayerSignal::Ready, None));
        assert_eq!(c.state(), PlaybackState::Paused);
        assert!(!c.has_pending_pause());

        let calls = calls.lock().unwrap();
        assert_eq!((calls.plays, calls.pauses), (1, 1));
    }

    #[test]
    fn force_pause_retries_a_refused_pause() {
        let (mut c, calls) = controller(true);
        c.set_active(true, Some(0));
        calls.lock().unwrap().refuse_pause = true;
        c.set_active(false, None);

        calls.lock().unwrap().refuse_pause = false;
        c.force_pause();
        assert_eq!(c.state(), PlaybackState::Paused);
        assert_eq!(calls.lock().unwrap().pauses, 1);
    }

    #[test]
    fn reactivation_while_pausing_resumes_playback() {
        let (mut c, calls) = controller(true);
        c.set_active(true, Some(0));
        calls.lock().unwrap().refuse_pause = true;
        c.set_active(false, None);

        c.set_active(true, Some(0));
        assert_eq!(c.state(), PlaybackState::Playing);
        assert!(!c.has_pending_pause());
        assert_eq!(calls.lock().unwrap().plays, 2);
    }

    #[test]
    fn failure_while_playing_rearms_and_resumes_on_ready() {
        let (mut c, calls) = controller(true);
        c.set_active(true, Some(0));
        c.on_signal(7, &PlayerSignal::Failed { reason: "stream reset".into() }, Some(0));
        assert_eq!(c.state(), PlaybackState::Armed);
        c.on_signal(7, &PlayerSignal::Ready, Some(0));
        assert_eq!(c.state(), PlaybackState::Playing);
        assert_eq!(calls.lock().unwrap().plays, 2);
    }
}
