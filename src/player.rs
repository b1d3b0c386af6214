//! Player resource abstraction.
//!
//! The video codec and transport live outside this crate. The scheduler only
//! needs play/pause/mute/release on a per-item resource and a readiness flag,
//! so that is all the [`PlayerResource`] trait exposes. Resources are created
//! by a [`PlayerFactory`] injected into the scheduler at construction.

use crate::domain::{FeedItem, ResourceNotReady};

/// Result of a single call into a player resource.
pub type PlayerResult = std::result::Result<(), ResourceNotReady>;

/// A per-item video player owned by one playback controller.
///
/// Implementations may fail any mutating call with [`ResourceNotReady`]
/// until they report readiness; readiness is then delivered to the scheduler
/// as a [`crate::app::Event::Player`] event carrying [`PlayerSignal::Ready`].
pub trait PlayerResource: Send {
    /// Starts or resumes playback.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceNotReady`] if the resource cannot play yet.
    fn play(&mut self) -> PlayerResult;

    /// Pauses playback.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceNotReady`] if the resource cannot be driven yet.
    fn pause(&mut self) -> PlayerResult;

    /// Applies the mute setting.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceNotReady`] if the resource cannot be driven yet.
    fn set_muted(&mut self, muted: bool) -> PlayerResult;

    /// Returns `true` once the resource can accept play/pause calls.
    fn is_ready(&self) -> bool;

    /// Stops playback and frees decoder resources. Called exactly once.
    fn release(&mut self);
}

/// Creates player resources for mounted items.
pub trait PlayerFactory: Send {
    /// Builds a resource bound to `item`'s media.
    ///
    /// `generation` identifies this mount. Lifecycle signals from the
    /// resource must be delivered with it; signals carrying an older
    /// generation are dropped as stale.
    fn create(&mut self, item: &FeedItem, generation: u64) -> Box<dyn PlayerResource>;
}

/// Lifecycle signals raised by a player resource.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerSignal {
    /// The resource finished initializing.
    Ready,
    /// The resource lost its decoder or stream and is no longer ready.
    Failed {
        /// Description from the player.
        reason: String,
    },
}
