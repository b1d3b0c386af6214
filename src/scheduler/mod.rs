//! Core scheduling components.
//!
//! ```text
//! engine ─▶ ViewabilityTracker ─▶ ActiveItemResolver ◀─ FocusGate
//!                                        │
//!                                        ▼
//!                           PlaybackController (per item) ─▶ player
//! ```
//!
//! [`InteractionRouter`] sits beside this pipeline: it reads the active slot
//! and item identifiers but never writes them.
//!
//! The components are plain state holders. Wiring, ordering, and the
//! single-playing check live in [`crate::app::FeedState`].

pub mod focus;
pub mod interaction;
pub mod playback;
pub mod resolver;
pub mod viewability;

pub use focus::FocusGate;
pub use interaction::{Intent, InteractionRouter, InteractionTarget, RouteOutcome};
pub use playback::{PlaybackController, PlaybackState};
pub use resolver::{ActiveChange, ActiveIndex, ActiveItemResolver};
pub use viewability::ViewabilityTracker;
