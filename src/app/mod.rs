//! Application layer coordinating state, events, and actions.
//!
//! # Architecture
//!
//! ```text
//! Engine / Host → Events → EventQueue → handle_event → FeedState step → Actions
//!                   ↑                                                     ↓
//!                   └────────────── Worker Responses ─────────────────────┘
//! ```
//!
//! Player calls happen inside the step. Everything else the host has to do
//! (present a sheet, post to the worker, schedule a tick) comes back as an
//! [`Action`].
//!
//! # Modules
//!
//! - [`actions`]: Side effect commands emitted by the event handler
//! - [`handler`]: Event type and the per-event dispatcher
//! - [`queue`]: FIFO delivery so events apply one at a time
//! - [`state`]: Scheduler state and its step operations
//!
//! # Example
//!
//! ```rust
//! use reelfeed::app::{handle_event, Event, FeedState};
//! use reelfeed::player::{PlayerFactory, PlayerResource, PlayerResult};
//! use reelfeed::{Config, FeedItem};
//!
//! struct Null;
//! impl PlayerResource for Null {
//!     fn play(&mut self) -> PlayerResult { Ok(()) }
//!     fn pause(&mut self) -> PlayerResult { Ok(()) }
//!     fn set_muted(&mut self, _muted: bool) -> PlayerResult { Ok(()) }
//!     fn is_ready(&self) -> bool { true }
//!     fn release(&mut self) {}
//! }
//! struct Players;
//! impl PlayerFactory for Players {
//!     fn create(&mut self, _item: &FeedItem, _generation: u64) -> Box<dyn PlayerResource> { Box::new(Null) }
//! }
//!
//! let mut state = FeedState::new(&Config::default(), Box::new(Players));
//! let (_changed, actions) = handle_event(&mut state, &Event::FocusChanged { has_focus: false })?;
//! assert!(actions.is_empty());
//! # Ok::<(), reelfeed::FeedError>(())
//! ```

pub mod actions;
pub mod handler;
pub mod queue;
pub mod state;

pub use actions::Action;
pub use handler::{handle_event, Event};
pub use queue::{DrainReport, EventQueue};
pub use state::FeedState;
