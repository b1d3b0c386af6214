//! Domain layer for the feed scheduler.
//!
//! Core types shared by every other layer, free of player, storage, or host
//! concerns.
//!
//! # Organization
//!
//! - [`error`]: Error types and result aliases
//! - [`item`]: Feed item model and identifiers
//! - [`viewability`]: Raw visibility events from the virtualization engine

pub mod error;
pub mod item;
pub mod viewability;

pub use error::{FeedError, ResourceNotReady, Result};
pub use item::{FeedItem, ItemId, ItemKind};
pub use viewability::{ViewabilityEvent, VisibleEntry};
