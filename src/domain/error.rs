//! Error types for the feed scheduler.
//!
//! This module defines the centralized error type [`FeedError`], the player-level
//! [`ResourceNotReady`] condition, and a [`Result`] alias used throughout the crate.
//! All errors are implemented using the `thiserror` crate.

use thiserror::Error;

/// A player resource refused a call because it has not finished initializing.
///
/// Returned by every mutating [`crate::player::PlayerResource`] call. The
/// playback controller treats it as "retry on the next edge" and never
/// surfaces it to the user.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("player resource not ready")]
pub struct ResourceNotReady;

/// The main error type for feed scheduler operations.
///
/// Variants follow the failure taxonomy of the scheduler: resource readiness,
/// transient collaborator I/O, programming defects, and the ambient storage,
/// configuration, and worker failures.
#[derive(Debug, Error)]
pub enum FeedError {
    /// Player not yet initialized.
    ///
    /// Retried on the next state edge; never shown to the user.
    #[error("Resource not ready: {0}")]
    ResourceNotReady(#[from] ResourceNotReady),

    /// Save, report, or content loading failed after the collaborator's retries.
    ///
    /// Surfaced as a dismissible notice.
    #[error("Transient I/O failure: {0}")]
    TransientIo(String),

    /// Scheduler invariant broken (for example two controllers playing at once).
    ///
    /// This is a programming defect. The scheduler pauses everything before
    /// returning it.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Storage operation failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Filesystem or I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration is invalid or missing.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Communication with the background worker failed.
    #[error("Worker communication error: {0}")]
    Worker(String),
}

/// A specialized `Result` type for feed scheduler operations.
pub type Result<T> = std::result::Result<T, FeedError>;
