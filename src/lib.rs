//! Reelfeed: single-active-video scheduling for virtualized feeds.
//!
//! A vertical feed renders many video items at once, but at most one of them
//! may play. Reelfeed decides which one:
//! - Viewability tracking with a visibility threshold and minimum dwell time
//! - Focus gating so nothing plays while the feed is off screen
//! - Per-item playback controllers that survive slow player start-up
//! - Interaction routing (comment, share, save, report) against stable item ids
//! - Paginated feed data with JSON file persistence for saved items

#![allow(clippy::multiple_crate_versions)]

//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │  Host / replay binary (main.rs)                     │  ← Entry point
//! └─────────────────────────────────────────────────────┘
//!                        │ Events
//! ┌─────────────────────────────────────────────────────┐
//! │  Application Layer (app/)                           │  ← One step per event
//! │  - EventQueue, handle_event                         │
//! │  - FeedState fan-out and invariant check            │
//! └─────────────────────────────────────────────────────┘
//!         │                    │                    │
//! ┌───────────────┐   ┌───────────────┐   ┌───────────────┐
//! │ Scheduler     │   │ Feed          │   │ Worker        │
//! │ (scheduler/)  │   │ (feed/)       │   │ (worker/)     │
//! │ - Viewability │   │ - Ordinals    │   │ - Save/unsave │
//! │ - Focus gate  │   │ - Pagination  │   │ - Page loads  │
//! │ - Resolver    │   │ - Content API │   │ - Reports     │
//! │ - Playback    │   └───────────────┘   └───────────────┘
//! │ - Interaction │                               │
//! └───────────────┘                       ┌───────────────┐
//!         │                               │ Storage       │
//! ┌───────────────┐                       │ (storage/)    │
//! │ Player seam   │                       │ - JSON I/O    │
//! │ (player.rs)   │                       │ - Catalog     │
//! └───────────────┘                       └───────────────┘
//! ┌─────────────────────────────────────────────────────┐
//! │  Domain, Infrastructure, Observability              │
//! │  - Items, viewability events, errors (domain/)      │
//! │  - Data directory resolution (infrastructure/)      │
//! │  - OpenTelemetry file export (observability/)       │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`app`]: Events, actions, the queue and the scheduler state
//! - [`scheduler`]: Viewability tracker, focus gate, active resolver, playback
//!   controller and interaction router
//! - [`feed`]: Ordered playable items and pagination
//! - [`player`]: The player resource seam implemented by hosts
//! - [`domain`]: Items, viewability reports and errors
//! - [`storage`]: Saved-set persistence and the JSON content catalog
//! - [`worker`]: Collaborator requests and their completions
//! - [`infrastructure`]: Data directory paths
//! - [`observability`]: OpenTelemetry tracing
//!
//! # Configuration
//!
//! Hosts pass a key/value map (see [`Config::from_map`]) or a TOML file
//! (see [`Config::from_file`]):
//!
//! ```toml
//! visibility_threshold = 0.5
//! min_dwell_ms = 100
//! page_size = 10
//! load_more_threshold = 2
//! sound_enabled = true
//! save_retries = 2
//! trace_level = "debug"
//! ```
//!
//! # Example
//!
//! ```rust
//! use reelfeed::player::{PlayerFactory, PlayerResource, PlayerResult};
//! use reelfeed::{handle_event, initialize, Config, Event, FeedItem, ViewabilityEvent};
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
//! let config = Config { min_dwell_ms: 0, ..Config::default() };
//! let mut state = initialize(&config, Box::new(Players))?;
//!
//! let items = vec![FeedItem::video("a", "a.mp4"), FeedItem::video("b", "b.mp4")];
//! handle_event(&mut state, &Event::FeedReloaded { items, next_cursor: None })?;
//! handle_event(&mut state, &Event::Viewability(ViewabilityEvent::single(0, 1, 0.8)))?;
//!
//! assert_eq!(state.active(), Some(1));
//! # Ok::<(), reelfeed::FeedError>(())
//! ```

pub mod app;
pub mod domain;
pub mod feed;
pub mod infrastructure;
pub mod observability;
pub mod player;
pub mod scheduler;
pub mod storage;
pub mod worker;

pub use app::{handle_event, Action, DrainReport, Event, EventQueue, FeedState};
pub use domain::{FeedError, FeedItem, ItemId, ItemKind, Result, ViewabilityEvent, VisibleEntry};
pub use player::{PlayerFactory, PlayerResource, PlayerSignal};
pub use scheduler::{ActiveIndex, Intent, InteractionTarget, PlaybackState};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Largest accepted [`Config::load_more_threshold`].
pub const MAX_LOAD_MORE_THRESHOLD: usize = 10_000;

/// Scheduler configuration.
///
/// Every field has a default, so partial maps and files are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Visible fraction an item must exceed to count as viewable. Default: `0.5`
    pub visibility_threshold: f64,

    /// Continuous time above the threshold before an item is confirmed.
    /// Default: `100`
    pub min_dwell_ms: u64,

    /// Items requested per page. Default: `10`
    pub page_size: usize,

    /// Request the next page when the active item is this close to the end.
    /// At most [`MAX_LOAD_MORE_THRESHOLD`]. Default: `2`
    pub load_more_threshold: usize,

    /// Initial sound preference; players start muted when `false`.
    /// Default: `true`
    pub sound_enabled: bool,

    /// Whether the hosting screen starts focused. Default: `true`
    pub start_focused: bool,

    /// Extra attempts for transient collaborator failures. Default: `2`
    pub save_retries: u32,

    /// Directory for storage and trace files. See
    /// [`infrastructure::get_data_dir`] for the fallback chain.
    pub data_dir: Option<String>,

    /// Tracing filter such as `debug` or `reelfeed=trace`. Default: `"info"`
    pub trace_level: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            visibility_threshold: 0.5,
            min_dwell_ms: 100,
            page_size: 10,
            load_more_threshold: 2,
            sound_enabled: true,
            start_focused: true,
            save_retries: 2,
            data_dir: None,
            trace_level: None,
        }
    }
}

impl Config {
    /// Parses configuration from a host-provided key/value map.
    ///
    /// Unknown keys are ignored. Values that fail to parse, a threshold
    /// outside `[0, 1)` or a load-more threshold above
    /// [`MAX_LOAD_MORE_THRESHOLD`] fall back to the default with a debug log.
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::collections::BTreeMap;
    /// use reelfeed::Config;
    ///
    /// let mut map = BTreeMap::new();
    /// map.insert("min_dwell_ms".to_string(), "250".to_string());
    /// map.insert("sound_enabled".to_string(), "false".to_string());
    ///
    /// let config = Config::from_map(&map);
    /// assert_eq!(config.min_dwell_ms, 250);
    /// assert!(!config.sound_enabled);
    /// assert_eq!(config.page_size, 10);
    /// ```
    #[must_use]
    pub fn from_map(map: &BTreeMap<String, String>) -> Self {
        fn parsed<T: std::str::FromStr>(map: &BTreeMap<String, String>, key: &str, default: T) -> T {
            match map.get(key) {
                None => default,
                Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                    tracing::debug!(key, value = %raw, "unparseable config value, using default");
                    default
                }),
            }
        }

        let defaults = Self::default();
        let mut visibility_threshold = parsed(map, "visibility_threshold", defaults.visibility_threshold);
        if !(0.0..1.0).contains(&visibility_threshold) {
            tracing::debug!(visibility_threshold, "threshold out of range, using default");
            visibility_threshold = defaults.visibility_threshold;
        }

        let mut load_more_threshold = parsed(map, "load_more_threshold", defaults.load_more_threshold);
        if load_more_threshold > MAX_LOAD_MORE_THRESHOLD {
            tracing::debug!(load_more_threshold, "load-more threshold too large, using default");
            load_more_threshold = defaults.load_more_threshold;
        }

        Self {
            visibility_threshold,
            min_dwell_ms: parsed(map, "min_dwell_ms", defaults.min_dwell_ms),
            page_size: parsed(map, "page_size", defaults.page_size).max(1),
            load_more_threshold,
            sound_enabled: parsed(map, "sound_enabled", defaults.sound_enabled),
            start_focused: parsed(map, "start_focused", defaults.start_focused),
            save_retries: parsed(map, "save_retries", defaults.save_retries),
            data_dir: map.get("data_dir").cloned().filter(|s| !s.is_empty()),
            trace_level: map.get("trace_level").cloned().filter(|s| !s.is_empty()),
        }
    }

    /// Loads and validates a TOML configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Io`] if the file cannot be read, and
    /// [`FeedError::Config`] if it does not parse or fails [`validate`](Self::validate).
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self =
            toml::from_str(&raw).map_err(|e| FeedError::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Config`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.visibility_threshold) {
            return Err(FeedError::Config(format!(
                "visibility_threshold must be in [0, 1), got {}",
                self.visibility_threshold
            )));
        }
        if self.page_size == 0 {
            return Err(FeedError::Config("page_size must be at least 1".to_string()));
        }
        if self.load_more_threshold > MAX_LOAD_MORE_THRESHOLD {
            return Err(FeedError::Config(format!(
                "load_more_threshold must be at most {MAX_LOAD_MORE_THRESHOLD}, got {}",
                self.load_more_threshold
            )));
        }
        Ok(())
    }
}

/// Validates `config` and creates an empty scheduler.
///
/// Call [`FeedState::startup_actions`] afterwards to request the saved-set and
/// the first page.
///
/// # Errors
///
/// Returns [`FeedError::Config`] if the configuration is invalid.
pub fn initialize(config: &Config, players: Box<dyn PlayerFactory>) -> Result<FeedState> {
    config.validate()?;
    tracing::debug!(
        threshold = config.visibility_threshold,
        min_dwell_ms = config.min_dwell_ms,
        page_size = config.page_size,
        "initializing feed scheduler"
    );
    Ok(FeedState::new(config, players))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn from_map_falls_back_on_bad_values() {
        let mut map = BTreeMap::new();
        map.insert("visibility_threshold".to_string(), "1.5".to_string());
        map.insert("page_size".to_string(), "lots".to_string());
        map.insert("save_retries".to_string(), " 4 ".to_string());
        map.insert("load_more_threshold".to_string(), usize::MAX.to_string());

        let config = Config::from_map(&map);
        assert!((config.visibility_threshold - 0.5).abs() < f64::EPSILON);
        assert_eq!(config.page_size, 10);
        assert_eq!(config.save_retries, 4);
        assert_eq!(config.load_more_threshold, 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_oversized_load_more_threshold() {
        let config = Config {
            load_more_threshold: MAX_LOAD_MORE_THRESHOLD + 1,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(FeedError::Config(_))));

        let config = Config {
            load_more_threshold: MAX_LOAD_MORE_THRESHOLD,
            ..Config::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn from_file_accepts_partial_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "min_dwell_ms = 300\ntrace_level = \"debug\"").unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.min_dwell_ms, 300);
        assert_eq!(config.trace_level.as_deref(), Some("debug"));
        assert!(config.sound_enabled);
    }

    #[test]
    fn from_file_rejects_invalid_threshold() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "visibility_threshold = 1.0").unwrap();

        let err = Config::from_file(file.path()).unwrap_err();
        assert!(matches!(err, FeedError::Config(_)));
    }
}
