//! Path utilities for data and trace file locations.

use crate::Config;
use std::path::PathBuf;

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "REELFEED_DATA_DIR";

/// Returns the directory holding storage and trace files.
///
/// Resolution order:
/// 1. `config.data_dir` (tilde-expanded)
/// 2. `$REELFEED_DATA_DIR`
/// 3. `$HOME/.local/share/reelfeed`
/// 4. `./.reelfeed` when no home directory is known
#[must_use]
pub fn get_data_dir(config: &Config) -> PathBuf {
    if let Some(dir) = &config.data_dir {
        return PathBuf::from(expand_tilde(dir));
    }
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        if !dir.is_empty() {
            return PathBuf::from(expand_tilde(&dir));
        }
    }
    std::env::var("HOME").map_or_else(
        |_| PathBuf::from(".reelfeed"),
        |home| PathBuf::from(home).join(".local").join("share").join("reelfeed"),
    )
}

/// Expands a leading `~` to `$HOME`. Other paths are returned unchanged.
///
/// # Examples
///
/// ```
/// use reelfeed::infrastructure::expand_tilde;
///
/// assert_eq!(expand_tilde("/absolute/path"), "/absolute/path");
/// ```
#[must_use]
pub fn expand_tilde(path: &str) -> String {
    let Ok(home) = std::env::var("HOME") else {
        return path.to_string();
    };
    if let Some(rest) = path.strip_prefix("~/") {
        format!("{home}/{rest}")
    } else if path == "~" {
        home
    } else {
        path.to_string()
    }
}
