//! Raw viewability events from the virtualization engine.
//!
//! These are transient: the tracker reduces them to a single confirmed ordinal
//! and never stores the events themselves.

use serde::{Deserialize, Serialize};

/// One visible entry as reported by the engine.
///
/// The ordinal is signed because engines have been seen to report `-1` for
/// headers and placeholders; such entries make the event malformed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VisibleEntry {
    pub ordinal: i64,
    pub fraction: f64,
}

impl VisibleEntry {
    #[must_use]
    pub const fn new(ordinal: i64, fraction: f64) -> Self {
        Self { ordinal, fraction }
    }

    /// Returns `true` when the ordinal is non-negative and the fraction lies in `[0, 1]`.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        self.ordinal >= 0 && (0.0..=1.0).contains(&self.fraction)
    }
}

/// The set of currently visible items at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewabilityEvent {
    /// Milliseconds on the host's monotonic clock.
    pub timestamp_ms: u64,
    pub entries: Vec<VisibleEntry>,
}

impl ViewabilityEvent {
    #[must_use]
    pub fn new(timestamp_ms: u64, entries: Vec<VisibleEntry>) -> Self {
        Self {
            timestamp_ms,
            entries,
        }
    }

    /// Shorthand for a single visible entry.
    #[must_use]
    pub fn single(timestamp_ms: u64, ordinal: i64, fraction: f64) -> Self {
        Self::new(timestamp_ms, vec![VisibleEntry::new(ordinal, fraction)])
    }

    /// Returns `true` if every entry is well formed.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        self.entries.iter().all(VisibleEntry::is_well_formed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_ordinal_is_malformed() {
        let event = ViewabilityEvent::new(
            0,
            vec![VisibleEntry::new(0, 0.7), VisibleEntry::new(-1, 0.2)],
        );
        assert!(!event.is_well_formed());
    }

    #[test]
    fn fraction_outside_unit_interval_is_malformed() {
        assert!(!VisibleEntry::new(0, 1.2).is_well_formed());
        assert!(!VisibleEntry::new(0, -0.1).is_well_formed());
        assert!(!VisibleEntry::new(0, f64::NAN).is_well_formed());
        assert!(VisibleEntry::new(0, 1.0).is_well_formed());
    }
}
