//! Screen-level navigation focus.

/// Tracks whether the screen hosting the feed is the one presented to the user.
///
/// The gate holds no timers: a blur is applied by the caller in the same step
/// it arrives, so nothing keeps playing on a screen the user navigated away from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FocusGate {
    has_focus: bool,
}

impl FocusGate {
    #[must_use]
    pub const fn new(has_focus: bool) -> Self {
        Self { has_focus }
    }

    #[must_use]
    pub const fn has_focus(&self) -> bool {
        self.has_focus
    }

    /// Records a focus or blur event. Returns `true` if the value changed.
    pub fn on_focus_changed(&mut self, has_focus: bool) -> bool {
        if self.has_focus == has_focus {
            return false;
        }
        tracing::debug!(has_focus, "feed screen focus changed");
        self.has_focus = has_focus;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_only_real_transitions() {
        let mut gate = FocusGate::new(true);
        assert!(!gate.on_focus_changed(true));
        assert!(gate.on_focus_changed(false));
        assert!(!gate.has_focus());
        assert!(!gate.on_focus_changed(false));
        assert!(gate.on_focus_changed(true));
    }
}
