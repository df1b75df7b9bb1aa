//! Playback position tracking

/// Last position read from the widget, plus an optimistic overlay
///
/// A seek shows its target right away instead of waiting for the widget to
/// catch up. The overlay is dropped on the next successful read, so it is
/// never older than one poll period.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PositionCache {
    authoritative: f64,
    overlay: Option<f64>,
}

impl PositionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Position to display, in seconds
    pub fn position(&self) -> f64 {
        self.overlay.unwrap_or(self.authoritative)
    }

    /// Last value the widget itself reported
    pub fn authoritative(&self) -> f64 {
        self.authoritative
    }

    /// Show `seconds` until the next read
    pub fn set_optimistic(&mut self, seconds: f64) {
        self.overlay = Some(sanitize(seconds));
    }

    /// Record a value read from the widget; clears any overlay
    pub fn record_read(&mut self, seconds: f64) {
        self.authoritative = sanitize(seconds);
        self.overlay = None;
    }

    /// An optimistic value is being shown
    pub fn has_overlay(&self) -> bool {
        self.overlay.is_some()
    }
}

fn sanitize(seconds: f64) -> f64 {
    if seconds.is_finite() {
        seconds.max(0.0)
    } else {
        0.0
    }
}
