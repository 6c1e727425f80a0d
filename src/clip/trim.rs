//! Trim selection
//!
//! The trim selector owns a recorded clip while the operator picks the
//! start/end window and a name. Its only externally visible output is a
//! [`SaveRequest`]; discarding releases the clip without producing one.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::RawClip;

/// The inclusive `(start, end)` time range selected for the final output,
/// in seconds. Invariant: `0 <= start <= end <= duration`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrimWindow {
    pub start: f64,
    pub end: f64,
}

impl TrimWindow {
    /// Duration of the selected range in seconds
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// The immutable payload sent across the network boundary
#[derive(Debug, Clone)]
pub struct SaveRequest {
    pub bytes: Bytes,
    pub start: f64,
    pub end: f64,
    pub name: String,
}

/// Owns a [`RawClip`] and the operator's trim selection
#[derive(Debug)]
pub struct TrimSelector {
    clip: RawClip,
    /// NAN until the player reports the clip duration
    duration: f64,
    window: TrimWindow,
    name: String,
}

impl TrimSelector {
    /// Take ownership of a freshly recorded clip
    pub fn new(clip: RawClip) -> Self {
        Self {
            clip,
            duration: f64::NAN,
            window: TrimWindow {
                start: 0.0,
                end: 0.0,
            },
            name: String::new(),
        }
    }

    /// Record the clip duration reported by the player.
    ///
    /// Players report the duration repeatedly, so this is idempotent: the
    /// first finite report initializes the window to `(0, duration)`,
    /// repeats of the same value are no-ops, and a changed value re-clamps
    /// the window into the new range.
    pub fn on_duration_known(&mut self, duration: f64) {
        if !duration.is_finite() || duration < 0.0 {
            return;
        }
        if !self.duration.is_finite() {
            self.duration = duration;
            self.window = TrimWindow {
                start: 0.0,
                end: duration,
            };
            tracing::debug!("Clip duration known: {:.3}s", duration);
        } else if (self.duration - duration).abs() > f64::EPSILON {
            self.duration = duration;
            let TrimWindow { start, end } = self.window;
            self.set_window(start, end);
        }
    }

    /// Set the trim window, clamping out-of-range or inverted inputs.
    ///
    /// The stored window is always valid; ignored entirely while the
    /// duration is still unknown.
    pub fn set_window(&mut self, start: f64, end: f64) {
        if !self.duration.is_finite() {
            return;
        }
        let mut start = if start.is_finite() { start } else { 0.0 };
        let mut end = if end.is_finite() { end } else { self.duration };
        start = start.clamp(0.0, self.duration);
        end = end.clamp(0.0, self.duration);
        if start > end {
            std::mem::swap(&mut start, &mut end);
        }
        self.window = TrimWindow { start, end };
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn window(&self) -> TrimWindow {
        self.window
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn clip(&self) -> &RawClip {
        &self.clip
    }

    /// Produce the save request for the current selection.
    ///
    /// Returns `None` while the trimmed name is empty or the duration is
    /// still unknown; the clip stays owned by the selector so the operator
    /// can resubmit after a failed upload.
    pub fn submit(&self) -> Option<SaveRequest> {
        let name = self.name.trim();
        if name.is_empty() || !self.duration.is_finite() {
            return None;
        }
        Some(SaveRequest {
            bytes: self.clip.bytes().clone(),
            start: self.window.start,
            end: self.window.end,
            name: name.to_string(),
        })
    }

    /// Release the clip without producing a save request
    pub fn discard(self) {
        tracing::debug!("Discarding clip ({} bytes)", self.clip.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selector() -> TrimSelector {
        TrimSelector::new(RawClip::new(vec![1u8, 2, 3, 4]))
    }

    #[test]
    fn duration_initializes_window() {
        let mut sel = selector();
        sel.on_duration_known(10.0);
        assert_eq!(sel.window(), TrimWindow { start: 0.0, end: 10.0 });
    }

    #[test]
    fn repeated_duration_reports_are_idempotent() {
        let mut sel = selector();
        sel.on_duration_known(10.0);
        sel.set_window(2.0, 8.0);
        sel.on_duration_known(10.0);
        assert_eq!(sel.window(), TrimWindow { start: 2.0, end: 8.0 });
    }

    #[test]
    fn changed_duration_reclamps_window() {
        let mut sel = selector();
        sel.on_duration_known(10.0);
        sel.set_window(2.0, 9.0);
        sel.on_duration_known(5.0);
        assert_eq!(sel.window(), TrimWindow { start: 2.0, end: 5.0 });
    }

    #[test]
    fn non_finite_duration_is_ignored() {
        let mut sel = selector();
        sel.on_duration_known(f64::NAN);
        sel.on_duration_known(f64::INFINITY);
        assert!(!sel.duration().is_finite());
    }

    #[test]
    fn window_is_clamped_into_range() {
        let mut sel = selector();
        sel.on_duration_known(10.0);
        sel.set_window(-3.0, 42.0);
        assert_eq!(sel.window(), TrimWindow { start: 0.0, end: 10.0 });
    }

    #[test]
    fn inverted_window_is_corrected() {
        let mut sel = selector();
        sel.on_duration_known(10.0);
        sel.set_window(7.5, 2.5);
        assert_eq!(sel.window(), TrimWindow { start: 2.5, end: 7.5 });
    }

    #[test]
    fn window_before_duration_known_is_ignored() {
        let mut sel = selector();
        sel.set_window(1.0, 2.0);
        assert_eq!(sel.window(), TrimWindow { start: 0.0, end: 0.0 });
    }

    #[test]
    fn submit_requires_name_and_duration() {
        let mut sel = selector();
        assert!(sel.submit().is_none());

        sel.set_name("clip1");
        // Duration still unknown
        assert!(sel.submit().is_none());

        sel.on_duration_known(10.0);
        sel.set_name("   ");
        assert!(sel.submit().is_none());

        sel.set_name("  clip1  ");
        let request = sel.submit().expect("submit should succeed");
        assert_eq!(request.name, "clip1");
        assert_eq!(request.start, 0.0);
        assert_eq!(request.end, 10.0);
        assert_eq!(&request.bytes[..], &[1, 2, 3, 4]);
    }

    #[test]
    fn submitted_window_matches_selection() {
        let mut sel = selector();
        sel.on_duration_known(10.0);
        sel.set_window(2.0, 5.5);
        sel.set_name("clip1");
        let request = sel.submit().expect("submit should succeed");
        assert_eq!(request.start, 2.0);
        assert_eq!(request.end, 5.5);
    }
}
