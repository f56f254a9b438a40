//! Load-progress watermark.
//!
//! Progress and totals reported by the engine are neither monotonic nor
//! consistent across peers while logs merge. The watermark keeps the
//! displayed progress from going backwards.

use crate::engine::LoadProgress;

/// Monotonic load-progress tracker, one per session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadWatermark {
    max_progress_seen: u64,
    estimated_total: u64,
}

impl LoadWatermark {
    pub fn new() -> Self {
        Self::default()
    }

    /// Highest progress value observed so far.
    pub fn max_progress_seen(&self) -> u64 {
        self.max_progress_seen
    }

    /// Best estimate of the total number of entries to load.
    pub fn estimated_total(&self) -> u64 {
        self.estimated_total
    }

    /// Fold one `load.progress` event into the watermark.
    pub fn observe(&mut self, event: &LoadProgress) {
        self.max_progress_seen = self.max_progress_seen.max(event.progress);
        self.estimated_total = event
            .progress
            .max(self.max_progress_seen)
            .max(event.total)
            .max(event.entry.clock.time);
    }

    /// Human-readable progress line.
    pub fn status_text(&self) -> String {
        format!(
            "Loading database... {} / {}",
            self.max_progress_seen, self.estimated_total
        )
    }
}
