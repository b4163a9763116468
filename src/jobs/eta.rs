//! Progress counters and remaining-time estimate for the thumbnail job.

use std::time::Duration;

use tokio::time::Instant;

/// Counters for one run of the job.
#[derive(Debug, Clone)]
pub struct ProgressState {
    pub total_tags: usize,
    pub total_markers: usize,
    pub processed_tags: usize,
    pub processed_markers: usize,
    pub start_time: Instant,
}

impl ProgressState {
    pub fn new(total_tags: usize, total_markers: usize, start_time: Instant) -> Self {
        Self {
            total_tags,
            total_markers,
            processed_tags: 0,
            processed_markers: 0,
            start_time,
        }
    }

    /// Fraction of tags handled so far, in `0.0..=1.0`. An empty run counts as done.
    pub fn progress(&self) -> f64 {
        if self.total_tags == 0 {
            return 1.0;
        }
        (self.processed_tags.min(self.total_tags)) as f64 / self.total_tags as f64
    }

    /// Whole seconds remaining, extrapolated from the time spent so far.
    pub fn eta_secs(&self, now: Instant) -> u64 {
        calculate_eta(
            self.total_tags,
            self.total_markers,
            self.processed_tags,
            self.processed_markers,
            now.saturating_duration_since(self.start_time),
        )
    }
}

/// Linear extrapolation over the combined tag and marker counts.
///
/// Tags processed and markers updated are summed into one remaining-work figure;
/// the average cost per item is taken over the full total, not the processed share.
pub fn calculate_eta(
    total_tags: usize,
    total_markers: usize,
    processed_tags: usize,
    processed_markers: usize,
    elapsed: Duration,
) -> u64 {
    let remaining = total_tags.saturating_sub(processed_tags)
        + total_markers.saturating_sub(processed_markers);
    let total = total_tags + total_markers;
    if remaining == 0 || total == 0 {
        return 0;
    }

    let avg_per_item = elapsed.as_secs_f64() / total as f64;
    (avg_per_item * remaining as f64) as u64
}
