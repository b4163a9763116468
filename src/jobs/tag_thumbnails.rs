//! Tag thumbnail job
//!
//! Gives every tag that has scene markers a preview image taken from one of its
//! markers, chosen at random:
//! 1. Discover tags with `marker_count > 0`
//! 2. Count markers across those tags (seeds the ETA)
//! 3. Fetch each tag's markers again, pick one, and write its stream URL as the tag image

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use rand::seq::SliceRandom;
use tokio::time::Instant;
use tracing::{debug, info};

use super::eta::ProgressState;
use crate::services::logging::ProgressLog;
use crate::services::stash::{SceneMarker, StashClient, Tag};

/// Totals reported at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub tags_total: usize,
    pub tags_updated: usize,
    pub tags_skipped: usize,
    pub markers_total: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TagOutcome {
    Updated,
    Skipped,
}

pub struct TagThumbnailJob {
    client: StashClient,
    log: Arc<dyn ProgressLog>,
    update_delay: Duration,
}

impl TagThumbnailJob {
    pub fn new(client: StashClient, log: Arc<dyn ProgressLog>, update_delay: Duration) -> Self {
        Self {
            client,
            log,
            update_delay,
        }
    }

    pub async fn run<R: Rng + ?Sized>(&self, rng: &mut R) -> RunSummary {
        let start_time = Instant::now();

        let tags = match self.client.fetch_tags_with_markers().await {
            Some(tags) if !tags.is_empty() => tags,
            _ => {
                info!("No tags with scene markers found, nothing to do");
                return RunSummary::default();
            }
        };
        info!(count = tags.len(), "Found tags with scene markers");

        let total_markers = self.count_markers(&tags).await;
        let mut state = ProgressState::new(tags.len(), total_markers, start_time);
        let mut summary = RunSummary {
            tags_total: tags.len(),
            markers_total: total_markers,
            ..Default::default()
        };

        for tag in &tags {
            match self.process_tag(tag, rng).await {
                TagOutcome::Updated => {
                    state.processed_markers += 1;
                    summary.tags_updated += 1;
                }
                TagOutcome::Skipped => summary.tags_skipped += 1,
            }
            state.processed_tags += 1;

            let progress = state.progress();
            self.log.progress(progress);

            let eta = state.eta_secs(Instant::now());
            self.log.info(&format!(
                "Progress: {:.2}%, ETA: {} seconds.",
                progress * 100.0,
                eta
            ));
        }

        info!(
            tags = summary.tags_total,
            updated = summary.tags_updated,
            skipped = summary.tags_skipped,
            markers = summary.markers_total,
            "Tag thumbnail run finished"
        );
        summary
    }

    /// Sum of marker counts over all tags. Failed fetches count as zero.
    async fn count_markers(&self, tags: &[Tag]) -> usize {
        let mut total = 0;
        for tag in tags {
            if let Some(markers) = self.client.fetch_markers_for_tag(&tag.id).await {
                if markers.len() != tag.scene_marker_count as usize {
                    debug!(
                        tag_id = %tag.id,
                        reported = tag.scene_marker_count,
                        fetched = markers.len(),
                        "Marker count differs from tag summary"
                    );
                }
                total += markers.len();
            }
        }
        debug!(total_markers = total, "Counted scene markers");
        total
    }

    async fn process_tag<R: Rng + ?Sized>(&self, tag: &Tag, rng: &mut R) -> TagOutcome {
        let Some(markers) = self.client.fetch_markers_for_tag(&tag.id).await else {
            self.log.info(&format!(
                "Could not fetch scene markers for tag_id '{}'. Skipping.",
                tag.id
            ));
            return TagOutcome::Skipped;
        };

        let Some((marker, stream_url)) = choose_stream(&markers, rng) else {
            self.log
                .info(&format!("No URL was available for tag '{}'. Skipping.", tag.name));
            return TagOutcome::Skipped;
        };

        debug!(
            tag_id = %tag.id,
            marker_id = %marker.id,
            marker_title = %marker.title,
            primary_tag = ?marker.primary_tag.as_ref().map(|t| &t.id),
            previous_image = ?tag.image_path,
            "Applying marker preview"
        );
        self.client.update_tag_image(&tag.id, stream_url).await;
        self.log.info(&format!(
            "Updated tag '{}' with scene marker video preview.",
            tag.name
        ));
        tokio::time::sleep(self.update_delay).await;

        TagOutcome::Updated
    }
}

/// A uniformly chosen marker and its stream URL, if that marker has one.
fn choose_stream<'a, R: Rng + ?Sized>(
    markers: &'a [SceneMarker],
    rng: &mut R,
) -> Option<(&'a SceneMarker, &'a str)> {
    let marker = markers.choose(rng)?;
    let url = marker.stream.as_deref().filter(|url| !url.is_empty())?;
    Some((marker, url))
}
