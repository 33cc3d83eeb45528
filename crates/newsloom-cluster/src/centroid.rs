//! Story centroid maintenance.
//!
//! A story's centroid is the elementwise mean of its members' embeddings.
//! Members without an embedding are excluded from the mean, never treated
//! as zero vectors: a zero vector would drag the centroid toward the
//! origin and poison cosine ranking for every future candidate query.

use std::sync::Arc;

use pgvector::Vector;
use rand::Rng;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};
use uuid::Uuid;

use newsloom_core::{defaults, Result, StoryRepository};

/// Elementwise mean of the given vectors. `None` when the slice is empty.
pub fn centroid(vectors: &[Vector]) -> Option<Vector> {
    let first = vectors.first()?;
    let dim = first.as_slice().len();
    let mut sums = vec![0.0f32; dim];

    for vector in vectors {
        let slice = vector.as_slice();
        if slice.len() != dim {
            // Mixed-dimension members mean a model migration is half done;
            // skip rather than corrupt the mean.
            warn!(
                subsystem = "cluster",
                component = "centroid",
                expected = dim,
                got = slice.len(),
                "Skipping embedding with mismatched dimension"
            );
            continue;
        }
        for (sum, value) in sums.iter_mut().zip(slice) {
            *sum += value;
        }
    }

    let count = vectors
        .iter()
        .filter(|v| v.as_slice().len() == dim)
        .count() as f32;
    for sum in sums.iter_mut() {
        *sum /= count;
    }
    Some(Vector::from(sums))
}

/// Cosine similarity of two vectors; 0.0 for mismatched dimensions or a
/// zero-magnitude operand.
pub fn cosine_similarity(a: &Vector, b: &Vector) -> f32 {
    let a = a.as_slice();
    let b = b.as_slice();
    if a.len() != b.len() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}

/// Result of one backfill run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackfillReport {
    pub stories_updated: u64,
    pub batches: u64,
}

/// Keeps story centroids in sync with membership.
pub struct CentroidMaintainer {
    stories: Arc<dyn StoryRepository>,
}

impl CentroidMaintainer {
    pub fn new(stories: Arc<dyn StoryRepository>) -> Self {
        Self { stories }
    }

    /// Recompute one story's centroid from current membership.
    ///
    /// Returns `true` when a centroid was written; `false` when no member
    /// has an embedding yet (the stored centroid is left untouched).
    pub async fn refresh(&self, story_id: Uuid) -> Result<bool> {
        let embeddings = self.stories.member_embeddings(story_id).await?;

        match centroid(&embeddings) {
            Some(vector) => {
                self.stories.update_centroid(story_id, Some(&vector)).await?;
                debug!(
                    subsystem = "cluster",
                    component = "centroid",
                    op = "refresh",
                    story_id = %story_id,
                    member_embeddings = embeddings.len(),
                    "Centroid refreshed"
                );
                Ok(true)
            }
            None => {
                debug!(
                    subsystem = "cluster",
                    component = "centroid",
                    op = "refresh",
                    story_id = %story_id,
                    "No embedded members; centroid unchanged"
                );
                Ok(false)
            }
        }
    }

    /// Recompute centroids for stories that predate embeddings, in small
    /// batches with a randomized inter-batch delay so the database never
    /// sees a burst. Pure arithmetic; no external API cost.
    pub async fn backfill(&self, batch_size: i64) -> Result<BackfillReport> {
        let mut report = BackfillReport::default();
        // Stories whose members have no embeddings stay centroid-less and
        // keep appearing in the backlog query; skip them after one look.
        let mut seen: std::collections::HashSet<Uuid> = std::collections::HashSet::new();

        loop {
            // Over-fetch by the skip count so permanent failures at the
            // head of the backlog cannot starve the rest of it.
            let mut story_ids: Vec<Uuid> = self
                .stories
                .missing_centroids(batch_size + seen.len() as i64)
                .await?
                .into_iter()
                .filter(|id| seen.insert(*id))
                .collect();
            story_ids.truncate(batch_size as usize);
            if story_ids.is_empty() {
                break;
            }

            report.batches += 1;
            for story_id in &story_ids {
                if self.refresh(*story_id).await? {
                    report.stories_updated += 1;
                }
            }

            let delay_ms = rand::thread_rng().gen_range(
                defaults::CENTROID_BACKFILL_DELAY_MIN_MS..=defaults::CENTROID_BACKFILL_DELAY_MAX_MS,
            );
            sleep(Duration::from_millis(delay_ms)).await;
        }

        info!(
            subsystem = "cluster",
            component = "centroid",
            op = "backfill",
            stories_updated = report.stories_updated,
            batches = report.batches,
            "Centroid backfill finished"
        );
        Ok(report)
    }
}
