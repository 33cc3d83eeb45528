//! Story lifecycle aging.
//!
//! A periodic sweep, not a per-event reaction: sweep frequency is high
//! relative to story count, so each transition is one set-based update
//! delegated to the repository rather than a per-story loop.

use std::sync::Arc;

use tracing::info;

use newsloom_core::{LifecycleConfig, LifecycleSweepReport, Result, StoryRepository};

/// Ages stories through `emerging → growing → stable → stale → closed`.
pub struct LifecycleManager {
    stories: Arc<dyn StoryRepository>,
    config: LifecycleConfig,
}

impl LifecycleManager {
    pub fn new(stories: Arc<dyn StoryRepository>, config: LifecycleConfig) -> Self {
        Self { stories, config }
    }

    /// Run one sweep. Closed stories drop out of candidate retrieval
    /// immediately (the repository's candidate query filters on state).
    pub async fn sweep(&self) -> Result<LifecycleSweepReport> {
        let report = self.stories.lifecycle_sweep(&self.config).await?;

        info!(
            subsystem = "cluster",
            component = "lifecycle",
            op = "sweep",
            to_growing = report.to_growing,
            to_stable = report.to_stable,
            to_stale = report.to_stale,
            closed = report.closed,
            "Lifecycle sweep finished"
        );
        Ok(report)
    }
}
