//! Merge reconciliation pass handler.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use newsloom_cluster::MergeReconciler;
use newsloom_core::{JobType, MergeConfig, StoryMergePayload, StoryRepository};

use crate::handler::{JobContext, JobHandler, JobResult};

/// Runs one merge reconciliation pass.
///
/// The payload can narrow the scan (`limit`) and override the Tier A
/// similarity threshold for the pass (`threshold`), which is how shadow
/// evaluations of candidate thresholds reach production traffic.
pub struct MergeHandler {
    stories: Arc<dyn StoryRepository>,
    config: MergeConfig,
}

impl MergeHandler {
    pub fn new(stories: Arc<dyn StoryRepository>, config: MergeConfig) -> Self {
        Self { stories, config }
    }
}

#[async_trait]
impl JobHandler for MergeHandler {
    fn job_type(&self) -> JobType {
        JobType::StoryMerge
    }

    async fn execute(&self, ctx: JobContext) -> JobResult {
        let payload: StoryMergePayload = match ctx.typed_payload() {
            Ok(p) => p,
            Err(e) => return JobResult::Failed(e),
        };

        let mut config = self.config.clone();
        config.scan_limit = payload.limit;
        if let Some(threshold) = payload.threshold {
            config = config.with_tier_a_min_sim(threshold);
        }

        let reconciler = MergeReconciler::new(self.stories.clone(), config);
        match reconciler.run_pass().await {
            Ok(report) => JobResult::Success(Some(json!({
                "scanned": report.scanned,
                "merged": report.merged.len(),
                "skipped": report.skipped,
                "shadow_decisions": report.shadow_decisions.len(),
            }))),
            Err(e) => JobResult::from_error(e),
        }
    }
}
