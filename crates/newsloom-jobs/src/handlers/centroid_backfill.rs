//! Centroid backfill handler.

use async_trait::async_trait;
use serde_json::json;

use newsloom_cluster::CentroidMaintainer;
use newsloom_core::{CentroidBackfillPayload, JobType};

use crate::handler::{JobContext, JobHandler, JobResult};

/// Recomputes centroids for stories created before embeddings existed.
pub struct CentroidBackfillHandler {
    centroids: CentroidMaintainer,
}

impl CentroidBackfillHandler {
    pub fn new(centroids: CentroidMaintainer) -> Self {
        Self { centroids }
    }
}

#[async_trait]
impl JobHandler for CentroidBackfillHandler {
    fn job_type(&self) -> JobType {
        JobType::CentroidBackfill
    }

    async fn execute(&self, ctx: JobContext) -> JobResult {
        let payload: CentroidBackfillPayload = match ctx.typed_payload() {
            Ok(p) => p,
            Err(e) => return JobResult::Failed(e),
        };

        match self.centroids.backfill(payload.batch_size).await {
            Ok(report) => JobResult::Success(Some(json!({
                "stories_updated": report.stories_updated,
                "batches": report.batches,
            }))),
            Err(e) => JobResult::from_error(e),
        }
    }
}
