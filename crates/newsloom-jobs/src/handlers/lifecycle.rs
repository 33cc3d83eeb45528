//! Lifecycle sweep handler.

use async_trait::async_trait;
use serde_json::json;

use newsloom_cluster::LifecycleManager;
use newsloom_core::JobType;

use crate::handler::{JobContext, JobHandler, JobResult};

/// Runs one set-based lifecycle sweep. The `story.lifecycle` payload is
/// empty; cadence comes from the scheduler that enqueues it.
pub struct LifecycleHandler {
    manager: LifecycleManager,
}

impl LifecycleHandler {
    pub fn new(manager: LifecycleManager) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl JobHandler for LifecycleHandler {
    fn job_type(&self) -> JobType {
        JobType::StoryLifecycle
    }

    async fn execute(&self, _ctx: JobContext) -> JobResult {
        match self.manager.sweep().await {
            Ok(report) => JobResult::Success(Some(json!({
                "to_growing": report.to_growing,
                "to_stable": report.to_stable,
                "to_stale": report.to_stale,
                "closed": report.closed,
            }))),
            Err(e) => JobResult::from_error(e),
        }
    }
}
