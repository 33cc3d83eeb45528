//! Job handler trait and execution context.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use newsloom_core::{Job, JobType};

/// Context provided to job handlers.
pub struct JobContext {
    /// The job being processed.
    pub job: Job,
}

impl JobContext {
    /// Create a new job context.
    pub fn new(job: Job) -> Self {
        Self { job }
    }

    /// Get the raw job payload.
    pub fn payload(&self) -> Option<&JsonValue> {
        self.job.payload.as_ref()
    }

    /// Deserialize the payload into its typed shape.
    ///
    /// A missing or malformed payload is the handler's cue to fail the
    /// job terminally: retrying cannot fix the producer's mistake.
    pub fn typed_payload<P: DeserializeOwned>(&self) -> Result<P, String> {
        let payload = self
            .payload()
            .ok_or_else(|| format!("{} job has no payload", self.job.job_type))?;
        serde_json::from_value(payload.clone())
            .map_err(|e| format!("{} payload invalid: {e}", self.job.job_type))
    }
}

/// Result of job execution.
#[derive(Debug)]
pub enum JobResult {
    /// Job completed successfully with optional result data.
    Success(Option<JsonValue>),
    /// Job failed terminally (malformed input, impossible work).
    Failed(String),
    /// Transient failure; the queue re-runs it with backoff.
    Retry(String),
}

impl JobResult {
    /// Map a core error to the matching result via its retry class.
    pub fn from_error(error: newsloom_core::Error) -> Self {
        if error.is_retryable() {
            JobResult::Retry(error.to_string())
        } else {
            JobResult::Failed(error.to_string())
        }
    }
}

/// Trait for job handlers.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// The job type this handler processes.
    fn job_type(&self) -> JobType;

    /// Execute the job.
    async fn execute(&self, ctx: JobContext) -> JobResult;
}

/// No-op handler for testing.
pub struct NoOpHandler {
    job_type: JobType,
}

impl NoOpHandler {
    /// Create a new no-op handler for the given job type.
    pub fn new(job_type: JobType) -> Self {
        Self { job_type }
    }
}

#[async_trait]
impl JobHandler for NoOpHandler {
    fn job_type(&self) -> JobType {
        self.job_type
    }

    async fn execute(&self, _ctx: JobContext) -> JobResult {
        JobResult::Success(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use newsloom_core::{ArticleEnrichPayload, JobStatus};
    use serde_json::json;
    use uuid::Uuid;

    fn job_with_payload(payload: Option<JsonValue>) -> Job {
        Job {
            id: Uuid::new_v4(),
            job_type: JobType::ArticleEnrich,
            status: JobStatus::Processing,
            priority: 0,
            payload,
            payload_hash: String::new(),
            result: None,
            error_message: None,
            attempts: 1,
            max_attempts: 3,
            run_at: Utc::now(),
            created_at: Utc::now(),
            started_at: Some(Utc::now()),
            finished_at: None,
        }
    }

    #[test]
    fn typed_payload_parses_valid_shape() {
        let article_id = Uuid::new_v4();
        let ctx = JobContext::new(job_with_payload(Some(json!({"article_id": article_id}))));
        let payload: ArticleEnrichPayload = ctx.typed_payload().unwrap();
        assert_eq!(payload.article_id, article_id);
    }

    #[test]
    fn typed_payload_rejects_missing_payload() {
        let ctx = JobContext::new(job_with_payload(None));
        let result: Result<ArticleEnrichPayload, _> = ctx.typed_payload();
        assert!(result.unwrap_err().contains("no payload"));
    }

    #[test]
    fn typed_payload_rejects_wrong_shape() {
        let ctx = JobContext::new(job_with_payload(Some(json!({"story_id": "nope"}))));
        let result: Result<ArticleEnrichPayload, _> = ctx.typed_payload();
        assert!(result.is_err());
    }

    #[test]
    fn from_error_maps_retry_class() {
        let retry = JobResult::from_error(newsloom_core::Error::Request("reset".into()));
        assert!(matches!(retry, JobResult::Retry(_)));

        let fail = JobResult::from_error(newsloom_core::Error::InvalidInput("bad".into()));
        assert!(matches!(fail, JobResult::Failed(_)));
    }

    #[tokio::test]
    async fn test_noop_handler() {
        let handler = NoOpHandler::new(JobType::StoryLifecycle);
        assert_eq!(handler.job_type(), JobType::StoryLifecycle);

        let ctx = JobContext::new(job_with_payload(None));
        let result = handler.execute(ctx).await;
        assert!(matches!(result, JobResult::Success(None)));
    }
}
