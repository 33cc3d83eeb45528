//! Repository trait definitions.
//!
//! Persistence is abstracted behind these traits so the decision engines
//! can be exercised against in-memory fakes while production wires the
//! PostgreSQL implementations from `newsloom-db`.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use pgvector::Vector;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::config::LifecycleConfig;
use crate::models::{
    Article, ArticleStoryLink, CreateArticleRequest, CreateStoryRequest, Job, JobType,
    LifecycleSweepReport, MergeAudit, MergeOutcome, QueueStats, Story, StoryCandidate,
};
use crate::Result;

/// Job queue operations.
///
/// Enqueue is idempotent over (job_type, payload content hash) for
/// non-terminal jobs; claim is exclusive under arbitrary concurrency.
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Enqueue a job, or return the id of an existing non-terminal job
    /// with the same (job_type, payload hash). Duplicate keys are success,
    /// not error.
    async fn enqueue(
        &self,
        job_type: JobType,
        payload: Option<JsonValue>,
        priority: i32,
        run_at: DateTime<Utc>,
    ) -> Result<Uuid>;

    /// Atomically claim the oldest runnable pending job of `job_type`.
    /// Concurrent callers never both receive the same job.
    async fn claim_next(&self, job_type: JobType) -> Result<Option<Job>>;

    /// Claim the oldest runnable pending job whose type is in `job_types`.
    /// An empty slice claims any type.
    async fn claim_next_for_types(&self, job_types: &[JobType]) -> Result<Option<Job>>;

    /// Mark a job completed.
    async fn complete(&self, job_id: Uuid, result: Option<JsonValue>) -> Result<()>;

    /// Mark a job failed. A retryable failure is re-queued with
    /// exponential backoff while attempts remain; a non-retryable one
    /// (malformed input) goes terminal immediately.
    async fn fail(&self, job_id: Uuid, error: &str, retryable: bool) -> Result<()>;

    /// Get a job by id.
    async fn get(&self, job_id: Uuid) -> Result<Option<Job>>;

    /// Sweep jobs stuck in processing for longer than `older_than` back to
    /// pending. Returns the number of jobs reset.
    async fn reset_stuck(&self, older_than: Duration) -> Result<u64>;

    /// Count of runnable (pending, run_at due) jobs of one type.
    async fn runnable_count(&self, job_type: JobType) -> Result<i64>;

    /// Queue statistics for observability.
    async fn queue_stats(&self) -> Result<QueueStats>;
}

/// Article persistence.
#[async_trait]
pub trait ArticleRepository: Send + Sync {
    /// Insert a new article. The dedup key is already resolved upstream;
    /// a conflict returns the existing article's id.
    async fn insert(&self, req: CreateArticleRequest) -> Result<Uuid>;

    /// Get an article by id.
    async fn get(&self, id: Uuid) -> Result<Option<Article>>;

    /// Write the extracted entity ids (enrichment, once).
    async fn set_entities(&self, id: Uuid, entity_ids: &[String]) -> Result<()>;

    /// Write the embedding vector (enrichment, once).
    async fn set_embedding(&self, id: Uuid, embedding: &Vector) -> Result<()>;

    /// The story an article is currently linked to, if any.
    async fn current_story(&self, article_id: Uuid) -> Result<Option<Uuid>>;
}

/// Story persistence and the set-based bulk operations the engines
/// delegate to.
#[async_trait]
pub trait StoryRepository: Send + Sync {
    /// Create a story with its primary article link.
    async fn create(&self, req: CreateStoryRequest) -> Result<Story>;

    /// Get a story by id.
    async fn get(&self, id: Uuid) -> Result<Option<Story>>;

    /// Nearest-neighbor candidate retrieval over open-story centroids:
    /// cosine similarity >= `floor`, last update within `updated_within`,
    /// ordered by similarity descending then recency.
    async fn find_candidates(
        &self,
        query: &Vector,
        limit: i64,
        floor: f32,
        updated_within: Duration,
    ) -> Result<Vec<StoryCandidate>>;

    /// Link an article to a story and bump membership. Returns `false`
    /// when the story was concurrently closed (guarded single-row update);
    /// the caller then moves to the next candidate.
    async fn attach_article(
        &self,
        story_id: Uuid,
        article_id: Uuid,
        similarity: f32,
        matched_at: DateTime<Utc>,
    ) -> Result<bool>;

    /// Embeddings of all current members that have one.
    async fn member_embeddings(&self, story_id: Uuid) -> Result<Vec<Vector>>;

    /// Replace a story's centroid.
    async fn update_centroid(&self, story_id: Uuid, centroid: Option<&Vector>) -> Result<()>;

    /// Union entity ids into a story's top-entity set.
    async fn union_entities(&self, story_id: Uuid, entity_ids: &[String]) -> Result<()>;

    /// One set-based lifecycle sweep. A fixed number of bulk statements
    /// regardless of story count.
    async fn lifecycle_sweep(&self, config: &LifecycleConfig) -> Result<LifecycleSweepReport>;

    /// Execute a merge: repoint the loser's links to the winner, union
    /// entities, close the loser, and write the audit row. Fails if the
    /// winner is closed.
    async fn absorb(&self, outcome: &MergeOutcome) -> Result<MergeAudit>;

    /// Stories with members but no centroid (pre-embedding backlog).
    async fn missing_centroids(&self, limit: i64) -> Result<Vec<Uuid>>;

    /// Open stories updated within `window`, newest first, for the merge
    /// scan.
    async fn recently_updated(&self, window: Duration, limit: i64) -> Result<Vec<Story>>;

    /// All current links of a story.
    async fn links(&self, story_id: Uuid) -> Result<Vec<ArticleStoryLink>>;
}
