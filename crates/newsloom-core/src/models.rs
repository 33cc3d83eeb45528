//! Core data models for newsloom.
//!
//! These types are shared across all newsloom crates and represent the
//! core domain entities: articles, stories, the links between them, and
//! the background jobs that drive every mutation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Embedding vector type (re-exported from pgvector).
pub use pgvector::Vector;

// =============================================================================
// ARTICLE TYPES
// =============================================================================

/// A normalized entity reference extracted from article text.
///
/// Produced by the upstream extraction step. The `id` is the deduplicated
/// cross-article key; `label` is the surface form; `kind` is the coarse
/// type (person, org, place, event).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    pub id: String,
    pub label: String,
    pub kind: String,
}

impl EntityRef {
    /// Validate an extractor response entry at the ingestion boundary.
    ///
    /// Entities with empty ids carry no matching signal and are dropped
    /// before they reach decision logic.
    pub fn is_valid(&self) -> bool {
        !self.id.trim().is_empty()
    }
}

/// An ingested news article. Immutable once written except for the
/// enrichment columns (entities, embedding), which are populated exactly
/// once by the enrichment job.
#[derive(Debug, Clone)]
pub struct Article {
    pub id: Uuid,
    /// Upstream dedup key (resolved by the fetch layer before insert).
    pub dedup_key: String,
    pub title: String,
    pub source: String,
    pub category: Option<String>,
    pub published_at: DateTime<Utc>,
    /// Normalized entity ids, empty until enrichment completes.
    pub entity_ids: Vec<String>,
    /// Embedding vector, absent until enrichment completes.
    pub embedding: Option<Vector>,
    pub created_at: DateTime<Utc>,
}

/// Request to insert a new article (fetch layer output).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateArticleRequest {
    pub dedup_key: String,
    pub title: String,
    pub source: String,
    pub category: Option<String>,
    pub published_at: DateTime<Utc>,
}

// =============================================================================
// STORY TYPES
// =============================================================================

/// Lifecycle state of a story.
///
/// `emerging → growing → stable → stale → closed`; `closed` is terminal
/// and excluded from candidate retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoryState {
    Emerging,
    Growing,
    Stable,
    Stale,
    Closed,
}

impl StoryState {
    /// String form used in the database enum.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Emerging => "emerging",
            Self::Growing => "growing",
            Self::Stable => "stable",
            Self::Stale => "stale",
            Self::Closed => "closed",
        }
    }

    /// Parse from the database string form. Unknown strings map to
    /// `Emerging` rather than failing a row read.
    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "emerging" => Self::Emerging,
            "growing" => Self::Growing,
            "stable" => Self::Stable,
            "stale" => Self::Stale,
            "closed" => Self::Closed,
            _ => Self::Emerging,
        }
    }

    /// Whether this state participates in candidate retrieval and merging.
    pub fn is_open(&self) -> bool {
        !matches!(self, Self::Closed)
    }
}

impl std::fmt::Display for StoryState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A story: a cluster of articles describing one real-world event.
#[derive(Debug, Clone)]
pub struct Story {
    pub id: Uuid,
    pub primary_headline: String,
    /// Elementwise mean of member embeddings; absent until the first
    /// embedded member arrives.
    pub centroid: Option<Vector>,
    /// Top normalized entity ids across members.
    pub top_entities: Vec<String>,
    pub topic_tags: Vec<String>,
    pub first_seen_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
    pub state: StoryState,
    pub member_count: i32,
    /// Optimistic concurrency counter, bumped on every mutation.
    pub version: i32,
}

/// Request to create a story from its primary article.
#[derive(Debug, Clone)]
pub struct CreateStoryRequest {
    pub headline: String,
    pub article_id: Uuid,
    pub entity_ids: Vec<String>,
    pub topic_tags: Vec<String>,
    pub embedding: Option<Vector>,
    pub similarity: f32,
    pub published_at: DateTime<Utc>,
}

/// Link from an article to its current story.
///
/// Each article has exactly one live link at any time; merges repoint
/// links to the winning story but never duplicate them.
#[derive(Debug, Clone)]
pub struct ArticleStoryLink {
    pub article_id: Uuid,
    pub story_id: Uuid,
    pub similarity_score: f32,
    pub is_primary: bool,
    pub matched_at: DateTime<Utc>,
}

/// A candidate story from the nearest-neighbor query, with its cosine
/// similarity to the query vector.
#[derive(Debug, Clone)]
pub struct StoryCandidate {
    pub story: Story,
    pub similarity: f32,
}

/// Per-transition counts from one lifecycle sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleSweepReport {
    pub to_growing: u64,
    pub to_stable: u64,
    pub to_stale: u64,
    pub closed: u64,
}

impl LifecycleSweepReport {
    pub fn total(&self) -> u64 {
        self.to_growing + self.to_stable + self.to_stale + self.closed
    }
}

// =============================================================================
// MERGE TYPES
// =============================================================================

/// Merge confidence band that authorized an absorption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MergeTier {
    /// High-similarity band with a margin requirement.
    A,
    /// Looser corroborated band, disabled until validated offline.
    B,
}

impl MergeTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::A => "tier_a",
            Self::B => "tier_b",
        }
    }
}

/// Corroborating signal that allowed a merge (or a Tier A margin bypass).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeSignal {
    SharedEntity,
    SharedTopicTag,
    SharedTitleTokens,
}

impl MergeSignal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SharedEntity => "shared_entity",
            Self::SharedTopicTag => "shared_topic_tag",
            Self::SharedTitleTokens => "shared_title_tokens",
        }
    }
}

/// A decided merge: `loser` is absorbed into `winner`.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub winner_id: Uuid,
    pub loser_id: Uuid,
    pub similarity: f32,
    /// Gap to the second-best candidate, when one existed.
    pub margin: Option<f32>,
    pub tier: MergeTier,
    pub signal: Option<MergeSignal>,
}

/// Audit record written for every absorption.
#[derive(Debug, Clone)]
pub struct MergeAudit {
    pub id: Uuid,
    pub winner_id: Uuid,
    pub loser_id: Uuid,
    pub similarity: f32,
    pub margin: Option<f32>,
    pub tier: MergeTier,
    pub signal: Option<MergeSignal>,
    pub repointed_links: i64,
    pub decided_at: DateTime<Utc>,
}

// =============================================================================
// JOB TYPES
// =============================================================================

/// Background job kinds. Jobs are the sole mechanism by which enrichment,
/// story re-enrichment, lifecycle sweeps, merge passes, and centroid
/// backfills are triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    /// Enrich one article (entities + embedding), then run attachment.
    ArticleEnrich,
    /// Re-extract the top entity set for one story.
    StoryEnrich,
    /// One merge reconciliation pass.
    StoryMerge,
    /// One lifecycle sweep over all stories.
    StoryLifecycle,
    /// Recompute centroids for stories missing them.
    CentroidBackfill,
}

impl JobType {
    /// Wire/database string form (`<area>.<verb>`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ArticleEnrich => "article.enrich",
            Self::StoryEnrich => "story.enrich",
            Self::StoryMerge => "story.merge",
            Self::StoryLifecycle => "story.lifecycle",
            Self::CentroidBackfill => "story.centroid_backfill",
        }
    }

    /// Parse from the wire string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "article.enrich" => Some(Self::ArticleEnrich),
            "story.enrich" => Some(Self::StoryEnrich),
            "story.merge" => Some(Self::StoryMerge),
            "story.lifecycle" => Some(Self::StoryLifecycle),
            "story.centroid_backfill" => Some(Self::CentroidBackfill),
            _ => None,
        }
    }

    /// Default queue priority. Higher runs first.
    pub fn default_priority(&self) -> i32 {
        match self {
            // Enrichment gates attachment, which gates everything downstream
            Self::ArticleEnrich => 5,
            Self::StoryEnrich => 3,
            // Periodic passes tolerate delay
            Self::StoryMerge => 2,
            Self::StoryLifecycle => 2,
            // Backfill is a background migration task
            Self::CentroidBackfill => 1,
        }
    }

    /// All known job types, for worker registration.
    pub fn all() -> [JobType; 5] {
        [
            Self::ArticleEnrich,
            Self::StoryEnrich,
            Self::StoryMerge,
            Self::StoryLifecycle,
            Self::CentroidBackfill,
        ]
    }
}

impl std::fmt::Display for JobType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Processing status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "pending" => Self::Pending,
            "processing" => Self::Processing,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            _ => Self::Pending,
        }
    }

    /// Terminal statuses release the idempotency key.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// A job in the processing queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub job_type: JobType,
    pub status: JobStatus,
    pub priority: i32,
    pub payload: Option<JsonValue>,
    /// Content hash of the payload; the idempotency key together with
    /// `job_type`.
    pub payload_hash: String,
    pub result: Option<JsonValue>,
    pub error_message: Option<String>,
    pub attempts: i32,
    pub max_attempts: i32,
    /// Earliest time the job may be claimed.
    pub run_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Queue statistics summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueStats {
    pub pending: i64,
    pub processing: i64,
    pub completed_last_hour: i64,
    pub failed_last_hour: i64,
    pub total: i64,
}

// =============================================================================
// JOB PAYLOADS
// =============================================================================

/// Payload for `article.enrich`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleEnrichPayload {
    pub article_id: Uuid,
}

/// Payload for `story.enrich`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoryEnrichPayload {
    pub story_id: Uuid,
}

/// Payload for `story.merge`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoryMergePayload {
    /// Maximum stories to scan this pass.
    pub limit: i64,
    /// Optional Tier A similarity override for this pass.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f32>,
}

/// Payload for `story.centroid_backfill`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CentroidBackfillPayload {
    pub batch_size: i64,
}
