//! Centralized default constants for the newsloom system.
//!
//! **This module is the single source of truth** for shared default values.
//! Crates reference these constants instead of defining their own magic
//! numbers. When adding constants, place them in the appropriate section
//! and document the rationale for the chosen value.

// =============================================================================
// EMBEDDING
// =============================================================================

/// Default embedding model name.
pub const EMBED_MODEL: &str = "nomic-embed-text";

/// Default embedding vector dimension for nomic-embed-text.
pub const EMBED_DIMENSION: usize = 768;

// =============================================================================
// ATTACHMENT
// =============================================================================

/// Trailing candidate window: stories untouched for longer than this are
/// not considered by the real-time attach path.
pub const ATTACH_WINDOW_HOURS: i64 = 7 * 24;

/// Candidates retrieved per attach decision.
pub const ATTACH_TOP_K: i64 = 10;

/// Minimum-similarity floor on the nearest-neighbor candidate query.
/// Below this, candidates never pass any gate, so retrieval skips them.
pub const ATTACH_SIMILARITY_FLOOR: f32 = 0.60;

/// Similarity required with three or more shared entities.
pub const ATTACH_MULTI_ENTITY_MIN_SIM: f32 = 0.75;

/// Similarity required with exactly two shared entities.
pub const ATTACH_TWO_ENTITY_MIN_SIM: f32 = 0.85;

// =============================================================================
// MERGE RECONCILIATION
// =============================================================================

/// Tier A similarity threshold. Stricter than attach: merges are harder to
/// undo than a later reconciliation pass.
pub const MERGE_TIER_A_MIN_SIM: f32 = 0.90;

/// Tier A required margin over the second-best candidate.
pub const MERGE_TIER_A_MARGIN: f32 = 0.04;

/// Similarity required for the title-token margin bypass.
pub const MERGE_TITLE_BYPASS_MIN_SIM: f32 = 0.905;

/// Tier B similarity threshold (corroborated, no margin requirement).
pub const MERGE_TIER_B_MIN_SIM: f32 = 0.88;

/// Default stories scanned per merge pass.
pub const MERGE_SCAN_LIMIT: i64 = 200;

/// Merge scan only considers stories updated in this trailing window.
pub const MERGE_SCAN_WINDOW_HOURS: i64 = 14 * 24;

// =============================================================================
// LIFECYCLE
// =============================================================================

/// A story first seen longer ago than this graduates emerging → growing.
pub const LIFECYCLE_GROWING_AFTER_HOURS: i64 = 12;

/// A story first seen longer ago than this graduates growing → stable.
pub const LIFECYCLE_STABLE_AFTER_HOURS: i64 = 48;

/// No new member for this long marks an open story stale.
pub const LIFECYCLE_STALE_AFTER_HOURS: i64 = 48;

/// No new member for this long closes a story.
pub const LIFECYCLE_CLOSE_AFTER_HOURS: i64 = 72;

// =============================================================================
// JOB QUEUE
// =============================================================================

/// Attempts before a failing job goes terminal.
pub const JOB_MAX_ATTEMPTS: i32 = 3;

/// Per-job handler timeout.
pub const JOB_TIMEOUT_SECS: u64 = 300;

/// A processing job older than this is assumed crashed and swept back to
/// pending.
pub const STUCK_JOB_TIMEOUT_SECS: i64 = 600;

/// Base retry delay; doubles per attempt.
pub const RETRY_BACKOFF_BASE_SECS: i64 = 30;

/// Retry delay ceiling.
pub const RETRY_BACKOFF_MAX_SECS: i64 = 3600;

// =============================================================================
// WORKER
// =============================================================================

/// Polling interval when the queue is empty.
pub const WORKER_POLL_INTERVAL_MS: u64 = 500;

/// Max jobs executed concurrently by one worker process.
pub const WORKER_MAX_CONCURRENT: usize = 4;

/// Interval between stuck-job sweeps.
pub const WORKER_STUCK_SWEEP_INTERVAL_SECS: u64 = 60;

/// Worker event bus capacity.
pub const EVENT_BUS_CAPACITY: usize = 256;

/// Interval between `story.lifecycle` pass submissions.
pub const LIFECYCLE_PASS_INTERVAL_SECS: u64 = 300;

/// Interval between `story.merge` pass submissions.
pub const MERGE_PASS_INTERVAL_SECS: u64 = 1800;

// =============================================================================
// ENRICHMENT PROVIDERS
// =============================================================================

/// Timeout on every external provider call.
pub const PROVIDER_TIMEOUT_SECS: u64 = 30;

/// Cap on provider response bodies. An embedding response is a few KB;
/// anything near this cap is malformed or hostile.
pub const PROVIDER_MAX_RESPONSE_BYTES: usize = 1 << 20;

// =============================================================================
// CENTROID BACKFILL
// =============================================================================

/// Stories recomputed per backfill batch.
pub const CENTROID_BACKFILL_BATCH: i64 = 50;

/// Randomized inter-batch delay bounds (milliseconds).
pub const CENTROID_BACKFILL_DELAY_MIN_MS: u64 = 200;
pub const CENTROID_BACKFILL_DELAY_MAX_MS: u64 = 1_500;

// =============================================================================
// FEED SOURCES
// =============================================================================

/// Consecutive failures at which a source is excluded from scheduling.
pub const SOURCE_FAILURE_THRESHOLD: u32 = 5;

/// Exponential backoff cap on source poll intervals.
pub const SOURCE_BACKOFF_MAX_MULTIPLIER: u32 = 16;

/// Cooldown before an excluded source is retried.
pub const SOURCE_EXCLUSION_COOLDOWN_MINS: i64 = 120;
