//! Structured logging schema and field name constants for newsloom.
//!
//! All crates use these constants for consistent structured logging
//! fields, so log aggregation tools can query by standardized names
//! across every subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events (startup, shutdown), operation completions |
//! | DEBUG | Decision points, intermediate values, config choices |
//! | TRACE | Per-item iteration (candidates, members) |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "db", "jobs", "cluster", "providers"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "attach", "merge", "worker", "pool"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "claim_next", "decide", "absorb", "sweep"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Article UUID being operated on.
pub const ARTICLE_ID: &str = "article_id";

/// Story UUID being operated on.
pub const STORY_ID: &str = "story_id";

/// Job UUID being processed.
pub const JOB_ID: &str = "job_id";

/// Job type string.
pub const JOB_TYPE: &str = "job_type";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of candidates evaluated by a decision.
pub const CANDIDATE_COUNT: &str = "candidate_count";

/// Cosine similarity of the decisive candidate.
pub const SIMILARITY: &str = "similarity";

/// Entity-overlap lane a decision resolved through.
pub const LANE: &str = "lane";

/// Merge tier that authorized an absorption.
pub const TIER: &str = "tier";
