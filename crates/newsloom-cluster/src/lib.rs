//! # newsloom-cluster
//!
//! The clustering decision engines of newsloom:
//!
//! - [`attach`] — real-time article-to-story attachment with tiered
//!   entity/similarity gates
//! - [`centroid`] — story centroid maintenance and backfill
//! - [`lifecycle`] — periodic set-based story aging
//! - [`merge`] — scheduled reconciliation of fragmented stories
//! - [`validation`] — offline threshold scoring against hand-labeled data
//!
//! Engines take explicit immutable configs from `newsloom-core` and talk
//! to storage through the repository traits, so the same decision code
//! runs in production, in tests against in-memory fakes, and in offline
//! validation sweeps.

pub mod attach;
pub mod centroid;
pub mod lifecycle;
pub mod merge;
pub mod validation;

pub use attach::{decide, AttachEngine, AttachOutcome, AttachResolution, DecisionTrace, Lane, RejectReason};
pub use centroid::{centroid, cosine_similarity, BackfillReport, CentroidMaintainer};
pub use lifecycle::LifecycleManager;
pub use merge::{
    evaluate_signals, merge_direction, normalize_entity_id, title_tokens, MergeDecision,
    MergePassReport, MergeReconciler, MergeVerdict, PairSignals, SkipReason,
};
pub use validation::{
    disagreements, estimate_fp_rate, sample_baseline, sample_risk_stratified, score,
    BucketScore, Disagreement, GoldenBucket, GoldenPair, ValidationReport,
};
