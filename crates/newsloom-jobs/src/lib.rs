//! # newsloom-jobs
//!
//! Background job worker for newsloom.
//!
//! This crate provides:
//! - The polling worker loop with concurrent execution and stuck-job
//!   recovery
//! - Handlers for enrichment, attachment, lifecycle, merge, and backfill
//! - HTTP enrichment provider clients with timeouts and response caps
//! - Feed source scheduling with failure backoff
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use newsloom_jobs::{WorkerBuilder, WorkerConfig, NoOpHandler};
//! use newsloom_db::Database;
//! use newsloom_core::JobType;
//!
//! let db = Database::connect("postgres://...").await?;
//! let jobs = Arc::new(db.jobs);
//!
//! let worker = WorkerBuilder::new(jobs)
//!     .with_config(WorkerConfig::from_env())
//!     .with_handler(NoOpHandler::new(JobType::StoryLifecycle))
//!     .build()
//!     .await;
//!
//! let handle = worker.start();
//! // ...
//! handle.shutdown().await?;
//! ```

pub mod handler;
pub mod handlers;
pub mod providers;
pub mod schedule;
pub mod sources;
pub mod worker;

pub use handler::{JobContext, JobHandler, JobResult, NoOpHandler};
pub use handlers::{
    ArticleEnrichHandler, CentroidBackfillHandler, LifecycleHandler, MergeHandler,
    StoryEnrichHandler,
};
pub use providers::{
    HttpEmbeddingClient, HttpEntityExtractor, MockEmbeddingClient, MockEntityExtractor,
};
pub use schedule::{spawn_periodic, standard_passes, PeriodicPass};
pub use sources::{poll_interval, SourceHealth, SourceScheduler, SourceTier};
pub use worker::{JobWorker, WorkerBuilder, WorkerConfig, WorkerEvent, WorkerHandle};
