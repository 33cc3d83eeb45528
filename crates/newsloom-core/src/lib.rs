//! # newsloom-core
//!
//! Core types, traits, and abstractions for the newsloom clustering
//! system.
//!
//! This crate provides the foundational data structures and trait
//! definitions that the database, clustering, and job crates depend on.

pub mod config;
pub mod defaults;
pub mod error;
pub mod hash;
pub mod ids;
pub mod logging;
pub mod models;
pub mod providers;
pub mod traits;

// Re-export commonly used types at crate root
pub use config::{AttachConfig, LifecycleConfig, MergeConfig};
pub use error::{Error, Result};
pub use hash::payload_hash;
pub use ids::{extract_timestamp, new_v7};
pub use models::*;
pub use providers::{EmbeddingClient, EntityExtractor};
pub use traits::{ArticleRepository, JobRepository, StoryRepository};
