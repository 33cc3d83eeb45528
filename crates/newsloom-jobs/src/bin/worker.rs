//! Worker process entry point.
//!
//! Connects to the database, wires the enrichment providers and engines,
//! registers all handlers, and runs until SIGINT.

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use newsloom_cluster::{AttachEngine, CentroidMaintainer, LifecycleManager};
use newsloom_core::{AttachConfig, LifecycleConfig, MergeConfig};
use newsloom_db::Database;
use newsloom_jobs::{
    ArticleEnrichHandler, CentroidBackfillHandler, HttpEmbeddingClient, HttpEntityExtractor,
    LifecycleHandler, MergeHandler, StoryEnrichHandler, WorkerBuilder, WorkerConfig,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let database_url = std::env::var("DATABASE_URL")
        .map_err(|_| anyhow::anyhow!("DATABASE_URL is not set"))?;

    let db = Database::connect(&database_url).await?;
    db.migrate().await?;

    let jobs = Arc::new(newsloom_db::PgJobRepository::new(db.pool.clone()));
    let articles = Arc::new(newsloom_db::PgArticleRepository::new(db.pool.clone()));
    let stories: Arc<dyn newsloom_core::StoryRepository> =
        Arc::new(newsloom_db::PgStoryRepository::new(db.pool.clone()));

    let embedder = Arc::new(HttpEmbeddingClient::from_env());
    let extractor = Arc::new(HttpEntityExtractor::from_env());

    let attach = AttachEngine::new(stories.clone(), AttachConfig::default());
    let centroids = CentroidMaintainer::new(stories.clone());
    let lifecycle = LifecycleManager::new(stories.clone(), LifecycleConfig::default());

    let worker = WorkerBuilder::new(jobs)
        .with_config(WorkerConfig::from_env())
        .with_handler(ArticleEnrichHandler::new(
            articles.clone(),
            embedder,
            extractor.clone(),
            attach,
            centroids,
        ))
        .with_handler(StoryEnrichHandler::new(stories.clone(), extractor))
        .with_handler(LifecycleHandler::new(lifecycle))
        .with_handler(MergeHandler::new(stories.clone(), MergeConfig::default()))
        .with_handler(CentroidBackfillHandler::new(CentroidMaintainer::new(
            stories.clone(),
        )))
        .build()
        .await;

    let handle = worker.start();

    // Recurring lifecycle and merge passes flow through the queue like
    // everything else; idempotent enqueue absorbs double submission when
    // several workers run this scheduler.
    let scheduler_jobs: Arc<dyn newsloom_core::JobRepository> =
        Arc::new(newsloom_db::PgJobRepository::new(db.pool.clone()));
    for pass in newsloom_jobs::standard_passes() {
        newsloom_jobs::spawn_periodic(scheduler_jobs.clone(), pass);
    }

    info!("Worker running; press Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");
    if let Err(e) = handle.shutdown().await {
        error!(error = %e, "Graceful shutdown failed");
    }

    Ok(())
}
