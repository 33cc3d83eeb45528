//! # newsloom-db
//!
//! PostgreSQL database layer for newsloom.
//!
//! This crate provides:
//! - Connection pool management
//! - Repository implementations for articles, stories, and the job queue
//! - Nearest-neighbor candidate retrieval with pgvector
//! - The set-based lifecycle sweep and merge absorption statements
//!
//! ## Example
//!
//! ```rust,ignore
//! use newsloom_db::Database;
//! use newsloom_core::{ArticleRepository, CreateArticleRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/newsloom").await?;
//!
//!     let article_id = db.articles.insert(CreateArticleRequest {
//!         dedup_key: "reuters:abc123".into(),
//!         title: "Senator X resigns".into(),
//!         source: "reuters".into(),
//!         category: Some("politics".into()),
//!         published_at: chrono::Utc::now(),
//!     }).await?;
//!
//!     println!("Ingested article: {}", article_id);
//!     Ok(())
//! }
//! ```

pub mod articles;
pub mod jobs;
pub mod pool;
pub mod stories;

// Test fixtures for integration tests
// Note: always compiled so integration tests (in tests/) can use
// DEFAULT_TEST_DATABASE_URL
pub mod test_fixtures;

// Re-export core types
pub use newsloom_core::*;

pub use articles::PgArticleRepository;
pub use jobs::PgJobRepository;
pub use pool::{create_pool, create_pool_with_config, log_pool_metrics, PoolConfig};
pub use stories::PgStoryRepository;

/// Combined database context with all repositories.
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Job queue repository.
    pub jobs: PgJobRepository,
    /// Article repository.
    pub articles: PgArticleRepository,
    /// Story repository.
    pub stories: PgStoryRepository,
}

impl Database {
    /// Connect with default pool configuration.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = create_pool(database_url).await?;
        Ok(Self::from_pool(pool))
    }

    /// Build the repository bundle over an existing pool.
    pub fn from_pool(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            jobs: PgJobRepository::new(pool.clone()),
            articles: PgArticleRepository::new(pool.clone()),
            stories: PgStoryRepository::new(pool.clone()),
            pool,
        }
    }

    /// Run pending migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Config(format!("migration failed: {e}")))?;
        Ok(())
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self::from_pool(self.pool.clone())
    }
}
