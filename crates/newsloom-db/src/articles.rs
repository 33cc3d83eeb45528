//! Article repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use pgvector::Vector;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use newsloom_core::{
    new_v7, Article, ArticleRepository, CreateArticleRequest, Error, Result,
};

/// PostgreSQL implementation of ArticleRepository.
pub struct PgArticleRepository {
    pool: Pool<Postgres>,
}

impl PgArticleRepository {
    /// Create a new PgArticleRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_article_row(row: sqlx::postgres::PgRow) -> Article {
        Article {
            id: row.get("id"),
            dedup_key: row.get("dedup_key"),
            title: row.get("title"),
            source: row.get("source"),
            category: row.get("category"),
            published_at: row.get("published_at"),
            entity_ids: row.get("entity_ids"),
            embedding: row.get("embedding"),
            created_at: row.get("created_at"),
        }
    }
}

#[async_trait]
impl ArticleRepository for PgArticleRepository {
    async fn insert(&self, req: CreateArticleRequest) -> Result<Uuid> {
        // The fetch layer resolves dedup keys before insert; a conflict
        // here means the same article arrived twice and the original wins.
        let inserted = sqlx::query_scalar::<_, Uuid>(
            "INSERT INTO article (id, dedup_key, title, source, category, published_at, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (dedup_key) DO NOTHING
             RETURNING id",
        )
        .bind(new_v7())
        .bind(&req.dedup_key)
        .bind(&req.title)
        .bind(&req.source)
        .bind(&req.category)
        .bind(req.published_at)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        if let Some(id) = inserted {
            return Ok(id);
        }

        let existing = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM article WHERE dedup_key = $1",
        )
        .bind(&req.dedup_key)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(existing)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Article>> {
        let row = sqlx::query(
            "SELECT id, dedup_key, title, source, category, published_at,
                    entity_ids, embedding, created_at
             FROM article WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(Self::parse_article_row))
    }

    async fn set_entities(&self, id: Uuid, entity_ids: &[String]) -> Result<()> {
        let result = sqlx::query("UPDATE article SET entity_ids = $1 WHERE id = $2")
            .bind(entity_ids)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::ArticleNotFound(id));
        }
        Ok(())
    }

    async fn set_embedding(&self, id: Uuid, embedding: &Vector) -> Result<()> {
        let result = sqlx::query("UPDATE article SET embedding = $1 WHERE id = $2")
            .bind(embedding)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::ArticleNotFound(id));
        }
        Ok(())
    }

    async fn current_story(&self, article_id: Uuid) -> Result<Option<Uuid>> {
        let story_id = sqlx::query_scalar::<_, Uuid>(
            "SELECT story_id FROM article_story WHERE article_id = $1",
        )
        .bind(article_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(story_id)
    }
}
