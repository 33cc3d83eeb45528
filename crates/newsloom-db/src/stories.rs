//! Story repository implementation.
//!
//! Candidate retrieval runs over the partial HNSW index on open-story
//! centroids. Membership and merge mutations are guarded single-row
//! updates (`state <> 'closed'`, version bump) so a story concurrently
//! closed by the reconciler refuses late attachments instead of
//! resurrecting.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use pgvector::Vector;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use newsloom_core::{
    new_v7, ArticleStoryLink, CreateStoryRequest, Error, LifecycleConfig, LifecycleSweepReport,
    MergeAudit, MergeOutcome, Result, Story, StoryCandidate, StoryRepository, StoryState,
};

const STORY_COLUMNS: &str = "id, primary_headline, centroid, top_entities, topic_tags,
             first_seen_at, last_updated_at, state::text, member_count, version";

/// PostgreSQL implementation of StoryRepository.
pub struct PgStoryRepository {
    pool: Pool<Postgres>,
}

impl PgStoryRepository {
    /// Create a new PgStoryRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_story_row(row: &sqlx::postgres::PgRow) -> Story {
        Story {
            id: row.get("id"),
            primary_headline: row.get("primary_headline"),
            centroid: row.get("centroid"),
            top_entities: row.get("top_entities"),
            topic_tags: row.get("topic_tags"),
            first_seen_at: row.get("first_seen_at"),
            last_updated_at: row.get("last_updated_at"),
            state: StoryState::from_str_lossy(row.get("state")),
            member_count: row.get("member_count"),
            version: row.get("version"),
        }
    }
}

#[async_trait]
impl StoryRepository for PgStoryRepository {
    async fn create(&self, req: CreateStoryRequest) -> Result<Story> {
        let story_id = new_v7();
        let now = Utc::now();

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let query = format!(
            "INSERT INTO story
                 (id, primary_headline, centroid, top_entities, topic_tags,
                  first_seen_at, last_updated_at, state, member_count, version)
             VALUES ($1, $2, $3, $4, $5, $6, $7, 'emerging'::story_state, 1, 0)
             RETURNING {STORY_COLUMNS}"
        );
        let row = sqlx::query(&query)
            .bind(story_id)
            .bind(&req.headline)
            .bind(&req.embedding)
            .bind(&req.entity_ids)
            .bind(&req.topic_tags)
            .bind(req.published_at)
            .bind(now)
            .fetch_one(&mut *tx)
            .await
            .map_err(Error::Database)?;

        sqlx::query(
            "INSERT INTO article_story (article_id, story_id, similarity_score, is_primary, matched_at)
             VALUES ($1, $2, $3, TRUE, $4)",
        )
        .bind(req.article_id)
        .bind(story_id)
        .bind(req.similarity)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;
        Ok(Self::parse_story_row(&row))
    }

    async fn get(&self, id: Uuid) -> Result<Option<Story>> {
        let query = format!("SELECT {STORY_COLUMNS} FROM story WHERE id = $1");
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(row.map(|r| Self::parse_story_row(&r)))
    }

    async fn find_candidates(
        &self,
        query_vec: &Vector,
        limit: i64,
        floor: f32,
        updated_within: Duration,
    ) -> Result<Vec<StoryCandidate>> {
        let since = Utc::now() - updated_within;

        let query = format!(
            "SELECT {STORY_COLUMNS},
                    1.0 - (centroid <=> $1::vector) AS similarity
             FROM story
             WHERE centroid IS NOT NULL
               AND state <> 'closed'::story_state
               AND last_updated_at >= $2
               AND 1.0 - (centroid <=> $1::vector) >= $3
             ORDER BY centroid <=> $1::vector ASC, last_updated_at DESC
             LIMIT $4"
        );

        let rows = sqlx::query(&query)
            .bind(query_vec)
            .bind(since)
            .bind(floor as f64)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let similarity = row.get::<f64, _>("similarity") as f32;
                StoryCandidate {
                    story: Self::parse_story_row(&row),
                    similarity,
                }
            })
            .collect())
    }

    async fn attach_article(
        &self,
        story_id: Uuid,
        article_id: Uuid,
        similarity: f32,
        matched_at: DateTime<Utc>,
    ) -> Result<bool> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        // Membership bump is refused for closed stories; the caller falls
        // through to the next candidate.
        let bumped = sqlx::query(
            "UPDATE story
             SET member_count = member_count + 1, last_updated_at = $1,
                 version = version + 1
             WHERE id = $2 AND state <> 'closed'::story_state",
        )
        .bind(matched_at)
        .bind(story_id)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        if bumped.rows_affected() == 0 {
            return Ok(false);
        }

        let linked = sqlx::query(
            "INSERT INTO article_story (article_id, story_id, similarity_score, is_primary, matched_at)
             VALUES ($1, $2, $3, FALSE, $4)
             ON CONFLICT (article_id) DO NOTHING",
        )
        .bind(article_id)
        .bind(story_id)
        .bind(similarity)
        .bind(matched_at)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        if linked.rows_affected() == 0 {
            // Article already linked elsewhere; drop the membership bump.
            tx.rollback().await.map_err(Error::Database)?;
            return Ok(false);
        }

        tx.commit().await.map_err(Error::Database)?;
        Ok(true)
    }

    async fn member_embeddings(&self, story_id: Uuid) -> Result<Vec<Vector>> {
        let rows = sqlx::query(
            "SELECT a.embedding
             FROM article a
             JOIN article_story l ON l.article_id = a.id
             WHERE l.story_id = $1 AND a.embedding IS NOT NULL",
        )
        .bind(story_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows
            .into_iter()
            .map(|row| row.get::<Vector, _>("embedding"))
            .collect())
    }

    async fn update_centroid(&self, story_id: Uuid, centroid: Option<&Vector>) -> Result<()> {
        let result = sqlx::query(
            "UPDATE story SET centroid = $1, version = version + 1 WHERE id = $2",
        )
        .bind(centroid)
        .bind(story_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::StoryNotFound(story_id));
        }
        Ok(())
    }

    async fn union_entities(&self, story_id: Uuid, entity_ids: &[String]) -> Result<()> {
        let result = sqlx::query(
            "UPDATE story
             SET top_entities = ARRAY(SELECT DISTINCT unnest(top_entities || $1::text[])),
                 version = version + 1
             WHERE id = $2",
        )
        .bind(entity_ids)
        .bind(story_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::StoryNotFound(story_id));
        }
        Ok(())
    }

    async fn lifecycle_sweep(&self, config: &LifecycleConfig) -> Result<LifecycleSweepReport> {
        let now = Utc::now();
        let close_cutoff = now - Duration::hours(config.close_after_hours);
        let stale_cutoff = now - Duration::hours(config.stale_after_hours);
        let stable_cutoff = now - Duration::hours(config.stable_after_hours);
        let growing_cutoff = now - Duration::hours(config.growing_after_hours);

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        // Ordered most-terminal first so one sweep never double-promotes a
        // story through two transitions.
        let closed = sqlx::query(
            "UPDATE story
             SET state = 'closed'::story_state, version = version + 1
             WHERE state <> 'closed'::story_state AND last_updated_at < $1",
        )
        .bind(close_cutoff)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?
        .rows_affected();

        let to_stale = sqlx::query(
            "UPDATE story
             SET state = 'stale'::story_state, version = version + 1
             WHERE state IN ('emerging'::story_state, 'growing'::story_state, 'stable'::story_state)
               AND last_updated_at < $1",
        )
        .bind(stale_cutoff)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?
        .rows_affected();

        let to_stable = sqlx::query(
            "UPDATE story
             SET state = 'stable'::story_state, version = version + 1
             WHERE state = 'growing'::story_state AND first_seen_at < $1",
        )
        .bind(stable_cutoff)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?
        .rows_affected();

        let to_growing = sqlx::query(
            "UPDATE story
             SET state = 'growing'::story_state, version = version + 1
             WHERE state = 'emerging'::story_state AND first_seen_at < $1",
        )
        .bind(growing_cutoff)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?
        .rows_affected();

        tx.commit().await.map_err(Error::Database)?;

        Ok(LifecycleSweepReport {
            to_growing,
            to_stable,
            to_stale,
            closed,
        })
    }

    async fn absorb(&self, outcome: &MergeOutcome) -> Result<MergeAudit> {
        let now = Utc::now();

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        // Lock the winner row and refuse merging into a closed story.
        let winner_state: String = sqlx::query_scalar(
            "SELECT state::text FROM story WHERE id = $1 FOR UPDATE",
        )
        .bind(outcome.winner_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(Error::Database)?
        .ok_or(Error::StoryNotFound(outcome.winner_id))?;

        if !StoryState::from_str_lossy(&winner_state).is_open() {
            return Err(Error::InvalidInput(format!(
                "cannot merge into closed story {}",
                outcome.winner_id
            )));
        }

        // Repoint every link under the loser. The winner keeps its own
        // primary; repointed links lose the flag.
        let repointed = sqlx::query(
            "UPDATE article_story
             SET story_id = $1, is_primary = FALSE
             WHERE story_id = $2",
        )
        .bind(outcome.winner_id)
        .bind(outcome.loser_id)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?
        .rows_affected() as i64;

        sqlx::query(
            "UPDATE story
             SET top_entities = ARRAY(
                     SELECT DISTINCT unnest(top_entities ||
                         (SELECT top_entities FROM story WHERE id = $2))),
                 topic_tags = ARRAY(
                     SELECT DISTINCT unnest(topic_tags ||
                         (SELECT topic_tags FROM story WHERE id = $2))),
                 member_count = member_count + $3,
                 last_updated_at = $4,
                 version = version + 1
             WHERE id = $1",
        )
        .bind(outcome.winner_id)
        .bind(outcome.loser_id)
        .bind(repointed as i32)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        sqlx::query(
            "UPDATE story
             SET state = 'closed'::story_state, member_count = 0,
                 last_updated_at = $2, version = version + 1
             WHERE id = $1",
        )
        .bind(outcome.loser_id)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        let audit = MergeAudit {
            id: new_v7(),
            winner_id: outcome.winner_id,
            loser_id: outcome.loser_id,
            similarity: outcome.similarity,
            margin: outcome.margin,
            tier: outcome.tier,
            signal: outcome.signal,
            repointed_links: repointed,
            decided_at: now,
        };

        sqlx::query(
            "INSERT INTO merge_audit
                 (id, winner_id, loser_id, similarity, margin, tier, signal,
                  repointed_links, decided_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(audit.id)
        .bind(audit.winner_id)
        .bind(audit.loser_id)
        .bind(audit.similarity)
        .bind(audit.margin)
        .bind(audit.tier.as_str())
        .bind(audit.signal.map(|s| s.as_str()))
        .bind(audit.repointed_links)
        .bind(audit.decided_at)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;
        Ok(audit)
    }

    async fn missing_centroids(&self, limit: i64) -> Result<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM story
             WHERE centroid IS NULL AND member_count > 0
               AND state <> 'closed'::story_state
             ORDER BY id
             LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(ids)
    }

    async fn recently_updated(&self, window: Duration, limit: i64) -> Result<Vec<Story>> {
        let since = Utc::now() - window;

        let query = format!(
            "SELECT {STORY_COLUMNS} FROM story
             WHERE state <> 'closed'::story_state AND last_updated_at >= $1
             ORDER BY last_updated_at DESC
             LIMIT $2"
        );
        let rows = sqlx::query(&query)
            .bind(since)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(rows.iter().map(Self::parse_story_row).collect())
    }

    async fn links(&self, story_id: Uuid) -> Result<Vec<ArticleStoryLink>> {
        let rows = sqlx::query(
            "SELECT article_id, story_id, similarity_score, is_primary, matched_at
             FROM article_story
             WHERE story_id = $1
             ORDER BY matched_at",
        )
        .bind(story_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows
            .into_iter()
            .map(|row| ArticleStoryLink {
                article_id: row.get("article_id"),
                story_id: row.get("story_id"),
                similarity_score: row.get("similarity_score"),
                is_primary: row.get("is_primary"),
                matched_at: row.get("matched_at"),
            })
            .collect())
    }
}
