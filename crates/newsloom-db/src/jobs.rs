//! Job queue repository implementation.
//!
//! Idempotent enqueue, exclusive claim, and crash recovery. The partial
//! unique index on (job_type, payload_hash) over non-terminal rows is the
//! idempotency contract; `FOR UPDATE SKIP LOCKED` is the claim contract.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value as JsonValue;
use sqlx::{Pool, Postgres, Row};
use tokio::sync::Notify;
use uuid::Uuid;

use newsloom_core::{
    defaults, new_v7, payload_hash, Error, Job, JobRepository, JobStatus, JobType, QueueStats,
    Result,
};

const JOB_COLUMNS: &str = "id, job_type, status::text, priority, payload, payload_hash, result,
             error_message, attempts, max_attempts, run_at, created_at, started_at, finished_at";

/// PostgreSQL implementation of JobRepository.
pub struct PgJobRepository {
    pool: Pool<Postgres>,
    /// Notify handle for event-driven worker wake.
    notify: Arc<Notify>,
}

impl PgJobRepository {
    /// Create a new PgJobRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            pool,
            notify: Arc::new(Notify::new()),
        }
    }

    /// Create a new PgJobRepository sharing an existing notify handle.
    pub fn with_notify(pool: Pool<Postgres>, notify: Arc<Notify>) -> Self {
        Self { pool, notify }
    }

    /// Get the job notification handle for event-driven waking.
    pub fn job_notify(&self) -> Arc<Notify> {
        self.notify.clone()
    }

    /// Convert string from database to JobType.
    fn str_to_job_type(s: &str) -> JobType {
        JobType::parse(s).unwrap_or(JobType::StoryLifecycle) // fallback
    }

    /// Parse a job row into a Job struct.
    fn parse_job_row(row: sqlx::postgres::PgRow) -> Job {
        Job {
            id: row.get("id"),
            job_type: Self::str_to_job_type(row.get("job_type")),
            status: JobStatus::from_str_lossy(row.get("status")),
            priority: row.get("priority"),
            payload: row.get("payload"),
            payload_hash: row.get("payload_hash"),
            result: row.get("result"),
            error_message: row.get("error_message"),
            attempts: row.get("attempts"),
            max_attempts: row.get("max_attempts"),
            run_at: row.get("run_at"),
            created_at: row.get("created_at"),
            started_at: row.get("started_at"),
            finished_at: row.get("finished_at"),
        }
    }

    /// Retry delay after `attempts` tries: base * 2^(attempts-1), capped.
    fn backoff_delay(attempts: i32) -> Duration {
        let shift = (attempts.max(1) - 1).min(16) as u32;
        let secs = defaults::RETRY_BACKOFF_BASE_SECS
            .saturating_mul(1i64 << shift)
            .min(defaults::RETRY_BACKOFF_MAX_SECS);
        Duration::seconds(secs)
    }
}

#[async_trait]
impl JobRepository for PgJobRepository {
    async fn enqueue(
        &self,
        job_type: JobType,
        payload: Option<JsonValue>,
        priority: i32,
        run_at: DateTime<Utc>,
    ) -> Result<Uuid> {
        let hash = payload_hash(payload.as_ref());
        let job_type_str = job_type.as_str();

        // Insert-or-return-existing against the partial unique index.
        // Two rounds cover the race where the holder goes terminal between
        // our insert attempt and the lookup.
        for _ in 0..2 {
            let inserted = sqlx::query_scalar::<_, Uuid>(
                "INSERT INTO job_queue
                     (id, job_type, status, priority, payload, payload_hash,
                      max_attempts, run_at, created_at)
                 VALUES ($1, $2, 'pending'::job_status, $3, $4, $5, $6, $7, $8)
                 ON CONFLICT (job_type, payload_hash)
                     WHERE status IN ('pending'::job_status, 'processing'::job_status)
                     DO NOTHING
                 RETURNING id",
            )
            .bind(new_v7())
            .bind(job_type_str)
            .bind(priority)
            .bind(&payload)
            .bind(&hash)
            .bind(defaults::JOB_MAX_ATTEMPTS)
            .bind(run_at)
            .bind(Utc::now())
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

            if let Some(id) = inserted {
                self.notify.notify_waiters();
                return Ok(id);
            }

            let existing = sqlx::query_scalar::<_, Uuid>(
                "SELECT id FROM job_queue
                 WHERE job_type = $1 AND payload_hash = $2
                   AND status IN ('pending'::job_status, 'processing'::job_status)
                 LIMIT 1",
            )
            .bind(job_type_str)
            .bind(&hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

            if let Some(id) = existing {
                return Ok(id);
            }
        }

        Err(Error::Job(format!(
            "enqueue of {job_type_str} lost both insert rounds"
        )))
    }

    async fn claim_next(&self, job_type: JobType) -> Result<Option<Job>> {
        self.claim_next_for_types(std::slice::from_ref(&job_type))
            .await
    }

    async fn claim_next_for_types(&self, job_types: &[JobType]) -> Result<Option<Job>> {
        let now = Utc::now();
        let type_strings: Vec<String> = job_types
            .iter()
            .map(|jt| jt.as_str().to_string())
            .collect();

        // FOR UPDATE SKIP LOCKED: concurrent claimers each lock a distinct
        // row or none. Filter by type and run_at before locking.
        // Empty array = claim any type.
        let query = format!(
            "UPDATE job_queue
             SET status = 'processing'::job_status, started_at = $1,
                 attempts = attempts + 1
             WHERE id = (
                 SELECT id FROM job_queue
                 WHERE status = 'pending'::job_status
                   AND run_at <= $1
                   AND (cardinality($2::text[]) = 0 OR job_type = ANY($2))
                 ORDER BY priority DESC, run_at ASC, created_at ASC
                 LIMIT 1
                 FOR UPDATE SKIP LOCKED
             )
             RETURNING {JOB_COLUMNS}"
        );

        let row = sqlx::query(&query)
            .bind(now)
            .bind(&type_strings)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(row.map(Self::parse_job_row))
    }

    async fn complete(&self, job_id: Uuid, result: Option<JsonValue>) -> Result<()> {
        sqlx::query(
            "UPDATE job_queue
             SET status = 'completed'::job_status, finished_at = $1, result = $2
             WHERE id = $3",
        )
        .bind(Utc::now())
        .bind(&result)
        .bind(job_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn fail(&self, job_id: Uuid, error: &str, retryable: bool) -> Result<()> {
        let now = Utc::now();

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let (attempts, max_attempts): (i32, i32) =
            sqlx::query_as("SELECT attempts, max_attempts FROM job_queue WHERE id = $1")
                .bind(job_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(Error::Database)?;

        if retryable && attempts < max_attempts {
            // Attempts remain: back to pending with exponential backoff.
            let run_at = now + Self::backoff_delay(attempts);
            sqlx::query(
                "UPDATE job_queue
                 SET status = 'pending'::job_status, error_message = $1,
                     run_at = $2, started_at = NULL
                 WHERE id = $3",
            )
            .bind(error)
            .bind(run_at)
            .bind(job_id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        } else {
            sqlx::query(
                "UPDATE job_queue
                 SET status = 'failed'::job_status, finished_at = $1, error_message = $2
                 WHERE id = $3",
            )
            .bind(now)
            .bind(error)
            .bind(job_id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        }

        tx.commit().await.map_err(Error::Database)?;
        Ok(())
    }

    async fn get(&self, job_id: Uuid) -> Result<Option<Job>> {
        let query = format!("SELECT {JOB_COLUMNS} FROM job_queue WHERE id = $1");
        let row = sqlx::query(&query)
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(row.map(Self::parse_job_row))
    }

    async fn reset_stuck(&self, older_than: Duration) -> Result<u64> {
        let cutoff = Utc::now() - older_than;

        let result = sqlx::query(
            "UPDATE job_queue
             SET status = 'pending'::job_status, started_at = NULL
             WHERE status = 'processing'::job_status AND started_at < $1",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        let swept = result.rows_affected();
        if swept > 0 {
            self.notify.notify_waiters();
        }
        Ok(swept)
    }

    async fn runnable_count(&self, job_type: JobType) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM job_queue
             WHERE status = 'pending'::job_status AND job_type = $1 AND run_at <= $2",
        )
        .bind(job_type.as_str())
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(count)
    }

    async fn queue_stats(&self) -> Result<QueueStats> {
        let row = sqlx::query(
            "SELECT
                COUNT(*) FILTER (WHERE status = 'pending') as pending,
                COUNT(*) FILTER (WHERE status = 'processing') as processing,
                COUNT(*) FILTER (WHERE status = 'completed' AND finished_at > NOW() - INTERVAL '1 hour') as completed_last_hour,
                COUNT(*) FILTER (WHERE status = 'failed' AND finished_at > NOW() - INTERVAL '1 hour') as failed_last_hour,
                COUNT(*) as total
             FROM job_queue",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(QueueStats {
            pending: row.get::<i64, _>("pending"),
            processing: row.get::<i64, _>("processing"),
            completed_last_hour: row.get::<i64, _>("completed_last_hour"),
            failed_last_hour: row.get::<i64, _>("failed_last_hour"),
            total: row.get::<i64, _>("total"),
        })
    }
}
