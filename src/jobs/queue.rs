//! Durable job queue backed by Postgres (spec.md §4.7, §6 admin endpoints).
//!
//! Claiming uses `SELECT ... FOR UPDATE SKIP LOCKED` so multiple worker
//! replicas can poll the same table without claiming the same row twice.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::db::DbPool;
use crate::error::Result;
use crate::jobs::{Job, JobKind, JobRow, JobState, Progress};

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct QueueStats {
    pub queue: String,
    pub waiting: u64,
    pub active: u64,
    pub delayed: u64,
    pub completed: u64,
    pub failed: u64,
    pub cancelled: u64,
    pub paused: bool,
}

/// Up to 3 attempts, exponential backoff starting at 2s (spec.md §4.7).
const DEFAULT_MAX_ATTEMPTS: i32 = 3;
const INITIAL_BACKOFF_SECS: i64 = 2;

fn backoff_for_attempt(attempts: i32) -> chrono::Duration {
    let secs = INITIAL_BACKOFF_SECS.saturating_mul(1i64 << attempts.max(0).min(10));
    chrono::Duration::seconds(secs)
}

#[derive(Clone)]
pub struct JobQueue {
    pool: DbPool,
}

impl JobQueue {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn enqueue(&self, kind: JobKind, payload: Value) -> Result<Uuid> {
        self.enqueue_with_attempts(kind, payload, DEFAULT_MAX_ATTEMPTS).await
    }

    pub async fn enqueue_with_attempts(&self, kind: JobKind, payload: Value, max_attempts: i32) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let progress = serde_json::to_value(Progress::default())?;

        sqlx::query(
            r#"
            INSERT INTO jobs (id, kind, queue, state, payload, attempts, max_attempts, progress, run_after, created_at)
            VALUES ($1, $2, $3, 'queued', $4, 0, $5, $6, now(), now())
            "#,
        )
        .bind(id)
        .bind(kind)
        .bind(kind.queue_name())
        .bind(payload)
        .bind(max_attempts)
        .bind(progress)
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    /// Return every `active` job to `waiting` (spec.md §4.7: "in-flight jobs
    /// that do not finish return to the waiting state on restart"). Called
    /// once at startup, before workers begin claiming, since a row can only
    /// be `active` here because the process that claimed it died without
    /// completing or failing it.
    pub async fn reclaim_orphaned(&self) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE jobs SET state = 'queued', started_at = NULL WHERE state = 'active'",
        )
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Claim up to one runnable job from `queue`, skipping rows locked by
    /// another worker. Returns `None` if the queue is empty or paused.
    pub async fn claim(&self, queue: &str) -> Result<Option<Job>> {
        let mut tx = self.pool.begin().await?;

        let paused: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM queue_controls WHERE queue = $1 AND paused = true)",
        )
        .bind(queue)
        .fetch_one(&mut *tx)
        .await?;

        if paused {
            tx.rollback().await?;
            return Ok(None);
        }

        let row: Option<JobRow> = sqlx::query_as(
            r#"
            SELECT * FROM jobs
            WHERE queue = $1
              AND (state = 'queued' OR (state = 'delayed' AND run_after <= now()))
            ORDER BY created_at
            FOR UPDATE SKIP LOCKED
            LIMIT 1
            "#,
        )
        .bind(queue)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.commit().await?;
            return Ok(None);
        };

        sqlx::query(
            "UPDATE jobs SET state = 'active', attempts = attempts + 1, started_at = now() WHERE id = $1",
        )
        .bind(row.id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        let mut job: Job = row.into();
        job.state = JobState::Active;
        job.attempts += 1;
        Ok(Some(job))
    }

    pub async fn complete(&self, job_id: Uuid) -> Result<()> {
        sqlx::query(
            "UPDATE jobs SET state = 'completed', finished_at = now() WHERE id = $1",
        )
        .bind(job_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Record a failure. If the job has attempts remaining, it's delayed
    /// behind an exponential backoff for a future claim; otherwise it's
    /// marked `failed` terminally.
    pub async fn fail_or_retry(&self, job_id: Uuid, error: &str) -> Result<()> {
        let row: (i32, i32) = sqlx::query_as("SELECT attempts, max_attempts FROM jobs WHERE id = $1")
            .bind(job_id)
            .fetch_one(&self.pool)
            .await?;
        let (attempts, max_attempts) = row;

        if attempts < max_attempts {
            let run_after = Utc::now() + backoff_for_attempt(attempts);
            sqlx::query("UPDATE jobs SET state = 'delayed', error = $2, run_after = $3 WHERE id = $1")
                .bind(job_id)
                .bind(error)
                .bind(run_after)
                .execute(&self.pool)
                .await?;
        } else {
            sqlx::query(
                "UPDATE jobs SET state = 'failed', error = $2, finished_at = now() WHERE id = $1",
            )
            .bind(job_id)
            .bind(error)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    pub async fn cancel(&self, job_id: Uuid) -> Result<()> {
        sqlx::query(
            "UPDATE jobs SET state = 'cancelled', finished_at = now() WHERE id = $1 AND state IN ('queued', 'active')",
        )
        .bind(job_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn update_progress(&self, job_id: Uuid, progress: &Progress) -> Result<()> {
        let value = serde_json::to_value(progress)?;
        sqlx::query("UPDATE jobs SET progress = $2 WHERE id = $1")
            .bind(job_id)
            .bind(value)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Paginated job listing, with an optional state filter and a `q` term
    /// matched against the job id and payload (the admin job browser's
    /// search box).
    pub async fn list(
        &self,
        queue: &str,
        state: Option<JobState>,
        q: Option<&str>,
        page: i64,
        per_page: i64,
    ) -> Result<Vec<Job>> {
        let offset = (page.max(1) - 1) * per_page;
        let like = q.map(|q| format!("%{q}%"));

        let rows: Vec<JobRow> = match (state, like) {
            (Some(state), Some(like)) => {
                sqlx::query_as(
                    r#"SELECT * FROM jobs WHERE queue = $1 AND state = $2
                       AND (id::text ILIKE $3 OR payload::text ILIKE $3)
                       ORDER BY created_at DESC LIMIT $4 OFFSET $5"#,
                )
                .bind(queue)
                .bind(state)
                .bind(like)
                .bind(per_page)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
            (Some(state), None) => {
                sqlx::query_as(
                    "SELECT * FROM jobs WHERE queue = $1 AND state = $2 ORDER BY created_at DESC LIMIT $3 OFFSET $4",
                )
                .bind(queue)
                .bind(state)
                .bind(per_page)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
            (None, Some(like)) => {
                sqlx::query_as(
                    r#"SELECT * FROM jobs WHERE queue = $1
                       AND (id::text ILIKE $2 OR payload::text ILIKE $2)
                       ORDER BY created_at DESC LIMIT $3 OFFSET $4"#,
                )
                .bind(queue)
                .bind(like)
                .bind(per_page)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
            (None, None) => {
                sqlx::query_as("SELECT * FROM jobs WHERE queue = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3")
                    .bind(queue)
                    .bind(per_page)
                    .bind(offset)
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        Ok(rows.into_iter().map(Job::from).collect())
    }

    pub async fn get(&self, job_id: Uuid) -> Result<Option<Job>> {
        let row: Option<JobRow> = sqlx::query_as("SELECT * FROM jobs WHERE id = $1")
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Job::from))
    }

    /// Counters per job state, plus whether the queue is currently paused
    /// (the `/queues/stats` admin endpoint's payload, cached by
    /// [`crate::control::stats_cache::StatsCache`]).
    pub async fn stats(&self, queue: &str) -> Result<QueueStats> {
        let rows: Vec<(JobState, i64)> =
            sqlx::query_as("SELECT state, COUNT(*) FROM jobs WHERE queue = $1 GROUP BY state")
                .bind(queue)
                .fetch_all(&self.pool)
                .await?;

        let mut stats = QueueStats { queue: queue.to_string(), ..Default::default() };
        for (state, count) in rows {
            let count = count as u64;
            match state {
                JobState::Queued => stats.waiting = count,
                JobState::Active => stats.active = count,
                JobState::Delayed => stats.delayed = count,
                JobState::Completed => stats.completed = count,
                JobState::Failed => stats.failed = count,
                JobState::Cancelled => stats.cancelled = count,
            }
        }

        stats.paused = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM queue_controls WHERE queue = $1 AND paused = true)",
        )
        .bind(queue)
        .fetch_one(&self.pool)
        .await?;

        Ok(stats)
    }

    /// Reset attempts to 0 and re-enqueue (spec.md §4.7: "resets attempts to
    /// 0, re-enqueues").
    pub async fn retry(&self, job_id: Uuid) -> Result<()> {
        sqlx::query(
            "UPDATE jobs SET state = 'queued', attempts = 0, error = NULL, run_after = now(), started_at = NULL, finished_at = NULL WHERE id = $1 AND state = 'failed'",
        )
        .bind(job_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Bulk retry up to `limit` failed jobs in a queue (spec.md §4.7: "bulk
    /// retry up to N failed jobs").
    pub async fn retry_all_failed(&self, queue: &str, limit: i64) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE jobs SET state = 'queued', attempts = 0, error = NULL, run_after = now(), started_at = NULL, finished_at = NULL
            WHERE id IN (
                SELECT id FROM jobs WHERE queue = $1 AND state = 'failed' ORDER BY created_at LIMIT $2
            )
            "#,
        )
        .bind(queue)
        .bind(limit)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete(&self, job_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM jobs WHERE id = $1")
            .bind(job_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn pause(&self, queue: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO queue_controls (queue, paused) VALUES ($1, true) ON CONFLICT (queue) DO UPDATE SET paused = true",
        )
        .bind(queue)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn resume(&self, queue: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO queue_controls (queue, paused) VALUES ($1, false) ON CONFLICT (queue) DO UPDATE SET paused = false",
        )
        .bind(queue)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Delete completed/failed/cancelled jobs in `queue` older than `grace`,
    /// per the cron cleanup task (every 6h with 24h grace) and the
    /// `/queues/{queue}/clean` admin endpoint. `status` narrows to one
    /// terminal state when the caller's request names one.
    pub async fn clean(&self, queue: &str, grace: chrono::Duration, status: Option<JobState>) -> Result<u64> {
        let cutoff = Utc::now() - grace;
        let result = match status {
            Some(state) => {
                sqlx::query(
                    "DELETE FROM jobs WHERE queue = $1 AND state = $2 AND finished_at < $3",
                )
                .bind(queue)
                .bind(state)
                .bind(cutoff)
                .execute(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "DELETE FROM jobs WHERE queue = $1 AND state IN ('completed', 'failed', 'cancelled') AND finished_at < $2",
                )
                .bind(queue)
                .bind(cutoff)
                .execute(&self.pool)
                .await?
            }
        };
        Ok(result.rows_affected())
    }

    /// Delete completed/failed/cancelled jobs across every queue older than
    /// `grace` (the cron-driven global sweep).
    pub async fn clean_all(&self, grace: chrono::Duration) -> Result<u64> {
        let cutoff = Utc::now() - grace;
        let result = sqlx::query(
            "DELETE FROM jobs WHERE state IN ('completed', 'failed', 'cancelled') AND finished_at < $1",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Cancel every queued/active job for `queue` (used when draining on
    /// graceful shutdown or an explicit stop request).
    pub async fn drain(&self, queue: &str) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE jobs SET state = 'cancelled', finished_at = now() WHERE queue = $1 AND state IN ('queued', 'active')",
        )
        .bind(queue)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// True if `queue` already has a queued or active job whose payload's
    /// `field` matches `value`. Used by `/sync/start` (spec.md §8 S4) to
    /// avoid enqueueing a second supplier-sync job for a supplier that
    /// already has one in flight.
    pub async fn has_queued_or_active(&self, queue: &str, field: &str, value: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM jobs
                WHERE queue = $1
                  AND state IN ('queued', 'active')
                  AND payload ->> $2 = $3
            )
            "#,
        )
        .bind(queue)
        .bind(field)
        .bind(value)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }
}
