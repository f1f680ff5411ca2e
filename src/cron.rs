//! Cron task bodies (spec.md §6 "Cron tasks (registered externally, bodies
//! in scope)"): nightly supplier sync, incremental semantic-sync
//! re-enqueue, queue cleanup, and a health-check sweep. Registration itself
//! (the actual cron schedule) is out of this engine's scope in the hosting
//! CMS, but `main.rs` stands in for that host by registering these same
//! task bodies against a `tokio_cron_scheduler::JobScheduler`, since this is
//! a standalone binary rather than a library mounted inside a larger CMS.

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use tokio_cron_scheduler::{Job as CronJob, JobScheduler};

use crate::control::ControlPlane;
use crate::db::{suppliers, DbPool};
use crate::error::Result;
use crate::jobs::queue::JobQueue;
use crate::jobs::{sinks, JobKind};

/// Failed-job and waiting-job thresholds for the health-check sweep
/// (spec.md §6: "thresholds: failed > 50, waiting > 100, paused with
/// waiting > 0 → warn").
const FAILED_WARN_THRESHOLD: u64 = 50;
const WAITING_WARN_THRESHOLD: u64 = 100;

const KNOWN_QUEUES: &[&str] = &["supplier-sync", "product-family", "image-upload", "index-upsert", "semantic-upsert"];

#[derive(Clone)]
pub struct CronDeps {
    pub pool: DbPool,
    pub queue: JobQueue,
    pub control: ControlPlane,
}

/// Register all four cron task bodies on `scheduler`. The scheduler itself
/// is started by the caller (`main.rs`); this only adds jobs to it.
pub async fn register(scheduler: &JobScheduler, deps: CronDeps) -> Result<()> {
    let deps = Arc::new(deps);

    scheduler
        .add(nightly_supplier_sync(deps.clone())?)
        .await
        .map_err(|e| crate::error::AppError::Config(format!("failed to register nightly sync cron: {e}")))?;

    scheduler
        .add(incremental_semantic_reenqueue(deps.clone())?)
        .await
        .map_err(|e| crate::error::AppError::Config(format!("failed to register incremental re-enqueue cron: {e}")))?;

    scheduler
        .add(queue_cleanup(deps.clone())?)
        .await
        .map_err(|e| crate::error::AppError::Config(format!("failed to register queue cleanup cron: {e}")))?;

    scheduler
        .add(health_check(deps)?)
        .await
        .map_err(|e| crate::error::AppError::Config(format!("failed to register health check cron: {e}")))?;

    Ok(())
}

/// Nightly at 02:00 local (spec.md §6): enqueue a `supplier-sync` job for
/// every active supplier that isn't already locked or queued.
fn nightly_supplier_sync(deps: Arc<CronDeps>) -> Result<CronJob> {
    CronJob::new_async("0 0 2 * * *", move |_uuid, _l| {
        let deps = deps.clone();
        Box::pin(async move {
            if let Err(e) = run_nightly_supplier_sync(&deps).await {
                tracing::error!(error = %e, "nightly supplier sync cron failed");
            }
        })
    })
    .map_err(|e| crate::error::AppError::Config(format!("invalid cron expression: {e}")))
}

async fn run_nightly_supplier_sync(deps: &CronDeps) -> Result<()> {
    let mut redis = deps.control.redis.clone();
    let active = suppliers::list_active(&deps.pool).await?;

    for supplier in active {
        if !supplier.auto_import {
            continue;
        }
        if crate::control::locks::is_locked(&mut redis, &supplier.code).await? {
            continue;
        }
        if deps
            .queue
            .has_queued_or_active("supplier-sync", "supplier_id", &supplier.code)
            .await?
        {
            continue;
        }

        let payload = serde_json::json!({ "supplier_id": supplier.code, "manual": false });
        deps.queue.enqueue(JobKind::SupplierSync, payload).await?;
        tracing::info!(supplier = %supplier.code, "nightly sync enqueued");
    }

    Ok(())
}

/// Every 12h (spec.md §6): re-enqueue `semantic-upsert` for products whose
/// `gemini_synced_hash` has drifted from `promidata_hash` since the last
/// sweep — covers a sink job that failed after its enclosing family job
/// already completed.
fn incremental_semantic_reenqueue(deps: Arc<CronDeps>) -> Result<CronJob> {
    CronJob::new_async("0 0 0,12 * * *", move |_uuid, _l| {
        let deps = deps.clone();
        Box::pin(async move {
            if let Err(e) = run_incremental_reenqueue(&deps).await {
                tracing::error!(error = %e, "incremental re-enqueue cron failed");
            }
        })
    })
    .map_err(|e| crate::error::AppError::Config(format!("invalid cron expression: {e}")))
}

async fn run_incremental_reenqueue(deps: &CronDeps) -> Result<()> {
    let since = Utc::now() - ChronoDuration::hours(12);
    let pending = crate::db::products::list_pending_semantic_sync(&deps.pool, since).await?;

    for family_key in &pending {
        sinks::enqueue_semantic_upsert(&deps.queue, family_key).await?;
    }

    if !pending.is_empty() {
        tracing::info!(count = pending.len(), "incremental semantic re-enqueue sweep");
    }

    Ok(())
}

/// Every 6h with a 24h grace window (spec.md §6): evict completed/failed/
/// cancelled jobs older than the grace window, across every queue.
fn queue_cleanup(deps: Arc<CronDeps>) -> Result<CronJob> {
    CronJob::new_async("0 0 0,6,12,18 * * *", move |_uuid, _l| {
        let deps = deps.clone();
        Box::pin(async move {
            let grace = ChronoDuration::hours(24);
            match deps.queue.clean_all(grace).await {
                Ok(removed) => {
                    if removed > 0 {
                        tracing::info!(removed, "queue cleanup swept stale jobs");
                    }
                }
                Err(e) => tracing::error!(error = %e, "queue cleanup cron failed"),
            }
        })
    })
    .map_err(|e| crate::error::AppError::Config(format!("invalid cron expression: {e}")))
}

/// Every 15 min (spec.md §6): warn when a queue's failed/waiting counters
/// cross the documented thresholds, or a paused queue still has work
/// waiting behind it.
fn health_check(deps: Arc<CronDeps>) -> Result<CronJob> {
    CronJob::new_async("0 */15 * * * *", move |_uuid, _l| {
        let deps = deps.clone();
        Box::pin(async move {
            if let Err(e) = run_health_check(&deps).await {
                tracing::error!(error = %e, "health check cron failed");
            }
        })
    })
    .map_err(|e| crate::error::AppError::Config(format!("invalid cron expression: {e}")))
}

async fn run_health_check(deps: &CronDeps) -> Result<()> {
    for queue in KNOWN_QUEUES {
        let stats = deps.queue.stats(queue).await?;

        if stats.failed > FAILED_WARN_THRESHOLD {
            tracing::warn!(queue, failed = stats.failed, "queue has an elevated failed-job count");
        }
        if stats.waiting > WAITING_WARN_THRESHOLD {
            tracing::warn!(queue, waiting = stats.waiting, "queue has an elevated waiting-job count");
        }
        if stats.paused && stats.waiting > 0 {
            tracing::warn!(queue, waiting = stats.waiting, "queue is paused with jobs waiting behind it");
        }
    }

    Ok(())
}
