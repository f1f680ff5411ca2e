//! Worker pool runner (spec.md §5): one polling loop per queue, each gated
//! by a `tokio::sync::Semaphore` sized to that queue's concurrency cap.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::control::ControlPlane;
use crate::db::DbPool;
use crate::downstream::DownstreamClient;
use crate::jobs::{concurrency_for_queue, handlers, queue::JobQueue, JobKind};
use crate::objectstore::ObjectStore;
use crate::upstream::UpstreamClient;

const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Everything a job handler needs: the relational store, the upstream feed
/// client, the object store, the queue itself (for enqueueing follow-on
/// jobs), and the control plane (locks/stop/stats).
#[derive(Clone)]
pub struct WorkerContext {
    pub pool: DbPool,
    pub upstream: UpstreamClient,
    pub object_store: ObjectStore,
    pub downstream: DownstreamClient,
    pub queue: JobQueue,
    pub control: ControlPlane,
}

/// Spawn one polling loop per queue kind. Returns immediately; loops run
/// until `shutdown` is cancelled, at which point each loop stops claiming
/// new work (in-flight jobs still run to completion within the semaphore).
pub fn spawn_all(ctx: WorkerContext, shutdown: CancellationToken) -> Vec<tokio::task::JoinHandle<()>> {
    [
        JobKind::SupplierSync,
        JobKind::ProductFamily,
        JobKind::ImageUpload,
        JobKind::IndexUpsert,
        JobKind::SemanticUpsert,
    ]
    .into_iter()
    .map(|kind| {
        let ctx = ctx.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(run_queue_loop(kind, ctx, shutdown))
    })
    .collect()
}

async fn run_queue_loop(kind: JobKind, ctx: WorkerContext, shutdown: CancellationToken) {
    let queue_name = kind.queue_name();
    let semaphore = Arc::new(Semaphore::new(concurrency_for_queue(queue_name)));

    loop {
        if shutdown.is_cancelled() {
            break;
        }

        let permit = semaphore.clone().acquire_owned().await.expect("semaphore not closed");

        let claimed = match ctx.queue.claim(queue_name).await {
            Ok(job) => job,
            Err(e) => {
                tracing::error!(queue = queue_name, error = %e, "failed to poll queue");
                drop(permit);
                tokio::time::sleep(POLL_INTERVAL).await;
                continue;
            }
        };

        let Some(job) = claimed else {
            drop(permit);
            tokio::time::sleep(POLL_INTERVAL).await;
            continue;
        };

        let ctx = ctx.clone();
        tokio::spawn(async move {
            let _permit = permit;
            let job_id = job.id;
            tracing::info!(queue = queue_name, job_id = %job_id, attempt = job.attempts, "job claimed");

            let outcome = match kind {
                JobKind::SupplierSync => handlers::supplier_sync::run(&ctx, &job).await,
                JobKind::ProductFamily => handlers::product_family::run(&ctx, &job).await,
                JobKind::ImageUpload => handlers::image_upload::run(&ctx, &job).await,
                JobKind::IndexUpsert | JobKind::SemanticUpsert => handlers::sink::run(&ctx, &job).await,
            };

            match outcome {
                Ok(_) => {
                    if let Err(e) = ctx.queue.complete(job_id).await {
                        tracing::error!(job_id = %job_id, error = %e, "failed to mark job completed");
                    }
                }
                Err(e) => {
                    tracing::warn!(job_id = %job_id, error = %e, "job failed");
                    if let Err(e) = ctx.queue.fail_or_retry(job_id, &e.to_string()).await {
                        tracing::error!(job_id = %job_id, error = %e, "failed to record job failure");
                    }
                }
            }
        });
    }
}
