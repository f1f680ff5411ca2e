//! `supplier-sync` queue handler (spec.md §4.7): manifest → parse → fetch &
//! normalize → group & hash → batch hash check → enqueue one
//! `product-family` job per changed family.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::control::{locks, stop};
use crate::db::suppliers;
use crate::error::{AppError, Result};
use crate::jobs::{worker::WorkerContext, Job, JobKind, Progress};
use crate::normalize::normalize_product;
use crate::reconciler::filter_for_sync;
use crate::upstream::manifest::parse_manifest;

#[derive(Debug, Deserialize)]
pub struct SupplierSyncPayload {
    pub supplier_id: String,
    #[serde(default)]
    pub manual: bool,
}

#[derive(Debug, Serialize)]
pub struct SupplierSyncResult {
    pub processed: u64,
    pub skipped: u64,
    pub failed: u64,
    pub errors: Vec<String>,
    pub cancelled: bool,
}

pub async fn run(ctx: &WorkerContext, job: &Job) -> Result<Value> {
    let payload: SupplierSyncPayload = serde_json::from_value(job.payload.clone())?;
    let supplier_id = payload.supplier_id.as_str();

    let mut redis = ctx.control.redis.clone();
    let Some(lock) = locks::acquire(&mut redis, supplier_id).await? else {
        return Err(AppError::LockHeld(supplier_id.to_string()));
    };

    let result = run_locked(ctx, job.id, supplier_id, &mut redis).await;

    locks::release(&mut redis, &lock).await?;

    match &result {
        Ok(outcome) if outcome.cancelled => {
            suppliers::mark_cancelled(&ctx.pool, supplier_id, "sync cancelled by stop signal").await?;
        }
        Ok(outcome) if outcome.failed * 2 > (outcome.processed + outcome.failed).max(1) => {
            suppliers::mark_failed(&ctx.pool, supplier_id, "more than half of families failed").await?;
        }
        Ok(_) => {
            suppliers::mark_completed(&ctx.pool, supplier_id, None).await?;
        }
        Err(e) => {
            suppliers::mark_failed(&ctx.pool, supplier_id, &e.to_string()).await?;
        }
    }

    Ok(serde_json::to_value(result?)?)
}

async fn run_locked(
    ctx: &WorkerContext,
    job_id: uuid::Uuid,
    supplier_id: &str,
    redis: &mut redis::aio::ConnectionManager,
) -> Result<SupplierSyncResult> {
    suppliers::mark_running(&ctx.pool, supplier_id).await?;
    stop::clear(redis, supplier_id).await?;

    report(ctx, job_id, "parse_manifest", 5).await;
    let manifest_url = format!("{supplier_id}/Import.txt");
    let manifest_text = ctx.upstream.fetch_text(&manifest_url).await?;
    let entries = parse_manifest(&manifest_text);

    if stop::requested(redis, supplier_id).await? {
        return Ok(cancelled_result(0));
    }

    report(ctx, job_id, "fetch_variants", 20).await;
    let mut families = Vec::new();
    let mut errors = Vec::new();

    for entry in &entries {
        let raw: Value = match ctx.upstream.fetch_json(&entry.url).await {
            Ok(doc) => doc,
            Err(e) => {
                errors.push(format!("{}: {e}", entry.sku));
                continue;
            }
        };

        match normalize_product(&raw) {
            Ok((family, variants)) => families.push((family, variants)),
            Err(e) => errors.push(format!("{}: {e}", entry.sku)),
        }

        if stop::requested(redis, supplier_id).await? {
            return Ok(cancelled_result(families.len() as u64));
        }
    }

    report(ctx, job_id, "group", 45).await;
    // Grouping and hashing happen per-family inside filter_for_sync/upsert.

    report(ctx, job_id, "batch_hash_check", 60).await;
    let filter_result = filter_for_sync(&ctx.pool, supplier_id, families).await?;

    if stop::requested(redis, supplier_id).await? {
        return Ok(cancelled_result(filter_result.skipped_count));
    }

    report(ctx, job_id, "enqueue_families", 80).await;
    for pending in &filter_result.to_process {
        let payload = serde_json::json!({
            "supplier_id": supplier_id,
            "family_key": pending.family.family_key,
            "family": pending.family,
            "variants": pending.variants,
            "family_hash": pending.hash,
        });
        ctx.queue.enqueue(JobKind::ProductFamily, payload).await?;

        if stop::requested(redis, supplier_id).await? {
            break;
        }
    }

    report(ctx, job_id, "done", 100).await;

    Ok(SupplierSyncResult {
        processed: filter_result.to_process.len() as u64,
        skipped: filter_result.skipped_count,
        failed: errors.len() as u64,
        errors,
        cancelled: false,
    })
}

fn cancelled_result(processed: u64) -> SupplierSyncResult {
    SupplierSyncResult { processed, skipped: 0, failed: 0, errors: Vec::new(), cancelled: true }
}

async fn report(ctx: &WorkerContext, job_id: uuid::Uuid, step: &str, percent: u8) {
    let _ = ctx
        .queue
        .update_progress(job_id, &Progress { step: step.to_string(), percent })
        .await;
}
