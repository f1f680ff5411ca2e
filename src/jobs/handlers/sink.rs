//! Downstream Sinks handler (spec.md §2, §3): shared by the `index-upsert`
//! and `semantic-upsert` queues, dispatching on the job's own `kind` since
//! both queues are wired to this one handler in the worker dispatch table.

use serde::Deserialize;
use serde_json::Value;

use crate::db::products;
use crate::error::{AppError, Result};
use crate::jobs::{worker::WorkerContext, Job, JobKind};

#[derive(Debug, Deserialize)]
struct SinkPayload {
    family_key: String,
}

pub async fn run(ctx: &WorkerContext, job: &Job) -> Result<Value> {
    let payload: SinkPayload = serde_json::from_value(job.payload.clone())?;
    let product = products::get_by_sku(&ctx.pool, &payload.family_key)
        .await?
        .ok_or_else(|| AppError::not_found(format!("product {}", payload.family_key)))?;

    match job.kind {
        JobKind::IndexUpsert => {
            ctx.downstream.push_index(&product).await?;
        }
        JobKind::SemanticUpsert => {
            let upload = ctx.downstream.push_semantic(&product).await?;
            let hash = product.promidata_hash.as_deref().unwrap_or_default();
            products::update_gemini(&ctx.pool, &payload.family_key, &upload.file_uri, hash).await?;
        }
        other => {
            return Err(AppError::validation(format!(
                "sink handler invoked for unexpected job kind {other:?}"
            )));
        }
    }

    Ok(serde_json::json!({ "family_key": payload.family_key }))
}
