//! `image-upload` queue handler (spec.md §4.6): thin wrapper dispatching the
//! job payload straight into [`crate::images::process_image`].

use serde_json::Value;

use crate::error::Result;
use crate::images::{self, ImageJob};
use crate::jobs::{worker::WorkerContext, Job};

pub async fn run(ctx: &WorkerContext, job: &Job) -> Result<Value> {
    let image_job: ImageJob = serde_json::from_value(job.payload.clone())?;
    let url = images::process_image(&ctx.pool, &ctx.upstream, &ctx.object_store, &image_job).await?;
    Ok(serde_json::json!({ "url": url }))
}
