//! Producer-side enqueue helpers for the downstream sink queues (spec.md §2
//! "Downstream Sinks": "fire-and-forget queues"). Called from the
//! `product-family` handler once a family's upsert has committed.

use serde_json::json;

use crate::error::Result;
use crate::jobs::{queue::JobQueue, JobKind};

pub async fn enqueue_index_upsert(queue: &JobQueue, family_key: &str) -> Result<()> {
    queue.enqueue(JobKind::IndexUpsert, json!({ "family_key": family_key })).await?;
    Ok(())
}

pub async fn enqueue_semantic_upsert(queue: &JobQueue, family_key: &str) -> Result<()> {
    queue.enqueue(JobKind::SemanticUpsert, json!({ "family_key": family_key })).await?;
    Ok(())
}
