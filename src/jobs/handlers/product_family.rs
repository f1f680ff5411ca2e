//! `product-family` queue handler (spec.md §4.7): reconcile one family and
//! its variants, then fan out the follow-on work the family's upsert
//! unblocks — per-image jobs (§4.6) and the two downstream sink jobs (§2).

use serde::Deserialize;
use serde_json::Value;

use crate::error::Result;
use crate::images::{ImageJob, ImageRole};
use crate::jobs::{sinks, worker::WorkerContext, Job, JobKind};
use crate::normalize::{FamilyRecord, VariantRecord};
use crate::reconciler::{self, PendingFamily, UpsertKind};

/// `supplier_id` and `family_key` also ride along in the payload but are
/// redundant with `family.family_key`, so they're left out here and just
/// ignored on decode.
#[derive(Debug, Deserialize)]
pub struct ProductFamilyPayload {
    pub family: FamilyRecord,
    pub variants: Vec<VariantRecord>,
    pub family_hash: String,
}

pub async fn run(ctx: &WorkerContext, job: &Job) -> Result<Value> {
    let payload: ProductFamilyPayload = serde_json::from_value(job.payload.clone())?;

    let pending = PendingFamily {
        family: payload.family,
        variants: payload.variants,
        hash: payload.family_hash,
    };

    let outcome = reconciler::upsert_family(&ctx.pool, &pending).await?;

    enqueue_image_jobs(ctx, &pending).await?;
    sinks::enqueue_index_upsert(&ctx.queue, &pending.family.family_key).await?;
    sinks::enqueue_semantic_upsert(&ctx.queue, &pending.family.family_key).await?;

    Ok(serde_json::json!({
        "family_key": outcome.family_key,
        "kind": match outcome.kind {
            UpsertKind::Created => "created",
            UpsertKind::Updated => "updated",
        },
        "variant_count": outcome.variant_count,
    }))
}

/// One `image-upload` job per variant image, carrying the §4.6 contract
/// verbatim. `is_first_variant_of_family` is true only for the family's
/// overall first variant (feed order), not the first variant of each color.
async fn enqueue_image_jobs(ctx: &WorkerContext, pending: &PendingFamily) -> Result<()> {
    for (index, variant) in pending.variants.iter().enumerate() {
        let is_first_variant_of_family = index == 0;

        if let Some(url) = &variant.primary_image {
            enqueue_one(ctx, pending, variant, url, ImageRole::Primary, is_first_variant_of_family).await?;
        }

        for url in &variant.gallery_images {
            enqueue_one(ctx, pending, variant, url, ImageRole::Gallery, is_first_variant_of_family).await?;
        }
    }
    Ok(())
}

async fn enqueue_one(
    ctx: &WorkerContext,
    pending: &PendingFamily,
    variant: &VariantRecord,
    source_url: &str,
    role: ImageRole,
    is_first_variant_of_family: bool,
) -> Result<()> {
    let job = ImageJob {
        source_url: source_url.to_string(),
        owner_variant_sku: variant.sku.clone(),
        role,
        is_first_variant_of_family,
        family_key: pending.family.family_key.clone(),
    };
    ctx.queue.enqueue(JobKind::ImageUpload, serde_json::to_value(job)?).await?;
    Ok(())
}
