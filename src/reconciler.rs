//! Reconciler (C5, spec.md §4.5): hash-diff filtering and atomic family
//! upsert, with per-family failure isolation so one bad family doesn't sink
//! the rest of the sync.

use rust_decimal::Decimal;

use sqlx::{Postgres, Transaction};

use crate::db::{media, products, variants, DbPool};
use crate::error::Result;
use crate::grouping::group_by_color;
use crate::hashing::hash_family;
use crate::images::derive_filename;
use crate::normalize::{FamilyRecord, VariantRecord};

#[derive(Debug, Clone)]
pub struct PendingFamily {
    pub family: FamilyRecord,
    pub variants: Vec<VariantRecord>,
    pub hash: String,
}

#[derive(Debug)]
pub struct FilterResult {
    pub to_process: Vec<PendingFamily>,
    pub skipped_count: u64,
    pub efficiency: f64,
}

/// Compare incoming hashes against stored hashes in a single bulk lookup,
/// classifying each family as new/changed (`to_process`) or unchanged
/// (skipped). Efficiency = skipped / total (spec.md §4.5).
pub async fn filter_for_sync(
    pool: &DbPool,
    supplier: &str,
    families: Vec<(FamilyRecord, Vec<VariantRecord>)>,
) -> Result<FilterResult> {
    let total = families.len() as u64;

    let hashed: Vec<PendingFamily> = families
        .into_iter()
        .map(|(family, variants)| {
            let hash = hash_family(&family);
            PendingFamily { family, variants, hash }
        })
        .collect();

    let family_keys: Vec<String> = hashed.iter().map(|p| p.family.family_key.clone()).collect();
    let stored = products::lookup_hashes(pool, supplier, &family_keys).await?;

    let mut to_process = Vec::new();
    let mut skipped_count = 0u64;

    for pending in hashed {
        match stored.get(&pending.family.family_key) {
            Some(stored_hash) if *stored_hash == pending.hash => skipped_count += 1,
            _ => to_process.push(pending),
        }
    }

    let efficiency = if total == 0 { 0.0 } else { skipped_count as f64 / total as f64 };

    Ok(FilterResult { to_process, skipped_count, efficiency })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertKind {
    Created,
    Updated,
}

#[derive(Debug)]
pub struct UpsertOutcome {
    pub family_key: String,
    pub kind: UpsertKind,
    pub variant_count: usize,
}

/// A per-family failure that does not abort sibling families in the same
/// batch (spec.md §4.5 failure policy).
#[derive(Debug, thiserror::Error)]
#[error("family {family_key} failed in phase {phase}: {cause}")]
pub struct FamilyError {
    pub family_key: String,
    pub phase: String,
    pub cause: String,
}

/// Upsert one family and its variants atomically: product row, variant rows,
/// and derived aggregates all commit or roll back together.
pub async fn upsert_family(pool: &DbPool, pending: &PendingFamily) -> Result<UpsertOutcome> {
    let family = &pending.family;
    let grouped = group_by_color(pending.variants.clone());

    let mut tx = pool.begin().await?;

    let created = products::upsert_family_row(
        &mut tx,
        &family.family_key,
        &family.family_key,
        &family.supplier_sku,
        &family.supplier_code,
        &family.name,
        &family.description,
        &family.short_description,
        &family.model_name,
        &family.material,
        family.category.as_deref(),
        family.country_of_origin.as_deref(),
        family.delivery_time.as_deref(),
        &family.dimensions,
        &family.price_tiers,
        &pending.hash,
    )
    .await?;

    for group in &grouped {
        let v = &group.variant;

        // Resolve against already-downloaded Media rows so a dedup hit is
        // visible on the variant (and, for the family's first variant, on
        // `main_image`) immediately — without waiting on the async
        // image-upload job (spec.md §4.6: "this must happen immediately
        // from within C5's post-upsert step, not via the job queue, to
        // avoid an empty main image window"). Cache misses are left unset
        // here; the image job fills them in once it has downloaded and
        // uploaded the asset.
        let resolved_primary = resolve_dedup_url(&mut tx, v.primary_image.as_deref()).await?;
        let mut resolved_gallery = Vec::with_capacity(v.gallery_images.len());
        for url in &v.gallery_images {
            if let Some(hit) = resolve_dedup_url(&mut tx, Some(url)).await? {
                resolved_gallery.push(hit);
            }
        }

        variants::upsert(
            &mut tx,
            &v.sku,
            &family.family_key,
            v.color.as_deref(),
            v.hex_color.as_deref(),
            v.size.as_deref(),
            v.dimensions.length,
            v.dimensions.width,
            v.dimensions.height,
            v.diameter,
            v.dimensions.weight,
            resolved_primary.as_deref(),
            &resolved_gallery,
            group.is_primary_for_color,
        )
        .await?;
    }

    let aggregates = variants::aggregates_for_family(&mut tx, &family.family_key).await?;

    let first_color = grouped.first().and_then(|g| g.variant.color.clone());
    let main_image = variants::primary_image_for_first_color(&mut tx, &family.family_key, first_color.as_deref()).await?;

    let (price_min, price_max) = price_bounds(&family.price_tiers);

    products::write_aggregates(
        &mut tx,
        &family.family_key,
        main_image.as_deref(),
        &aggregates.colors,
        &aggregates.sizes,
        &aggregates.hex_colors,
        &aggregates.gallery_images,
        price_min,
        price_max,
    )
    .await?;

    tx.commit().await?;

    Ok(UpsertOutcome {
        family_key: family.family_key.clone(),
        kind: if created { UpsertKind::Created } else { UpsertKind::Updated },
        variant_count: grouped.len(),
    })
}

/// Looks up whether `source_url`'s derived filename already has a stored
/// Media row, returning its URL on a dedup hit and `None` on a miss.
async fn resolve_dedup_url(tx: &mut Transaction<'_, Postgres>, source_url: Option<&str>) -> Result<Option<String>> {
    let Some(source_url) = source_url else { return Ok(None) };
    let filename = derive_filename(source_url);
    Ok(media::find_by_filename_tx(tx, &filename).await?.map(|m| m.url))
}

fn price_bounds(tiers: &[crate::models::PriceTier]) -> (Option<Decimal>, Option<Decimal>) {
    let mut min: Option<Decimal> = None;
    let mut max: Option<Decimal> = None;
    for tier in tiers {
        min = Some(min.map_or(tier.price, |m| m.min(tier.price)));
        max = Some(max.map_or(tier.price, |m| m.max(tier.price)));
    }
    (min, max)
}

/// Upsert a batch of families, capturing per-family failures rather than
/// aborting the whole batch (spec.md §4.5).
pub async fn upsert_families(
    pool: &DbPool,
    pending: Vec<PendingFamily>,
) -> (Vec<UpsertOutcome>, Vec<FamilyError>) {
    let mut outcomes = Vec::new();
    let mut errors = Vec::new();

    for family in pending {
        match upsert_family(pool, &family).await {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => {
                let _ = products::rollback_hash(pool, &family.family.family_key, None).await;
                errors.push(FamilyError {
                    family_key: family.family.family_key.clone(),
                    phase: "upsert".to_string(),
                    cause: e.to_string(),
                });
            }
        }
    }

    (outcomes, errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PriceType;

    #[test]
    fn price_bounds_from_tiers() {
        let tiers = vec![
            crate::models::PriceTier { quantity: 1, price: Decimal::new(1000, 2), currency: "EUR".into(), price_type: PriceType::Selling },
            crate::models::PriceTier { quantity: 10, price: Decimal::new(800, 2), currency: "EUR".into(), price_type: PriceType::Selling },
        ];
        let (min, max) = price_bounds(&tiers);
        assert_eq!(min, Some(Decimal::new(800, 2)));
        assert_eq!(max, Some(Decimal::new(1000, 2)));
    }

    #[test]
    fn price_bounds_empty_is_none() {
        assert_eq!(price_bounds(&[]), (None, None));
    }
}
