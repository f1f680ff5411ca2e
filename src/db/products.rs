//! Product (family) repository (spec.md §3 "Product (family)", §4.5 C5).

use std::collections::HashMap;

use chrono::Utc;
use sqlx::{Postgres, Transaction};

use crate::db::DbPool;
use crate::error::Result;
use crate::models::{Dimensions, Multilingual, PriceTier, Product};

/// Bulk lookup of stored hashes for a set of family keys under one supplier,
/// in a single query (spec.md §4.5: "Performs a single bulk lookup").
pub async fn lookup_hashes(
    pool: &DbPool,
    supplier: &str,
    family_keys: &[String],
) -> Result<HashMap<String, String>> {
    if family_keys.is_empty() {
        return Ok(HashMap::new());
    }

    let rows: Vec<(String, Option<String>)> = sqlx::query_as(
        "SELECT sku, promidata_hash FROM products WHERE supplier = $1 AND sku = ANY($2)",
    )
    .bind(supplier)
    .bind(family_keys)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .filter_map(|(sku, hash)| hash.map(|h| (sku, h)))
        .collect())
}

pub async fn get_by_sku(pool: &DbPool, sku: &str) -> Result<Option<Product>> {
    let row = sqlx::query_as::<_, ProductRow>("SELECT * FROM products WHERE sku = $1")
        .bind(sku)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(ProductRow::into_product))
}

/// Insert-or-update the family row within the caller's transaction. Does not
/// touch derived aggregates; see [`write_aggregates`], called after variants
/// are upserted (spec.md §4.5: "After variant upsert, compute and write...
/// This write is part of the family transaction").
pub async fn upsert_family_row(
    tx: &mut Transaction<'_, Postgres>,
    family_key: &str,
    a_number: &str,
    supplier_sku: &str,
    supplier: &str,
    name: &Multilingual,
    description: &Multilingual,
    short_description: &Multilingual,
    model_name: &Multilingual,
    material: &Multilingual,
    category: Option<&str>,
    country_of_origin: Option<&str>,
    delivery_time: Option<&str>,
    dimensions: &Dimensions,
    price_tiers: &[PriceTier],
    hash: &str,
) -> Result<bool> {
    let name_json = serde_json::to_value(name)?;
    let description_json = serde_json::to_value(description)?;
    let short_description_json = serde_json::to_value(short_description)?;
    let model_name_json = serde_json::to_value(model_name)?;
    let material_json = serde_json::to_value(material)?;
    let dimensions_json = serde_json::to_value(dimensions)?;
    let price_tiers_json = serde_json::to_value(price_tiers)?;

    let existing: Option<(String,)> = sqlx::query_as("SELECT sku FROM products WHERE sku = $1")
        .bind(family_key)
        .fetch_optional(&mut **tx)
        .await?;
    let created = existing.is_none();

    sqlx::query(
        r#"
        INSERT INTO products (
            sku, a_number, supplier_sku, supplier, name, description, short_description,
            model_name, material, category, country_of_origin, delivery_time, dimensions,
            price_tiers, promidata_hash, last_synced_at, is_active, created_at, updated_at
        ) VALUES (
            $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, true, now(), now()
        )
        ON CONFLICT (sku) DO UPDATE SET
            a_number = EXCLUDED.a_number,
            supplier_sku = EXCLUDED.supplier_sku,
            supplier = EXCLUDED.supplier,
            name = EXCLUDED.name,
            description = EXCLUDED.description,
            short_description = EXCLUDED.short_description,
            model_name = EXCLUDED.model_name,
            material = EXCLUDED.material,
            category = EXCLUDED.category,
            country_of_origin = EXCLUDED.country_of_origin,
            delivery_time = EXCLUDED.delivery_time,
            dimensions = EXCLUDED.dimensions,
            price_tiers = EXCLUDED.price_tiers,
            promidata_hash = EXCLUDED.promidata_hash,
            last_synced_at = EXCLUDED.last_synced_at,
            is_active = true,
            updated_at = now()
        "#,
    )
    .bind(family_key)
    .bind(a_number)
    .bind(supplier_sku)
    .bind(supplier)
    .bind(name_json)
    .bind(description_json)
    .bind(short_description_json)
    .bind(model_name_json)
    .bind(material_json)
    .bind(category)
    .bind(country_of_origin)
    .bind(delivery_time)
    .bind(dimensions_json)
    .bind(price_tiers_json)
    .bind(hash)
    .bind(Utc::now())
    .execute(&mut **tx)
    .await?;

    Ok(created)
}

/// Roll a family's stored hash back to `previous_hash` so the next sync
/// re-attempts it (spec.md §4.5 compensation policy for non-transactional
/// stores — here used defensively even though the store is transactional).
pub async fn rollback_hash(pool: &DbPool, family_key: &str, previous_hash: Option<&str>) -> Result<()> {
    sqlx::query("UPDATE products SET promidata_hash = $2, updated_at = now() WHERE sku = $1")
        .bind(family_key)
        .bind(previous_hash)
        .execute(pool)
        .await?;
    Ok(())
}

/// Write derived aggregates for a family (spec.md §3 I2, §4.5).
#[allow(clippy::too_many_arguments)]
pub async fn write_aggregates(
    tx: &mut Transaction<'_, Postgres>,
    family_key: &str,
    main_image: Option<&str>,
    available_colors: &[String],
    available_sizes: &[String],
    hex_colors: &[String],
    gallery_images: &[String],
    price_min: Option<rust_decimal::Decimal>,
    price_max: Option<rust_decimal::Decimal>,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE products SET
            main_image = $2,
            available_colors = $3,
            available_sizes = $4,
            hex_colors = $5,
            gallery_images = $6,
            price_min = $7,
            price_max = $8,
            updated_at = now()
        WHERE sku = $1
        "#,
    )
    .bind(family_key)
    .bind(main_image)
    .bind(available_colors)
    .bind(available_sizes)
    .bind(hex_colors)
    .bind(gallery_images)
    .bind(price_min)
    .bind(price_max)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Family keys updated since `since` whose semantic-store sync has drifted
/// from their current `promidata_hash` (cron §6 "incremental re-enqueue for
/// recently-updated products every 12h" — catches products whose downstream
/// sink job never ran or failed after the enclosing family job completed).
pub async fn list_pending_semantic_sync(pool: &DbPool, since: chrono::DateTime<Utc>) -> Result<Vec<String>> {
    let skus: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT sku FROM products
        WHERE updated_at >= $1
          AND promidata_hash IS NOT NULL
          AND gemini_synced_hash IS DISTINCT FROM promidata_hash
        ORDER BY updated_at
        "#,
    )
    .bind(since)
    .fetch_all(pool)
    .await?;
    Ok(skus)
}

/// Persist the semantic store's upload reference after a successful push
/// (spec.md §3: `gemini_file_uri`/`gemini_synced_hash`, "set by downstream sink").
pub async fn update_gemini(pool: &DbPool, family_key: &str, gemini_file_uri: &str, gemini_synced_hash: &str) -> Result<()> {
    sqlx::query(
        "UPDATE products SET gemini_file_uri = $2, gemini_synced_hash = $3, updated_at = now() WHERE sku = $1",
    )
    .bind(family_key)
    .bind(gemini_file_uri)
    .bind(gemini_synced_hash)
    .execute(pool)
    .await?;
    Ok(())
}

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    sku: String,
    a_number: String,
    supplier_sku: String,
    supplier: String,
    name: serde_json::Value,
    description: serde_json::Value,
    short_description: serde_json::Value,
    model_name: serde_json::Value,
    material: serde_json::Value,
    category: Option<String>,
    main_image: Option<String>,
    gallery_images: Vec<String>,
    dimensions: serde_json::Value,
    price_tiers: serde_json::Value,
    country_of_origin: Option<String>,
    delivery_time: Option<String>,
    promidata_hash: Option<String>,
    last_synced_at: Option<chrono::DateTime<Utc>>,
    is_active: bool,
    available_colors: Vec<String>,
    available_sizes: Vec<String>,
    hex_colors: Vec<String>,
    price_min: Option<rust_decimal::Decimal>,
    price_max: Option<rust_decimal::Decimal>,
    gemini_file_uri: Option<String>,
    gemini_synced_hash: Option<String>,
    created_at: chrono::DateTime<Utc>,
    updated_at: chrono::DateTime<Utc>,
}

impl ProductRow {
    fn into_product(self) -> Product {
        Product {
            sku: self.sku,
            a_number: self.a_number,
            supplier_sku: self.supplier_sku,
            supplier: self.supplier,
            name: serde_json::from_value(self.name).unwrap_or_default(),
            description: serde_json::from_value(self.description).unwrap_or_default(),
            short_description: serde_json::from_value(self.short_description).unwrap_or_default(),
            model_name: serde_json::from_value(self.model_name).unwrap_or_default(),
            material: serde_json::from_value(self.material).unwrap_or_default(),
            categories: self.category.clone().into_iter().collect(),
            category: self.category,
            main_image: self.main_image,
            gallery_images: self.gallery_images,
            price_tiers: serde_json::from_value(self.price_tiers).unwrap_or_default(),
            dimensions: serde_json::from_value(self.dimensions).unwrap_or_default(),
            country_of_origin: self.country_of_origin,
            delivery_time: self.delivery_time,
            promidata_hash: self.promidata_hash,
            last_synced_at: self.last_synced_at,
            is_active: self.is_active,
            available_colors: self.available_colors,
            available_sizes: self.available_sizes,
            hex_colors: self.hex_colors,
            price_min: self.price_min,
            price_max: self.price_max,
            gemini_file_uri: self.gemini_file_uri,
            gemini_synced_hash: self.gemini_synced_hash,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}
