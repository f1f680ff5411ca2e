//! ProductVariant repository (spec.md §3 "ProductVariant", §4.5 C5).

use sqlx::{Postgres, Transaction};

use crate::error::Result;

/// Upsert one variant by `sku` within the caller's transaction. On a SKU
/// collision with a different family, the variant is re-parented to
/// `product_sku` (spec.md §4.5: "on SKU collision across families, the
/// existing variant is re-parented to the new family").
#[allow(clippy::too_many_arguments)]
pub async fn upsert(
    tx: &mut Transaction<'_, Postgres>,
    sku: &str,
    product_sku: &str,
    color: Option<&str>,
    hex_color: Option<&str>,
    size: Option<&str>,
    dimensions_length: Option<f64>,
    dimensions_width: Option<f64>,
    dimensions_height: Option<f64>,
    dimensions_diameter: Option<f64>,
    dimensions_weight: Option<f64>,
    primary_image: Option<&str>,
    gallery_images: &[String],
    is_primary_for_color: bool,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO product_variants (
            sku, product_sku, color, hex_color, size,
            dimensions_length, dimensions_width, dimensions_height, dimensions_diameter, dimensions_weight,
            primary_image, gallery_images, is_primary_for_color, is_active, created_at, updated_at
        ) VALUES (
            $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, true, now(), now()
        )
        ON CONFLICT (sku) DO UPDATE SET
            product_sku = EXCLUDED.product_sku,
            color = EXCLUDED.color,
            hex_color = EXCLUDED.hex_color,
            size = EXCLUDED.size,
            dimensions_length = EXCLUDED.dimensions_length,
            dimensions_width = EXCLUDED.dimensions_width,
            dimensions_height = EXCLUDED.dimensions_height,
            dimensions_diameter = EXCLUDED.dimensions_diameter,
            dimensions_weight = EXCLUDED.dimensions_weight,
            primary_image = EXCLUDED.primary_image,
            gallery_images = EXCLUDED.gallery_images,
            is_primary_for_color = EXCLUDED.is_primary_for_color,
            is_active = true,
            updated_at = now()
        "#,
    )
    .bind(sku)
    .bind(product_sku)
    .bind(color)
    .bind(hex_color)
    .bind(size)
    .bind(dimensions_length)
    .bind(dimensions_width)
    .bind(dimensions_height)
    .bind(dimensions_diameter)
    .bind(dimensions_weight)
    .bind(primary_image)
    .bind(gallery_images)
    .bind(is_primary_for_color)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Distinct colors/sizes/hex colors for a family's *live* variants, used to
/// compute the product's derived aggregates (spec.md §3 I2).
pub struct VariantAggregates {
    pub colors: Vec<String>,
    pub sizes: Vec<String>,
    pub hex_colors: Vec<String>,
    pub gallery_images: Vec<String>,
}

pub async fn aggregates_for_family(
    tx: &mut Transaction<'_, Postgres>,
    product_sku: &str,
) -> Result<VariantAggregates> {
    let colors: Vec<String> = sqlx::query_scalar(
        "SELECT DISTINCT color FROM product_variants WHERE product_sku = $1 AND is_active = true AND color IS NOT NULL ORDER BY color",
    )
    .bind(product_sku)
    .fetch_all(&mut **tx)
    .await?;

    let sizes: Vec<String> = sqlx::query_scalar(
        "SELECT DISTINCT size FROM product_variants WHERE product_sku = $1 AND is_active = true AND size IS NOT NULL ORDER BY size",
    )
    .bind(product_sku)
    .fetch_all(&mut **tx)
    .await?;

    let hex_colors: Vec<String> = sqlx::query_scalar(
        "SELECT DISTINCT hex_color FROM product_variants WHERE product_sku = $1 AND is_active = true AND hex_color IS NOT NULL ORDER BY hex_color",
    )
    .bind(product_sku)
    .fetch_all(&mut **tx)
    .await?;

    let gallery_rows: Vec<Vec<String>> = sqlx::query_scalar(
        "SELECT gallery_images FROM product_variants WHERE product_sku = $1 AND is_active = true ORDER BY created_at",
    )
    .bind(product_sku)
    .fetch_all(&mut **tx)
    .await?;

    let mut gallery_images = Vec::new();
    for row in gallery_rows {
        for url in row {
            if !gallery_images.contains(&url) {
                gallery_images.push(url);
            }
        }
    }

    Ok(VariantAggregates { colors, sizes, hex_colors, gallery_images })
}

/// The primary variant's primary image for the first color seen, used to set
/// `main_image` (spec.md §3 I4).
pub async fn primary_image_for_first_color(
    tx: &mut Transaction<'_, Postgres>,
    product_sku: &str,
    first_color: Option<&str>,
) -> Result<Option<String>> {
    let row: Option<(Option<String>,)> = sqlx::query_as(
        r#"
        SELECT primary_image FROM product_variants
        WHERE product_sku = $1 AND is_active = true AND is_primary_for_color = true
          AND color IS NOT DISTINCT FROM $2
        LIMIT 1
        "#,
    )
    .bind(product_sku)
    .bind(first_color)
    .fetch_optional(&mut **tx)
    .await?;

    Ok(row.and_then(|(img,)| img))
}
