//! Image Pipeline (C6, spec.md §4.6): dedup-by-filename, download via the
//! upstream client, upload to the object store, attach to the owning
//! variant, and — for the first variant of a family — set the product's
//! `main_image` immediately to avoid an empty main-image window.

use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::db::{media, DbPool};
use crate::error::Result;
use crate::objectstore::ObjectStore;
use crate::upstream::UpstreamClient;

pub const PER_DOWNLOAD_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);
pub const LARGE_MASTER_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageRole {
    Primary,
    Gallery,
}

/// The `image-upload` job payload contract (spec.md §4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageJob {
    pub source_url: String,
    pub owner_variant_sku: String,
    pub role: ImageRole,
    pub is_first_variant_of_family: bool,
    pub family_key: String,
}

/// Transfer and attach one image, reusing the existing `Media` row on a
/// filename dedup hit rather than re-downloading (spec.md §4.6).
pub async fn process_image(
    pool: &DbPool,
    upstream: &UpstreamClient,
    store: &ObjectStore,
    job: &ImageJob,
) -> Result<String> {
    let filename = derive_filename(&job.source_url);

    let url = match media::find_by_filename(pool, &filename).await? {
        Some(existing) => existing.url,
        None => {
            let timeout = if job.source_url.contains("master") {
                LARGE_MASTER_TIMEOUT
            } else {
                PER_DOWNLOAD_TIMEOUT
            };
            let bytes = upstream.fetch_bytes_with_timeout(&job.source_url, timeout).await?;
            let size = bytes.len() as i64;
            let hash = hex_sha256(&bytes);
            let content_type = content_type_for(&filename);
            let uploaded_url = store.put(&filename, bytes, content_type).await?;
            media::insert_if_absent(pool, &filename, &uploaded_url, Some(size), Some(&hash))
                .await?
                .url
        }
    };

    attach_to_variant(pool, &job.owner_variant_sku, job.role, &url).await?;

    if job.is_first_variant_of_family && job.role == ImageRole::Primary {
        set_product_main_image(pool, &job.family_key, &url).await?;
    }

    Ok(url)
}

/// Attachment is a set, not an append, so a re-run is always idempotent
/// (spec.md §4.6).
async fn attach_to_variant(pool: &DbPool, variant_sku: &str, role: ImageRole, url: &str) -> Result<()> {
    match role {
        ImageRole::Primary => {
            sqlx::query("UPDATE product_variants SET primary_image = $2, updated_at = now() WHERE sku = $1")
                .bind(variant_sku)
                .bind(url)
                .execute(pool)
                .await?;
        }
        ImageRole::Gallery => {
            sqlx::query(
                r#"
                UPDATE product_variants
                SET gallery_images = array(SELECT DISTINCT unnest(gallery_images || ARRAY[$2::text])),
                    updated_at = now()
                WHERE sku = $1
                "#,
            )
            .bind(variant_sku)
            .bind(url)
            .execute(pool)
            .await?;
        }
    }
    Ok(())
}

async fn set_product_main_image(pool: &DbPool, family_key: &str, url: &str) -> Result<()> {
    sqlx::query("UPDATE products SET main_image = $2, updated_at = now() WHERE sku = $1")
        .bind(family_key)
        .bind(url)
        .execute(pool)
        .await?;
    Ok(())
}

pub fn derive_filename(source_url: &str) -> String {
    let path = source_url.split(['?', '#']).next().unwrap_or(source_url);
    Path::new(path)
        .file_name()
        .and_then(|f| f.to_str())
        .unwrap_or(path)
        .to_string()
}

fn content_type_for(filename: &str) -> &'static str {
    let lower = filename.to_lowercase();
    if lower.ends_with(".png") {
        "image/png"
    } else if lower.ends_with(".webp") {
        "image/webp"
    } else if lower.ends_with(".gif") {
        "image/gif"
    } else {
        "image/jpeg"
    }
}

fn hex_sha256(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_filename_from_url() {
        assert_eq!(derive_filename("https://cdn.example.com/img/ABC123.jpg?v=2"), "ABC123.jpg");
    }

    #[test]
    fn content_type_matches_extension() {
        assert_eq!(content_type_for("a.png"), "image/png");
        assert_eq!(content_type_for("a.webp"), "image/webp");
        assert_eq!(content_type_for("a.jpg"), "image/jpeg");
    }
}
