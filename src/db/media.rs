//! Media repository (spec.md §3 "Media", I7: at most one row per filename).

use sqlx::{Postgres, Transaction};

use crate::db::DbPool;
use crate::error::Result;
use crate::models::Media;

pub async fn find_by_filename(pool: &DbPool, filename: &str) -> Result<Option<Media>> {
    let row = sqlx::query_as::<_, Media>("SELECT * FROM media WHERE filename = $1")
        .bind(filename)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// Insert a media row if one doesn't already exist for `filename`; returns
/// the resulting row either way (dedup per I7).
pub async fn insert_if_absent(
    pool: &DbPool,
    filename: &str,
    url: &str,
    size: Option<i64>,
    hash: Option<&str>,
) -> Result<Media> {
    sqlx::query(
        r#"
        INSERT INTO media (filename, url, size, hash, created_at)
        VALUES ($1, $2, $3, $4, now())
        ON CONFLICT (filename) DO NOTHING
        "#,
    )
    .bind(filename)
    .bind(url)
    .bind(size)
    .bind(hash)
    .execute(pool)
    .await?;

    find_by_filename(pool, filename)
        .await?
        .ok_or_else(|| crate::error::AppError::Internal(anyhow::anyhow!("media row missing after insert")))
}

pub async fn find_by_filename_tx(
    tx: &mut Transaction<'_, Postgres>,
    filename: &str,
) -> Result<Option<crate::models::Media>> {
    let row = sqlx::query_as::<_, crate::models::Media>("SELECT * FROM media WHERE filename = $1")
        .bind(filename)
        .fetch_optional(&mut **tx)
        .await?;
    Ok(row)
}

pub async fn insert_if_absent_tx(
    tx: &mut Transaction<'_, Postgres>,
    filename: &str,
    url: &str,
    size: Option<i64>,
    hash: Option<&str>,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO media (filename, url, size, hash, created_at)
        VALUES ($1, $2, $3, $4, now())
        ON CONFLICT (filename) DO NOTHING
        "#,
    )
    .bind(filename)
    .bind(url)
    .bind(size)
    .bind(hash)
    .execute(&mut **tx)
    .await?;
    Ok(())
}
