//! Supplier repository (spec.md §3 "Supplier").
//!
//! Suppliers are bootstrapped once from a static list and thereafter mutated
//! only by the engine's own event handlers on job completion/failure.

use chrono::Utc;

use crate::db::DbPool;
use crate::error::Result;
use crate::models::Supplier;

pub async fn bootstrap(pool: &DbPool, codes: &[&str]) -> Result<()> {
    for code in codes {
        sqlx::query(
            r#"
            INSERT INTO suppliers (code, is_active, auto_import, last_sync_status, created_at, updated_at)
            VALUES ($1, true, true, 'idle', now(), now())
            ON CONFLICT (code) DO NOTHING
            "#,
        )
        .bind(code)
        .execute(pool)
        .await?;
    }
    Ok(())
}

pub async fn list_active(pool: &DbPool) -> Result<Vec<Supplier>> {
    let rows = sqlx::query_as::<_, Supplier>(
        "SELECT * FROM suppliers WHERE is_active = true ORDER BY code",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn get(pool: &DbPool, code: &str) -> Result<Supplier> {
    sqlx::query_as::<_, Supplier>("SELECT * FROM suppliers WHERE code = $1")
        .bind(code)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| crate::error::AppError::not_found(format!("supplier {code}")))
}

pub async fn mark_running(pool: &DbPool, code: &str) -> Result<()> {
    sqlx::query(
        "UPDATE suppliers SET last_sync_status = 'running', last_sync_message = NULL, updated_at = now() WHERE code = $1",
    )
    .bind(code)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn mark_completed(pool: &DbPool, code: &str, message: Option<&str>) -> Result<()> {
    sqlx::query(
        "UPDATE suppliers SET last_sync_status = 'completed', last_sync_message = $2, last_sync_at = $3, updated_at = now() WHERE code = $1",
    )
    .bind(code)
    .bind(message)
    .bind(Utc::now())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn mark_failed(pool: &DbPool, code: &str, message: &str) -> Result<()> {
    sqlx::query(
        "UPDATE suppliers SET last_sync_status = 'failed', last_sync_message = $2, updated_at = now() WHERE code = $1",
    )
    .bind(code)
    .bind(message)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn mark_cancelled(pool: &DbPool, code: &str, message: &str) -> Result<()> {
    sqlx::query(
        "UPDATE suppliers SET last_sync_status = 'cancelled', last_sync_message = $2, updated_at = now() WHERE code = $1",
    )
    .bind(code)
    .bind(message)
    .execute(pool)
    .await?;
    Ok(())
}
