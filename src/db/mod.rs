//! Relational store access (the Postgres half of spec.md §3/§6).
//!
//! Pool setup, migrations, and health check are carried over directly from
//! the original `db.rs`; repository modules below replace the original
//! banking-domain queries with the catalog schema this engine maintains.
//! Queries here are written with the runtime `sqlx::query_as` form rather
//! than the `query_as!` compile-time macro family: the macros require a live
//! database (or a checked-in `sqlx-data.json`) at compile time, which this
//! exercise has no way to produce (see DESIGN.md).

pub mod media;
pub mod products;
pub mod suppliers;
pub mod variants;

use std::time::Duration;

use sqlx::{Pool, Postgres};

pub type DbPool = Pool<Postgres>;

pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    tracing::info!("creating database connection pool");

    sqlx::postgres::PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .test_before_acquire(true)
        .connect(database_url)
        .await
}

pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::Error> {
    tracing::info!("running database migrations");
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("migrations completed");
    Ok(())
}

pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").fetch_one(pool).await?;
    Ok(())
}

pub fn pool_stats(pool: &DbPool) -> PoolStats {
    PoolStats {
        size: pool.size(),
        idle: pool.num_idle(),
        active: pool.size() - pool.num_idle(),
    }
}

#[derive(Debug, serde::Serialize)]
pub struct PoolStats {
    pub size: u32,
    pub idle: usize,
    pub active: u32,
}
