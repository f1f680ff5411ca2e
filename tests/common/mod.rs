//! Shared setup for integration tests that need a live Postgres/Redis.
//!
//! Every test in this directory is `#[ignore]`d: they require
//! `TEST_DATABASE_URL` and `TEST_REDIS_URL` pointing at throwaway instances
//! (e.g. `docker compose up postgres redis` in CI), and run migrations
//! against whatever database they're given — never point these at anything
//! you care about.

use promidata_sync::db::DbPool;

pub async fn test_pool() -> DbPool {
    let url = std::env::var("TEST_DATABASE_URL")
        .expect("set TEST_DATABASE_URL to a throwaway Postgres instance to run these tests");
    let pool = promidata_sync::db::create_pool(&url)
        .await
        .expect("failed to connect to TEST_DATABASE_URL");
    promidata_sync::db::run_migrations(&pool)
        .await
        .expect("failed to run migrations against TEST_DATABASE_URL");
    pool
}

pub async fn test_redis() -> redis::aio::ConnectionManager {
    let url = std::env::var("TEST_REDIS_URL")
        .expect("set TEST_REDIS_URL to a throwaway Redis instance to run these tests");
    let client = redis::Client::open(url).expect("invalid TEST_REDIS_URL");
    redis::aio::ConnectionManager::new(client)
        .await
        .expect("failed to connect to TEST_REDIS_URL")
}

/// A unique-enough identifier so parallel test runs don't collide on unique
/// columns (`suppliers.code`, `products.sku`, `media.filename`).
pub fn unique(prefix: &str) -> String {
    format!("{prefix}-{}", uuid::Uuid::new_v4().simple())
}
