//! Typed configuration loaded from the environment (spec.md §6).

use std::time::Duration;

use crate::error::{AppError, Result};

/// All environment-derived configuration for one process.
///
/// Loaded once at startup via [`Config::from_env`]; missing or malformed
/// required values are a fatal `ConfigError` (exit code 1, per spec).
#[derive(Debug, Clone)]
pub struct Config {
    pub upstream_base_url: String,
    pub db_dsn: String,
    pub redis_url: String,

    pub object_store_access_key: String,
    pub object_store_secret: String,
    pub object_store_bucket: String,
    pub object_store_endpoint: String,
    pub object_store_public_url: String,

    pub concurrency_families: usize,
    pub concurrency_images: usize,
    pub concurrency_suppliers: usize,

    pub timeout_supplier: Duration,
    pub timeout_family: Duration,
    pub timeout_image: Duration,

    pub lock_ttl: Duration,
    pub stop_ttl: Duration,

    pub search_index_url: Option<String>,
    pub semantic_store_url: Option<String>,

    pub log_level: String,

    pub host: String,
    pub port: u16,
    pub admin_token: String,
    pub run_migrations: bool,
    pub graceful_shutdown: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            upstream_base_url: required("UPSTREAM_BASE_URL")?,
            db_dsn: required("DB_DSN")?,
            redis_url: required("REDIS_URL")?,

            object_store_access_key: required("OBJECT_STORE_ACCESS_KEY")?,
            object_store_secret: required("OBJECT_STORE_SECRET")?,
            object_store_bucket: required("OBJECT_STORE_BUCKET")?,
            object_store_endpoint: required("OBJECT_STORE_ENDPOINT")?,
            object_store_public_url: required("OBJECT_STORE_PUBLIC_URL")?,

            concurrency_families: int_default("CONCURRENCY_FAMILIES", 3)?,
            concurrency_images: int_default("CONCURRENCY_IMAGES", 10)?,
            concurrency_suppliers: 1,

            timeout_supplier: Duration::from_millis(int_default("TIMEOUT_SUPPLIER_MS", 1_800_000)? as u64),
            timeout_family: Duration::from_millis(int_default("TIMEOUT_FAMILY_MS", 300_000)? as u64),
            timeout_image: Duration::from_millis(int_default("TIMEOUT_IMAGE_MS", 120_000)? as u64),

            lock_ttl: Duration::from_millis(int_default("LOCK_TTL_MS", 3_600_000)? as u64),
            stop_ttl: Duration::from_millis(int_default("STOP_TTL_MS", 300_000)? as u64),

            search_index_url: std::env::var("SEARCH_INDEX_URL").ok(),
            semantic_store_url: std::env::var("SEMANTIC_STORE_URL").ok(),

            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),

            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: int_default("PORT", 8080)? as u16,
            admin_token: required("ADMIN_TOKEN")?,
            run_migrations: std::env::var("RUN_MIGRATIONS")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            graceful_shutdown: Duration::from_millis(int_default("GRACEFUL_SHUTDOWN_MS", 30_000)? as u64),
        })
    }
}

fn required(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| AppError::Config(format!("{key} must be set")))
}

fn int_default(key: &str, default: i64) -> Result<i64> {
    match std::env::var(key) {
        Ok(v) => v
            .parse::<i64>()
            .map_err(|_| AppError::Config(format!("{key} must be an integer"))),
        Err(_) => Ok(default),
    }
}
