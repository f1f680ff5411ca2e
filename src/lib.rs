//! Promidata Synchronization Engine — library crate.
//!
//! Wires together the eight components of spec.md §2: upstream client
//! (`upstream`), manifest parser (`upstream::manifest`), product normalizer
//! (`normalize`), grouping & hashing (`grouping`, `hashing`), reconciler
//! (`reconciler`), image pipeline (`images`, `objectstore`), job pipeline
//! (`jobs`), and lock & control plane (`control`). `main.rs` assembles these
//! into a runnable binary (config load, pool/client setup, cron
//! registration, axum server, graceful shutdown).

pub mod config;
pub mod control;
pub mod cron;
pub mod db;
pub mod downstream;
pub mod error;
pub mod grouping;
pub mod hashing;
pub mod images;
pub mod jobs;
pub mod middleware;
pub mod models;
pub mod normalize;
pub mod objectstore;
pub mod reconciler;
pub mod routes;
pub mod upstream;

pub use config::Config;
pub use db::DbPool;
pub use error::{AppError, Result};
