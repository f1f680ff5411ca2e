//! Control Plane (C8, spec.md §4.8): distributed locks, stop signals, and a
//! short-TTL stats cache, all backed by Redis — the one place in this engine
//! where Redis's TTL + atomic-CAS primitives are load-bearing rather than a
//! BullMQ stand-in (see [`crate::jobs`] for why the durable queue itself
//! lives in Postgres instead).

pub mod locks;
pub mod stats_cache;
pub mod stop;

use std::sync::Arc;

use redis::aio::ConnectionManager;

use stats_cache::StatsCache;

#[derive(Clone)]
pub struct ControlPlane {
    pub redis: ConnectionManager,
    pub stats: Arc<StatsCache>,
}

impl ControlPlane {
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis, stats: Arc::new(StatsCache::new()) }
    }
}
