//! Stop sentinel (spec.md §4.8): cooperative cancellation checked at safe
//! points by long-running workers.

use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::error::{AppError, Result};

const STOP_TTL_SECS: u64 = 300;
const STOP_PREFIX: &str = "sync:promidata:stop:";

pub async fn signal(redis: &mut ConnectionManager, supplier_id: &str) -> Result<()> {
    redis
        .set_ex::<_, _, ()>(stop_key(supplier_id), "1", STOP_TTL_SECS)
        .await
        .map_err(AppError::Redis)
}

/// Check the stop sentinel. Workers call this between manifest parse,
/// between family fetches, between family enqueues, and between image
/// batches (spec.md §4.8 safe points) — never mid-atomic-unit.
pub async fn requested(redis: &mut ConnectionManager, supplier_id: &str) -> Result<bool> {
    let exists: bool = redis.exists(stop_key(supplier_id)).await.map_err(AppError::Redis)?;
    Ok(exists)
}

pub async fn clear(redis: &mut ConnectionManager, supplier_id: &str) -> Result<()> {
    let _: i64 = redis.del(stop_key(supplier_id)).await.map_err(AppError::Redis)?;
    Ok(())
}

fn stop_key(supplier_id: &str) -> String {
    format!("{STOP_PREFIX}{supplier_id}")
}
