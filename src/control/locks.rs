//! Per-supplier sync locks (spec.md §4.8): `SET NX EX` acquisition, Lua
//! compare-and-delete release, `SCAN`-based enumeration (never `KEYS`, which
//! managed Redis variants disable for bulk listing).

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use uuid::Uuid;

use crate::error::{AppError, Result};

const LOCK_TTL_SECS: u64 = 3600;
const LOCK_PREFIX: &str = "sync:promidata:lock:";

/// Released by comparing the stored holder id before deleting, so a worker
/// can never release a lock that has since been claimed by someone else
/// after its own lease expired.
const RELEASE_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

pub struct SupplierLock {
    pub supplier_id: String,
    pub holder_id: String,
}

/// Attempt to acquire the lock for `supplier_id`. Returns `None` if another
/// holder already has it.
pub async fn acquire(redis: &mut ConnectionManager, supplier_id: &str) -> Result<Option<SupplierLock>> {
    let holder_id = Uuid::new_v4().to_string();
    let key = lock_key(supplier_id);

    let set: Option<String> = redis::cmd("SET")
        .arg(&key)
        .arg(&holder_id)
        .arg("NX")
        .arg("EX")
        .arg(LOCK_TTL_SECS)
        .query_async(redis)
        .await
        .map_err(AppError::Redis)?;

    Ok(set.map(|_| SupplierLock { supplier_id: supplier_id.to_string(), holder_id }))
}

pub async fn release(redis: &mut ConnectionManager, lock: &SupplierLock) -> Result<bool> {
    let key = lock_key(&lock.supplier_id);
    let script = redis::Script::new(RELEASE_SCRIPT);
    let deleted: i32 = script
        .key(&key)
        .arg(&lock.holder_id)
        .invoke_async(redis)
        .await
        .map_err(AppError::Redis)?;
    Ok(deleted == 1)
}

/// List supplier ids with an active lock, via cursor-based `SCAN` rather
/// than `KEYS` (spec.md §4.8).
pub async fn list_active(redis: &mut ConnectionManager) -> Result<Vec<String>> {
    let mut cursor: u64 = 0;
    let mut supplier_ids = Vec::new();

    loop {
        let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(format!("{LOCK_PREFIX}*"))
            .arg("COUNT")
            .arg(100)
            .query_async(redis)
            .await
            .map_err(AppError::Redis)?;

        for key in keys {
            if let Some(supplier_id) = key.strip_prefix(LOCK_PREFIX) {
                supplier_ids.push(supplier_id.to_string());
            }
        }

        cursor = next_cursor;
        if cursor == 0 {
            break;
        }
    }

    supplier_ids.sort();
    supplier_ids.dedup();
    Ok(supplier_ids)
}

pub async fn is_locked(redis: &mut ConnectionManager, supplier_id: &str) -> Result<bool> {
    let exists: bool = redis.exists(lock_key(supplier_id)).await.map_err(AppError::Redis)?;
    Ok(exists)
}

fn lock_key(supplier_id: &str) -> String {
    format!("{LOCK_PREFIX}{supplier_id}")
}
