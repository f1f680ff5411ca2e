//! `/sync/*` admin endpoints (spec.md §6): enqueue supplier syncs, list
//! active locks, and post cooperative stop signals.

use axum::extract::{Path, State};
use axum::response::Json;
use serde::{Deserialize, Serialize};

use crate::control::locks;
use crate::control::stop;
use crate::db::suppliers;
use crate::error::{AppError, Result};
use crate::jobs::JobKind;
use crate::routes::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct StartRequest {
    /// Omit to sync every active supplier (spec.md §6: "one supplier or all
    /// active suppliers").
    pub supplier_id: Option<String>,
    #[serde(default)]
    pub manual: bool,
}

#[derive(Debug, Serialize)]
pub struct StartResponse {
    pub mode: &'static str,
    pub job_ids: Vec<uuid::Uuid>,
}

/// `POST /sync/start`. A supplier already locked (a sync genuinely running)
/// or already queued is reported as a conflict rather than silently
/// enqueueing a duplicate (spec.md §8 S4: "exactly one job enqueued").
pub async fn start(State(state): State<AppState>, Json(req): Json<StartRequest>) -> Result<Json<StartResponse>> {
    let supplier_ids = match &req.supplier_id {
        Some(id) => vec![suppliers::get(&state.pool, id).await?.code],
        None => suppliers::list_active(&state.pool)
            .await?
            .into_iter()
            .map(|s| s.code)
            .collect(),
    };

    if supplier_ids.is_empty() {
        return Ok(Json(StartResponse { mode: "queued", job_ids: Vec::new() }));
    }

    let mut redis = state.control.redis.clone();
    let mut job_ids = Vec::with_capacity(supplier_ids.len());

    for supplier_id in &supplier_ids {
        if locks::is_locked(&mut redis, supplier_id).await? {
            if req.supplier_id.is_some() {
                return Err(AppError::LockHeld(supplier_id.clone()));
            }
            continue;
        }
        if state
            .queue
            .has_queued_or_active("supplier-sync", "supplier_id", supplier_id)
            .await?
        {
            if req.supplier_id.is_some() {
                return Err(AppError::LockHeld(supplier_id.clone()));
            }
            continue;
        }

        let payload = serde_json::json!({ "supplier_id": supplier_id, "manual": req.manual });
        let job_id = state.queue.enqueue(JobKind::SupplierSync, payload).await?;
        job_ids.push(job_id);
    }

    Ok(Json(StartResponse { mode: "queued", job_ids }))
}

#[derive(Debug, Serialize)]
pub struct ActiveResponse {
    pub supplier_ids: Vec<String>,
}

/// `GET /sync/active`: supplier ids with a currently held lock.
pub async fn active(State(state): State<AppState>) -> Result<Json<ActiveResponse>> {
    let mut redis = state.control.redis.clone();
    let supplier_ids = locks::list_active(&mut redis).await?;
    Ok(Json(ActiveResponse { supplier_ids }))
}

#[derive(Debug, Serialize)]
pub struct StopResponse {
    pub success: bool,
}

/// `POST /sync/stop/{supplier_id}`. Succeeds regardless of whether a sync is
/// actually running (spec.md §6), since the sentinel is harmless if nothing
/// is watching it.
pub async fn stop(State(state): State<AppState>, Path(supplier_id): Path<String>) -> Result<Json<StopResponse>> {
    let mut redis = state.control.redis.clone();
    stop::signal(&mut redis, &supplier_id).await?;
    Ok(Json(StopResponse { success: true }))
}
