//! Liveness/readiness endpoints (spec.md §6 control surface). Unauthenticated:
//! these back container orchestration health probes, not admin operations.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};

use crate::routes::AppState;

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Readiness also checks the dependencies this engine cannot operate
/// without: Postgres and Redis. Returns 503 when either is unreachable,
/// matching spec.md §6's status code table for "dependencies unreachable".
pub async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    let db_ok = crate::db::health_check(&state.pool).await.is_ok();

    let mut redis = state.control.redis.clone();
    let redis_ok = redis::cmd("PING")
        .query_async::<_, String>(&mut redis)
        .await
        .is_ok();

    if db_ok && redis_ok {
        (StatusCode::OK, Json(serde_json::json!({ "status": "ready" })))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({
                "status": "not_ready",
                "database": db_ok,
                "redis": redis_ok,
            })),
        )
    }
}
