//! Admin control surface (spec.md §6): thin authenticated endpoints over
//! the job queue and control plane. The public read API, the CMS hosting
//! this engine, and user-facing search are out of scope — this surface only
//! starts/stops/inspects syncs and queues.

pub mod health;
pub mod queues;
pub mod sync;

use axum::{
    middleware as axum_middleware,
    routing::get,
    Router,
};

use crate::control::ControlPlane;
use crate::db::DbPool;
use crate::jobs::queue::JobQueue;
use crate::middleware::admin_auth::{require_admin_token, AdminAuthState};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub queue: JobQueue,
    pub control: ControlPlane,
}

pub fn router(state: AppState, admin_token: String) -> Router {
    use axum::routing::post;

    let admin_state = AdminAuthState { token: admin_token };

    let protected = Router::new()
        .route("/sync/start", post(sync::start))
        .route("/sync/active", get(sync::active))
        .route("/sync/stop/:supplier_id", post(sync::stop))
        .route("/queues/stats", get(queues::stats_all))
        .route("/queues/stats/:queue", get(queues::stats_one))
        .route("/queues/:queue/jobs", get(queues::list_jobs))
        .route("/queues/:queue/jobs/:id", get(queues::get_job).delete(queues::delete_job))
        .route("/queues/:queue/jobs/:id/retry", post(queues::retry_job))
        .route("/queues/:queue/retry-failed", post(queues::retry_failed))
        .route("/queues/:queue/pause", post(queues::pause))
        .route("/queues/:queue/resume", post(queues::resume))
        .route("/queues/:queue/clean", post(queues::clean))
        .route_layer(axum_middleware::from_fn_with_state(admin_state, require_admin_token));

    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::ready))
        .merge(protected)
        .with_state(state)
}
