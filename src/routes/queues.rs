//! `/queues/*` admin endpoints (spec.md §4.7, §6): inspect and operate on
//! the three persistent job queues plus the two downstream sink queues.
//! Every handler validates the queue name, job state, and pagination
//! bounds before touching the store (spec.md §4.8: "Input validation on
//! admin endpoints rejects unknown queue names, unknown job states, and
//! out-of-range pagination").

use axum::extract::{Path, Query, State};
use axum::response::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::jobs::{Job, JobState};
use crate::jobs::queue::QueueStats;
use crate::routes::AppState;

const KNOWN_QUEUES: &[&str] = &["supplier-sync", "product-family", "image-upload", "index-upsert", "semantic-upsert"];
const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;
const DEFAULT_BULK_RETRY_LIMIT: i64 = 100;

fn validate_queue(queue: &str) -> Result<()> {
    if KNOWN_QUEUES.contains(&queue) {
        Ok(())
    } else {
        Err(AppError::BadRequest(format!("unknown queue '{queue}'")))
    }
}

fn parse_state(state: &str) -> Result<JobState> {
    match state {
        "queued" => Ok(JobState::Queued),
        "active" => Ok(JobState::Active),
        "delayed" => Ok(JobState::Delayed),
        "completed" => Ok(JobState::Completed),
        "failed" => Ok(JobState::Failed),
        "cancelled" => Ok(JobState::Cancelled),
        other => Err(AppError::BadRequest(format!("unknown job state '{other}'"))),
    }
}

pub async fn stats_all(State(state): State<AppState>) -> Result<Json<Vec<QueueStats>>> {
    let mut all = Vec::with_capacity(KNOWN_QUEUES.len());
    for queue in KNOWN_QUEUES {
        all.push(fetch_stats(&state, queue).await?);
    }
    Ok(Json(all))
}

pub async fn stats_one(State(state): State<AppState>, Path(queue): Path<String>) -> Result<Json<QueueStats>> {
    validate_queue(&queue)?;
    Ok(Json(fetch_stats(&state, &queue).await?))
}

/// Stats are cached for up to 3s with single-flight coalescing (spec.md
/// §4.8), shared across every caller through [`crate::control::ControlPlane`].
async fn fetch_stats(state: &AppState, queue: &str) -> Result<QueueStats> {
    let pool = state.pool.clone();
    let queue_owned = queue.to_string();
    let job_queue = state.queue.clone();

    let cache_key = format!("queue:stats:{queue}");
    let value = state
        .control
        .stats
        .get_or_fetch(&cache_key, || async move {
            let _ = &pool;
            let stats = job_queue.stats(&queue_owned).await?;
            Ok(serde_json::to_value(stats)?)
        })
        .await?;

    Ok(serde_json::from_value(value)?)
}

#[derive(Debug, Deserialize)]
pub struct ListJobsQuery {
    pub state: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    pub q: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct JobListResponse {
    pub jobs: Vec<Job>,
    pub page: i64,
    pub page_size: i64,
}

pub async fn list_jobs(
    State(state): State<AppState>,
    Path(queue): Path<String>,
    Query(params): Query<ListJobsQuery>,
) -> Result<Json<JobListResponse>> {
    validate_queue(&queue)?;

    let job_state = params.state.as_deref().map(parse_state).transpose()?;

    let page = params.page.unwrap_or(1);
    if page < 1 {
        return Err(AppError::BadRequest("page must be >= 1".to_string()));
    }
    let page_size = params.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
    if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
        return Err(AppError::BadRequest(format!("page_size must be in [1,{MAX_PAGE_SIZE}]")));
    }

    let jobs = state
        .queue
        .list(&queue, job_state, params.q.as_deref(), page, page_size)
        .await?;

    Ok(Json(JobListResponse { jobs, page, page_size }))
}

pub async fn get_job(State(state): State<AppState>, Path((queue, id)): Path<(String, Uuid)>) -> Result<Json<Job>> {
    validate_queue(&queue)?;
    let job = state
        .queue
        .get(id)
        .await?
        .filter(|j| j.queue == queue)
        .ok_or_else(|| AppError::not_found(format!("job {id}")))?;
    Ok(Json(job))
}

pub async fn delete_job(State(state): State<AppState>, Path((queue, id)): Path<(String, Uuid)>) -> Result<Json<serde_json::Value>> {
    validate_queue(&queue)?;
    state.queue.delete(id).await?;
    Ok(Json(serde_json::json!({ "deleted": id })))
}

pub async fn retry_job(State(state): State<AppState>, Path((queue, id)): Path<(String, Uuid)>) -> Result<Json<serde_json::Value>> {
    validate_queue(&queue)?;
    state.queue.retry(id).await?;
    Ok(Json(serde_json::json!({ "retried": id })))
}

#[derive(Debug, Default, Deserialize)]
pub struct RetryFailedRequest {
    pub limit: Option<i64>,
}

pub async fn retry_failed(
    State(state): State<AppState>,
    Path(queue): Path<String>,
    body: Option<Json<RetryFailedRequest>>,
) -> Result<Json<serde_json::Value>> {
    validate_queue(&queue)?;
    let limit = body.and_then(|Json(b)| b.limit).unwrap_or(DEFAULT_BULK_RETRY_LIMIT);
    if limit < 1 {
        return Err(AppError::BadRequest("limit must be >= 1".to_string()));
    }
    let retried = state.queue.retry_all_failed(&queue, limit).await?;
    Ok(Json(serde_json::json!({ "retried": retried })))
}

pub async fn pause(State(state): State<AppState>, Path(queue): Path<String>) -> Result<Json<serde_json::Value>> {
    validate_queue(&queue)?;
    state.queue.pause(&queue).await?;
    Ok(Json(serde_json::json!({ "paused": true })))
}

pub async fn resume(State(state): State<AppState>, Path(queue): Path<String>) -> Result<Json<serde_json::Value>> {
    validate_queue(&queue)?;
    state.queue.resume(&queue).await?;
    Ok(Json(serde_json::json!({ "paused": false })))
}

#[derive(Debug, Deserialize)]
pub struct CleanRequest {
    pub grace_ms: i64,
    pub status: Option<String>,
}

pub async fn clean(
    State(state): State<AppState>,
    Path(queue): Path<String>,
    Json(req): Json<CleanRequest>,
) -> Result<Json<serde_json::Value>> {
    validate_queue(&queue)?;
    if req.grace_ms < 0 {
        return Err(AppError::BadRequest("grace_ms must be >= 0".to_string()));
    }
    let status = req.status.as_deref().map(parse_state).transpose()?;
    let grace = chrono::Duration::milliseconds(req.grace_ms);
    let removed = state.queue.clean(&queue, grace, status).await?;
    Ok(Json(serde_json::json!({ "removed": removed })))
}
