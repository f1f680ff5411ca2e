use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

pub type Result<T> = std::result::Result<T, AppError>;

/// Error taxonomy per spec.md §7.
///
/// Infrastructure errors (`Sqlx`, `Redis`, `Reqwest`, `S3`) are glue from the
/// crates this engine actually touches; each is reclassified into the §7
/// taxonomy at the point it's handled (a `Reqwest` timeout becomes an
/// `Upstream` error, a unique-violation `Sqlx::Database` becomes `Conflict`).
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("upstream error fetching {url}: {cause} (after {attempts} attempts)")]
    Upstream {
        url: String,
        attempts: u32,
        last_status: Option<u16>,
        cause: String,
    },

    #[error("validation error: {0}")]
    Validation(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("transient store error: {0}")]
    TransientStore(String),

    #[error("sync cancelled, processed {processed}")]
    Cancelled { processed: u64 },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("lock already held for {0}")]
    LockHeld(String),

    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("http client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("object store error: {0}")]
    S3(String),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        AppError::NotFound(format!("{} not found", resource.into()))
    }

    /// True for the §7 error kinds that the job pipeline should retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::Upstream { .. } | AppError::TransientStore(_) | AppError::Sqlx(_) | AppError::Redis(_)
        )
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AppError::Upstream { .. } => (StatusCode::SERVICE_UNAVAILABLE, "UPSTREAM_ERROR"),
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            AppError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            AppError::TransientStore(_) => (StatusCode::SERVICE_UNAVAILABLE, "STORE_UNAVAILABLE"),
            AppError::Cancelled { .. } => (StatusCode::OK, "CANCELLED"),
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            AppError::LockHeld(_) => (StatusCode::CONFLICT, "LOCK_HELD"),
            AppError::Sqlx(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR"),
            AppError::Redis(_) => (StatusCode::SERVICE_UNAVAILABLE, "CACHE_ERROR"),
            AppError::Reqwest(_) => (StatusCode::SERVICE_UNAVAILABLE, "UPSTREAM_ERROR"),
            AppError::S3(_) => (StatusCode::SERVICE_UNAVAILABLE, "OBJECT_STORE_ERROR"),
            AppError::Serde(_) => (StatusCode::INTERNAL_SERVER_ERROR, "SERIALIZATION_ERROR"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        if matches!(status, StatusCode::INTERNAL_SERVER_ERROR | StatusCode::SERVICE_UNAVAILABLE) {
            tracing::error!(error = %self, "request failed");
        }

        let body = Json(ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
            },
        });

        (status, body).into_response()
    }
}
