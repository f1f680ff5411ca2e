//! Admin control-surface auth: a minimal bearer-token guard comparing
//! against one configured token. Full user identity, login, and
//! multi-tenant auth belong to the CMS hosting this engine, not here — the
//! control surface only needs to keep its own operators honest.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};

use crate::error::AppError;

#[derive(Clone)]
pub struct AdminAuthState {
    pub token: String,
}

pub async fn require_admin_token(
    State(state): State<AdminAuthState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let presented = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match presented {
        Some(token) if constant_time_eq(token.as_bytes(), state.token.as_bytes()) => Ok(next.run(request).await),
        _ => Err(AppError::Unauthorized),
    }
}

/// Avoid leaking token length/content through response-time differences.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_time_eq_matches_equal_slices() {
        assert!(constant_time_eq(b"abc123", b"abc123"));
    }

    #[test]
    fn constant_time_eq_rejects_mismatched_slices() {
        assert!(!constant_time_eq(b"abc123", b"abc124"));
        assert!(!constant_time_eq(b"short", b"longer"));
    }
}
