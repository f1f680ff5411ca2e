//! Upstream Client (C1, spec.md §4.1).
//!
//! Three operations — `fetch_text`, `fetch_json`, `fetch_bytes` — each retried
//! up to 3 times with exponential backoff starting at 1s and doubling per
//! attempt. No backoff crate lives in this corpus's dependency graph, so the
//! retry loop is hand-rolled around `tokio::time::sleep`, in the same direct
//! style the scraper example drives its own `reqwest::Client` calls.

pub mod manifest;

use std::time::Duration;

use rand::Rng;
use serde::de::DeserializeOwned;

use crate::error::{AppError, Result};

const MAX_ATTEMPTS: u32 = 3;
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub default_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            default_timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// HTTP client for the upstream Promidata feed (manifests, product JSON,
/// images). Wraps one shared `reqwest::Client`.
#[derive(Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl UpstreamClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("promidata-sync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(AppError::Reqwest)?;
        Ok(Self { http, config })
    }

    pub async fn fetch_text(&self, url: &str) -> Result<String> {
        self.fetch_text_with_timeout(url, self.config.default_timeout).await
    }

    pub async fn fetch_text_with_timeout(&self, url: &str, timeout: Duration) -> Result<String> {
        self.execute_with_retry(url, timeout, |resp| async move {
            resp.text().await.map_err(|e| ("decode body as text".to_string(), e))
        })
        .await
    }

    pub async fn fetch_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        self.fetch_json_with_timeout(url, self.config.default_timeout).await
    }

    pub async fn fetch_json_with_timeout<T: DeserializeOwned>(&self, url: &str, timeout: Duration) -> Result<T> {
        self.execute_with_retry(url, timeout, |resp| async move {
            resp.json::<T>().await.map_err(|e| ("decode body as json".to_string(), e))
        })
        .await
    }

    pub async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        self.fetch_bytes_with_timeout(url, self.config.default_timeout).await
    }

    pub async fn fetch_bytes_with_timeout(&self, url: &str, timeout: Duration) -> Result<Vec<u8>> {
        self.execute_with_retry(url, timeout, |resp| async move {
            resp.bytes()
                .await
                .map(|b| b.to_vec())
                .map_err(|e| ("read body bytes".to_string(), e))
        })
        .await
    }

    /// Shared retry loop. `decode` turns a successful response into `T`;
    /// decode failures are treated as non-retryable (the bytes are already in
    /// hand, retrying won't change a malformed payload).
    async fn execute_with_retry<T, F, Fut>(&self, url: &str, per_attempt_timeout: Duration, decode: F) -> Result<T>
    where
        F: Fn(reqwest::Response) -> Fut,
        Fut: std::future::Future<Output = std::result::Result<T, (String, reqwest::Error)>>,
    {
        let mut attempt = 0u32;
        let mut backoff = INITIAL_BACKOFF;
        let mut last_status: Option<u16> = None;
        let mut last_cause = String::new();

        loop {
            attempt += 1;

            let outcome = tokio::time::timeout(per_attempt_timeout, self.http.get(url).send()).await;

            let response = match outcome {
                Err(_) => {
                    last_cause = format!("request timed out after {per_attempt_timeout:?}");
                    if attempt >= MAX_ATTEMPTS {
                        return Err(upstream_error(url, attempt, last_status, last_cause));
                    }
                    tokio::time::sleep(jittered(backoff)).await;
                    backoff *= 2;
                    continue;
                }
                Ok(Err(e)) => {
                    last_cause = e.to_string();
                    if attempt >= MAX_ATTEMPTS {
                        return Err(upstream_error(url, attempt, last_status, last_cause));
                    }
                    tokio::time::sleep(jittered(backoff)).await;
                    backoff *= 2;
                    continue;
                }
                Ok(Ok(resp)) => resp,
            };

            let status = response.status();
            last_status = Some(status.as_u16());

            if status.is_success() {
                return match decode(response).await {
                    Ok(value) => Ok(value),
                    Err((cause, _)) => Err(upstream_error(url, attempt, last_status, cause)),
                };
            }

            if status.as_u16() == 429 {
                let retry_after = response
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .map(Duration::from_secs);

                last_cause = "429 too many requests".to_string();
                if attempt >= MAX_ATTEMPTS {
                    return Err(upstream_error(url, attempt, last_status, last_cause));
                }
                tokio::time::sleep(retry_after.unwrap_or_else(|| jittered(backoff))).await;
                backoff *= 2;
                continue;
            }

            if status.is_server_error() {
                last_cause = format!("server error {status}");
                if attempt >= MAX_ATTEMPTS {
                    return Err(upstream_error(url, attempt, last_status, last_cause));
                }
                tokio::time::sleep(jittered(backoff)).await;
                backoff *= 2;
                continue;
            }

            // Any other 4xx: fail immediately, no retry.
            return Err(upstream_error(url, attempt, last_status, format!("client error {status}")));
        }
    }
}

fn upstream_error(url: &str, attempts: u32, last_status: Option<u16>, cause: String) -> AppError {
    AppError::Upstream {
        url: url.to_string(),
        attempts,
        last_status,
        cause,
    }
}

/// Add up to 20% jitter to a backoff duration so concurrent retries across
/// families don't pile up on the same wall-clock tick.
fn jittered(base: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let factor: f64 = rng.gen_range(0.8..1.2);
    Duration::from_secs_f64(base.as_secs_f64() * factor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jittered_stays_in_bounds() {
        let base = Duration::from_secs(2);
        for _ in 0..50 {
            let j = jittered(base);
            assert!(j.as_secs_f64() >= 1.5 && j.as_secs_f64() <= 2.5);
        }
    }
}
