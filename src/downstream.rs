//! Downstream Sinks (spec.md §2 "Downstream Sinks", §3 `gemini_file_uri`):
//! fire-and-forget pushes of an updated product to the full-text search
//! index and the semantic-search store. Both are external collaborators
//! (spec.md §1 non-goals: "the downstream semantic-search store" is treated
//! as an opaque upload target) — this client only knows how to PUT a JSON
//! document and, for the semantic store, how to read back the file
//! reference it's given in return.

use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::models::Product;

#[derive(Debug, Clone, Default)]
pub struct DownstreamConfig {
    pub index_url: Option<String>,
    pub semantic_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DownstreamClient {
    http: reqwest::Client,
    config: DownstreamConfig,
}

#[derive(Debug, Deserialize)]
pub struct SemanticUploadResult {
    pub file_uri: String,
}

impl DownstreamClient {
    pub fn new(config: DownstreamConfig) -> Self {
        Self { http: reqwest::Client::new(), config }
    }

    /// Push `product` to the full-text index. Not configuring an endpoint is
    /// a valid deployment (the index is out of scope per spec.md §1), so a
    /// disabled sink is a no-op success rather than an error.
    pub async fn push_index(&self, product: &Product) -> Result<()> {
        let Some(url) = &self.config.index_url else {
            tracing::debug!(sku = %product.sku, "search index sink disabled, skipping push");
            return Ok(());
        };

        self.http
            .put(url)
            .json(product)
            .send()
            .await
            .map_err(AppError::Reqwest)?
            .error_for_status()
            .map_err(AppError::Reqwest)?;
        Ok(())
    }

    /// Push `product` to the semantic store and return the file reference it
    /// hands back, to be persisted as `gemini_file_uri`.
    pub async fn push_semantic(&self, product: &Product) -> Result<SemanticUploadResult> {
        let Some(url) = &self.config.semantic_url else {
            tracing::debug!(sku = %product.sku, "semantic store sink disabled, skipping push");
            return Ok(SemanticUploadResult { file_uri: format!("disabled:{}", product.sku) });
        };

        let response = self
            .http
            .put(url)
            .json(product)
            .send()
            .await
            .map_err(AppError::Reqwest)?
            .error_for_status()
            .map_err(AppError::Reqwest)?;

        response.json::<SemanticUploadResult>().await.map_err(AppError::Reqwest)
    }
}
