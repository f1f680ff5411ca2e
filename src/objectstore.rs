//! Object store wrapper (spec.md §4.6 C6): thin wrapper around
//! `aws-sdk-s3`, the object-store crate already pinned in this project's
//! dependency stack (it shipped unused here; this is where it earns its
//! keep).

use aws_sdk_s3::config::{Builder as S3ConfigBuilder, Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;

use crate::error::{AppError, Result};

#[derive(Clone)]
pub struct ObjectStore {
    client: Client,
    bucket: String,
    public_base_url: String,
}

impl ObjectStore {
    /// Builds an S3-compatible client from the `OBJECT_STORE_*` settings
    /// (spec.md §6), rather than the default AWS credential chain, since the
    /// object store is a generic S3-compatible endpoint (e.g. MinIO), not
    /// necessarily AWS itself.
    pub fn new(access_key: &str, secret: &str, bucket: String, endpoint: &str, public_base_url: String) -> Self {
        let credentials = Credentials::new(access_key, secret, None, None, "promidata-sync");
        let config = S3ConfigBuilder::new()
            .region(Region::new("us-east-1"))
            .endpoint_url(endpoint)
            .credentials_provider(credentials)
            .force_path_style(true)
            .behavior_version(aws_sdk_s3::config::BehaviorVersion::latest())
            .build();
        let client = Client::from_conf(config);
        Self { client, bucket, public_base_url }
    }

    pub async fn exists(&self, key: &str) -> Result<bool> {
        match self.client.head_object().bucket(&self.bucket).key(key).send().await {
            Ok(_) => Ok(true),
            Err(err) => {
                if err.as_service_error().map(|e| e.is_not_found()).unwrap_or(false) {
                    Ok(false)
                } else {
                    Err(AppError::S3(err.to_string()))
                }
            }
        }
    }

    pub async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<String> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| AppError::S3(e.to_string()))?;

        Ok(self.public_url(key))
    }

    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url.trim_end_matches('/'), key)
    }
}
