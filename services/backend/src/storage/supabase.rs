use async_trait::async_trait;
use axum::body::Bytes;
use reqwest::{Client, StatusCode, header};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};

use super::{ObjectStore, StorageResult, public_object_url};
use crate::errors::StorageError;

/// Bound on establishing a connection. Transfers themselves are not capped,
/// since an upload of `MAX_UPLOAD_BYTES` can legitimately take minutes.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Supabase Storage over its REST API.
#[derive(Clone, Debug)]
pub struct SupabaseStorage {
    client: Client,
    base_url: String,
    api_key: String,
}

impl SupabaseStorage {
    pub fn new(base_url: &str, api_key: impl Into<String>) -> Result<Self, StorageError> {
        let parsed = url::Url::parse(base_url)
            .map_err(|e| StorageError::Unavailable(format!("invalid SUPABASE_URL: {}", e)))?;
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;

        info!("Object store: Supabase at {}", parsed.origin().ascii_serialization());
        Ok(SupabaseStorage {
            client,
            base_url: parsed.as_str().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    fn object_url(&self, bucket: &str, key: &str) -> String {
        format!("{}/storage/v1/object/{}/{}", self.base_url, bucket, key)
    }

    async fn check(response: reqwest::Response) -> StorageResult<()> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(StorageError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl ObjectStore for SupabaseStorage {
    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> StorageResult<()> {
        debug!("Uploading {} bytes to {}/{}", bytes.len(), bucket, key);
        let response = self
            .client
            .post(self.object_url(bucket, key))
            .bearer_auth(&self.api_key)
            .header("apikey", &self.api_key)
            .header("x-upsert", "true")
            .header(header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await?;
        Self::check(response).await
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        public_object_url(&self.base_url, bucket, key)
    }

    async fn remove(&self, bucket: &str, key: &str) -> StorageResult<()> {
        debug!("Removing {}/{}", bucket, key);
        let response = self
            .client
            .delete(format!("{}/storage/v1/object/{}", self.base_url, bucket))
            .bearer_auth(&self.api_key)
            .header("apikey", &self.api_key)
            .json(&json!({ "prefixes": [key] }))
            .send()
            .await?;
        // Bulk delete answers 200 with the removed objects, possibly none.
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        Self::check(response).await
    }
}
