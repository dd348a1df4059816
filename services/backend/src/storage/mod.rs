use async_trait::async_trait;
use axum::body::Bytes;

use crate::errors::StorageError;

pub mod memory;
pub mod supabase;

pub use memory::MemoryObjectStore;
pub use supabase::SupabaseStorage;

pub type StorageResult<T> = Result<T, StorageError>;

/// Path segment under which buckets are publicly readable.
pub const PUBLIC_OBJECT_PATH: &str = "storage/v1/object/public";

/// Blob storage addressed by bucket + key.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stores `bytes` under `key`, replacing any existing blob.
    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> StorageResult<()>;

    /// Public retrieval URL for `key`. Does not check that the blob exists.
    fn public_url(&self, bucket: &str, key: &str) -> String;

    /// Removing a missing key is not an error.
    async fn remove(&self, bucket: &str, key: &str) -> StorageResult<()>;

    /// Inverse of [`ObjectStore::public_url`]; `None` if `url` is not under `bucket`.
    fn key_from_public_url(&self, bucket: &str, url: &str) -> Option<String> {
        let prefix = self.public_url(bucket, "");
        url.strip_prefix(&prefix)
            .filter(|key| !key.is_empty())
            .map(str::to_string)
    }
}

/// `{base}/storage/v1/object/public/{bucket}/{key}`, tolerating a trailing slash on `base`.
pub(crate) fn public_object_url(base: &str, bucket: &str, key: &str) -> String {
    format!(
        "{}/{}/{}/{}",
        base.trim_end_matches('/'),
        PUBLIC_OBJECT_PATH,
        bucket,
        key
    )
}
