use async_trait::async_trait;
use axum::body::Bytes;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{ObjectStore, StorageResult, public_object_url};

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub bytes: Bytes,
    pub content_type: String,
}

/// Process-local object store for dev runs and tests.
#[derive(Debug, Clone)]
pub struct MemoryObjectStore {
    base_url: String,
    objects: Arc<RwLock<HashMap<(String, String), StoredObject>>>,
}

impl MemoryObjectStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        MemoryObjectStore {
            base_url: base_url.into(),
            objects: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn object(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.objects
            .read()
            .await
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    /// Number of blobs across all buckets.
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> StorageResult<()> {
        self.objects.write().await.insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        public_object_url(&self.base_url, bucket, key)
    }

    async fn remove(&self, bucket: &str, key: &str) -> StorageResult<()> {
        self.objects
            .write()
            .await
            .remove(&(bucket.to_string(), key.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upload_overwrites_by_key() {
        let store = MemoryObjectStore::new("http://localhost:3000");
        store
            .upload("songs", "k.mp3", Bytes::from_static(b"one"), "audio/mpeg")
            .await
            .unwrap();
        store
            .upload("songs", "k.mp3", Bytes::from_static(b"two"), "audio/ogg")
            .await
            .unwrap();

        let object = store.object("songs", "k.mp3").await.unwrap();
        assert_eq!(object.bytes, Bytes::from_static(b"two"));
        assert_eq!(object.content_type, "audio/ogg");
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn remove_is_idempotent_and_bucket_scoped() {
        let store = MemoryObjectStore::new("http://localhost:3000");
        store
            .upload("songs", "k", Bytes::from_static(b"a"), "audio/mpeg")
            .await
            .unwrap();
        store
            .upload("image", "k", Bytes::from_static(b"b"), "image/png")
            .await
            .unwrap();

        store.remove("songs", "k").await.unwrap();
        store.remove("songs", "k").await.unwrap();

        assert!(store.object("songs", "k").await.is_none());
        assert!(store.object("image", "k").await.is_some());
    }
}
