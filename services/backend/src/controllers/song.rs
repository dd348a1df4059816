use chrono::Utc;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::{
    controllers::parser::{normalize_category, storage_key},
    db::SongStore,
    errors::SongError,
    models::song::{
        DEFAULT_ARTIST, DEFAULT_CATEGORY, FilePayload, NewSong, Song, SongUpload, UploadedSong,
    },
    storage::ObjectStore,
};

/// What a delete does when a blob removal fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlobCleanupPolicy {
    /// Attempt every removal, then fail and keep the document.
    #[default]
    Abort,
    /// Log removal failures and delete the document anyway.
    BestEffort,
}

impl FromStr for BlobCleanupPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "abort" => Ok(BlobCleanupPolicy::Abort),
            "best-effort" | "best_effort" | "besteffort" => Ok(BlobCleanupPolicy::BestEffort),
            other => Err(format!("unknown blob cleanup policy: {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SongOptions {
    pub audio_bucket: String,
    pub image_bucket: String,
    pub cleanup: BlobCleanupPolicy,
    /// Store aliased categories in canonical form, matching what category queries look up.
    pub normalize_category_on_write: bool,
}

impl Default for SongOptions {
    fn default() -> Self {
        SongOptions {
            audio_bucket: "songs".to_string(),
            image_bucket: "image".to_string(),
            cleanup: BlobCleanupPolicy::Abort,
            normalize_category_on_write: true,
        }
    }
}

/// Keeps the blob buckets and the song documents in step.
///
/// Writes go object store first, metadata last; deletes read the document,
/// remove its blobs, then delete the document. Nothing is retried or rolled
/// back: a failure part way leaves the completed steps in place and is logged
/// with the orphaned keys.
#[derive(Clone)]
pub struct SongController {
    objects: Arc<dyn ObjectStore>,
    songs: Arc<dyn SongStore>,
    options: SongOptions,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

impl SongController {
    pub fn new(
        objects: Arc<dyn ObjectStore>,
        songs: Arc<dyn SongStore>,
        options: SongOptions,
    ) -> Self {
        SongController {
            objects,
            songs,
            options,
        }
    }

    pub fn options(&self) -> &SongOptions {
        &self.options
    }

    pub async fn upload_song(&self, upload: SongUpload) -> Result<UploadedSong, SongError> {
        let Some(audio) = upload.audio else {
            return Err(SongError::MissingAudio);
        };

        let audio_url = self.put_blob(&self.options.audio_bucket, &audio).await?;

        let image_url = match &upload.image {
            Some(image) => match self.put_blob(&self.options.image_bucket, image).await {
                Ok(url) => Some(url),
                Err(e) => {
                    error!(orphaned = %audio_url, "Image upload failed after audio upload");
                    return Err(e);
                }
            },
            None => None,
        };

        let category = match non_empty(upload.category) {
            Some(raw) if self.options.normalize_category_on_write => {
                normalize_category(&raw).to_string()
            }
            Some(raw) => raw,
            None => DEFAULT_CATEGORY.to_string(),
        };
        let new_song = NewSong {
            name: non_empty(upload.name).unwrap_or_else(|| audio.file_name.clone()),
            artist: non_empty(upload.artist).unwrap_or_else(|| DEFAULT_ARTIST.to_string()),
            category,
            audio_url: audio_url.clone(),
            image_url: image_url.clone(),
        };

        let song = match self.songs.insert_song(new_song).await {
            Ok(song) => song,
            Err(e) => {
                error!(
                    orphaned = %audio_url,
                    orphaned_image = ?image_url,
                    error = %e,
                    "Song document insert failed after blob upload"
                );
                return Err(e.into());
            }
        };

        info!("Uploaded song {} ({})", song.id, song.name);
        Ok(UploadedSong {
            id: song.id,
            audio_url,
            image_url,
        })
    }

    async fn put_blob(&self, bucket: &str, file: &FilePayload) -> Result<String, SongError> {
        let key = storage_key(Utc::now().timestamp_millis(), &file.file_name);
        if let Err(e) = self
            .objects
            .upload(bucket, &key, file.bytes.clone(), &file.content_type)
            .await
        {
            error!(bucket = bucket, key = %key, error = %e, "Blob upload failed");
            return Err(e.into());
        }
        Ok(self.objects.public_url(bucket, &key))
    }

    pub async fn list_songs(&self) -> Result<Vec<Song>, SongError> {
        Ok(self.songs.list_songs(None).await?)
    }

    /// `category` is alias-normalized before the lookup.
    pub async fn list_songs_by_category(&self, category: &str) -> Result<Vec<Song>, SongError> {
        let category = normalize_category(category);
        Ok(self.songs.list_songs(Some(category)).await?)
    }

    /// Removes a song's blobs and then its document. Returns the deleted song.
    pub async fn delete_song(&self, id: &str) -> Result<Song, SongError> {
        let Some(song) = self.songs.get_song(id).await? else {
            return Err(SongError::NotFound(id.to_string()));
        };

        let blobs = [
            (&self.options.audio_bucket, Some(song.audio_url.as_str())),
            (&self.options.image_bucket, song.image_url.as_deref()),
        ];
        let mut failures = Vec::new();
        for (bucket, url) in blobs {
            let Some(url) = url.filter(|u| !u.is_empty()) else {
                continue;
            };
            if let Err(reason) = self.remove_blob(bucket, url).await {
                failures.push(reason);
            }
        }

        if !failures.is_empty() {
            match self.options.cleanup {
                BlobCleanupPolicy::Abort => {
                    error!(song_id = %id, failures = ?failures, "Keeping song document, blob removal failed");
                    return Err(SongError::BlobCleanup(failures));
                }
                BlobCleanupPolicy::BestEffort => {
                    warn!(song_id = %id, orphaned = ?failures, "Deleting song document despite blob removal failures");
                }
            }
        }

        if !self.songs.delete_song(id).await? {
            // Lost a race with another delete of the same id.
            warn!(song_id = %id, "Song document already gone");
        }
        info!("Deleted song {}", id);
        Ok(song)
    }

    async fn remove_blob(&self, bucket: &str, url: &str) -> Result<(), String> {
        let Some(key) = self.objects.key_from_public_url(bucket, url) else {
            warn!(bucket = bucket, url = url, "Stored URL is not in the expected bucket");
            return Err(format!("{}: url not in bucket: {}", bucket, url));
        };
        self.objects.remove(bucket, &key).await.map_err(|e| {
            error!(bucket = bucket, key = %key, error = %e, "Blob removal failed");
            format!("{}/{}: {}", bucket, key, e)
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::{MemoryDatabase, MetadataResult};
    use crate::errors::{MetadataError, StorageError};
    use crate::storage::{MemoryObjectStore, StorageResult};
    use async_trait::async_trait;
    use axum::body::Bytes;
    use std::sync::Mutex;

    pub(crate) const BASE_URL: &str = "https://proj.supabase.co";

    type Journal = Arc<Mutex<Vec<String>>>;

    /// Object store wrapper that logs every call and can fail per bucket.
    pub(crate) struct RecordingObjects {
        pub(crate) inner: MemoryObjectStore,
        journal: Journal,
        fail_upload: Option<String>,
        fail_remove: Option<String>,
    }

    #[async_trait]
    impl ObjectStore for RecordingObjects {
        async fn upload(
            &self,
            bucket: &str,
            key: &str,
            bytes: Bytes,
            content_type: &str,
        ) -> StorageResult<()> {
            self.journal
                .lock()
                .unwrap()
                .push(format!("upload {}/{}", bucket, key));
            if self.fail_upload.as_deref() == Some(bucket) {
                return Err(StorageError::Status {
                    status: 500,
                    body: "upload refused".into(),
                });
            }
            self.inner.upload(bucket, key, bytes, content_type).await
        }

        fn public_url(&self, bucket: &str, key: &str) -> String {
            self.inner.public_url(bucket, key)
        }

        async fn remove(&self, bucket: &str, key: &str) -> StorageResult<()> {
            self.journal
                .lock()
                .unwrap()
                .push(format!("remove {}/{}", bucket, key));
            if self.fail_remove.as_deref() == Some(bucket) {
                return Err(StorageError::Unavailable("remove refused".into()));
            }
            self.inner.remove(bucket, key).await
        }
    }

    /// Metadata store wrapper that logs every call and can fail inserts,
    /// lookups and listings.
    pub(crate) struct RecordingSongs {
        pub(crate) inner: MemoryDatabase,
        journal: Journal,
        fail_insert: bool,
        fail_get: bool,
        fail_list: bool,
    }

    #[async_trait]
    impl SongStore for RecordingSongs {
        async fn insert_song(&self, song: NewSong) -> MetadataResult<Song> {
            self.journal.lock().unwrap().push("insert".to_string());
            if self.fail_insert {
                return Err(MetadataError::Unavailable("insert refused".into()));
            }
            self.inner.insert_song(song).await
        }

        async fn get_song(&self, id: &str) -> MetadataResult<Option<Song>> {
            self.journal.lock().unwrap().push(format!("get {}", id));
            if self.fail_get {
                return Err(MetadataError::Unavailable("down".into()));
            }
            self.inner.get_song(id).await
        }

        async fn list_songs(&self, category: Option<&str>) -> MetadataResult<Vec<Song>> {
            self.journal
                .lock()
                .unwrap()
                .push(format!("list {:?}", category));
            if self.fail_list {
                return Err(MetadataError::Unavailable("down".into()));
            }
            self.inner.list_songs(category).await
        }

        async fn delete_song(&self, id: &str) -> MetadataResult<bool> {
            self.journal.lock().unwrap().push(format!("delete {}", id));
            self.inner.delete_song(id).await
        }
    }

    pub(crate) struct Harness {
        pub(crate) controller: SongController,
        pub(crate) objects: MemoryObjectStore,
        pub(crate) songs: MemoryDatabase,
        journal: Journal,
    }

    impl Harness {
        pub(crate) fn events(&self) -> Vec<String> {
            self.journal.lock().unwrap().clone()
        }

        fn clear(&self) {
            self.journal.lock().unwrap().clear();
        }
    }

    #[derive(Default)]
    pub(crate) struct Faults {
        pub(crate) fail_upload: Option<&'static str>,
        pub(crate) fail_remove: Option<&'static str>,
        pub(crate) fail_insert: bool,
        pub(crate) fail_get: bool,
        pub(crate) fail_list: bool,
    }

    pub(crate) fn harness(options: SongOptions, faults: Faults) -> Harness {
        let journal: Journal = Arc::new(Mutex::new(Vec::new()));
        let objects = MemoryObjectStore::new(BASE_URL);
        let songs = MemoryDatabase::new();
        let controller = SongController::new(
            Arc::new(RecordingObjects {
                inner: objects.clone(),
                journal: journal.clone(),
                fail_upload: faults.fail_upload.map(str::to_string),
                fail_remove: faults.fail_remove.map(str::to_string),
            }),
            Arc::new(RecordingSongs {
                inner: songs.clone(),
                journal: journal.clone(),
                fail_insert: faults.fail_insert,
                fail_get: faults.fail_get,
                fail_list: faults.fail_list,
            }),
            options,
        );
        Harness {
            controller,
            objects,
            songs,
            journal,
        }
    }

    pub(crate) fn file(name: &str, content_type: &str, bytes: &'static [u8]) -> FilePayload {
        FilePayload {
            file_name: name.to_string(),
            content_type: content_type.to_string(),
            bytes: Bytes::from_static(bytes),
        }
    }

    fn full_upload() -> SongUpload {
        SongUpload {
            audio: Some(file("Song A.mp3", "audio/mpeg", b"ID3 audio bytes")),
            image: Some(file("cover.png", "image/png", b"\x89PNG cover")),
            name: Some("Song A".into()),
            artist: Some("X".into()),
            category: Some("เปียโน".into()),
        }
    }

    fn key_of(h: &Harness, bucket: &str, url: &str) -> String {
        h.objects.key_from_public_url(bucket, url).unwrap()
    }

    #[tokio::test]
    async fn missing_audio_makes_no_outbound_calls() {
        let h = harness(SongOptions::default(), Faults::default());
        let upload = SongUpload {
            image: Some(file("cover.png", "image/png", b"png")),
            name: Some("no audio".into()),
            ..SongUpload::default()
        };

        let err = h.controller.upload_song(upload).await.unwrap_err();

        assert!(matches!(err, SongError::MissingAudio));
        assert!(h.events().is_empty());
        assert_eq!(h.objects.len().await, 0);
    }

    #[tokio::test]
    async fn upload_writes_blobs_then_document() {
        let h = harness(SongOptions::default(), Faults::default());

        let uploaded = h.controller.upload_song(full_upload()).await.unwrap();

        let audio_key = key_of(&h, "songs", &uploaded.audio_url);
        let image_url = uploaded.image_url.clone().unwrap();
        let image_key = key_of(&h, "image", &image_url);
        assert!(audio_key.ends_with("_Song_A.mp3"));
        assert!(image_key.ends_with("_cover.png"));
        assert_eq!(
            h.events(),
            vec![
                format!("upload songs/{}", audio_key),
                format!("upload image/{}", image_key),
                "insert".to_string(),
            ]
        );

        let audio = h.objects.object("songs", &audio_key).await.unwrap();
        assert_eq!(audio.bytes, Bytes::from_static(b"ID3 audio bytes"));
        assert_eq!(audio.content_type, "audio/mpeg");

        let song = h.songs.get_song(&uploaded.id).await.unwrap().unwrap();
        assert_eq!(song.name, "Song A");
        assert_eq!(song.artist, "X");
        assert_eq!(song.category, "ดนตรีเปียโน");
        assert_eq!(song.audio_url, uploaded.audio_url);
        assert_eq!(song.image_url, Some(image_url));
    }

    #[tokio::test]
    async fn upload_fills_defaults_for_absent_fields() {
        let h = harness(SongOptions::default(), Faults::default());
        let upload = SongUpload {
            audio: Some(file("track.ogg", "audio/ogg", b"ogg")),
            name: Some(String::new()),
            ..SongUpload::default()
        };

        let uploaded = h.controller.upload_song(upload).await.unwrap();

        assert!(uploaded.image_url.is_none());
        let song = h.songs.get_song(&uploaded.id).await.unwrap().unwrap();
        assert_eq!(song.name, "track.ogg");
        assert_eq!(song.artist, DEFAULT_ARTIST);
        assert_eq!(song.category, DEFAULT_CATEGORY);
        assert!(song.image_url.is_none());
    }

    #[tokio::test]
    async fn raw_category_is_kept_when_write_normalization_is_off() {
        let options = SongOptions {
            normalize_category_on_write: false,
            ..SongOptions::default()
        };
        let h = harness(options, Faults::default());

        let uploaded = h.controller.upload_song(full_upload()).await.unwrap();

        let song = h.songs.get_song(&uploaded.id).await.unwrap().unwrap();
        assert_eq!(song.category, "เปียโน");
        // The filtered listing looks up the canonical name and misses it.
        let listed = h.controller.list_songs_by_category("เปียโน").await.unwrap();
        assert!(listed.is_empty());
    }

    #[tokio::test]
    async fn image_failure_orphans_audio_and_skips_document() {
        let h = harness(
            SongOptions::default(),
            Faults {
                fail_upload: Some("image"),
                ..Faults::default()
            },
        );

        let err = h.controller.upload_song(full_upload()).await.unwrap_err();

        assert!(matches!(err, SongError::Storage(_)));
        let events = h.events();
        assert_eq!(events.len(), 2);
        assert!(events[0].starts_with("upload songs/"));
        assert!(events[1].starts_with("upload image/"));
        assert_eq!(h.objects.len().await, 1);
        assert!(h.songs.list_songs(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn audio_failure_stops_before_image() {
        let h = harness(
            SongOptions::default(),
            Faults {
                fail_upload: Some("songs"),
                ..Faults::default()
            },
        );

        let err = h.controller.upload_song(full_upload()).await.unwrap_err();

        assert!(matches!(err, SongError::Storage(_)));
        assert_eq!(h.events().len(), 1);
        assert_eq!(h.objects.len().await, 0);
    }

    #[tokio::test]
    async fn insert_failure_leaves_uploaded_blobs() {
        let h = harness(
            SongOptions::default(),
            Faults {
                fail_insert: true,
                ..Faults::default()
            },
        );

        let err = h.controller.upload_song(full_upload()).await.unwrap_err();

        assert!(matches!(err, SongError::Metadata(_)));
        assert_eq!(h.objects.len().await, 2);
    }

    #[tokio::test]
    async fn category_listing_applies_aliases() {
        let h = harness(SongOptions::default(), Faults::default());
        let mut elder = full_upload();
        elder.category = Some("เพลงสำหรับผู้สูงวัย".into());
        let elder = h.controller.upload_song(elder).await.unwrap();
        h.controller.upload_song(full_upload()).await.unwrap();

        let listed = h.controller.list_songs_by_category("ผู้สูงวัย").await.unwrap();

        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, elder.id);
        assert_eq!(h.controller.list_songs().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn deleting_unknown_id_issues_no_removals() {
        let h = harness(SongOptions::default(), Faults::default());

        let err = h.controller.delete_song("missing").await.unwrap_err();

        assert!(matches!(err, SongError::NotFound(_)));
        assert_eq!(h.events(), vec!["get missing".to_string()]);
    }

    #[tokio::test]
    async fn delete_removes_each_blob_then_the_document() {
        let h = harness(SongOptions::default(), Faults::default());
        let uploaded = h.controller.upload_song(full_upload()).await.unwrap();
        let audio_key = key_of(&h, "songs", &uploaded.audio_url);
        let image_key = key_of(&h, "image", uploaded.image_url.as_deref().unwrap());
        h.clear();

        let deleted = h.controller.delete_song(&uploaded.id).await.unwrap();

        assert_eq!(deleted.id, uploaded.id);
        assert_eq!(
            h.events(),
            vec![
                format!("get {}", uploaded.id),
                format!("remove songs/{}", audio_key),
                format!("remove image/{}", image_key),
                format!("delete {}", uploaded.id),
            ]
        );
        assert_eq!(h.objects.len().await, 0);
        assert!(h.songs.get_song(&uploaded.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn abort_policy_tries_every_blob_and_keeps_the_document() {
        let h = harness(
            SongOptions::default(),
            Faults {
                fail_remove: Some("songs"),
                ..Faults::default()
            },
        );
        let uploaded = h.controller.upload_song(full_upload()).await.unwrap();
        h.clear();

        let err = h.controller.delete_song(&uploaded.id).await.unwrap_err();

        assert!(matches!(err, SongError::BlobCleanup(ref f) if f.len() == 1));
        let events = h.events();
        assert!(events.iter().any(|e| e.starts_with("remove image/")));
        assert!(!events.iter().any(|e| e.starts_with("delete ")));
        assert!(h.songs.get_song(&uploaded.id).await.unwrap().is_some());
        // Audio blob survives, image blob is gone.
        assert_eq!(h.objects.len().await, 1);
    }

    #[tokio::test]
    async fn best_effort_policy_deletes_the_document_anyway() {
        let options = SongOptions {
            cleanup: BlobCleanupPolicy::BestEffort,
            ..SongOptions::default()
        };
        let h = harness(
            options,
            Faults {
                fail_remove: Some("songs"),
                ..Faults::default()
            },
        );
        let uploaded = h.controller.upload_song(full_upload()).await.unwrap();

        h.controller.delete_song(&uploaded.id).await.unwrap();

        assert!(h.songs.get_song(&uploaded.id).await.unwrap().is_none());
        assert_eq!(h.objects.len().await, 1);
    }

    #[tokio::test]
    async fn foreign_url_counts_as_a_failed_removal() {
        let h = harness(SongOptions::default(), Faults::default());
        let song = h
            .songs
            .insert_song(NewSong {
                name: "legacy".into(),
                artist: DEFAULT_ARTIST.into(),
                category: DEFAULT_CATEGORY.into(),
                audio_url: "https://cdn.example.com/legacy.mp3".into(),
                image_url: None,
            })
            .await
            .unwrap();

        let err = h.controller.delete_song(&song.id).await.unwrap_err();

        assert!(matches!(err, SongError::BlobCleanup(_)));
        assert!(!h.events().iter().any(|e| e.starts_with("remove ")));
    }

    #[test]
    fn cleanup_policy_parses_config_values() {
        assert_eq!(
            "abort".parse::<BlobCleanupPolicy>(),
            Ok(BlobCleanupPolicy::Abort)
        );
        assert_eq!(
            "Best-Effort".parse::<BlobCleanupPolicy>(),
            Ok(BlobCleanupPolicy::BestEffort)
        );
        assert!("retry".parse::<BlobCleanupPolicy>().is_err());
    }
}
