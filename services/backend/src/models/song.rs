use axum::body::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub const DEFAULT_ARTIST: &str = "Unknown";
pub const DEFAULT_CATEGORY: &str = "Uncategorized";

/// A stored song document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Song {
    pub id: String,
    pub name: String,
    pub artist: String,
    pub category: String,
    pub audio_url: String,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Row shape of the `songs` table.
#[derive(Debug, FromRow)]
pub struct SongRow {
    pub id: uuid::Uuid,
    pub name: String,
    pub artist: String,
    pub category: String,
    pub audio_url: String,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<SongRow> for Song {
    fn from(row: SongRow) -> Self {
        Song {
            id: row.id.to_string(),
            name: row.name,
            artist: row.artist,
            category: row.category,
            audio_url: row.audio_url,
            image_url: row.image_url,
            created_at: row.created_at,
        }
    }
}

/// Fields written on insert; `id` and `created_at` come from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSong {
    pub name: String,
    pub artist: String,
    pub category: String,
    pub audio_url: String,
    pub image_url: Option<String>,
}

/// One uploaded file from the multipart form.
#[derive(Debug, Clone)]
pub struct FilePayload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

#[derive(Debug, Clone, Default)]
pub struct SongUpload {
    pub audio: Option<FilePayload>,
    pub image: Option<FilePayload>,
    pub name: Option<String>,
    pub artist: Option<String>,
    pub category: Option<String>,
}

/// Result of a completed upload.
#[derive(Debug, Clone)]
pub struct UploadedSong {
    pub id: String,
    pub audio_url: String,
    pub image_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddSongResponse {
    pub message: String,
    pub song_id: String,
    pub audio_url: String,
    pub image_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        MessageResponse {
            message: message.into(),
        }
    }
}
