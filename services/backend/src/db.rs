use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, postgres::PgPoolOptions};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::errors::MetadataError;
use crate::models::song::{NewSong, Song, SongRow};

pub type MetadataResult<T> = Result<T, MetadataError>;

/// Document store holding song metadata.
#[async_trait]
pub trait SongStore: Send + Sync {
    /// Inserts a document; the store assigns `id` and `created_at`.
    async fn insert_song(&self, song: NewSong) -> MetadataResult<Song>;

    async fn get_song(&self, id: &str) -> MetadataResult<Option<Song>>;

    /// Newest first, optionally restricted to an exact category.
    async fn list_songs(&self, category: Option<&str>) -> MetadataResult<Vec<Song>>;

    /// Returns whether a document was deleted.
    async fn delete_song(&self, id: &str) -> MetadataResult<bool>;
}

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self, sqlx::Error> {
        debug!("Connecting metadata store");

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl SongStore for Database {
    async fn insert_song(&self, song: NewSong) -> MetadataResult<Song> {
        let row = sqlx::query_as::<_, SongRow>(
            "INSERT INTO songs (id, name, artist, category, audio_url, image_url)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING id, name, artist, category, audio_url, image_url, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(song.name)
        .bind(song.artist)
        .bind(song.category)
        .bind(song.audio_url)
        .bind(song.image_url)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn get_song(&self, id: &str) -> MetadataResult<Option<Song>> {
        let Ok(id) = Uuid::parse_str(id) else {
            return Ok(None);
        };
        let row = sqlx::query_as::<_, SongRow>(
            "SELECT id, name, artist, category, audio_url, image_url, created_at
             FROM songs WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Song::from))
    }

    async fn list_songs(&self, category: Option<&str>) -> MetadataResult<Vec<Song>> {
        let rows = sqlx::query_as::<_, SongRow>(
            "SELECT id, name, artist, category, audio_url, image_url, created_at
             FROM songs
             WHERE ($1::text IS NULL OR category = $1)
             ORDER BY created_at DESC, seq DESC",
        )
        .bind(category)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Song::from).collect())
    }

    async fn delete_song(&self, id: &str) -> MetadataResult<bool> {
        let Ok(id) = Uuid::parse_str(id) else {
            return Ok(false);
        };
        let result = sqlx::query("DELETE FROM songs WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[derive(Default)]
struct MemoryState {
    songs: Vec<Song>,
    last_created_at: Option<DateTime<Utc>>,
}

/// Process-local metadata store for dev runs and tests.
#[derive(Clone, Default)]
pub struct MemoryDatabase {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SongStore for MemoryDatabase {
    async fn insert_song(&self, song: NewSong) -> MetadataResult<Song> {
        let mut state = self.state.write().await;
        let now = Utc::now();
        // Clock steps backwards must not reorder listings.
        let created_at = match state.last_created_at {
            Some(last) if last > now => last,
            _ => now,
        };
        state.last_created_at = Some(created_at);

        let stored = Song {
            id: Uuid::new_v4().to_string(),
            name: song.name,
            artist: song.artist,
            category: song.category,
            audio_url: song.audio_url,
            image_url: song.image_url,
            created_at,
        };
        state.songs.push(stored.clone());
        Ok(stored)
    }

    async fn get_song(&self, id: &str) -> MetadataResult<Option<Song>> {
        let state = self.state.read().await;
        Ok(state.songs.iter().find(|s| s.id == id).cloned())
    }

    async fn list_songs(&self, category: Option<&str>) -> MetadataResult<Vec<Song>> {
        let state = self.state.read().await;
        // Walk newest insert first so the stable sort keeps it ahead on ties.
        let mut songs: Vec<Song> = state
            .songs
            .iter()
            .rev()
            .filter(|s| category.is_none_or(|c| s.category == c))
            .cloned()
            .collect();
        songs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(songs)
    }

    async fn delete_song(&self, id: &str) -> MetadataResult<bool> {
        let mut state = self.state.write().await;
        let before = state.songs.len();
        state.songs.retain(|s| s.id != id);
        Ok(state.songs.len() != before)
    }
}
