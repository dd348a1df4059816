use axum::{
    Json, Router,
    extract::{
        DefaultBodyLimit, Multipart, Path, State,
        multipart::{MultipartError, MultipartRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use tracing::{debug, info};

use crate::controllers::SongController;
use crate::errors::SongError;
use crate::models::song::{AddSongResponse, FilePayload, MessageResponse, Song, SongUpload};

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

pub fn song_routes(max_upload_bytes: usize) -> Router<SongController> {
    Router::new()
        .route(
            "/songs/add-song",
            post(add_song_route).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/songs", get(list_songs_route))
        .route("/songs/", get(list_songs_route))
        .route("/songs/category/{category}", get(list_by_category_route))
        .route("/songs/delete-song/{id}", delete(delete_song_route))
}

/// Keeps the body-limit status (413) instead of folding it into a 400.
fn multipart_error(context: String, e: MultipartError) -> SongError {
    let message = format!("{}: {}", context, e);
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        SongError::PayloadTooLarge(message)
    } else {
        SongError::InvalidUpload(message)
    }
}

/// Collects the `file`/`image` parts and the text fields of an add-song form.
async fn read_upload(mut multipart: Multipart) -> Result<SongUpload, SongError> {
    let mut upload = SongUpload::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error("Invalid multipart data".to_string(), e))?
    {
        let name = field.name().unwrap_or_default().to_string();

        if let Some(file_name) = field.file_name().map(str::to_string) {
            let content_type = field
                .content_type()
                .unwrap_or(DEFAULT_CONTENT_TYPE)
                .to_string();
            let slot = match name.as_str() {
                "file" => &mut upload.audio,
                "image" => &mut upload.image,
                _ => return Err(SongError::InvalidUpload(format!("Unexpected field: {}", name))),
            };
            if slot.is_some() {
                return Err(SongError::InvalidUpload(format!("Unexpected field: {}", name)));
            }
            let bytes = field
                .bytes()
                .await
                .map_err(|e| multipart_error(format!("Failed to read '{}'", file_name), e))?;
            debug!("Received {} ({}, {} bytes)", file_name, content_type, bytes.len());
            *slot = Some(FilePayload {
                file_name,
                content_type,
                bytes,
            });
            continue;
        }

        let slot = match name.as_str() {
            "name" => &mut upload.name,
            "artist" => &mut upload.artist,
            "category" => &mut upload.category,
            _ => continue,
        };
        let text = field
            .text()
            .await
            .map_err(|e| multipart_error(format!("Invalid field '{}'", name), e))?;
        *slot = Some(text);
    }

    Ok(upload)
}

pub async fn add_song_route(
    State(controller): State<SongController>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let upload = match multipart {
        Ok(multipart) => match read_upload(multipart).await {
            Ok(upload) => upload,
            Err(e) => return e.respond("Error uploading song").into_response(),
        },
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            return SongError::PayloadTooLarge(rejection.body_text())
                .respond("Error uploading song")
                .into_response();
        }
        Err(rejection) => {
            // Not a multipart body, so there is no audio file either.
            debug!("Add-song without multipart body: {}", rejection);
            SongUpload::default()
        }
    };

    match controller.upload_song(upload).await {
        Ok(uploaded) => (
            StatusCode::OK,
            Json(AddSongResponse {
                message: "Song uploaded successfully!".to_string(),
                song_id: uploaded.id,
                audio_url: uploaded.audio_url,
                image_url: uploaded.image_url,
            }),
        )
            .into_response(),
        Err(e) => e.respond("Error uploading song").into_response(),
    }
}

fn listing(result: Result<Vec<Song>, SongError>, empty: &str, failure: &str) -> Response {
    match result {
        Ok(songs) if songs.is_empty() => {
            (StatusCode::NOT_FOUND, Json(MessageResponse::new(empty))).into_response()
        }
        Ok(songs) => (StatusCode::OK, Json(songs)).into_response(),
        Err(e) => e.respond(failure).into_response(),
    }
}

pub async fn list_songs_route(State(controller): State<SongController>) -> Response {
    listing(
        controller.list_songs().await,
        "No songs found.",
        "Error fetching songs",
    )
}

pub async fn list_by_category_route(
    State(controller): State<SongController>,
    Path(category): Path<String>,
) -> Response {
    listing(
        controller.list_songs_by_category(&category).await,
        "ไม่พบเพลงในหมวดหมู่นี้",
        "Error fetching songs by category",
    )
}

pub async fn delete_song_route(
    State(controller): State<SongController>,
    Path(id): Path<String>,
) -> Response {
    match controller.delete_song(&id).await {
        Ok(song) => {
            info!("Removed song {} from both stores", song.id);
            (
                StatusCode::OK,
                Json(MessageResponse::new(
                    "ลบเพลงสำเร็จทั้งใน Firestore และ Supabase",
                )),
            )
                .into_response()
        }
        Err(e) => e.respond("เกิดข้อผิดพลาด").into_response(),
    }
}
