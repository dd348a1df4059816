use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Failures talking to the object store.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object store request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("object store returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("object store unavailable: {0}")]
    Unavailable(String),
}

/// Failures talking to the metadata store.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error("metadata store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum SongError {
    #[error("No audio file uploaded.")]
    MissingAudio,

    #[error("{0}")]
    InvalidUpload(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("song {0} not found")]
    NotFound(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error("failed to remove {} blob(s): {}", .0.len(), .0.join("; "))]
    BlobCleanup(Vec<String>),
}

pub const NOT_FOUND_MESSAGE: &str = "เพลงไม่พบ";

impl SongError {
    /// Shapes the error for the client; `context` is the message used for upstream failures.
    pub fn respond(self, context: &str) -> ApiError {
        match self {
            SongError::MissingAudio | SongError::InvalidUpload(_) => ApiError {
                status: StatusCode::BAD_REQUEST,
                message: self.to_string(),
                error: None,
            },
            SongError::PayloadTooLarge(_) => ApiError {
                status: StatusCode::PAYLOAD_TOO_LARGE,
                message: self.to_string(),
                error: None,
            },
            SongError::NotFound(_) => ApiError {
                status: StatusCode::NOT_FOUND,
                message: NOT_FOUND_MESSAGE.to_string(),
                error: None,
            },
            upstream => {
                error!(context = context, error = %upstream, "request failed upstream");
                ApiError {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    message: context.to_string(),
                    error: Some(upstream.to_string()),
                }
            }
        }
    }
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub error: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match self.error {
            Some(error) => json!({ "message": self.message, "error": error }),
            None => json!({ "message": self.message }),
        };
        (self.status, Json(body)).into_response()
    }
}
