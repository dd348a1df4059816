use axum::extract::State;
use crate::controllers::{RootController, SongController};

pub async fn root_route(State(_controller): State<SongController>) -> impl axum::response::IntoResponse {
    RootController::root().await
}

pub async fn health_check_route(State(_controller): State<SongController>) -> impl axum::response::IntoResponse {
    RootController::health_check().await
}
