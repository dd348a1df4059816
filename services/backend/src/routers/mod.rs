use axum::{Router, routing::get};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::controllers::SongController;

pub mod root;
pub mod song;

pub use root::{health_check_route, root_route};
pub use song::song_routes;

/// Full application router over the given coordinator.
pub fn app(controller: SongController, max_upload_bytes: usize) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Core routes
        .route("/", get(root_route))
        .route("/health", get(health_check_route))
        // Song upload, listing and deletion
        .merge(song_routes(max_upload_bytes))
        // Middleware
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(controller)
}
