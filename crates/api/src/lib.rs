//! Streamarr API module
//!
//! Route wiring and wire-format mapping for the search and playback
//! endpoints. All orchestration lives in `streamarr-search`; handlers
//! decode the path-embedded config and query, gate on the API key, and
//! translate pipeline errors into status codes.

pub mod error;
pub mod handlers;
pub mod models;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use state::AppState;

use axum::routing::get;
use axum::Router;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/manifest.json", get(handlers::health::manifest))
        .route("/:config/manifest.json", get(handlers::health::manifest))
        .route(
            "/:config/stream/:stream_type/:stream_id",
            get(handlers::stream::search),
        )
        .route(
            "/playback/stremthru/:store_code/:config/:query",
            get(handlers::playback::stremthru_get).head(handlers::playback::stremthru_head),
        )
        .route(
            "/playback/:config/:query",
            get(handlers::playback::playback_get).head(handlers::playback::playback_head),
        )
        .with_state(state)
}
