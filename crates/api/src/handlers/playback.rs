//! Playback endpoints
//!
//! `GET /playback/{config}/{query}` resolves the encoded query to a
//! direct URL and redirects: 301 for a resolved link, 302 for the
//! placeholder while a download is still warming up. HEAD always
//! answers 200 so clients keep the entry selectable. The aggregator
//! variant carries the store code in the path and dispatches the same
//! query through the aggregator branch of the resolver.

use crate::error::ApiResult;
use crate::state::{client_ip, AppState};
use axum::extract::{ConnectInfo, Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use std::net::SocketAddr;
use streamarr_core::models::{PlaybackQuery, UserConfig};
use tracing::{debug, info};

fn redirect(status: StatusCode, url: &str) -> Response {
    (status, [(header::LOCATION, url.to_string())]).into_response()
}

fn head_ok() -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "video/mp4"),
            (header::ACCEPT_RANGES, "bytes"),
            (header::CACHE_CONTROL, "no-store, no-cache, must-revalidate, max-age=0"),
            (header::CONTENT_LENGTH, "0"),
        ],
    )
        .into_response()
}

async fn resolve_and_redirect(
    state: &AppState,
    config: &UserConfig,
    query: &PlaybackQuery,
    decoded_query: &str,
    ip: &str,
) -> ApiResult<Response> {
    let link = state
        .resolver
        .resolve(config, query, decoded_query, ip)
        .await?;
    let status = if link == state.resolver.placeholder_url() {
        debug!("redirecting to placeholder while content warms up");
        StatusCode::FOUND
    } else {
        StatusCode::MOVED_PERMANENTLY
    };
    Ok(redirect(status, &link))
}

pub async fn playback_get(
    State(state): State<AppState>,
    Path((config_b64, query_b64)): Path<(String, String)>,
    headers: HeaderMap,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
) -> ApiResult<Response> {
    let config = UserConfig::decode_b64(&config_b64)?;
    let ip = client_ip(&headers, peer);
    state.check_api_key(config.api_key.as_deref()).await?;

    let decoded_query = PlaybackQuery::decode_b64_raw(&query_b64)?;
    let query = PlaybackQuery::decode_b64(&query_b64)?;
    info!("playback: service {} from {ip}", query.service);

    resolve_and_redirect(&state, &config, &query, &decoded_query, &ip).await
}

pub async fn playback_head(
    State(state): State<AppState>,
    Path((config_b64, query_b64)): Path<(String, String)>,
) -> ApiResult<Response> {
    // Decode for validation only; availability is not probed on HEAD
    let config = UserConfig::decode_b64(&config_b64)?;
    state.check_api_key(config.api_key.as_deref()).await?;
    PlaybackQuery::decode_b64(&query_b64)?;
    Ok(head_ok())
}

pub async fn stremthru_get(
    State(state): State<AppState>,
    Path((store_code, config_b64, query_b64)): Path<(String, String, String)>,
    headers: HeaderMap,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
) -> ApiResult<Response> {
    let config = UserConfig::decode_b64(&config_b64)?;
    let ip = client_ip(&headers, peer);
    state.check_api_key(config.api_key.as_deref()).await?;

    let mut query = PlaybackQuery::decode_b64(&query_b64)?;
    // The path is authoritative for the store this playback runs on
    query.service = format!("ST:{}", store_code.to_ascii_uppercase());
    let decoded_query =
        serde_json::to_string(&query).map_err(|e| streamarr_core::StreamarrError::Internal {
            message: format!("query re-serialization failed: {e}"),
        })?;
    info!("stremthru playback via {} from {ip}", query.service);

    resolve_and_redirect(&state, &config, &query, &decoded_query, &ip).await
}

/// HEAD is unconditionally 200 so clients render the entry as
/// available; the GET does the real work.
pub async fn stremthru_head() -> Response {
    head_ok()
}
