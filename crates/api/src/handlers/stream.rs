//! Stream search endpoint
//!
//! `GET /{config_b64}/stream/{type}/{stream_id}`: decodes the user
//! config from the path, validates the API key when one is carried,
//! and runs the search pipeline. An empty stream list is a successful
//! response, never an error.

use crate::error::ApiResult;
use crate::models::{SearchResponse, StremioStream};
use crate::state::{client_ip, AppState};
use axum::extract::{ConnectInfo, Path, State};
use axum::http::HeaderMap;
use axum::Json;
use std::net::SocketAddr;
use streamarr_core::models::{MediaRequest, UserConfig};
use tracing::info;

pub async fn search(
    State(state): State<AppState>,
    Path((config_b64, stream_type, stream_id)): Path<(String, String, String)>,
    headers: HeaderMap,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
) -> ApiResult<Json<SearchResponse>> {
    let config = UserConfig::decode_b64(&config_b64)?;
    let ip = client_ip(&headers, peer);
    state.check_api_key(config.api_key.as_deref()).await?;

    let media = MediaRequest::from_stream_path(&stream_type, &stream_id, config.languages.clone())?;
    info!(
        "stream search: {} {} from {ip}",
        stream_type,
        media.imdb_id()
    );

    let descriptors = state.orchestrator.search(&media, &config, &ip).await?;
    let streams: Vec<StremioStream> = descriptors.into_iter().map(StremioStream::from).collect();
    Ok(Json(SearchResponse { streams }))
}
