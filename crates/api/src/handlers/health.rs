//! Health and addon manifest endpoints

use axum::Json;
use serde_json::{json, Value};

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

pub async fn manifest() -> Json<Value> {
    Json(json!({
        "id": "community.streamarr",
        "version": env!("CARGO_PKG_VERSION"),
        "name": "Streamarr",
        "description": "Debrid-backed torrent stream aggregator",
        "resources": ["stream"],
        "types": ["movie", "series"],
        "idPrefixes": ["tt"],
        "catalogs": [],
        "behaviorHints": {
            "configurable": true,
            "configurationRequired": false
        }
    }))
}
