//! Shared handler state

use std::net::SocketAddr;
use std::sync::Arc;
use streamarr_core::traits::ApiKeyValidator;
use streamarr_core::Result;
use streamarr_search::{PlaybackResolver, SearchOrchestrator};

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<SearchOrchestrator>,
    pub resolver: Arc<PlaybackResolver>,
    /// Absent when the deployment runs keyless
    pub api_keys: Option<Arc<dyn ApiKeyValidator>>,
}

impl AppState {
    /// Validate the config-carried API key when both a key and a
    /// validator are present; keyless requests pass through.
    pub async fn check_api_key(&self, api_key: Option<&str>) -> Result<()> {
        let (Some(validator), Some(key)) = (&self.api_keys, api_key) else {
            return Ok(());
        };
        validator.validate(key).await
    }
}

/// Client address for rate limiting and per-user cache keys; proxies
/// forward the original peer in X-Forwarded-For.
pub fn client_ip(headers: &axum::http::HeaderMap, peer: SocketAddr) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|list| list.split(',').next())
        .map(|ip| ip.trim().to_string())
        .unwrap_or_else(|| peer.ip().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderMap;

    #[test]
    fn test_client_ip_prefers_forwarded_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "10.1.2.3, 172.16.0.1".parse().unwrap());
        let peer: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        assert_eq!(client_ip(&headers, peer), "10.1.2.3");
    }

    #[test]
    fn test_client_ip_falls_back_to_peer() {
        let peer: SocketAddr = "192.168.1.5:9000".parse().unwrap();
        assert_eq!(client_ip(&HeaderMap::new(), peer), "192.168.1.5");
    }
}
