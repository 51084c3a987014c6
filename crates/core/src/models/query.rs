//! Playback query codec
//!
//! A descriptor's playback URL embeds everything the resolver needs as a
//! base64-encoded JSON document. Standard alphabet, with `=` padding
//! escaped as `%3D` so the token survives URL path segments unmangled.

use crate::error::{Result, StreamarrError};
use crate::models::result::Privacy;
use crate::models::MediaKind;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub magnet: Option<String>,

    #[serde(
        default,
        rename = "infoHash",
        skip_serializing_if = "Option::is_none"
    )]
    pub info_hash: Option<String>,

    #[serde(rename = "type")]
    pub media_kind: MediaKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_index: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub torrent_download: Option<String>,

    /// 2-letter provider code, `ST:XX`, or `DL` for the download service
    pub service: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub privacy: Option<Privacy>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cached: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub always_show: Option<bool>,
}

impl PlaybackQuery {
    pub fn encode_b64(&self) -> Result<String> {
        let json = serde_json::to_string(self).map_err(|e| StreamarrError::Internal {
            message: format!("query serialization failed: {e}"),
        })?;
        Ok(BASE64.encode(json).replace('=', "%3D"))
    }

    pub fn decode_b64(encoded: &str) -> Result<PlaybackQuery> {
        let json = Self::decode_b64_raw(encoded)?;
        serde_json::from_str(&json).map_err(|e| StreamarrError::InvalidRequest {
            message: format!("malformed playback query: {e}"),
        })
    }

    /// Decode to the raw JSON string. The resolver keys its caches and
    /// locks off this exact string, so it must be stable per query.
    pub fn decode_b64_raw(encoded: &str) -> Result<String> {
        let unescaped = encoded.replace("%3D", "=");
        let bytes = BASE64
            .decode(unescaped.as_bytes())
            .map_err(|e| StreamarrError::InvalidRequest {
                message: format!("query is not valid base64: {e}"),
            })?;
        String::from_utf8(bytes).map_err(|e| StreamarrError::InvalidRequest {
            message: format!("query is not valid UTF-8: {e}"),
        })
    }

    /// Whether the playback must be dispatched through the aggregator
    pub fn aggregator_store_code(&self) -> Option<&str> {
        self.service.strip_prefix("ST:")
    }

    /// The hash this query plays, taken from `info_hash` or the magnet
    pub fn resolved_info_hash(&self) -> Option<String> {
        if let Some(hash) = &self.info_hash {
            if hash.len() == 40 {
                return Some(hash.to_ascii_lowercase());
            }
        }
        self.magnet
            .as_deref()
            .and_then(crate::parsing::magnet::info_hash_from_magnet)
    }
}
