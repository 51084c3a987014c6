//! Per-request user configuration
//!
//! Every route carries the user's configuration as a base64-encoded JSON
//! document in the path. The wire shape uses camelCase keys and
//! `<XX>Token` entries that are either a bare string or an OAuth object.

use crate::error::{Result, StreamarrError};
use crate::models::torrent::StoreName;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

/// A provider credential: either a bare API key or an OAuth bundle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Token {
    Plain(String),
    OAuth {
        access_token: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        refresh_token: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        expires_at: Option<i64>,
    },
}

impl Token {
    pub fn secret(&self) -> &str {
        match self {
            Token::Plain(s) => s,
            Token::OAuth { access_token, .. } => access_token,
        }
    }

    /// A token is usable only if its secret is non-blank.
    pub fn is_valid(&self) -> bool {
        !self.secret().trim().is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserConfig {
    #[serde(default)]
    pub api_key: Option<String>,

    /// Enabled debrid services, by name or 2-letter code
    #[serde(default)]
    pub service: Vec<String>,

    #[serde(default, rename = "RDToken")]
    pub rd_token: Option<Token>,
    #[serde(default, rename = "ADToken")]
    pub ad_token: Option<Token>,
    #[serde(default, rename = "PMToken")]
    pub pm_token: Option<Token>,
    #[serde(default, rename = "TBToken")]
    pub tb_token: Option<Token>,

    /// Service the download flow should use; defaults to the only
    /// enabled service when exactly one is configured
    #[serde(default)]
    pub debrid_downloader: Option<String>,

    #[serde(default, alias = "stremthru_enabled")]
    pub stremthru_enabled: bool,
    #[serde(default, alias = "stremthru_url")]
    pub stremthru_url: Option<String>,

    #[serde(default)]
    pub jackett: bool,
    #[serde(default)]
    pub yggflix: bool,
    #[serde(default)]
    pub zilean: bool,
    #[serde(default)]
    pub sharewood: bool,

    /// Whether the public result cache participates in the pipeline
    #[serde(default)]
    pub cache: bool,

    #[serde(default)]
    pub metadata_provider: Option<String>,

    #[serde(default)]
    pub languages: Vec<String>,

    #[serde(default = "default_min_cached_results")]
    pub min_cached_results: u32,
    #[serde(default = "default_max_results")]
    pub max_results: u32,
    #[serde(default = "default_results_per_quality")]
    pub results_per_quality: u32,

    #[serde(default)]
    pub sort: String,

    #[serde(default)]
    pub addon_host: String,

    /// Emit direct-torrent descriptors for public results
    #[serde(default)]
    pub torrenting: bool,
}

fn default_min_cached_results() -> u32 {
    5
}

fn default_max_results() -> u32 {
    30
}

fn default_results_per_quality() -> u32 {
    5
}

impl UserConfig {
    pub fn decode_b64(encoded: &str) -> Result<UserConfig> {
        let unescaped = encoded.replace("%3D", "=");
        let bytes = BASE64
            .decode(unescaped.as_bytes())
            .map_err(|e| StreamarrError::InvalidRequest {
                message: format!("config is not valid base64: {e}"),
            })?;
        serde_json::from_slice(&bytes).map_err(|e| StreamarrError::InvalidRequest {
            message: format!("malformed config: {e}"),
        })
    }

    pub fn encode_b64(&self) -> Result<String> {
        let json = serde_json::to_string(self).map_err(|e| StreamarrError::Internal {
            message: format!("config serialization failed: {e}"),
        })?;
        Ok(BASE64.encode(json).replace('=', "%3D"))
    }

    /// Cache keys and locks are scoped per user: the API key when one is
    /// configured, otherwise the client address.
    pub fn user_identifier(&self, client_ip: &str) -> String {
        self.api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .unwrap_or(client_ip)
            .to_string()
    }

    pub fn token_for(&self, store: StoreName) -> Option<&Token> {
        match store {
            StoreName::RealDebrid => self.rd_token.as_ref(),
            StoreName::AllDebrid => self.ad_token.as_ref(),
            StoreName::Premiumize => self.pm_token.as_ref(),
            StoreName::Torbox => self.tb_token.as_ref(),
            _ => None,
        }
    }

    pub fn has_valid_token(&self, store: StoreName) -> bool {
        self.token_for(store).map(Token::is_valid).unwrap_or(false)
    }

    /// Whether an aggregator client participates in this request
    pub fn has_aggregator(&self) -> bool {
        self.stremthru_enabled && self.stremthru_url.is_some()
    }
}
