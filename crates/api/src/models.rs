//! Wire representation of stream descriptors
//!
//! Stremio expects either a `url` or an `infoHash`/`fileIdx` pair per
//! stream; the cached descriptor keeps both identities around, so the
//! wire shape is derived here.

use serde::Serialize;
use streamarr_core::models::StreamDescriptor;

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub streams: Vec<StremioStream>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StremioStream {
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_idx: Option<u32>,
    pub behavior_hints: BehaviorHints,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BehaviorHints {
    pub binge_group: String,
    pub filename: String,
}

impl From<StreamDescriptor> for StremioStream {
    fn from(descriptor: StreamDescriptor) -> Self {
        let (info_hash, file_idx) = if descriptor.url.is_some() {
            (None, None)
        } else {
            (descriptor.info_hash, descriptor.file_index)
        };
        StremioStream {
            name: descriptor.name,
            description: descriptor.description,
            url: descriptor.url,
            info_hash,
            file_idx,
            behavior_hints: BehaviorHints {
                binge_group: descriptor.binge_group,
                filename: descriptor.filename,
            },
        }
    }
}
