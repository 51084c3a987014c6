//! Stream descriptor construction
//!
//! Turns ranked torrent items into the user-facing descriptor list.
//! The display name's first line encodes availability, the second the
//! resolution; the playback URL embeds the base64 query the resolver
//! decodes later. Aggregator-backed items use the dedicated URL shape
//! so playback dispatches to the aggregator branch.

use streamarr_core::models::{
    MediaRequest, PlaybackQuery, Privacy, StreamDescriptor, TorrentItem, UserConfig,
};
use streamarr_core::Result;
use tracing::debug;

const INSTANT: &str = "⚡";
const DOWNLOAD: &str = "⬇️";

pub struct StreamDescriptorBuilder<'a> {
    config: &'a UserConfig,
    config_b64: String,
}

impl<'a> StreamDescriptorBuilder<'a> {
    pub fn new(config: &'a UserConfig) -> Result<Self> {
        Ok(StreamDescriptorBuilder {
            config,
            config_b64: config.encode_b64()?,
        })
    }

    pub fn build(&self, items: &[TorrentItem], media: &MediaRequest) -> Vec<StreamDescriptor> {
        let limit = self.config.max_results as usize;
        let descriptors: Vec<StreamDescriptor> = items
            .iter()
            .take(limit)
            .filter_map(|item| self.build_one(item, media).ok())
            .collect();
        debug!(
            "built {} descriptors from {} items (cap {limit})",
            descriptors.len(),
            items.len()
        );
        descriptors
    }

    fn build_one(&self, item: &TorrentItem, media: &MediaRequest) -> Result<StreamDescriptor> {
        let name = format!(
            "{}\n({})",
            self.display_prefix(item),
            item.parsed.resolution.as_deref().unwrap_or("Unknown")
        );
        let description = self.description(item, media);
        let filename = item
            .file_name
            .clone()
            .unwrap_or_else(|| item.raw_title.clone());
        let binge_group = format!("stream-{}", item.info_hash);

        // Public torrents with no provider verdict go out as direct
        // torrent entries when torrenting is on; everything else plays
        // through the resolver.
        let direct_torrent = self.config.torrenting
            && item.availability.is_empty()
            && item.privacy == Privacy::Public
            && !item.info_hash.is_empty();
        let url = if direct_torrent {
            None
        } else {
            Some(self.playback_url(item, media)?)
        };

        Ok(StreamDescriptor {
            name,
            description,
            url,
            info_hash: Some(item.info_hash.clone()),
            file_index: item.file_index,
            service: Some(self.service_code(item)),
            binge_group,
            filename,
        })
    }

    fn service_code(&self, item: &TorrentItem) -> String {
        if item.availability.is_empty() {
            "DL".to_string()
        } else {
            item.availability.as_str().to_string()
        }
    }

    fn display_prefix(&self, item: &TorrentItem) -> String {
        let availability = &item.availability;
        if let Some(store_code) = availability.aggregator_store() {
            return if item.is_cached {
                format!("{INSTANT}ST:{store_code}+")
            } else {
                format!("{DOWNLOAD}ST:{store_code}")
            };
        }
        match availability.as_str() {
            "" => format!(
                "{DOWNLOAD}{}",
                item.file_name.as_deref().unwrap_or(&item.raw_title)
            ),
            "PM" => {
                if item.pm_cached == Some(true) {
                    format!("{INSTANT}PM+")
                } else {
                    format!("{DOWNLOAD}PM")
                }
            }
            "TB" => {
                if item.tb_cached == Some(true) {
                    format!("{INSTANT}TB+")
                } else {
                    format!("{DOWNLOAD}TB")
                }
            }
            code => format!("{INSTANT}{code}+"),
        }
    }

    fn description(&self, item: &TorrentItem, media: &MediaRequest) -> String {
        let mut description = format!("{}\n", item.raw_title);
        if media.is_series() {
            if let Some(file_name) = &item.file_name {
                description.push_str(&format!("{file_name}\n"));
            }
        }

        if item.languages.is_empty() {
            description.push_str("🌐");
        } else {
            let flags: Vec<&str> = item.languages.iter().map(|l| language_flag(l)).collect();
            description.push_str(&flags.join("/"));
        }
        if let Some(group) = &item.parsed.group {
            description.push_str(&format!("  ☠️ {group}"));
        }
        description.push('\n');

        let size_gb = item.file_size_bytes.unwrap_or(item.size_bytes) as f64 / 1024f64.powi(3);
        description.push_str(&format!(
            "👥 {}   💾 {size_gb:.2}GB   🔍 {}\n",
            item.seeders, item.indexer_name
        ));

        let mut technical = Vec::new();
        if !item.parsed.codec.is_empty() {
            technical.push(format!("🎥 {}", item.parsed.codec.join(" ")));
        }
        if let Some(quality) = &item.parsed.quality {
            technical.push(format!("📺 {quality}"));
        }
        if !item.parsed.audio.is_empty() {
            technical.push(format!("🎧 {}", item.parsed.audio.join(" ")));
        }
        if !technical.is_empty() {
            description.push_str(&technical.join(" "));
            description.push('\n');
        }
        description
    }

    fn playback_url(&self, item: &TorrentItem, media: &MediaRequest) -> Result<String> {
        let (season, episode) = match media.season_episode() {
            Some((s, e)) => (Some(s), Some(e)),
            None => (None, None),
        };
        let query = PlaybackQuery {
            magnet: item.magnet_uri(),
            info_hash: Some(item.info_hash.clone()),
            media_kind: item.media_kind,
            season,
            episode,
            file_index: item.file_index,
            torrent_download: item
                .torrent_file_url
                .as_deref()
                .map(|u| urlencoding::encode(u).into_owned()),
            service: self.service_code(item),
            privacy: Some(item.privacy),
            cached: Some(item.is_cached),
            always_show: Some(item.always_show),
        };
        let query_b64 = query.encode_b64()?;
        let host = self.config.addon_host.trim_end_matches('/');

        Ok(match item.availability.aggregator_store() {
            Some(store_code) => format!(
                "{host}/playback/stremthru/{store_code}/{}/{query_b64}",
                self.config_b64
            ),
            None => format!("{host}/playback/{}/{query_b64}", self.config_b64),
        })
    }
}

fn language_flag(language: &str) -> &'static str {
    match language.to_ascii_lowercase().as_str() {
        "fr" => "🇫🇷 FRENCH",
        "en" => "🇬🇧 ENGLISH",
        "es" => "🇪🇸 SPANISH",
        "de" => "🇩🇪 GERMAN",
        "it" => "🇮🇹 ITALIAN",
        "pt" => "🇵🇹 PORTUGUESE",
        "ru" => "🇷🇺 RUSSIAN",
        "nl" => "🇳🇱 DUTCH",
        "multi" => "🌍 MULTi",
        _ => "🇬🇧",
    }
}
