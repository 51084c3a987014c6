//! Torrent items, availability codes and store names
//!
//! [`TorrentItem`] is the unit the smart container holds. It is created
//! from a [`RawResult`], mutated only by the container during
//! availability updates, and round-trips through the result cache as
//! JSON. Every field added after the first cached version carries a
//! serde default so older cached payloads still deserialize.

use crate::models::result::{Privacy, RawResult};
use crate::models::MediaKind;
use crate::parsing::ParsedMetadata;
use serde::{Deserialize, Serialize};

/// Internal store names understood by the aggregator gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreName {
    RealDebrid,
    AllDebrid,
    Premiumize,
    Torbox,
    DebridLink,
    EasyDebrid,
    Offcloud,
    PikPak,
}

impl StoreName {
    /// The internal name transmitted in aggregator request headers
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreName::RealDebrid => "realdebrid",
            StoreName::AllDebrid => "alldebrid",
            StoreName::Premiumize => "premiumize",
            StoreName::Torbox => "torbox",
            StoreName::DebridLink => "debridlink",
            StoreName::EasyDebrid => "easydebrid",
            StoreName::Offcloud => "offcloud",
            StoreName::PikPak => "pikpak",
        }
    }

    /// The 2-letter display code
    pub fn code(&self) -> &'static str {
        match self {
            StoreName::RealDebrid => "RD",
            StoreName::AllDebrid => "AD",
            StoreName::Premiumize => "PM",
            StoreName::Torbox => "TB",
            StoreName::DebridLink => "DL",
            StoreName::EasyDebrid => "ED",
            StoreName::Offcloud => "OC",
            StoreName::PikPak => "PK",
        }
    }

    pub fn parse(name: &str) -> Option<StoreName> {
        match name.to_ascii_lowercase().as_str() {
            "realdebrid" | "real-debrid" => Some(StoreName::RealDebrid),
            "alldebrid" => Some(StoreName::AllDebrid),
            "premiumize" => Some(StoreName::Premiumize),
            "torbox" => Some(StoreName::Torbox),
            "debridlink" => Some(StoreName::DebridLink),
            "easydebrid" => Some(StoreName::EasyDebrid),
            "offcloud" => Some(StoreName::Offcloud),
            "pikpak" => Some(StoreName::PikPak),
            _ => None,
        }
    }

    pub fn from_code(code: &str) -> Option<StoreName> {
        match code.to_ascii_uppercase().as_str() {
            "RD" => Some(StoreName::RealDebrid),
            "AD" => Some(StoreName::AllDebrid),
            "PM" => Some(StoreName::Premiumize),
            "TB" => Some(StoreName::Torbox),
            "DL" => Some(StoreName::DebridLink),
            "ED" => Some(StoreName::EasyDebrid),
            "OC" => Some(StoreName::Offcloud),
            "PK" => Some(StoreName::PikPak),
            _ => None,
        }
    }
}

/// Availability marker on a torrent item.
///
/// Either empty ("unknown / needs download"), a 2-letter direct code
/// (`RD`, `AD`, `PM`, `TB`, `DL`, `ED`, `OC`, `PK`), or a prefixed
/// aggregator code `ST:XX`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AvailabilityCode(String);

impl AvailabilityCode {
    pub fn empty() -> Self {
        AvailabilityCode(String::new())
    }

    pub fn direct(code: &str) -> Self {
        AvailabilityCode(code.to_ascii_uppercase())
    }

    pub fn aggregated(store: StoreName) -> Self {
        AvailabilityCode(format!("ST:{}", store.code()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `Some("AD")` for `ST:AD`, `None` for direct codes
    pub fn aggregator_store(&self) -> Option<&str> {
        self.0.strip_prefix("ST:")
    }

    /// The underlying 2-letter code regardless of aggregation
    pub fn provider_code(&self) -> Option<&str> {
        if self.0.is_empty() {
            None
        } else {
            Some(self.aggregator_store().unwrap_or(&self.0))
        }
    }
}

impl std::fmt::Display for AvailabilityCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One entry of a torrent's full file listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedFile {
    pub file_index: u32,
    pub file_name: String,
    pub size_bytes: u64,
    #[serde(default)]
    pub seasons: Vec<u32>,
    #[serde(default)]
    pub episodes: Vec<u32>,
}

/// The unit held by [`TorrentSmartContainer`](crate::container::TorrentSmartContainer)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TorrentItem {
    pub raw_title: String,
    pub info_hash: String,
    pub size_bytes: u64,
    #[serde(default)]
    pub magnet: Option<String>,
    #[serde(default)]
    pub torrent_file_url: Option<String>,
    pub seeders: u32,
    #[serde(default)]
    pub languages: Vec<String>,
    pub indexer_name: String,
    pub privacy: Privacy,
    pub media_kind: MediaKind,
    pub parsed: ParsedMetadata,

    /// Selected file inside the torrent. When set, `file_name` and
    /// `file_size_bytes` are set consistently.
    #[serde(default)]
    pub file_index: Option<u32>,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub file_size_bytes: Option<u64>,
    #[serde(default)]
    pub full_index: Option<Vec<IndexedFile>>,

    #[serde(default)]
    pub availability: AvailabilityCode,

    #[serde(default = "default_true")]
    pub is_cached: bool,
    #[serde(default = "default_true")]
    pub always_show: bool,
    #[serde(default)]
    pub pm_cached: Option<bool>,
    #[serde(default)]
    pub tb_cached: Option<bool>,
}

fn default_true() -> bool {
    true
}

impl TorrentItem {
    /// Convert an indexer result, deriving parsed metadata from the title.
    pub fn from_raw(raw: RawResult, media_kind: MediaKind) -> Self {
        let parsed = ParsedMetadata::from_title(&raw.raw_title);
        let mut languages = raw.languages;
        if languages.is_empty() {
            languages = parsed.languages.clone();
        }
        TorrentItem {
            raw_title: raw.raw_title,
            info_hash: raw.info_hash.to_ascii_lowercase(),
            size_bytes: raw.size_bytes,
            magnet: raw.magnet,
            torrent_file_url: raw.torrent_file_url,
            seeders: raw.seeders,
            languages,
            indexer_name: raw.indexer_name,
            privacy: raw.privacy,
            media_kind,
            parsed,
            file_index: None,
            file_name: None,
            file_size_bytes: None,
            full_index: None,
            availability: AvailabilityCode::empty(),
            is_cached: true,
            always_show: true,
            pm_cached: None,
            tb_cached: None,
        }
    }

    /// Magnet URI for this item, synthesized from the hash when the
    /// indexer did not provide one.
    pub fn magnet_uri(&self) -> Option<String> {
        self.magnet.clone().or_else(|| {
            if self.info_hash.is_empty() {
                None
            } else {
                Some(format!("magnet:?xt=urn:btih:{}", self.info_hash))
            }
        })
    }

    /// Update the selected-file triple in one step, keeping the
    /// consistency invariant.
    pub fn select_file(&mut self, file_index: u32, file_name: &str, size_bytes: u64) {
        self.file_index = Some(file_index);
        self.file_name = Some(file_name.to_string());
        self.file_size_bytes = Some(size_bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_availability_code_shapes() {
        assert!(AvailabilityCode::empty().is_empty());
        assert_eq!(AvailabilityCode::direct("rd").as_str(), "RD");
        let agg = AvailabilityCode::aggregated(StoreName::AllDebrid);
        assert_eq!(agg.as_str(), "ST:AD");
        assert_eq!(agg.aggregator_store(), Some("AD"));
        assert_eq!(agg.provider_code(), Some("AD"));
        assert_eq!(AvailabilityCode::direct("TB").provider_code(), Some("TB"));
        assert_eq!(AvailabilityCode::empty().provider_code(), None);
    }

    #[test]
    fn test_store_name_round_trip() {
        for store in [
            StoreName::RealDebrid,
            StoreName::AllDebrid,
            StoreName::Premiumize,
            StoreName::Torbox,
            StoreName::DebridLink,
            StoreName::EasyDebrid,
            StoreName::Offcloud,
            StoreName::PikPak,
        ] {
            assert_eq!(StoreName::parse(store.as_str()), Some(store));
            assert_eq!(StoreName::from_code(store.code()), Some(store));
        }
        assert_eq!(StoreName::parse("real-debrid"), Some(StoreName::RealDebrid));
    }

    #[test]
    fn test_item_serde_defaults_forward_compat() {
        // A cached payload from before the per-provider flags existed
        let json = r#"{
            "raw_title": "Movie.2020.1080p.WEB-DL.x264-GRP",
            "info_hash": "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa",
            "size_bytes": 1000,
            "seeders": 10,
            "indexer_name": "jackett",
            "privacy": "public",
            "media_kind": "movie",
            "parsed": {}
        }"#;
        let item: TorrentItem = serde_json::from_str(json).unwrap();
        assert!(item.availability.is_empty());
        assert!(item.is_cached);
        assert!(item.always_show);
        assert_eq!(item.pm_cached, None);
    }

    #[test]
    fn test_magnet_uri_synthesis() {
        let raw = RawResult {
            raw_title: "X".into(),
            info_hash: "b".repeat(40),
            size_bytes: 1,
            magnet: None,
            torrent_file_url: None,
            seeders: 0,
            languages: vec![],
            indexer_name: "t".into(),
            privacy: Privacy::Public,
        };
        let item = TorrentItem::from_raw(raw, MediaKind::Movie);
        assert_eq!(
            item.magnet_uri().unwrap(),
            format!("magnet:?xt=urn:btih:{}", "b".repeat(40))
        );
    }
}
