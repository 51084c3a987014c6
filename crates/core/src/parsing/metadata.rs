//! Release title parsing
//!
//! Derives [`ParsedMetadata`] from a raw release title. Pure string
//! matching over compiled patterns; the same title always yields the same
//! metadata.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedMetadata {
    #[serde(default)]
    pub resolution: Option<String>,
    #[serde(default)]
    pub quality: Option<String>,
    #[serde(default)]
    pub codec: Vec<String>,
    #[serde(default)]
    pub audio: Vec<String>,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub seasons: Vec<u32>,
    #[serde(default)]
    pub episodes: Vec<u32>,
    #[serde(default)]
    pub languages: Vec<String>,
}

static RESOLUTION: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    vec![
        (Regex::new(r"(?i)\b(2160p|4k|uhd)\b").unwrap(), "2160p"),
        (Regex::new(r"(?i)\b1080p\b").unwrap(), "1080p"),
        (Regex::new(r"(?i)\b720p\b").unwrap(), "720p"),
        (Regex::new(r"(?i)\b576p\b").unwrap(), "576p"),
        (Regex::new(r"(?i)\b480p\b").unwrap(), "480p"),
    ]
});

static QUALITY: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    vec![
        (Regex::new(r"(?i)\bremux\b").unwrap(), "REMUX"),
        (Regex::new(r"(?i)\bblu-?ray\b").unwrap(), "BluRay"),
        (Regex::new(r"(?i)\bweb-?dl\b").unwrap(), "WEB-DL"),
        (Regex::new(r"(?i)\bwebrip\b").unwrap(), "WEBRip"),
        (Regex::new(r"(?i)\bhdtv\b").unwrap(), "HDTV"),
        (Regex::new(r"(?i)\bdvdrip\b").unwrap(), "DVDRip"),
        (Regex::new(r"(?i)\b(hdcam|camrip|\bcam\b)\b").unwrap(), "CAM"),
    ]
});

static CODEC: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    vec![
        (Regex::new(r"(?i)\b(x265|h\.?265|hevc)\b").unwrap(), "HEVC"),
        (Regex::new(r"(?i)\b(x264|h\.?264|avc)\b").unwrap(), "AVC"),
        (Regex::new(r"(?i)\bav1\b").unwrap(), "AV1"),
        (Regex::new(r"(?i)\bxvid\b").unwrap(), "XviD"),
    ]
});

static AUDIO: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    vec![
        (Regex::new(r"(?i)\batmos\b").unwrap(), "Atmos"),
        (Regex::new(r"(?i)\btruehd\b").unwrap(), "TrueHD"),
        (Regex::new(r"(?i)\bdts-?hd\b").unwrap(), "DTS-HD"),
        (Regex::new(r"(?i)\bdts\b").unwrap(), "DTS"),
        (Regex::new(r"(?i)\b(ddp|dd\+|eac3|e-ac-3)").unwrap(), "DDP"),
        (Regex::new(r"(?i)\b(dd5\.?1|ac3)\b").unwrap(), "AC3"),
        (Regex::new(r"(?i)\baac\b").unwrap(), "AAC"),
    ]
});

static LANGUAGES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    vec![
        (Regex::new(r"(?i)\bmulti\b").unwrap(), "multi"),
        (Regex::new(r"(?i)\b(vff|truefrench)\b").unwrap(), "fr"),
        (Regex::new(r"(?i)\b(vostfr|subfrench)\b").unwrap(), "fr"),
        (Regex::new(r"(?i)\b(french|vf2|vfq|vfi|vof|\bvf\b)\b").unwrap(), "fr"),
        (Regex::new(r"(?i)\b(english|\beng\b)\b").unwrap(), "en"),
        (Regex::new(r"(?i)\b(spanish|castellano)\b").unwrap(), "es"),
        (Regex::new(r"(?i)\b(german|deutsch)\b").unwrap(), "de"),
        (Regex::new(r"(?i)\bitalian\b").unwrap(), "it"),
    ]
});

static SEASON_EPISODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bS(\d{1,2})[\s.]?E(\d{1,3})\b").unwrap());
static SEASON_RANGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bS(\d{1,2})\s?-\s?S?(\d{1,2})\b").unwrap());
static SEASON_ONLY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:S|Saison\s|Season\s)(\d{1,2})\b").unwrap());
static X_FORMAT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{1,2})x(\d{2,3})\b").unwrap());
static GROUP: Lazy<Regex> = Lazy::new(|| Regex::new(r"-([A-Za-z0-9]+)\s*$").unwrap());

impl ParsedMetadata {
    pub fn from_title(title: &str) -> ParsedMetadata {
        let mut parsed = ParsedMetadata::default();

        for (pattern, label) in RESOLUTION.iter() {
            if pattern.is_match(title) {
                parsed.resolution = Some((*label).to_string());
                break;
            }
        }
        for (pattern, label) in QUALITY.iter() {
            if pattern.is_match(title) {
                parsed.quality = Some((*label).to_string());
                break;
            }
        }
        for (pattern, label) in CODEC.iter() {
            if pattern.is_match(title) {
                parsed.codec.push((*label).to_string());
            }
        }
        for (pattern, label) in AUDIO.iter() {
            if pattern.is_match(title) {
                parsed.audio.push((*label).to_string());
            }
        }
        for (pattern, label) in LANGUAGES.iter() {
            let label = (*label).to_string();
            if pattern.is_match(title) && !parsed.languages.contains(&label) {
                parsed.languages.push(label);
            }
        }

        for captures in SEASON_EPISODE.captures_iter(title) {
            if let (Some(s), Some(e)) = (parse_num(&captures, 1), parse_num(&captures, 2)) {
                push_unique(&mut parsed.seasons, s);
                push_unique(&mut parsed.episodes, e);
            }
        }
        for captures in X_FORMAT.captures_iter(title) {
            if let (Some(s), Some(e)) = (parse_num(&captures, 1), parse_num(&captures, 2)) {
                push_unique(&mut parsed.seasons, s);
                push_unique(&mut parsed.episodes, e);
            }
        }
        if let Some(captures) = SEASON_RANGE.captures(title) {
            if let (Some(start), Some(end)) = (parse_num(&captures, 1), parse_num(&captures, 2)) {
                if start <= end && end - start <= 50 {
                    for season in start..=end {
                        push_unique(&mut parsed.seasons, season);
                    }
                }
            }
        }
        if parsed.seasons.is_empty() {
            if let Some(captures) = SEASON_ONLY.captures(title) {
                if let Some(season) = parse_num(&captures, 1) {
                    parsed.seasons.push(season);
                }
            }
        }

        if let Some(captures) = GROUP.captures(title.trim()) {
            let group = captures.get(1).map(|m| m.as_str()).unwrap_or("");
            // Resolution or codec tokens at the tail are not release groups
            let tail_is_token = RESOLUTION.iter().any(|(p, _)| p.is_match(group))
                || CODEC.iter().any(|(p, _)| p.is_match(group));
            if !group.is_empty() && !tail_is_token {
                parsed.group = Some(group.to_string());
            }
        }

        parsed
    }
}

fn parse_num(captures: &regex::Captures<'_>, index: usize) -> Option<u32> {
    captures.get(index).and_then(|m| m.as_str().parse().ok())
}

fn push_unique(values: &mut Vec<u32>, value: u32) {
    if !values.contains(&value) {
        values.push(value);
    }
}
