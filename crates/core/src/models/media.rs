//! Media request models
//!
//! A [`MediaRequest`] identifies what the client is asking for: a movie or
//! a single series episode. It is created once per request and never
//! mutated. Metadata resolution (title lookup) happens upstream; the
//! pipeline only needs the identifiers carried here.

use crate::error::{Result, StreamarrError};
use serde::{Deserialize, Serialize};

/// Whether a torrent is expected to hold a movie or a series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Movie,
    Series,
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaKind::Movie => write!(f, "movie"),
            MediaKind::Series => write!(f, "series"),
        }
    }
}

/// A single search target, tagged movie or series episode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MediaRequest {
    Movie {
        /// IMDB identifier (e.g. "tt0111161")
        id: String,
        /// Known titles, best first; may be empty when metadata was skipped
        titles: Vec<String>,
        year: Option<u16>,
        languages: Vec<String>,
    },
    SeriesEpisode {
        id: String,
        titles: Vec<String>,
        season: u32,
        episode: u32,
        languages: Vec<String>,
    },
}

impl MediaRequest {
    /// Parse the `{type}/{stream_id}` pair of the stream route.
    ///
    /// `stream_id` is the IMDB id for movies, or `imdbid:season:episode`
    /// for series. A trailing `.json` suffix is stripped.
    pub fn from_stream_path(
        stream_type: &str,
        stream_id: &str,
        languages: Vec<String>,
    ) -> Result<Self> {
        let stream_id = stream_id.trim_end_matches(".json");
        match stream_type {
            "movie" => Ok(MediaRequest::Movie {
                id: stream_id.to_string(),
                titles: Vec::new(),
                year: None,
                languages,
            }),
            "series" => {
                let mut parts = stream_id.split(':');
                let id = parts
                    .next()
                    .filter(|p| !p.is_empty())
                    .ok_or_else(|| StreamarrError::InvalidRequest {
                        message: format!("malformed series id: {stream_id}"),
                    })?
                    .to_string();
                let season = parse_segment(parts.next(), stream_id)?;
                let episode = parse_segment(parts.next(), stream_id)?;
                Ok(MediaRequest::SeriesEpisode {
                    id,
                    titles: Vec::new(),
                    season,
                    episode,
                    languages,
                })
            }
            other => Err(StreamarrError::InvalidRequest {
                message: format!("unknown stream type: {other}"),
            }),
        }
    }

    pub fn imdb_id(&self) -> &str {
        match self {
            MediaRequest::Movie { id, .. } => id,
            MediaRequest::SeriesEpisode { id, .. } => id,
        }
    }

    pub fn languages(&self) -> &[String] {
        match self {
            MediaRequest::Movie { languages, .. } => languages,
            MediaRequest::SeriesEpisode { languages, .. } => languages,
        }
    }

    pub fn season_episode(&self) -> Option<(u32, u32)> {
        match self {
            MediaRequest::Movie { .. } => None,
            MediaRequest::SeriesEpisode {
                season, episode, ..
            } => Some((*season, *episode)),
        }
    }

    pub fn kind(&self) -> MediaKind {
        match self {
            MediaRequest::Movie { .. } => MediaKind::Movie,
            MediaRequest::SeriesEpisode { .. } => MediaKind::Series,
        }
    }

    pub fn is_series(&self) -> bool {
        matches!(self, MediaRequest::SeriesEpisode { .. })
    }

    /// The same request, shifted to the next episode. Used by the
    /// background pre-fetch of the search pipeline.
    pub fn next_episode(&self) -> Option<MediaRequest> {
        match self {
            MediaRequest::Movie { .. } => None,
            MediaRequest::SeriesEpisode {
                id,
                titles,
                season,
                episode,
                languages,
            } => Some(MediaRequest::SeriesEpisode {
                id: id.clone(),
                titles: titles.clone(),
                season: *season,
                episode: episode + 1,
                languages: languages.clone(),
            }),
        }
    }
}

fn parse_segment(segment: Option<&str>, full: &str) -> Result<u32> {
    segment
        .and_then(|s| s.parse::<u32>().ok())
        .ok_or_else(|| StreamarrError::InvalidRequest {
            message: format!("malformed series id: {full}"),
        })
}
