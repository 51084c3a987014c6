//! Jackett indexer client
//!
//! Queries Jackett's aggregate results endpoint across all configured
//! trackers. Categories: 2000 (movies) or 5000 (TV) depending on the
//! request.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use streamarr_core::models::{MediaRequest, Privacy, RawResult};
use streamarr_core::parsing::magnet::info_hash_from_magnet;
use streamarr_core::retry::{with_retries, RetrySchedule};
use streamarr_core::traits::IndexerClient;
use streamarr_core::{Result, StreamarrError};
use tracing::debug;

const INDEXER_NAME: &str = "jackett";

pub struct JackettClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl JackettClient {
    pub fn new(client: reqwest::Client, base_url: &str, api_key: &str) -> Self {
        JackettClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    fn search_url(&self, media: &MediaRequest) -> String {
        let (query, category) = match media {
            MediaRequest::Movie { id, titles, year, .. } => {
                let mut text = titles.first().cloned().unwrap_or_else(|| id.clone());
                if let Some(year) = year {
                    text.push_str(&format!(" {year}"));
                }
                (text, 2000)
            }
            MediaRequest::SeriesEpisode {
                id,
                titles,
                season,
                episode,
                ..
            } => {
                let base = titles.first().cloned().unwrap_or_else(|| id.clone());
                (format!("{base} S{season:02}E{episode:02}"), 5000)
            }
        };
        format!(
            "{}/api/v2.0/indexers/all/results?apikey={}&Query={}&Category[]={category}",
            self.base_url,
            self.api_key,
            urlencoding::encode(&query)
        )
    }

    fn to_raw_result(entry: &Value) -> Option<RawResult> {
        let raw_title = entry["Title"].as_str()?.to_string();
        let magnet = entry["MagnetUri"].as_str().map(String::from);
        let info_hash = entry["InfoHash"]
            .as_str()
            .map(str::to_lowercase)
            .or_else(|| magnet.as_deref().and_then(info_hash_from_magnet))
            .unwrap_or_default();
        let privacy = match entry["TrackerType"].as_str() {
            Some("public") => Privacy::Public,
            _ => Privacy::Private,
        };
        Some(RawResult {
            raw_title,
            info_hash,
            size_bytes: entry["Size"].as_u64().unwrap_or(0),
            magnet,
            torrent_file_url: entry["Link"].as_str().map(String::from),
            seeders: entry["Seeders"].as_u64().unwrap_or(0) as u32,
            languages: Vec::new(),
            indexer_name: entry["Tracker"]
                .as_str()
                .map(|t| format!("{INDEXER_NAME}:{t}"))
                .unwrap_or_else(|| INDEXER_NAME.to_string()),
            privacy,
        })
    }

    async fn fetch(&self, media: &MediaRequest) -> Result<Vec<RawResult>> {
        let response = self
            .client
            .get(self.search_url(media))
            .timeout(Duration::from_secs(20))
            .send()
            .await
            .map_err(|e| StreamarrError::ProviderTransient {
                service: INDEXER_NAME.to_string(),
                error: e.to_string(),
            })?;
        if !response.status().is_success() {
            return Err(StreamarrError::ProviderTransient {
                service: INDEXER_NAME.to_string(),
                error: format!("HTTP {}", response.status()),
            });
        }
        let body: Value = response
            .json()
            .await
            .map_err(|e| StreamarrError::ProviderTransient {
                service: INDEXER_NAME.to_string(),
                error: format!("invalid JSON: {e}"),
            })?;
        let results = body["Results"]
            .as_array()
            .map(|entries| entries.iter().filter_map(Self::to_raw_result).collect())
            .unwrap_or_default();
        Ok(results)
    }
}

#[async_trait]
impl IndexerClient for JackettClient {
    fn name(&self) -> &str {
        INDEXER_NAME
    }

    async fn search(&self, media: &MediaRequest) -> Result<Vec<RawResult>> {
        let results =
            with_retries(&RetrySchedule::indexer(), "jackett search", || self.fetch(media)).await?;
        debug!("jackett: {} results for {}", results.len(), media.imdb_id());
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_results_mapped_with_hash_from_magnet() {
        let server = MockServer::start().await;
        let hash = "d".repeat(40);
        Mock::given(method("GET"))
            .and(path("/api/v2.0/indexers/all/results"))
            .and(query_param("apikey", "key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "Results": [
                    {
                        "Title": "Movie.2020.1080p.WEB-DL",
                        "Tracker": "SomeTracker",
                        "TrackerType": "public",
                        "MagnetUri": format!("magnet:?xt=urn:btih:{hash}&dn=x"),
                        "Size": 1000,
                        "Seeders": 42
                    },
                    {
                        "Title": "Movie.2020.720p",
                        "Tracker": "PrivateOne",
                        "TrackerType": "private",
                        "Link": "https://jackett.example/dl/1.torrent",
                        "Size": 700,
                        "Seeders": 3
                    }
                ]
            })))
            .mount(&server)
            .await;

        let client = JackettClient::new(reqwest::Client::new(), &server.uri(), "key");
        let media = MediaRequest::Movie {
            id: "tt1".to_string(),
            titles: vec!["Movie".to_string()],
            year: Some(2020),
            languages: vec![],
        };
        let results = client.search(&media).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].info_hash, hash);
        assert_eq!(results[0].privacy, Privacy::Public);
        assert_eq!(results[0].seeders, 42);
        assert!(results[1].info_hash.is_empty());
        assert_eq!(results[1].privacy, Privacy::Private);
        assert!(results[1].torrent_file_url.is_some());
    }
}
