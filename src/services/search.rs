use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::{
    config::Config,
    error::{AppError, Result},
    models::video::VideoResult,
    services::filter,
    state::AppState,
};

/// Appended to every query sent to the provider.
pub const QUERY_SUFFIX: &str = " children kids songs";
/// Results requested from the provider per search.
pub const MAX_RESULTS: u32 = 20;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// An external video search backend.
#[async_trait]
pub trait VideoProvider: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<VideoResult>>;
}

/// Validates the query, applies the parent's blocklists and asks the provider.
///
/// A blocked query returns before the provider is contacted.
pub async fn search(state: &AppState, raw_query: &str, parent_id: Uuid) -> Result<Vec<VideoResult>> {
    let query = filter::validate_query(raw_query)?;

    let (phrases, songs) = futures::try_join!(
        state.blocklists.list_phrases(parent_id),
        state.blocklists.list_songs(parent_id)
    )?;
    if let Err(e) = filter::check_query(&query, &phrases) {
        tracing::info!("Search blocked for parent {}", parent_id);
        return Err(e);
    }

    let results = state
        .videos
        .search(&format!("{}{}", query, QUERY_SUFFIX))
        .await?;
    let total = results.len();
    let results = filter::filter_results(results, &songs);

    tracing::debug!(
        "Search for parent {} returned {} results ({} blocked)",
        parent_id,
        results.len(),
        total - results.len()
    );
    Ok(results)
}

/// The YouTube Data API search resource.
pub struct YouTubeProvider {
    http: reqwest::Client,
    api_url: String,
    api_key: Option<Zeroizing<String>>,
}

impl YouTubeProvider {
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AppError::Internal(format!("HTTP client: {}", e)))?;
        Ok(Self {
            http,
            api_url: config.youtube_api_url.clone(),
            api_key: config.youtube_api_key.clone(),
        })
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Deserialize)]
struct SearchItem {
    id: ItemId,
    snippet: Option<Snippet>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemId {
    video_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    title: String,
    #[serde(default)]
    channel_title: String,
    #[serde(default)]
    thumbnails: Thumbnails,
}

#[derive(Deserialize, Default)]
struct Thumbnails {
    medium: Option<Thumbnail>,
    default: Option<Thumbnail>,
}

#[derive(Deserialize)]
struct Thumbnail {
    url: String,
}

fn parse_search_response(body: &str) -> Result<Vec<VideoResult>> {
    let response: SearchResponse = sonic_rs::from_str(body)
        .map_err(|e| AppError::Upstream(format!("Unreadable search response: {}", e)))?;

    Ok(response
        .items
        .into_iter()
        .filter_map(|item| {
            let video_id = item.id.video_id?;
            let snippet = item.snippet?;
            let thumbnail = snippet
                .thumbnails
                .medium
                .or(snippet.thumbnails.default)
                .map(|t| t.url)
                .unwrap_or_default();
            Some(VideoResult {
                video_id,
                title: snippet.title,
                thumbnail,
                channel_title: snippet.channel_title,
            })
        })
        .collect())
}

#[async_trait]
impl VideoProvider for YouTubeProvider {
    async fn search(&self, query: &str) -> Result<Vec<VideoResult>> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| AppError::Upstream("YouTube API key not configured".to_string()))?;

        let max_results = MAX_RESULTS.to_string();
        let response = self
            .http
            .get(&self.api_url)
            .query(&[
                ("part", "snippet"),
                ("q", query),
                ("type", "video"),
                ("videoCategoryId", "10"),
                ("safeSearch", "strict"),
                ("maxResults", max_results.as_str()),
                ("key", api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("YouTube request failed: {}", e.without_url())))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::Upstream(format!("YouTube body: {}", e.without_url())))?;

        if !status.is_success() {
            return Err(AppError::Upstream(format!(
                "YouTube returned {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        parse_search_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_provider_items() {
        let body = r#"{
            "items": [
                {
                    "id": {"kind": "youtube#video", "videoId": "abc123"},
                    "snippet": {
                        "title": "Baby Shark",
                        "channelTitle": "Pinkfong",
                        "thumbnails": {
                            "default": {"url": "https://i.ytimg.com/d.jpg"},
                            "medium": {"url": "https://i.ytimg.com/m.jpg"}
                        }
                    }
                },
                {
                    "id": {"kind": "youtube#channel", "channelId": "xyz"},
                    "snippet": {"title": "A channel", "channelTitle": "", "thumbnails": {}}
                }
            ]
        }"#;

        let results = parse_search_response(body).unwrap();
        assert_eq!(
            results,
            vec![VideoResult {
                video_id: "abc123".to_string(),
                title: "Baby Shark".to_string(),
                thumbnail: "https://i.ytimg.com/m.jpg".to_string(),
                channel_title: "Pinkfong".to_string(),
            }]
        );
    }

    #[test]
    fn missing_items_is_empty() {
        assert!(parse_search_response("{}").unwrap().is_empty());
    }

    #[test]
    fn garbage_is_an_upstream_error() {
        assert!(matches!(
            parse_search_response("<html>"),
            Err(AppError::Upstream(_))
        ));
    }
}
