use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{header, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{library::FavoriteAction, usage::UsageReport, video::VideoResult};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors seen by the child client.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unreadable response: {0}")]
    Decode(String),

    /// The session token is unknown or expired. The user has to log in again.
    #[error("Session expired")]
    SessionExpired,

    /// The daily time limit is used up.
    #[error("Daily time limit reached")]
    Locked,

    /// A search hit the parent's blocklist.
    #[error("Blocked: {0}")]
    Blocked(String),

    #[error("Request failed ({status}): {message}")]
    Api { status: u16, message: String },
}

/// A freshly issued child session.
#[derive(Debug, Clone, Deserialize)]
pub struct PinSession {
    pub session_token: String,
    pub expires_at: DateTime<Utc>,
    pub child_id: Uuid,
    pub username: String,
    pub avatar_color: String,
    pub parent_id: Uuid,
}

#[derive(Deserialize, Default)]
struct ErrorBody {
    #[serde(default)]
    error: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    blocked: bool,
    #[serde(default)]
    is_locked: bool,
}

#[derive(Serialize)]
struct PinBody<'a> {
    child_id: Uuid,
    pin: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchBody<'a> {
    query: &'a str,
    parent_id: Uuid,
}

#[derive(Deserialize)]
struct SearchResults {
    results: Vec<VideoResult>,
}

#[derive(Serialize)]
struct IncrementBody {
    minutes_used: i32,
}

#[derive(Serialize)]
struct VideoBody<'a> {
    video_id: &'a str,
    video_title: &'a str,
    video_thumbnail: Option<&'a str>,
    search_query: Option<&'a str>,
}

#[derive(Deserialize)]
struct ToggleResult {
    action: FavoriteAction,
}

#[derive(Deserialize)]
struct Ack {}

/// Typed calls against the VibeOn API.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// `base_url` is the server origin, e.g. `http://127.0.0.1:3000`.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn verify_pin(&self, child_id: Uuid, pin: &str) -> Result<PinSession, ClientError> {
        let request = self
            .http
            .post(self.url("/api/child/verify-pin"))
            .json_body(&PinBody { child_id, pin })?;
        execute(request).await
    }

    /// Searches on behalf of the parent's child. A blocked phrase yields [`ClientError::Blocked`].
    pub async fn search(
        &self,
        query: &str,
        parent_id: Uuid,
    ) -> Result<Vec<VideoResult>, ClientError> {
        let request = self
            .http
            .post(self.url("/api/search"))
            .json_body(&SearchBody { query, parent_id })?;
        let results: SearchResults = execute(request).await?;
        Ok(results.results)
    }

    pub async fn get_usage(&self, token: &str) -> Result<UsageReport, ClientError> {
        let request = self.http.get(self.url("/api/child/usage"));
        with_session(request, token).await
    }

    /// Adds `minutes` to today's usage. Not idempotent: a retried call counts twice.
    pub async fn increment_usage(
        &self,
        token: &str,
        minutes: i32,
    ) -> Result<UsageReport, ClientError> {
        let request = self
            .http
            .post(self.url("/api/child/usage"))
            .json_body(&IncrementBody {
                minutes_used: minutes,
            })?;
        with_session(request, token).await
    }

    pub async fn toggle_favorite(
        &self,
        token: &str,
        video: &VideoResult,
    ) -> Result<FavoriteAction, ClientError> {
        let request = self
            .http
            .post(self.url("/api/child/favorites/toggle"))
            .json_body(&VideoBody {
                video_id: &video.video_id,
                video_title: &video.title,
                video_thumbnail: Some(&video.thumbnail),
                search_query: None,
            })?;
        let result: ToggleResult = with_session(request, token).await?;
        Ok(result.action)
    }

    pub async fn append_history(
        &self,
        token: &str,
        video: &VideoResult,
        search_query: Option<&str>,
    ) -> Result<(), ClientError> {
        let request = self
            .http
            .post(self.url("/api/child/history"))
            .json_body(&VideoBody {
                video_id: &video.video_id,
                video_title: &video.title,
                video_thumbnail: Some(&video.thumbnail),
                search_query,
            })?;
        let _: Ack = with_session(request, token).await?;
        Ok(())
    }

    pub async fn logout(&self, token: &str) -> Result<(), ClientError> {
        let request = self.http.post(self.url("/api/child/logout"));
        let _: Ack = with_session(request, token).await?;
        Ok(())
    }
}

trait JsonBody: Sized {
    fn json_body<T: Serialize>(self, body: &T) -> Result<Self, ClientError>;
}

impl JsonBody for RequestBuilder {
    fn json_body<T: Serialize>(self, body: &T) -> Result<Self, ClientError> {
        let body = sonic_rs::to_string(body).map_err(|e| ClientError::Decode(e.to_string()))?;
        Ok(self
            .header(header::CONTENT_TYPE, "application/json")
            .body(body))
    }
}

async fn with_session<T: DeserializeOwned>(
    request: RequestBuilder,
    token: &str,
) -> Result<T, ClientError> {
    match execute(request.bearer_auth(token)).await {
        Err(ClientError::Api { status: 401, .. }) => Err(ClientError::SessionExpired),
        other => other,
    }
}

async fn execute<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, ClientError> {
    let response = request.send().await?;
    let status = response.status();
    let body = response.bytes().await?;

    if status.is_success() {
        return sonic_rs::from_slice(&body).map_err(|e| ClientError::Decode(e.to_string()));
    }
    Err(error_from(status, &body))
}

fn error_from(status: StatusCode, body: &[u8]) -> ClientError {
    let parsed: ErrorBody = sonic_rs::from_slice(body).unwrap_or_default();
    if parsed.blocked {
        return ClientError::Blocked(parsed.message.unwrap_or(parsed.error));
    }
    if parsed.is_locked {
        return ClientError::Locked;
    }
    ClientError::Api {
        status: status.as_u16(),
        message: parsed.error,
    }
}
