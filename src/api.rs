//! Campaign backend client.
//!
//! Wraps the HTTP endpoints the kiosk consumes behind the [`Backend`] trait so
//! the controller can be driven by a scripted backend in tests.

use crate::schedule::ScheduleStatus;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{header, Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP error! status: {0}")]
    Status(u16),

    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid backend URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("{0}")]
    Setup(String),
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::Status(404))
    }
}

/// Raw `/next-video` response.
#[derive(Debug, Clone)]
pub struct MediaPayload {
    pub content_type: String,
    pub bytes: Bytes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoType {
    Campaign,
    Filler,
    /// The "no scheduled content" image.
    Placeholder,
    /// Any type this build doesn't know about.
    #[serde(other)]
    Other,
}

/// What the backend says is on screen.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct VideoInfo {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(rename = "type")]
    pub video_type: VideoType,
    #[serde(default)]
    pub campaign_name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CampaignSummary {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub plays_today: u32,
    #[serde(default)]
    pub plays_this_hour: u32,
    #[serde(default)]
    pub video_exists: bool,
    #[serde(default)]
    pub video_file: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CampaignStatus {
    /// ISO-8601, with or without an offset.
    pub current_time: String,
    #[serde(default)]
    pub total_campaigns: u32,
    #[serde(default)]
    pub campaigns: Vec<CampaignSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceSetup {
    pub device_name: String,
    pub location_id: i64,
    pub stream_type: String,
}

/// Where the kiosk goes after a successful setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamRoute {
    Video,
    Audio,
}

impl StreamRoute {
    pub fn for_stream_type(stream_type: &str) -> Self {
        if stream_type == "audio" {
            StreamRoute::Audio
        } else {
            StreamRoute::Video
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            StreamRoute::Video => "/video",
            StreamRoute::Audio => "/audio",
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReloadResult {
    #[serde(default)]
    pub message: Option<String>,
}

#[async_trait]
pub trait Backend: Send + Sync {
    /// `GET /next-video`, with `skip=true` when `force_skip`.
    async fn next_media(&self, force_skip: bool) -> Result<MediaPayload, ApiError>;

    /// `GET /api/current-video-id`. `Ok(None)` when nothing is loaded yet (404).
    async fn current_video(&self) -> Result<Option<VideoInfo>, ApiError>;

    async fn campaign_status(&self) -> Result<CampaignStatus, ApiError>;

    async fn schedule_status(&self) -> Result<ScheduleStatus, ApiError>;

    async fn setup_device(&self, setup: &DeviceSetup) -> Result<StreamRoute, ApiError>;

    async fn reload_schedule(&self) -> Result<ReloadResult, ApiError>;

    async fn reload_campaigns(&self) -> Result<ReloadResult, ApiError>;
}

/// [`Backend`] over HTTP.
pub struct HttpBackend {
    client: Client,
    base: Url,
}

impl HttpBackend {
    pub fn new(client: Client, server_url: &str) -> Result<Self, ApiError> {
        let mut base = Url::parse(server_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self { client, base })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.base.join(path)?)
    }

    /// URL for the next media item. `cache_bust` defeats intermediary caches.
    pub fn next_media_url(&self, force_skip: bool, cache_bust: u128) -> Result<Url, ApiError> {
        let mut url = self.endpoint("next-video")?;
        {
            let mut query = url.query_pairs_mut();
            if force_skip {
                query.append_pair("skip", "true");
            }
            query.append_pair("_t", &cache_bust.to_string());
        }
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.endpoint(path)?;
        tracing::debug!("GET {}", url);
        let res = self.client.get(url).send().await?;
        if !res.status().is_success() {
            return Err(ApiError::Status(res.status().as_u16()));
        }
        let body = res.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn post_reload(&self, path: &str) -> Result<ReloadResult, ApiError> {
        let url = self.endpoint(path)?;
        tracing::debug!("POST {}", url);
        let res = self.client.post(url).send().await?;
        let status = res.status();
        let body = res.bytes().await?;
        if !status.is_success() {
            let message = serde_json::from_slice::<ErrorBody>(&body)
                .ok()
                .and_then(|b| b.error);
            return Err(match message {
                Some(message) => ApiError::Setup(message),
                None => ApiError::Status(status.as_u16()),
            });
        }
        Ok(serde_json::from_slice(&body)?)
    }
}

fn cache_bust_token() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}

#[async_trait]
impl Backend for HttpBackend {
    async fn next_media(&self, force_skip: bool) -> Result<MediaPayload, ApiError> {
        let url = self.next_media_url(force_skip, cache_bust_token())?;
        tracing::debug!("GET {}", url);

        let res = self
            .client
            .get(url)
            .header(header::CACHE_CONTROL, "no-cache")
            .header(header::PRAGMA, "no-cache")
            .send()
            .await?;
        if !res.status().is_success() {
            return Err(ApiError::Status(res.status().as_u16()));
        }

        let content_type = res
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_lowercase();
        let bytes = res.bytes().await?;

        Ok(MediaPayload {
            content_type,
            bytes,
        })
    }

    async fn current_video(&self) -> Result<Option<VideoInfo>, ApiError> {
        match self.get_json("api/current-video-id").await {
            Ok(info) => Ok(Some(info)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn campaign_status(&self) -> Result<CampaignStatus, ApiError> {
        self.get_json("api/campaign-status").await
    }

    async fn schedule_status(&self) -> Result<ScheduleStatus, ApiError> {
        self.get_json("api/schedule-status").await
    }

    async fn setup_device(&self, setup: &DeviceSetup) -> Result<StreamRoute, ApiError> {
        let url = self.endpoint("api/device/setup")?;
        tracing::debug!("POST {} for {}", url, setup.device_name);

        let res = self.client.post(url).json(setup).send().await?;
        let status = res.status();
        let body = res.bytes().await?;

        if status.is_success() {
            return Ok(StreamRoute::for_stream_type(&setup.stream_type));
        }

        let message = serde_json::from_slice::<ErrorBody>(&body)
            .ok()
            .and_then(|b| b.error)
            .unwrap_or_else(|| {
                StatusCode::from_u16(status.as_u16())
                    .ok()
                    .and_then(|s| s.canonical_reason())
                    .unwrap_or("setup rejected")
                    .to_string()
            });
        Err(ApiError::Setup(message))
    }

    async fn reload_schedule(&self) -> Result<ReloadResult, ApiError> {
        self.post_reload("api/reload-schedule").await
    }

    async fn reload_campaigns(&self) -> Result<ReloadResult, ApiError> {
        self.post_reload("api/reload-campaigns").await
    }
}
