use std::time::Duration;

use serde::Deserialize;

/// Response from the video metadata endpoint (`/x/web-interface/view`)
#[derive(Debug, Clone, Deserialize)]
pub struct ViewResponse {
    pub code: i64,
    #[serde(default)]
    pub message: String,
    pub data: Option<ViewData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ViewData {
    pub bvid: String,
    pub title: String,
    pub cid: u64,
    #[serde(default)]
    pub pages: Vec<PageEntry>,
}

/// One part of a multi-part upload, as listed by the metadata endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct PageEntry {
    pub cid: u64,
    pub page: u32,
}

/// Response from the stream resolution endpoint (`/x/player/playurl`)
#[derive(Debug, Clone, Deserialize)]
pub struct PlayUrlResponse {
    pub code: i64,
    #[serde(default)]
    pub message: String,
    pub data: Option<PlayUrlData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlayUrlData {
    pub dash: Option<DashStreams>,
    #[serde(default)]
    pub durl: Vec<DurlEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DashStreams {
    #[serde(default)]
    pub audio: Vec<DashAudio>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DashAudio {
    pub bandwidth: u64,
    #[serde(rename = "baseUrl")]
    pub base_url: String,
}

/// Legacy whole-file stream entry, returned when no DASH manifest exists
#[derive(Debug, Clone, Deserialize)]
pub struct DurlEntry {
    pub url: String,
}

/// Configuration for the API client
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub api_base_url: String,
    /// Referrer the origin server expects; requests without it are rejected.
    pub referer: String,
    /// Realistic browser identifier, required for the same reason.
    pub user_agent: String,
    /// Deadline applied to each request (and to each chunk of a streaming
    /// fetch). Closes the hung-request gap of the callback-era design.
    pub request_timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.bilibili.com".to_string(),
            referer: "https://www.bilibili.com".to_string(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36"
                .to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}
