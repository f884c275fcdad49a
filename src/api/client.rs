use futures::StreamExt;
use reqwest::header::{REFERER, USER_AGENT};
use reqwest::Client;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::domain::{
    AppError, Result, StreamContainer, StreamDescriptor, VideoIdentity, VideoPart,
};

use super::models::{ApiConfig, PlayUrlResponse, ViewResponse};

/// Client for the upstream metadata, stream-resolution and media endpoints.
///
/// Covers the three network leaves of the pipeline: metadata lookup, stream
/// resolution and the binary fetch. Nothing here retries; failures propagate
/// unchanged to the orchestrator.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    config: ApiConfig,
}

impl ApiClient {
    pub fn new(config: ApiConfig) -> Self {
        Self {
            http: Client::new(),
            config,
        }
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    fn transport_error(err: reqwest::Error, what: &str) -> AppError {
        if err.is_timeout() {
            AppError::Timeout(format!("{what} timed out"))
        } else {
            AppError::Network(format!("{what} failed: {err}"))
        }
    }

    /// Resolve the page's video id to its title, primary content id and part
    /// list.
    pub async fn get_video_info(&self, video_id: &str) -> Result<VideoIdentity> {
        let url = format!(
            "{}/x/web-interface/view?bvid={}",
            self.config.api_base_url, video_id
        );

        let request = self
            .http
            .get(&url)
            .header(REFERER, &self.config.referer)
            .header(USER_AGENT, &self.config.user_agent)
            .send();

        let response = timeout(self.config.request_timeout, request)
            .await
            .map_err(|_| AppError::Timeout("video info request timed out".to_string()))?
            .map_err(|e| Self::transport_error(e, "video info request"))?;

        if !response.status().is_success() {
            return Err(AppError::Transport(format!(
                "video info request returned HTTP {}",
                response.status().as_u16()
            )));
        }

        // The body read needs its own deadline; a stalled origin that has
        // already sent headers must not hang the session.
        let body: ViewResponse = timeout(self.config.request_timeout, response.json())
            .await
            .map_err(|_| AppError::Timeout("video info response timed out".to_string()))?
            .map_err(|e| AppError::Network(format!("video info decode failed: {e}")))?;

        if body.code != 0 {
            return Err(AppError::Api(format!(
                "video info error {}: {}",
                body.code, body.message
            )));
        }

        let data = body
            .data
            .ok_or_else(|| AppError::Api("video info response missing data".to_string()))?;

        Ok(VideoIdentity {
            id: data.bvid,
            content_id: data.cid,
            title: data.title,
            parts: data
                .pages
                .into_iter()
                .map(|p| VideoPart {
                    content_id: p.cid,
                    index: p.page,
                })
                .collect(),
        })
    }

    /// Resolve the available audio streams for one content id, in descending
    /// bandwidth order.
    ///
    /// Prefers the DASH audio list; falls back to the legacy whole-file list.
    /// An empty result is `NoStreamsAvailable`, reported distinctly from
    /// transport errors because it usually means rights-restricted content.
    pub async fn get_audio_streams(
        &self,
        video_id: &str,
        content_id: u64,
    ) -> Result<Vec<StreamDescriptor>> {
        let url = format!(
            "{}/x/player/playurl?bvid={}&cid={}&fnval=16",
            self.config.api_base_url, video_id, content_id
        );

        let request = self
            .http
            .get(&url)
            .header(REFERER, &self.config.referer)
            .header(USER_AGENT, &self.config.user_agent)
            .send();

        let response = timeout(self.config.request_timeout, request)
            .await
            .map_err(|_| AppError::Timeout("stream resolution timed out".to_string()))?
            .map_err(|e| Self::transport_error(e, "stream resolution"))?;

        if !response.status().is_success() {
            return Err(AppError::Transport(format!(
                "stream resolution returned HTTP {}",
                response.status().as_u16()
            )));
        }

        let body: PlayUrlResponse = timeout(self.config.request_timeout, response.json())
            .await
            .map_err(|_| AppError::Timeout("stream resolution response timed out".to_string()))?
            .map_err(|e| AppError::Network(format!("stream resolution decode failed: {e}")))?;

        if body.code != 0 {
            return Err(AppError::Api(format!(
                "stream resolution error {}: {}",
                body.code, body.message
            )));
        }

        let data = body.data.ok_or(AppError::NoStreamsAvailable)?;

        let mut streams: Vec<StreamDescriptor> = Vec::new();
        if let Some(dash) = data.dash {
            streams = dash
                .audio
                .into_iter()
                .map(|a| StreamDescriptor {
                    url: a.base_url,
                    bandwidth_bits_per_sec: a.bandwidth,
                    container: StreamContainer::DashAudio,
                })
                .collect();
            // Stable sort keeps the resolver's own order among equal bandwidths.
            streams.sort_by(|a, b| b.bandwidth_bits_per_sec.cmp(&a.bandwidth_bits_per_sec));
        }

        if streams.is_empty() {
            streams = data
                .durl
                .into_iter()
                .map(|d| StreamDescriptor {
                    url: d.url,
                    bandwidth_bits_per_sec: 0,
                    container: StreamContainer::Legacy,
                })
                .collect();
        }

        if streams.is_empty() {
            return Err(AppError::NoStreamsAvailable);
        }

        Ok(streams)
    }

    /// Stream the selected URL's bytes into memory.
    ///
    /// `on_chunk` is called once per received network chunk with
    /// `(loaded_bytes, total_bytes)`; `total_bytes` is `None` when the origin
    /// does not declare a length. The referrer and client identifier headers
    /// are required by the origin, which rejects bare requests.
    pub async fn fetch_binary(
        &self,
        url: &str,
        mut on_chunk: impl FnMut(u64, Option<u64>),
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>> {
        let request = self
            .http
            .get(url)
            .header(REFERER, &self.config.referer)
            .header(USER_AGENT, &self.config.user_agent)
            .send();

        let response = timeout(self.config.request_timeout, request)
            .await
            .map_err(|_| AppError::Timeout("audio download timed out".to_string()))?
            .map_err(|e| Self::transport_error(e, "audio download"))?;

        if !response.status().is_success() {
            return Err(AppError::Transport(format!(
                "audio download returned HTTP {}",
                response.status().as_u16()
            )));
        }

        let total = response.content_length();
        let mut buffer: Vec<u8> = match total {
            Some(len) => Vec::with_capacity(len as usize),
            None => Vec::new(),
        };

        let mut stream = response.bytes_stream();
        loop {
            if cancel.is_cancelled() {
                return Err(AppError::Cancelled);
            }

            // Per-chunk inactivity deadline; a stalled stream must not hang
            // the session forever.
            let next = timeout(self.config.request_timeout, stream.next())
                .await
                .map_err(|_| AppError::Timeout("audio download stalled".to_string()))?;

            match next {
                Some(Ok(chunk)) => {
                    buffer.extend_from_slice(&chunk);
                    on_chunk(buffer.len() as u64, total);
                }
                Some(Err(e)) => {
                    return Err(Self::transport_error(e, "audio download"));
                }
                None => break,
            }
        }

        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client_for(server: &mockito::Server) -> ApiClient {
        ApiClient::new(ApiConfig {
            api_base_url: server.url(),
            ..ApiConfig::default()
        })
    }

    #[tokio::test]
    async fn video_info_resolves_identity_with_parts() {
        let mut server = mockito::Server::new_async().await;
        let body = json!({
            "code": 0,
            "message": "0",
            "data": {
                "bvid": "BV1xx411c7mD",
                "title": "some video",
                "cid": 111,
                "pages": [
                    { "cid": 111, "page": 1 },
                    { "cid": 222, "page": 2 }
                ]
            }
        });
        let mock = server
            .mock("GET", "/x/web-interface/view?bvid=BV1xx411c7mD")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .create_async()
            .await;

        let identity = client_for(&server)
            .get_video_info("BV1xx411c7mD")
            .await
            .unwrap();

        assert_eq!(identity.id, "BV1xx411c7mD");
        assert_eq!(identity.title, "some video");
        assert_eq!(identity.content_id, 111);
        assert_eq!(identity.parts.len(), 2);
        assert_eq!(identity.content_id_for_part(Some(2)), 222);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn video_info_surfaces_upstream_error_message() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/x/web-interface/view?bvid=BVgone")
            .with_status(200)
            .with_body(json!({ "code": -404, "message": "啥都木有" }).to_string())
            .create_async()
            .await;

        let err = client_for(&server).get_video_info("BVgone").await.unwrap_err();
        match err {
            AppError::Api(msg) => assert!(msg.contains("啥都木有")),
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn stalled_response_body_times_out() {
        use std::io::Write;

        let mut server = mockito::Server::new_async().await;
        // Headers arrive promptly, then the body stalls mid-JSON.
        server
            .mock("GET", "/x/web-interface/view?bvid=BV1")
            .with_status(200)
            .with_chunked_body(|w| {
                w.write_all(b"{\"code\":0,")?;
                std::thread::sleep(std::time::Duration::from_millis(500));
                w.write_all(b"\"message\":\"\"}")
            })
            .create_async()
            .await;

        let client = ApiClient::new(ApiConfig {
            api_base_url: server.url(),
            request_timeout: std::time::Duration::from_millis(100),
            ..ApiConfig::default()
        });
        let err = client.get_video_info("BV1").await.unwrap_err();
        assert!(matches!(err, AppError::Timeout(_)));
    }

    #[tokio::test]
    async fn video_info_non_2xx_is_transport_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/x/web-interface/view?bvid=BV1")
            .with_status(503)
            .create_async()
            .await;

        let err = client_for(&server).get_video_info("BV1").await.unwrap_err();
        assert!(matches!(err, AppError::Transport(_)));
    }

    #[tokio::test]
    async fn streams_are_ordered_by_descending_bandwidth() {
        let mut server = mockito::Server::new_async().await;
        let body = json!({
            "code": 0,
            "data": {
                "dash": {
                    "audio": [
                        { "bandwidth": 64000, "baseUrl": "http://cdn/low" },
                        { "bandwidth": 320000, "baseUrl": "http://cdn/high" },
                        { "bandwidth": 128000, "baseUrl": "http://cdn/mid" }
                    ]
                }
            }
        });
        server
            .mock("GET", "/x/player/playurl?bvid=BV1&cid=111&fnval=16")
            .with_status(200)
            .with_body(body.to_string())
            .create_async()
            .await;

        let streams = client_for(&server).get_audio_streams("BV1", 111).await.unwrap();
        let bandwidths: Vec<u64> = streams.iter().map(|s| s.bandwidth_bits_per_sec).collect();
        assert_eq!(bandwidths, vec![320000, 128000, 64000]);
        assert_eq!(streams[0].url, "http://cdn/high");
        assert_eq!(
            streams[0].bandwidth_bits_per_sec,
            streams.iter().map(|s| s.bandwidth_bits_per_sec).max().unwrap()
        );
        assert!(streams.iter().all(|s| s.container == StreamContainer::DashAudio));
    }

    #[tokio::test]
    async fn legacy_durl_is_used_when_dash_is_absent() {
        let mut server = mockito::Server::new_async().await;
        let body = json!({
            "code": 0,
            "data": {
                "durl": [ { "url": "http://cdn/whole-file" } ]
            }
        });
        server
            .mock("GET", "/x/player/playurl?bvid=BV1&cid=111&fnval=16")
            .with_status(200)
            .with_body(body.to_string())
            .create_async()
            .await;

        let streams = client_for(&server).get_audio_streams("BV1", 111).await.unwrap();
        assert_eq!(streams.len(), 1);
        assert_eq!(streams[0].container, StreamContainer::Legacy);
        assert_eq!(streams[0].url, "http://cdn/whole-file");
    }

    #[tokio::test]
    async fn empty_stream_lists_are_reported_distinctly() {
        let mut server = mockito::Server::new_async().await;
        let body = json!({
            "code": 0,
            "data": { "dash": { "audio": [] }, "durl": [] }
        });
        server
            .mock("GET", "/x/player/playurl?bvid=BV1&cid=111&fnval=16")
            .with_status(200)
            .with_body(body.to_string())
            .create_async()
            .await;

        let err = client_for(&server).get_audio_streams("BV1", 111).await.unwrap_err();
        assert_eq!(err, AppError::NoStreamsAvailable);
    }

    #[tokio::test]
    async fn fetch_binary_sends_required_headers_and_reports_progress() {
        let mut server = mockito::Server::new_async().await;
        let payload = vec![7u8; 4096];
        let mock = server
            .mock("GET", "/audio.m4s")
            .match_header("referer", "https://www.bilibili.com")
            .match_header(
                "user-agent",
                mockito::Matcher::Regex("Mozilla".to_string()),
            )
            .with_status(200)
            .with_body(payload.clone())
            .create_async()
            .await;

        let client = client_for(&server);
        let cancel = CancellationToken::new();
        let mut events: Vec<(u64, Option<u64>)> = Vec::new();
        let bytes = client
            .fetch_binary(
                &format!("{}/audio.m4s", server.url()),
                |loaded, total| events.push((loaded, total)),
                &cancel,
            )
            .await
            .unwrap();

        assert_eq!(bytes, payload);
        assert!(!events.is_empty());
        let (final_loaded, final_total) = *events.last().unwrap();
        assert_eq!(final_loaded, 4096);
        assert_eq!(final_total, Some(4096));
        // loaded is monotonically non-decreasing across chunks
        assert!(events.windows(2).all(|w| w[0].0 <= w[1].0));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn fetch_binary_non_2xx_is_transport_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/audio.m4s")
            .with_status(403)
            .create_async()
            .await;

        let client = client_for(&server);
        let cancel = CancellationToken::new();
        let err = client
            .fetch_binary(&format!("{}/audio.m4s", server.url()), |_, _| {}, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Transport(_)));
    }

    #[tokio::test]
    async fn fetch_binary_honors_cancellation() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/audio.m4s")
            .with_status(200)
            .with_body(vec![0u8; 1024])
            .create_async()
            .await;

        let client = client_for(&server);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = client
            .fetch_binary(&format!("{}/audio.m4s", server.url()), |_, _| {}, &cancel)
            .await
            .unwrap_err();
        assert_eq!(err, AppError::Cancelled);
    }
}
