//! clipyard API client with retry logic.

use anyhow::{anyhow, Context, Result};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use shared::stats::AchievementStatus;
use shared::{Job, Stats, VideoFile};
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Request rejected by the server (4xx); never retried
#[derive(Error, Debug)]
#[error("{message} ({code}, HTTP {status})")]
pub struct ApiRejection {
    pub status: u16,
    pub code: String,
    pub message: String,
}

impl ApiRejection {
    pub fn is_not_found(&self) -> bool {
        self.status == StatusCode::NOT_FOUND.as_u16()
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
    code: String,
}

/// Result of an explicit cleanup
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupSummary {
    pub removed_jobs: usize,
    pub removed_videos: usize,
    pub media_deleted: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PollingBody {
    interval_ms: u64,
}

/// clipyard HTTP client
pub struct ClipyardClient {
    /// HTTP client
    client: Client,
    /// Server base URL, without trailing slash
    base_url: String,
    /// Maximum retries for failed requests
    max_retries: u32,
    /// Base delay for retry (exponential backoff)
    retry_delay_ms: u64,
}

impl ClipyardClient {
    /// Create a new client
    pub fn new(base_url: impl Into<String>, max_retries: u32, retry_delay_ms: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("clipctl/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            max_retries,
            retry_delay_ms,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send a request. GETs are retried on transport errors and 5xx
    /// responses; other methods are sent once, since the server may have
    /// acted on a request whose response was lost.
    ///
    /// 4xx responses are returned immediately as [`ApiRejection`].
    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&Value>,
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, endpoint);
        let max_retries = if method == Method::GET {
            self.max_retries
        } else {
            0
        };

        for attempt in 0..=max_retries {
            debug!(url = %url, method = %method, attempt = attempt + 1, "Making API request");

            let mut request = self.client.request(method.clone(), &url);
            if let Some(body) = body {
                request = request.json(body);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return response
                            .json::<T>()
                            .await
                            .with_context(|| format!("Failed to parse response from {}", url));
                    }

                    let text = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "Unknown error".to_string());

                    if status.is_client_error() {
                        let rejection = match serde_json::from_str::<ErrorBody>(&text) {
                            Ok(body) => ApiRejection {
                                status: status.as_u16(),
                                code: body.code,
                                message: body.error,
                            },
                            Err(_) => ApiRejection {
                                status: status.as_u16(),
                                code: "UNKNOWN".to_string(),
                                message: text,
                            },
                        };
                        return Err(rejection.into());
                    }

                    warn!(url = %url, status = %status, error = %text, "Request failed");
                    if attempt == max_retries {
                        return Err(anyhow!("Request failed with status {}: {}", status, text));
                    }
                }
                Err(e) => {
                    warn!(url = %url, error = %e, "Request error");
                    if attempt == max_retries {
                        return Err(anyhow!(
                            "Request failed after {} retries: {}",
                            max_retries,
                            e
                        ));
                    }
                }
            }

            let delay = Duration::from_millis(self.retry_delay_ms * 2u64.pow(attempt));
            debug!(delay_ms = delay.as_millis(), "Retrying after delay");
            sleep(delay).await;
        }

        Err(anyhow!("Request failed after all retries"))
    }

    async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T> {
        self.request(Method::GET, endpoint, None).await
    }

    async fn post<T: DeserializeOwned>(&self, endpoint: &str, body: Value) -> Result<T> {
        self.request(Method::POST, endpoint, Some(&body)).await
    }

    // ========== Queries ==========

    pub async fn list_videos(&self) -> Result<Vec<VideoFile>> {
        self.get("/api/videos").await
    }

    pub async fn list_jobs(&self) -> Result<Vec<Job>> {
        self.get("/api/jobs").await
    }

    pub async fn get_job(&self, id: &str) -> Result<Job> {
        self.get(&format!("/api/jobs/{}", id)).await
    }

    pub async fn get_stats(&self) -> Result<Stats> {
        self.get("/api/stats").await
    }

    pub async fn achievements(&self) -> Result<Vec<AchievementStatus>> {
        self.get("/api/achievements").await
    }

    /// Re-fetch interval published by the server
    pub async fn polling_interval(&self) -> Result<Duration> {
        let body: PollingBody = self.get("/api/config/polling").await?;
        Ok(Duration::from_millis(body.interval_ms.max(1)))
    }

    // ========== Commands ==========

    /// Submit a split job
    pub async fn split(&self, video_id: &str, segment_duration: u32) -> Result<Job> {
        self.post(
            "/api/videos/split",
            json!({ "videoId": video_id, "segmentDuration": segment_duration }),
        )
        .await
    }

    /// Submit a merge job
    pub async fn merge(&self, video_ids: &[String]) -> Result<Job> {
        self.post("/api/videos/merge", json!({ "videoIds": video_ids }))
            .await
    }

    pub async fn delete_video(&self, id: &str) -> Result<()> {
        let _: Value = self
            .request(Method::DELETE, &format!("/api/videos/{}", id), None)
            .await?;
        Ok(())
    }

    /// Trigger an explicit cleanup on the server
    pub async fn cleanup(&self) -> Result<CleanupSummary> {
        self.post("/api/cleanup", json!({})).await
    }
}
