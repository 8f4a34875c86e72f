/// Video host client
///
/// The host owns bytes and transcoding. The billing-service only opens an
/// ingest slot after a successful reservation and reads back the
/// authoritative media report at finalize time; the report's size always
/// overrides the caller's estimate.
use super::ClientError;
use crate::config::VideoHostConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct IngestRequest {
    pub creator_id: Uuid,
    pub video_id: Uuid,
    pub title: String,
}

/// Where the client pushes upload bytes
#[derive(Debug, Clone, Deserialize)]
pub struct IngestTicket {
    pub upload_url: String,
    pub host_reference: String,
}

/// Authoritative post-upload measurements
#[derive(Debug, Clone, Deserialize)]
pub struct MediaReport {
    pub size_gb: f64,
    pub duration_minutes: f64,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VideoHost: Send + Sync {
    /// Open an ingest slot for an upload whose blocks are already reserved.
    async fn begin_ingest(&self, request: &IngestRequest) -> Result<IngestTicket, ClientError>;

    /// Final measurements for a video, once the host has them.
    async fn fetch_media_report(&self, video_id: Uuid) -> Result<Option<MediaReport>, ClientError>;
}

/// HTTP implementation against the host REST API
pub struct HttpVideoHost {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpVideoHost {
    pub fn new(config: &VideoHostConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .unwrap_or_default();

        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }
}

#[async_trait]
impl VideoHost for HttpVideoHost {
    async fn begin_ingest(&self, request: &IngestRequest) -> Result<IngestTicket, ClientError> {
        let url = format!("{}/v1/ingest", self.base_url);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<IngestTicket>()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))
    }

    async fn fetch_media_report(&self, video_id: Uuid) -> Result<Option<MediaReport>, ClientError> {
        let url = format!("{}/v1/videos/{}/report", self.base_url, video_id);

        let response = self.http.get(&url).bearer_auth(&self.api_key).send().await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }

        let report = response
            .json::<MediaReport>()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))?;

        Ok(Some(report))
    }
}
