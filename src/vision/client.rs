//! HTTP client for the photo analysis endpoint.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use super::{AnalysisRequest, PhotoAnalyzer, PhotoVerdict, VisionError};
use crate::storage::VisionSettings;

/// Vision API client.
pub struct VisionClient {
    http: reqwest::Client,
    /// Full URL of the analysis endpoint
    endpoint: String,
    /// Bearer token, if the endpoint needs one
    api_key: Option<String>,
    /// Whether the last request reached the service
    online: AtomicBool,
}

impl VisionClient {
    pub fn new(settings: &VisionSettings) -> Result<Self, VisionError> {
        if settings.endpoint.trim().is_empty() {
            return Err(VisionError::ConfigError("empty vision endpoint".to_string()));
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs.max(1)))
            .build()
            .map_err(|e| VisionError::ConfigError(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: settings.endpoint.clone(),
            api_key: settings.api_key.clone(),
            online: AtomicBool::new(true),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Relaxed)
    }

    async fn send(&self, request: &AnalysisRequest) -> Result<PhotoVerdict, VisionError> {
        let mut builder = self.http.post(&self.endpoint).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_connect() || e.is_timeout() {
                self.online.store(false, Ordering::Relaxed);
                VisionError::Offline
            } else {
                VisionError::ApiError(e.to_string())
            }
        })?;
        self.online.store(true, Ordering::Relaxed);

        let status = response.status();
        if status.is_success() {
            response
                .json::<PhotoVerdict>()
                .await
                .map_err(|e| VisionError::SerializationError(e.to_string()))
        } else {
            Err(status_error(status.as_u16()))
        }
    }
}

impl PhotoAnalyzer for VisionClient {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<PhotoVerdict, VisionError> {
        tracing::debug!("Sending photo for analysis to {}", self.endpoint);
        self.send(request).await
    }
}

fn status_error(status: u16) -> VisionError {
    match status {
        429 => VisionError::RateLimited,
        503 => VisionError::ServiceUnavailable,
        _ => VisionError::ApiError(format!("API returned status {}", status)),
    }
}
