//! Photo verification through an external vision model.
//!
//! The model is a black box behind [`PhotoAnalyzer`]. This module owns the
//! retry contract: only rate-limited and unavailable responses are retried,
//! a bounded number of times, with a delay between attempts.

pub mod client;

pub use client::VisionClient;

use crate::missions::Task;
use crate::storage::VisionSettings;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

/// Image plus instructions for the vision model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub prompt: String,
    /// Base64-encoded image bytes
    pub image_base64: String,
    pub mime_type: String,
}

impl AnalysisRequest {
    /// JPEG request verifying `task`.
    pub fn for_task(task: &Task, image_base64: impl Into<String>) -> Self {
        Self {
            prompt: photo_prompt(task),
            image_base64: image_base64.into(),
            mime_type: "image/jpeg".to_string(),
        }
    }
}

/// Structured answer from the vision model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoVerdict {
    /// Whether the photo satisfies the task
    pub verified: bool,
    /// Model confidence in 0.0-1.0
    #[serde(default)]
    pub confidence: f32,
    /// Short explanation for the traveller
    #[serde(default)]
    pub feedback: String,
}

/// Analyzes a photo against a prompt.
pub trait PhotoAnalyzer {
    fn analyze(
        &self,
        request: &AnalysisRequest,
    ) -> impl Future<Output = Result<PhotoVerdict, VisionError>> + Send;
}

/// Vision API errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VisionError {
    /// API returned an error
    #[error("Vision API error: {0}")]
    ApiError(String),

    /// HTTP 429
    #[error("Rate limited - try again later")]
    RateLimited,

    /// HTTP 503
    #[error("Vision service unavailable")]
    ServiceUnavailable,

    /// Network unavailable
    #[error("Network unavailable")]
    Offline,

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),
}

impl VisionError {
    /// Whether another attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, VisionError::RateLimited | VisionError::ServiceUnavailable)
    }
}

impl From<serde_json::Error> for VisionError {
    fn from(err: serde_json::Error) -> Self {
        VisionError::SerializationError(err.to_string())
    }
}

/// How retryable failures are retried.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Extra attempts after the first one
    pub max_retries: u32,
    /// Delay before the first retry
    pub delay: Duration,
    /// Factor applied to the delay after each retry (1.0 = fixed delay)
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay: Duration::from_millis(1000),
            backoff_multiplier: 1.0,
        }
    }
}

impl RetryPolicy {
    pub fn from_settings(settings: &VisionSettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            delay: Duration::from_millis(settings.retry_delay_ms),
            ..Default::default()
        }
    }

    /// Policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    fn delay_for(&self, retry: u32) -> Duration {
        let factor = self.backoff_multiplier.max(1.0).powi(retry as i32);
        self.delay.mul_f64(factor)
    }
}

/// Run `op`, retrying retryable errors according to `policy`.
///
/// Non-retryable errors and the last retryable error are returned as is.
pub async fn retry_with_backoff<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, VisionError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, VisionError>>,
{
    let mut retry = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && retry < policy.max_retries => {
                let delay = policy.delay_for(retry);
                retry += 1;
                tracing::warn!(
                    "Vision call failed ({}), retry {}/{} in {:?}",
                    e,
                    retry,
                    policy.max_retries,
                    delay
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Prompt asking the model whether a photo satisfies `task`.
pub fn photo_prompt(task: &Task) -> String {
    let mut prompt = format!(
        "You are verifying a tourist's photo for the mission task \"{}\".",
        task.label
    );
    if let Some(requirement) = &task.requirement {
        prompt.push_str(&format!(" Requirement: {}.", requirement));
    }
    prompt.push_str(
        " Reply with JSON {\"verified\": bool, \"confidence\": number between 0 and 1, \
         \"feedback\": short encouraging sentence}.",
    );
    prompt
}
