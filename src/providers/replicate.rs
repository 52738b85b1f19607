//! Replicate video-generation adapter.
//!
//! Submission is fire-and-forget: a prediction is created and returned in the
//! `starting` state, and callers poll [`VideoGenerator::job_status`] until it
//! becomes terminal.

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::models::{clamp_dimensions, select_model, ModelReference};
use super::prompt::{horizontal_prompt, vertical_prompt};
use super::{GenerationJob, JobStatus, VideoGenerator, VideoJobRequest};
use crate::config::ReplicateConfig;
use crate::{ReelhookError, Result};

/// Error text used when no credential is available
pub const NOT_CONFIGURED_MESSAGE: &str =
    "Replicate API is not configured. Please add REPLICATE_API_TOKEN to your environment variables.";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub input: PredictionInput,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionInput {
    pub prompt: String,
    pub num_frames: u32,
    pub fps: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Deserialize)]
struct PredictionResponse {
    id: String,
    status: String,
    #[serde(default)]
    output: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    detail: Option<String>,
}

/// A submission ready to send: endpoint plus body
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedSubmission {
    pub url: String,
    pub model_id: &'static str,
    pub body: PredictionRequest,
}

pub struct ReplicateVideoGenerator {
    client: Client,
    api_token: Option<String>,
    base_url: String,
    default_model: String,
}

impl std::fmt::Debug for ReplicateVideoGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplicateVideoGenerator")
            .field("base_url", &self.base_url)
            .field("default_model", &self.default_model)
            .finish_non_exhaustive()
    }
}

impl ReplicateVideoGenerator {
    pub fn new(config: &ReplicateConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            api_token: config.api_token.clone().filter(|t| !t.trim().is_empty()),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            default_model: config.default_model.clone(),
        })
    }

    fn prediction_url(&self, job_id: &str) -> String {
        format!("{}/predictions/{}", self.base_url, job_id)
    }

    fn submission_url(&self, reference: ModelReference) -> String {
        match reference {
            ModelReference::Version(_) => format!("{}/predictions", self.base_url),
            ModelReference::Official(name) => format!("{}/models/{}/predictions", self.base_url, name),
        }
    }

    /// Resolve model, geometry and prompt for a request.
    ///
    /// Portrait requests are pinned to a portrait-safe model and get the
    /// vertical keyword clauses appended to the prompt.
    pub fn prepare(&self, request: &VideoJobRequest) -> PreparedSubmission {
        let portrait = request.is_portrait();
        let requested = request.model.as_deref().unwrap_or(&self.default_model);
        let model = select_model(requested, portrait);
        let (width, height) = clamp_dimensions(model, request.width, request.height);

        let prompt = if portrait {
            vertical_prompt(&request.prompt)
        } else {
            horizontal_prompt(&request.prompt)
        };

        let version = match model.reference {
            ModelReference::Version(version) => Some(version.to_string()),
            ModelReference::Official(_) => None,
        };

        PreparedSubmission {
            url: self.submission_url(model.reference),
            model_id: model.id,
            body: PredictionRequest {
                version,
                input: PredictionInput {
                    prompt,
                    num_frames: request.duration * request.fps,
                    fps: request.fps,
                    width,
                    height,
                },
            },
        }
    }

    fn parse_api_error(status: StatusCode, body: &str) -> String {
        if let Ok(parsed) = serde_json::from_str::<ApiErrorBody>(body) {
            if let Some(detail) = parsed.detail.or(parsed.title) {
                return format!("Replicate API error ({}): {}", status, detail);
            }
        }

        let truncated: String = body.chars().take(500).collect();
        format!("Replicate API error ({}): {}", status, truncated)
    }

    fn job_from_prediction(prediction: PredictionResponse) -> GenerationJob {
        match JobStatus::from_provider(&prediction.status) {
            JobStatus::Succeeded => match prediction.output.as_ref().and_then(first_url) {
                Some(url) => GenerationJob::succeeded(prediction.id, url),
                None => GenerationJob::failed(
                    prediction.id,
                    "Video generation succeeded without an output URL",
                ),
            },
            JobStatus::Failed => {
                let error = match prediction.error {
                    Some(serde_json::Value::String(message)) => message,
                    Some(serde_json::Value::Null) | None => "Unknown error occurred".to_string(),
                    Some(other) => other.to_string(),
                };
                GenerationJob::failed(prediction.id, error)
            }
            status => GenerationJob {
                id: prediction.id,
                status,
                output_url: None,
                error: None,
            },
        }
    }

    async fn send_submission(&self, token: &str, submission: &PreparedSubmission) -> Result<GenerationJob> {
        let response = self
            .client
            .post(&submission.url)
            .bearer_auth(token)
            .json(&submission.body)
            .send()
            .await
            .map_err(|e| ReelhookError::ProviderRequest(format!("Network error: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read Replicate response")?;

        if !status.is_success() {
            return Err(ReelhookError::ProviderRequest(Self::parse_api_error(status, &body)).into());
        }

        let prediction: PredictionResponse =
            serde_json::from_str(&body).context("Failed to parse Replicate response")?;

        Ok(Self::job_from_prediction(prediction))
    }
}

/// Replicate returns either a single URL or a list of them
fn first_url(output: &serde_json::Value) -> Option<String> {
    match output {
        serde_json::Value::String(url) if !url.is_empty() => Some(url.clone()),
        serde_json::Value::Array(items) => items.iter().find_map(first_url),
        _ => None,
    }
}

#[async_trait]
impl VideoGenerator for ReplicateVideoGenerator {
    async fn submit(&self, request: &VideoJobRequest) -> GenerationJob {
        let local_id = chrono::Utc::now().timestamp_millis().to_string();

        let Some(token) = self.api_token.as_deref() else {
            warn!("Video generation requested without a Replicate token");
            return GenerationJob::failed(local_id, NOT_CONFIGURED_MESSAGE);
        };

        let submission = self.prepare(request);
        debug!(
            "Submitting {} prediction at {}x{}",
            submission.model_id, submission.body.input.width, submission.body.input.height
        );

        match self.send_submission(token, &submission).await {
            Ok(job) => {
                info!("Replicate prediction submitted: id={} status={}", job.id, job.status);
                job
            }
            Err(e) => {
                warn!("Replicate submission failed: {}", e);
                GenerationJob::failed(local_id, e.to_string())
            }
        }
    }

    async fn job_status(&self, job_id: &str) -> Result<GenerationJob> {
        let token = self
            .api_token
            .as_deref()
            .ok_or_else(|| ReelhookError::ProviderNotConfigured(NOT_CONFIGURED_MESSAGE.to_string()))?;

        let response = self
            .client
            .get(self.prediction_url(job_id))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ReelhookError::ProviderRequest(format!("Network error: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read Replicate response")?;

        if !status.is_success() {
            return Err(ReelhookError::ProviderRequest(Self::parse_api_error(status, &body)).into());
        }

        let prediction: PredictionResponse =
            serde_json::from_str(&body).context("Failed to parse Replicate status response")?;
        debug!("Replicate poll for {}: status={}", job_id, prediction.status);

        Ok(Self::job_from_prediction(prediction))
    }

    fn is_configured(&self) -> bool {
        self.api_token.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generator(token: Option<&str>) -> ReplicateVideoGenerator {
        let config = ReplicateConfig {
            api_token: token.map(str::to_string),
            ..ReplicateConfig::default()
        };
        ReplicateVideoGenerator::new(&config).unwrap()
    }

    fn prediction(json: &str) -> PredictionResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_portrait_request_is_rewritten_and_clamped() {
        let submission = generator(Some("t")).prepare(&VideoJobRequest::new("test").with_model("svd"));

        assert_eq!(submission.model_id, "zeroscope");
        assert_eq!(submission.url, "https://api.replicate.com/v1/predictions");
        assert!(submission.body.version.as_deref().unwrap().starts_with("anotherjesse/zeroscope-v2-xl:"));
        assert!(submission.body.input.prompt.starts_with("test, vertical video format"));
        assert_eq!((submission.body.input.width, submission.body.input.height), (576, 1024));
        assert_eq!(submission.body.input.num_frames, 150);
    }

    #[test]
    fn test_landscape_request_uses_model_endpoint() {
        let request = VideoJobRequest::new("ocean")
            .with_dimensions(1920, 1080)
            .with_fps(24)
            .with_model("svd");
        let submission = generator(Some("t")).prepare(&request);

        assert_eq!(submission.model_id, "svd");
        assert_eq!(
            submission.url,
            "https://api.replicate.com/v1/models/stability-ai/stable-video-diffusion/predictions"
        );
        assert!(submission.body.version.is_none());
        assert!(submission.body.input.prompt.contains("smooth motion"));
        assert_eq!(submission.body.input.num_frames, 120);

        let json = serde_json::to_string(&submission.body).unwrap();
        assert!(!json.contains("version"));
    }

    #[test]
    fn test_parse_api_error_structured() {
        let body = r#"{"title":"Insufficient credit","detail":"You have insufficient credit to run this model.","status":402}"#;
        let message = ReplicateVideoGenerator::parse_api_error(StatusCode::PAYMENT_REQUIRED, body);
        assert!(message.contains("402 Payment Required"));
        assert!(message.contains("insufficient credit"));
    }

    #[test]
    fn test_parse_api_error_unstructured() {
        let message = ReplicateVideoGenerator::parse_api_error(StatusCode::BAD_GATEWAY, "upstream died");
        assert_eq!(message, "Replicate API error (502 Bad Gateway): upstream died");
    }

    #[test]
    fn test_job_from_prediction_states() {
        let job = ReplicateVideoGenerator::job_from_prediction(prediction(
            r#"{"id":"p1","status":"starting","output":null}"#,
        ));
        assert_eq!(job, GenerationJob::starting("p1"));

        let job = ReplicateVideoGenerator::job_from_prediction(prediction(
            r#"{"id":"p2","status":"succeeded","output":["https://cdn.example.com/out.mp4"]}"#,
        ));
        assert_eq!(job.output_url.as_deref(), Some("https://cdn.example.com/out.mp4"));

        let job = ReplicateVideoGenerator::job_from_prediction(prediction(
            r#"{"id":"p3","status":"failed","error":"CUDA out of memory"}"#,
        ));
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.as_deref(), Some("CUDA out of memory"));

        let job = ReplicateVideoGenerator::job_from_prediction(prediction(
            r#"{"id":"p4","status":"canceled"}"#,
        ));
        assert_eq!(job.status, JobStatus::Processing);
    }

    #[test]
    fn test_success_without_output_is_a_failure() {
        let job = ReplicateVideoGenerator::job_from_prediction(prediction(
            r#"{"id":"p5","status":"succeeded","output":[]}"#,
        ));
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.output_url.is_none());
    }

    #[tokio::test]
    async fn test_submit_without_token_returns_failed_job() {
        let generator = generator(None);
        assert!(!generator.is_configured());

        let job = generator.submit(&VideoJobRequest::new("test")).await;
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.as_deref(), Some(NOT_CONFIGURED_MESSAGE));
    }

    #[tokio::test]
    async fn test_status_without_token_is_an_error() {
        let err = generator(Some("  ")).job_status("p1").await.unwrap_err();
        assert!(err.to_string().contains("not configured"));
    }
}
