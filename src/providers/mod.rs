//! Adapters for the external AI services the pipeline talks to.
//!
//! Each collaborator sits behind a small async trait so the orchestrator can be
//! driven by live HTTP adapters, the scripted demo path, or test doubles.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod models;
pub mod openai;
pub mod prompt;
pub mod replicate;

use crate::upload::UploadedAsset;
use crate::Result;

pub use models::{clamp_dimensions, ModelCapability, MODEL_CAPABILITIES};
pub use openai::{OpenAiCaptionStyler, OpenAiTranscriber};
pub use replicate::ReplicateVideoGenerator;

/// Lifecycle of a video-generation job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Starting,
    Processing,
    Succeeded,
    Failed,
}

impl JobStatus {
    /// Map a provider status onto the four-state lifecycle.
    ///
    /// Anything the provider reports that is not one of the known words
    /// (`canceled`, `queued`, ...) counts as still processing.
    pub fn from_provider(status: &str) -> Self {
        match status.trim().to_ascii_lowercase().as_str() {
            "starting" => JobStatus::Starting,
            "processing" => JobStatus::Processing,
            "succeeded" => JobStatus::Succeeded,
            "failed" => JobStatus::Failed,
            other => {
                tracing::warn!("Unrecognized job status '{}', treating as processing", other);
                JobStatus::Processing
            }
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Starting => write!(f, "starting"),
            JobStatus::Processing => write!(f, "processing"),
            JobStatus::Succeeded => write!(f, "succeeded"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// An asynchronous unit of work at the video-generation provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationJob {
    /// Provider-assigned identifier
    pub id: String,

    pub status: JobStatus,

    /// Generated clip, present once the job succeeded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_url: Option<String>,

    /// Failure reason, present once the job failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GenerationJob {
    pub fn starting(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: JobStatus::Starting,
            output_url: None,
            error: None,
        }
    }

    pub fn succeeded(id: impl Into<String>, output_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: JobStatus::Succeeded,
            output_url: Some(output_url.into()),
            error: None,
        }
    }

    pub fn failed(id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: JobStatus::Failed,
            output_url: None,
            error: Some(error.into()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Parameters for a video-generation submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoJobRequest {
    pub prompt: String,

    /// Clip length in seconds
    pub duration: u32,

    pub fps: u32,

    pub width: u32,

    pub height: u32,

    /// Model id from the capability table (the configured default when unset)
    pub model: Option<String>,
}

impl VideoJobRequest {
    /// Create a request with the intro defaults (5s, 30fps, 1080x1920)
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            duration: 5,
            fps: 30,
            width: 1080,
            height: 1920,
            model: None,
        }
    }

    pub fn with_duration(mut self, duration: u32) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = fps;
        self
    }

    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn is_portrait(&self) -> bool {
        self.height > self.width
    }
}

/// A time-stamped piece of the transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub index: usize,

    /// Start time in seconds
    pub start: f64,

    /// End time in seconds
    pub end: f64,

    pub text: String,
}

/// Speech-to-text output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcription {
    pub text: String,

    /// Time-ascending, non-overlapping segments
    pub segments: Vec<TranscriptSegment>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// Caption styling flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptionStyle {
    /// Short, punchy social-media lines
    Tiktok,
    /// Natural subtitle breaks
    Subtitles,
}

impl std::fmt::Display for CaptionStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptionStyle::Tiktok => write!(f, "tiktok"),
            CaptionStyle::Subtitles => write!(f, "subtitles"),
        }
    }
}

/// Video-generation provider: fire-and-forget submission plus single-shot status queries.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VideoGenerator: Send + Sync {
    /// Submit a job. Failures come back as a job in the `Failed` state.
    async fn submit(&self, request: &VideoJobRequest) -> GenerationJob;

    /// Query the current state of a job once
    async fn job_status(&self, job_id: &str) -> Result<GenerationJob>;

    /// Whether a credential is configured
    fn is_configured(&self) -> bool;
}

/// Speech-to-text provider
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, asset: &UploadedAsset) -> Result<Transcription>;
}

/// Caption-styling provider
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CaptionStyler: Send + Sync {
    async fn style(&self, text: &str, style: CaptionStyle) -> Result<Vec<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(JobStatus::from_provider("starting"), JobStatus::Starting);
        assert_eq!(JobStatus::from_provider("processing"), JobStatus::Processing);
        assert_eq!(JobStatus::from_provider("SUCCEEDED"), JobStatus::Succeeded);
        assert_eq!(JobStatus::from_provider("failed"), JobStatus::Failed);
    }

    #[test]
    fn test_unknown_status_maps_to_processing() {
        assert_eq!(JobStatus::from_provider("canceled"), JobStatus::Processing);
        assert_eq!(JobStatus::from_provider("queued"), JobStatus::Processing);
        assert_eq!(JobStatus::from_provider(""), JobStatus::Processing);
    }

    #[test]
    fn test_terminal_states() {
        assert!(!JobStatus::Starting.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
        assert!(JobStatus::Succeeded.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }

    #[test]
    fn test_job_constructors_keep_invariants() {
        let ok = GenerationJob::succeeded("a", "https://cdn.example.com/a.mp4");
        assert!(ok.output_url.is_some() && ok.error.is_none());

        let bad = GenerationJob::failed("b", "boom");
        assert!(bad.output_url.is_none());
        assert_eq!(bad.error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_request_builder() {
        let request = VideoJobRequest::new("test")
            .with_duration(3)
            .with_fps(24)
            .with_dimensions(1920, 1080)
            .with_model("svd");
        assert_eq!(request.duration, 3);
        assert_eq!(request.fps, 24);
        assert!(!request.is_portrait());
        assert_eq!(request.model.as_deref(), Some("svd"));
        assert!(VideoJobRequest::new("x").is_portrait());
    }

    #[test]
    fn test_job_serialization_skips_empty_fields() {
        let json = serde_json::to_string(&GenerationJob::starting("job-1")).unwrap();
        assert_eq!(json, r#"{"id":"job-1","status":"starting"}"#);
    }
}
