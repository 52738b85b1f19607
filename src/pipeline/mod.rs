//! The orchestration state machine.
//!
//! A run walks `idle -> generating-ai -> transcribing -> generating-captions ->
//! completed`, with a side exit to `error`. Every status change goes through
//! [`transition`], so the live path and the scripted demo path produce the same
//! observable sequence.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{error, info, warn};

pub mod poller;

pub use poller::poll_until_terminal;

use crate::captions::{
    demo_captions, demo_transcription, style_with_fallback, synthesize_timing, total_duration,
    CaptionSource,
};
use crate::config::Config;
use crate::hooks::HookSelection;
use crate::providers::{
    openai, replicate, CaptionStyle, CaptionStyler, JobStatus, OpenAiCaptionStyler, OpenAiTranscriber,
    ReplicateVideoGenerator, Transcriber, VideoGenerator, VideoJobRequest,
};
use crate::state::{ProcessingState, StateStore, VideoAction};
use crate::upload::{MediaStore, UploadedAsset};
use crate::{ReelhookError, Result};

pub const GENERATING_AI_MESSAGE: &str = "Generating AI intro video...";
pub const TRANSCRIBING_MESSAGE: &str = "Transcribing audio...";
pub const GENERATING_CAPTIONS_MESSAGE: &str = "Generating captions...";
pub const COMPLETED_MESSAGE: &str = "Video processing completed!";
pub const GENERIC_ERROR_MESSAGE: &str = "An unexpected error occurred";

const PLACEHOLDER_COMPLETED_MESSAGE: &str =
    "Video processing completed! (Captions come from a placeholder transcript)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProcessingStatus {
    #[default]
    Idle,
    GeneratingAi,
    Transcribing,
    GeneratingCaptions,
    Completed,
    Error,
}

impl ProcessingStatus {
    /// A run is in flight
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            ProcessingStatus::GeneratingAi | ProcessingStatus::Transcribing | ProcessingStatus::GeneratingCaptions
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcessingStatus::Completed | ProcessingStatus::Error)
    }

    pub fn progress_percent(&self) -> u8 {
        match self {
            ProcessingStatus::GeneratingAi => 25,
            ProcessingStatus::Transcribing => 50,
            ProcessingStatus::GeneratingCaptions => 75,
            ProcessingStatus::Completed => 100,
            ProcessingStatus::Idle | ProcessingStatus::Error => 0,
        }
    }
}

impl std::fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessingStatus::Idle => write!(f, "idle"),
            ProcessingStatus::GeneratingAi => write!(f, "generating-ai"),
            ProcessingStatus::Transcribing => write!(f, "transcribing"),
            ProcessingStatus::GeneratingCaptions => write!(f, "generating-captions"),
            ProcessingStatus::Completed => write!(f, "completed"),
            ProcessingStatus::Error => write!(f, "error"),
        }
    }
}

/// What happened, as far as the state machine is concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineEvent {
    Start,
    VideoReady,
    TranscriptReady,
    CaptionsReady,
    Failed,
    Reset,
}

/// The transition table.
///
/// A new run may start from any resting state. `Failed` is accepted from every
/// in-flight state and `Reset` from anywhere.
pub fn transition(from: ProcessingStatus, event: PipelineEvent) -> Result<ProcessingStatus> {
    use PipelineEvent as E;
    use ProcessingStatus as S;

    let next = match (from, event) {
        (_, E::Reset) => S::Idle,
        (S::Idle | S::Completed | S::Error, E::Start) => S::GeneratingAi,
        (S::GeneratingAi, E::VideoReady) => S::Transcribing,
        (S::Transcribing, E::TranscriptReady) => S::GeneratingCaptions,
        (S::GeneratingCaptions, E::CaptionsReady) => S::Completed,
        (busy, E::Failed) if busy.is_busy() => S::Error,
        (from, event) => {
            return Err(ReelhookError::InvalidTransition {
                from: from.to_string(),
                event: format!("{:?}", event),
            }
            .into())
        }
    };

    Ok(next)
}

/// Why a run took the scripted path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemoReason {
    MissingCredentials,
    InsufficientCredit,
    Forced,
}

impl DemoReason {
    pub fn completion_message(&self) -> &'static str {
        match self {
            DemoReason::MissingCredentials => {
                "Demo mode: Video processing completed! (Add API keys for full functionality)"
            }
            DemoReason::InsufficientCredit => {
                "Demo mode: Video processing completed! (Add credits to Replicate for full functionality)"
            }
            DemoReason::Forced => "Demo mode: Video processing completed! (Demo mode is forced in the configuration)",
        }
    }
}

impl std::fmt::Display for DemoReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DemoReason::MissingCredentials => write!(f, "missing API credentials"),
            DemoReason::InsufficientCredit => write!(f, "insufficient provider credit"),
            DemoReason::Forced => write!(f, "forced by configuration"),
        }
    }
}

/// Classify a video-generation failure that should fall back to the demo path
pub fn demo_trigger(error: &str) -> Option<DemoReason> {
    if error.contains("Insufficient credit") || error.contains("402 Payment Required") {
        Some(DemoReason::InsufficientCredit)
    } else if error.contains(replicate::NOT_CONFIGURED_MESSAGE) || error.contains(openai::NOT_CONFIGURED_MESSAGE) {
        Some(DemoReason::MissingCredentials)
    } else {
        None
    }
}

/// Knobs for one orchestrator
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub credentials_present: bool,
    pub force_demo: bool,
    pub duration_secs: u32,
    pub fps: u32,
    pub width: u32,
    pub height: u32,
    pub model: Option<String>,
    pub poll_interval: Duration,
    pub transcription_timeout: Duration,
    pub caption_style: CaptionStyle,
    pub caption_group_size: usize,
    pub default_caption_duration: f64,
    pub demo_delays: Vec<Duration>,
    pub demo_video_url: String,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            credentials_present: config.has_api_keys(),
            force_demo: config.demo.force,
            duration_secs: config.pipeline.duration_secs,
            fps: config.pipeline.fps,
            width: config.pipeline.width,
            height: config.pipeline.height,
            model: None,
            poll_interval: config.poll_interval(),
            transcription_timeout: config.transcription_timeout(),
            caption_style: config.pipeline.caption_style,
            caption_group_size: config.pipeline.caption_group_size,
            default_caption_duration: config.pipeline.default_caption_duration,
            demo_delays: config.demo.step_delays_ms.iter().map(|ms| Duration::from_millis(*ms)).collect(),
            demo_video_url: config.demo.video_url.clone(),
        }
    }

    fn video_request(&self, prompt: &str) -> VideoJobRequest {
        let request = VideoJobRequest::new(prompt)
            .with_duration(self.duration_secs)
            .with_fps(self.fps)
            .with_dimensions(self.width, self.height);

        match &self.model {
            Some(model) => request.with_model(model.clone()),
            None => request,
        }
    }

    fn demo_delay(&self, step: usize) -> Duration {
        self.demo_delays.get(step).copied().unwrap_or_default()
    }
}

/// How a run ended
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub processing: ProcessingState,
    /// Every status the run passed through, in order
    pub transitions: Vec<ProcessingStatus>,
    pub demo: Option<DemoReason>,
    pub job_id: Option<String>,
}

/// A run in progress: the store plus the statuses visited so far
struct Run<'a> {
    store: &'a mut StateStore,
    status: ProcessingStatus,
    transitions: Vec<ProcessingStatus>,
    demo: Option<DemoReason>,
    job_id: Option<String>,
}

impl<'a> Run<'a> {
    fn new(store: &'a mut StateStore) -> Self {
        let status = store.state().processing.status;
        Self {
            store,
            status,
            transitions: Vec::new(),
            demo: None,
            job_id: None,
        }
    }

    fn advance(&mut self, event: PipelineEvent, message: &str) -> Result<()> {
        let next = transition(self.status, event)?;
        info!("{} -> {}: {}", self.status, next, message);

        self.store
            .dispatch(VideoAction::SetProcessingState(ProcessingState::new(next, message)))?;
        self.status = next;
        self.transitions.push(next);
        Ok(())
    }

    fn fail(&mut self, message: String) -> Result<()> {
        let next = transition(self.status, PipelineEvent::Failed).unwrap_or(ProcessingStatus::Error);
        self.store
            .dispatch(VideoAction::SetProcessingState(ProcessingState::new(next, message)))?;
        self.status = next;
        self.transitions.push(next);
        Ok(())
    }

    fn notice(&mut self, notice: String) -> Result<()> {
        warn!("{}", notice);
        self.store.dispatch(VideoAction::AddNotice(notice))
    }
}

/// Sequences the adapters for one selected clip and hook
pub struct Orchestrator {
    generator: Arc<dyn VideoGenerator>,
    transcriber: Arc<dyn Transcriber>,
    styler: Arc<dyn CaptionStyler>,
    media: Arc<dyn MediaStore>,
    settings: PipelineSettings,
}

impl Orchestrator {
    pub fn new(
        generator: Arc<dyn VideoGenerator>,
        transcriber: Arc<dyn Transcriber>,
        styler: Arc<dyn CaptionStyler>,
        media: Arc<dyn MediaStore>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            generator,
            transcriber,
            styler,
            media,
            settings,
        }
    }

    /// Wire the live Replicate and OpenAI adapters from configuration
    pub fn from_config(config: &Config, media: Arc<dyn MediaStore>) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(
            Arc::new(ReplicateVideoGenerator::new(&config.replicate)?),
            Arc::new(OpenAiTranscriber::new(&config.openai)?),
            Arc::new(OpenAiCaptionStyler::new(&config.openai)?),
            media,
            PipelineSettings::from_config(config),
        ))
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut PipelineSettings {
        &mut self.settings
    }

    /// Run the pipeline for the file and hook selected in `store`.
    ///
    /// Missing selections are reported as an error without touching the state.
    /// Once the run starts, every failure lands in the `error` status and the
    /// outcome is returned normally.
    pub async fn run(&self, store: &mut StateStore) -> Result<RunOutcome> {
        let state = store.state();
        if state.is_processing() {
            return Err(ReelhookError::StateBusy("start another run").into());
        }
        let (Some(asset), Some(hook)) = (state.selected_file.clone(), state.selected_hook.clone()) else {
            anyhow::bail!("Please select a video file and a hook before generating");
        };

        store.dispatch(VideoAction::ClearProcessingResults)?;
        let mut run = Run::new(store);

        if let Err(e) = self.drive(&mut run, &asset, &hook).await {
            let message = e.to_string();
            let message = if message.trim().is_empty() {
                GENERIC_ERROR_MESSAGE.to_string()
            } else {
                message
            };
            error!("Pipeline failed: {}", message);
            run.fail(message)?;
        }

        Ok(RunOutcome {
            processing: run.store.state().processing.clone(),
            transitions: run.transitions,
            demo: run.demo,
            job_id: run.job_id,
        })
    }

    async fn drive(&self, run: &mut Run<'_>, asset: &UploadedAsset, hook: &HookSelection) -> Result<()> {
        run.advance(PipelineEvent::Start, GENERATING_AI_MESSAGE)?;

        if self.settings.force_demo {
            return self.run_demo(run, asset, DemoReason::Forced).await;
        }
        if !self.settings.credentials_present {
            return self.run_demo(run, asset, DemoReason::MissingCredentials).await;
        }

        let request = self.settings.video_request(&hook.prompt);
        info!("Submitting intro for hook '{}'", hook.id);
        let job = self.generator.submit(&request).await;
        run.job_id = Some(job.id.clone());

        let job = poll_until_terminal(self.generator.as_ref(), job, self.settings.poll_interval, |_, _| {}).await?;

        let video_url = match (job.status, job.output_url) {
            (JobStatus::Succeeded, Some(url)) => url,
            _ => {
                let message = job
                    .error
                    .unwrap_or_else(|| "Failed to generate AI video".to_string());
                if let Some(reason) = demo_trigger(&message) {
                    warn!("Video generation unavailable ({}), switching to demo mode", reason);
                    return self.run_demo(run, asset, reason).await;
                }
                anyhow::bail!(message);
            }
        };

        run.store.dispatch(VideoAction::SetAiVideoUrl(Some(video_url)))?;
        run.advance(PipelineEvent::VideoReady, TRANSCRIBING_MESSAGE)?;

        let stored = self.media.upload_and_store(asset).await?;
        run.store.dispatch(VideoAction::SetUserVideoUrl(Some(stored.url)))?;

        let timeout_secs = self.settings.transcription_timeout.as_secs();
        let failure = match timeout(self.settings.transcription_timeout, self.transcriber.transcribe(asset)).await {
            Ok(Ok(transcription)) => Ok(transcription),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!("timed out after {}s", timeout_secs)),
        };
        let (transcription, placeholder) = match failure {
            Ok(transcription) => (transcription, false),
            Err(reason) => {
                run.notice(format!(
                    "Transcription unavailable ({}); captions use a placeholder transcript",
                    reason
                ))?;
                (demo_transcription(), true)
            }
        };

        run.advance(PipelineEvent::TranscriptReady, GENERATING_CAPTIONS_MESSAGE)?;

        let styled = style_with_fallback(
            self.styler.as_ref(),
            &transcription.text,
            self.settings.caption_style,
            self.settings.caption_group_size,
        )
        .await;
        if let Some(reason) = &styled.fallback_reason {
            run.notice(format!("Caption styling unavailable ({}); lines were grouped locally", reason))?;
        }

        let duration = total_duration(&transcription.segments, self.settings.default_caption_duration);
        let captions = synthesize_timing(&styled.lines, duration);
        let source = if placeholder {
            CaptionSource::PlaceholderTranscript
        } else {
            styled.source
        };
        run.store.dispatch(VideoAction::SetCaptions { captions, source })?;

        let message = if placeholder {
            PLACEHOLDER_COMPLETED_MESSAGE
        } else {
            COMPLETED_MESSAGE
        };
        run.advance(PipelineEvent::CaptionsReady, message)
    }

    /// The scripted path: same transitions, fixed delays, canned outputs
    async fn run_demo(&self, run: &mut Run<'_>, asset: &UploadedAsset, reason: DemoReason) -> Result<()> {
        info!("Running demo pipeline: {}", reason);
        run.demo = Some(reason);

        sleep(self.settings.demo_delay(0)).await;
        run.advance(PipelineEvent::VideoReady, TRANSCRIBING_MESSAGE)?;

        sleep(self.settings.demo_delay(1)).await;
        run.advance(PipelineEvent::TranscriptReady, GENERATING_CAPTIONS_MESSAGE)?;

        sleep(self.settings.demo_delay(2)).await;
        run.store
            .dispatch(VideoAction::SetAiVideoUrl(Some(self.settings.demo_video_url.clone())))?;

        sleep(self.settings.demo_delay(3)).await;
        let stored = self.media.upload_and_store(asset).await?;
        run.store.dispatch(VideoAction::SetUserVideoUrl(Some(stored.url)))?;

        run.store.dispatch(VideoAction::SetCaptions {
            captions: demo_captions(),
            source: CaptionSource::Demo,
        })?;
        run.advance(PipelineEvent::CaptionsReady, reason.completion_message())
    }
}
