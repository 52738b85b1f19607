//! Boundary to the external preview/export compositor.
//!
//! The compositor itself renders two stacked video layers with the caption
//! overlay on top. This crate only prepares and checks its input props, hands
//! them over, and fetches the generated intro clip when asked.

use anyhow::Context;
use async_trait::async_trait;
use futures_util::StreamExt;
use indicatif::ProgressBar;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::captions::CaptionSegment;
use crate::state::VideoState;
use crate::utils::sanitize_filename;
use crate::{ReelhookError, Result};

/// Timeline padding used when there are no captions to size it
const NO_CAPTION_TAIL_SECS: f64 = 5.0;

pub const PROPS_FILE_NAME: &str = "composition.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExportQuality {
    Low,
    #[default]
    Medium,
    High,
}

/// Render geometry for a quality preset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualitySettings {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl ExportQuality {
    pub fn settings(&self) -> QualitySettings {
        match self {
            ExportQuality::Low => QualitySettings { width: 432, height: 768, fps: 24 },
            ExportQuality::Medium => QualitySettings { width: 576, height: 1024, fps: 30 },
            ExportQuality::High => QualitySettings { width: 720, height: 1280, fps: 30 },
        }
    }
}

impl std::fmt::Display for ExportQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportQuality::Low => write!(f, "low"),
            ExportQuality::Medium => write!(f, "medium"),
            ExportQuality::High => write!(f, "high"),
        }
    }
}

/// Input props for the montage composition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositionProps {
    pub ai_video_url: Option<String>,
    pub user_video_url: Option<String>,
    pub captions: Vec<CaptionSegment>,
    /// Length of the intro layer in seconds
    pub ai_video_duration: f64,
    pub fps: u32,
    pub width: u32,
    pub height: u32,
    pub duration_in_frames: u64,
}

impl CompositionProps {
    pub fn from_state(state: &VideoState, ai_video_duration: f64, quality: ExportQuality) -> Self {
        let QualitySettings { width, height, fps } = quality.settings();
        let total = timeline_duration(ai_video_duration, &state.captions);

        Self {
            ai_video_url: state.ai_video_url.clone(),
            user_video_url: state.user_video_url.clone(),
            captions: state.captions.clone(),
            ai_video_duration,
            fps,
            width,
            height,
            duration_in_frames: (total * fps as f64).ceil().max(0.0) as u64,
        }
    }

    pub fn total_duration(&self) -> f64 {
        timeline_duration(self.ai_video_duration, &self.captions)
    }
}

/// Intro length plus the latest caption end (or a fixed tail with no captions)
pub fn timeline_duration(ai_video_duration: f64, captions: &[CaptionSegment]) -> f64 {
    let tail = captions
        .iter()
        .map(|caption| caption.end_time)
        .reduce(f64::max)
        .unwrap_or(NO_CAPTION_TAIL_SECS);

    ai_video_duration + tail
}

/// Check props before handing them to the compositor
pub fn validate_composition(props: &CompositionProps) -> std::result::Result<(), ReelhookError> {
    let has_url = |url: &Option<String>| url.as_deref().is_some_and(|u| !u.is_empty());
    if !has_url(&props.ai_video_url) && !has_url(&props.user_video_url) {
        return Err(ReelhookError::Composition("At least one video URL is required".to_string()));
    }

    if !(1.0..=10.0).contains(&props.ai_video_duration) {
        return Err(ReelhookError::Composition(
            "AI video duration must be between 1 and 10 seconds".to_string(),
        ));
    }

    if props
        .captions
        .iter()
        .any(|caption| caption.start_time < 0.0 || caption.end_time <= caption.start_time)
    {
        return Err(ReelhookError::Composition("Invalid caption timing".to_string()));
    }

    Ok(())
}

/// Renders (or hands off) a composition into `output_dir`
#[async_trait]
pub trait Compositor: Send + Sync {
    async fn render(&self, props: &CompositionProps, output_dir: &Path) -> Result<PathBuf>;
}

/// Writes the validated props as `composition.json` for an external renderer
#[derive(Debug, Default)]
pub struct PropsBundleExporter;

#[async_trait]
impl Compositor for PropsBundleExporter {
    async fn render(&self, props: &CompositionProps, output_dir: &Path) -> Result<PathBuf> {
        validate_composition(props)?;

        tokio::fs::create_dir_all(output_dir)
            .await
            .with_context(|| format!("Failed to create {}", output_dir.display()))?;

        let path = output_dir.join(PROPS_FILE_NAME);
        let json = serde_json::to_string_pretty(props).context("Failed to serialize composition")?;
        tokio::fs::write(&path, json)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;

        info!(
            "Wrote composition ({} frames at {}fps) to {}",
            props.duration_in_frames,
            props.fps,
            path.display()
        );
        Ok(path)
    }
}

/// Local file name for a downloaded clip
fn download_file_name(url: &url::Url) -> String {
    let last = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|name| !name.is_empty())
        .unwrap_or("intro.mp4");

    let name = sanitize_filename(last);
    if name.contains('.') {
        name
    } else {
        format!("{}.mp4", name)
    }
}

/// Fetch a clip into `dest_dir`, streaming to disk.
///
/// `file://` URLs are copied; anything else goes over HTTP.
pub async fn download_video(video_url: &str, dest_dir: &Path, progress: &ProgressBar) -> Result<PathBuf> {
    let url = url::Url::parse(video_url).with_context(|| format!("Invalid video URL: {}", video_url))?;
    fs_err::create_dir_all(dest_dir)?;

    if url.scheme() == "file" {
        let source = url
            .to_file_path()
            .map_err(|_| anyhow::anyhow!("Invalid file URL: {}", video_url))?;
        let name = source
            .file_name()
            .and_then(|name| name.to_str())
            .map(sanitize_filename)
            .unwrap_or_else(|| "intro.mp4".to_string());
        let dest = dest_dir.join(name);
        tokio::fs::copy(&source, &dest)
            .await
            .with_context(|| format!("Failed to copy {}", source.display()))?;
        progress.finish_with_message("Copy complete");
        return Ok(dest);
    }

    let dest = dest_dir.join(download_file_name(&url));
    let response = reqwest::get(url.as_str())
        .await
        .with_context(|| format!("Failed to download {}", video_url))?;

    if !response.status().is_success() {
        anyhow::bail!("Failed to download video: HTTP {}", response.status());
    }

    progress.set_length(response.content_length().unwrap_or(0));
    progress.set_message("Downloading intro...");

    let mut file = tokio::fs::File::create(&dest)
        .await
        .with_context(|| format!("Failed to create {}", dest.display()))?;
    let mut downloaded = 0u64;
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.context("Download interrupted")?;
        file.write_all(&chunk).await?;
        downloaded += chunk.len() as u64;
        progress.set_position(downloaded);
    }

    file.flush().await?;
    debug!("Downloaded {} bytes to {}", downloaded, dest.display());
    progress.finish_with_message("Download complete");
    Ok(dest)
}
