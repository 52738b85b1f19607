use anyhow::Result;
use serde::Serialize;
use std::path::Path;

use crate::captions::{CaptionSegment, CaptionSource};
use crate::cli::OutputFormat;
use crate::pipeline::ProcessingStatus;
use crate::state::VideoState;
use crate::utils::format_clock;

/// What a finished run produced, in printable form
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub status: ProcessingStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_video_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_video_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption_source: Option<CaptionSource>,
    pub captions: Vec<CaptionSegment>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notices: Vec<String>,
}

impl From<&VideoState> for RunReport {
    fn from(state: &VideoState) -> Self {
        Self {
            status: state.processing.status,
            message: state.processing.message.clone(),
            ai_video_url: state.ai_video_url.clone(),
            user_video_url: state.user_video_url.clone(),
            caption_source: state.caption_source,
            captions: state.captions.clone(),
            notices: state.notices.clone(),
        }
    }
}

pub fn render(report: &RunReport, format: &OutputFormat) -> Result<String> {
    Ok(match format {
        OutputFormat::Text => format_as_text(report),
        OutputFormat::Json => serde_json::to_string_pretty(report)?,
        OutputFormat::Srt => format_as_srt(&report.captions),
        OutputFormat::Vtt => format_as_vtt(&report.captions),
    })
}

/// Save a run report to file
pub async fn save_to_file(report: &RunReport, path: &Path, format: &OutputFormat) -> Result<()> {
    let content = render(report, format)?;
    fs_err::write(path, content)?;
    Ok(())
}

/// Print a run report to stdout
pub fn print_to_console(report: &RunReport, format: &OutputFormat) -> Result<()> {
    println!("{}", render(report, format)?);
    Ok(())
}

pub fn format_as_text(report: &RunReport) -> String {
    let mut out = format!("Status: {}\n{}\n", report.status, report.message);

    if let Some(url) = &report.ai_video_url {
        out.push_str(&format!("AI intro: {}\n", url));
    }
    if let Some(url) = &report.user_video_url {
        out.push_str(&format!("Your clip: {}\n", url));
    }
    for notice in &report.notices {
        out.push_str(&format!("Note: {}\n", notice));
    }

    if !report.captions.is_empty() {
        out.push_str("\nCaptions:\n");
        for caption in &report.captions {
            out.push_str(&format!(
                "[{} - {}] {}\n",
                format_clock(caption.start_time),
                format_clock(caption.end_time),
                caption.text
            ));
        }
    }

    out.trim_end().to_string()
}

pub fn format_as_srt(captions: &[CaptionSegment]) -> String {
    captions
        .iter()
        .enumerate()
        .map(|(i, caption)| {
            format!(
                "{}\n{} --> {}\n{}\n",
                i + 1,
                cue_timestamp(caption.start_time, ','),
                cue_timestamp(caption.end_time, ','),
                caption.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_as_vtt(captions: &[CaptionSegment]) -> String {
    let mut out = String::from("WEBVTT\n");
    for caption in captions {
        out.push_str(&format!(
            "\n{} --> {}\n{}\n",
            cue_timestamp(caption.start_time, '.'),
            cue_timestamp(caption.end_time, '.'),
            caption.text
        ));
    }
    out
}

/// `HH:MM:SS<sep>mmm`
fn cue_timestamp(seconds: f64, separator: char) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms % 3_600_000) / 60_000;
    let secs = (total_ms % 60_000) / 1000;
    let millis = total_ms % 1000;

    format!("{:02}:{:02}:{:02}{}{:03}", hours, minutes, secs, separator, millis)
}
