//! Caption line grouping and timing.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::providers::{CaptionStyle, CaptionStyler, TranscriptSegment, Transcription};

/// Caption timeline length used when a transcript carries no segments
pub const DEFAULT_CAPTION_DURATION: f64 = 10.0;

/// Words per line in the local fallback
pub const DEFAULT_GROUP_SIZE: usize = 3;

/// A timed span of caption text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionSegment {
    pub text: String,

    /// Start time in seconds
    pub start_time: f64,

    /// End time in seconds
    pub end_time: f64,
}

impl CaptionSegment {
    pub fn new(text: impl Into<String>, start_time: f64, end_time: f64) -> Self {
        Self {
            text: text.into(),
            start_time,
            end_time,
        }
    }

    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }

    /// Whether `time` falls in `[start, end)`
    pub fn contains(&self, time: f64) -> bool {
        time >= self.start_time && time < self.end_time
    }
}

/// Where the displayed caption lines came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptionSource {
    /// Styled by the caption provider from the real transcript
    Provider,
    /// Grouped locally after the caption provider failed
    Heuristic,
    /// Built from the placeholder transcript after transcription failed
    PlaceholderTranscript,
    /// Canned demo captions
    Demo,
}

/// Caption lines plus their provenance
#[derive(Debug, Clone, PartialEq)]
pub struct StyledCaptions {
    pub lines: Vec<String>,
    pub source: CaptionSource,
    /// Why the provider was bypassed, if it was
    pub fallback_reason: Option<String>,
}

/// Group words into lines: word `i` lands on line `i / group_size`.
pub fn group_words(text: &str, group_size: usize) -> Vec<String> {
    let group_size = group_size.max(1);
    let words: Vec<&str> = text.split_whitespace().collect();

    words
        .chunks(group_size)
        .map(|chunk| chunk.join(" "))
        .collect()
}

/// Style captions with the provider, falling back to local word grouping on error
pub async fn style_with_fallback(
    styler: &dyn CaptionStyler,
    text: &str,
    style: CaptionStyle,
    group_size: usize,
) -> StyledCaptions {
    match styler.style(text, style).await {
        Ok(lines) => StyledCaptions {
            lines,
            source: CaptionSource::Provider,
            fallback_reason: None,
        },
        Err(e) => {
            warn!("Caption styling failed, grouping words locally: {}", e);
            StyledCaptions {
                lines: group_words(text, group_size),
                source: CaptionSource::Heuristic,
                fallback_reason: Some(e.to_string()),
            }
        }
    }
}

/// Timeline length for a transcript: the last segment's end, or `default` when
/// there are no segments or the last end is not positive.
pub fn total_duration(segments: &[TranscriptSegment], default: f64) -> f64 {
    segments
        .last()
        .map(|segment| segment.end)
        .filter(|end| *end > 0.0 && end.is_finite())
        .unwrap_or(default)
}

/// Spread `lines` evenly over `[0, total_duration]`.
///
/// Line `i` of `n` covers `[i/n * D, (i+1)/n * D)`. Adjacent boundaries come
/// from the same expression so the segments tile the range exactly.
pub fn synthesize_timing(lines: &[String], total_duration: f64) -> Vec<CaptionSegment> {
    let n = lines.len();
    let boundary = |i: usize| (i as f64 / n as f64) * total_duration;

    lines
        .iter()
        .enumerate()
        .map(|(i, line)| CaptionSegment::new(line.clone(), boundary(i), boundary(i + 1)))
        .collect()
}

/// The caption showing at playback time `time`, if any
pub fn active_caption(captions: &[CaptionSegment], time: f64) -> Option<&CaptionSegment> {
    captions.iter().find(|caption| caption.contains(time))
}

/// Transcript substituted when the real one cannot be produced
pub fn demo_transcription() -> Transcription {
    let lines = demo_lines();
    let segments = lines
        .iter()
        .enumerate()
        .map(|(index, text)| TranscriptSegment {
            index,
            start: index as f64 * 2.0,
            end: (index + 1) as f64 * 2.0,
            text: text.clone(),
        })
        .collect();

    Transcription {
        text: lines.join(" "),
        segments,
        language: Some("en".to_string()),
    }
}

/// The three canned demo caption segments
pub fn demo_captions() -> Vec<CaptionSegment> {
    demo_lines()
        .into_iter()
        .enumerate()
        .map(|(i, text)| CaptionSegment::new(text, i as f64 * 2.0, (i + 1) as f64 * 2.0))
        .collect()
}

fn demo_lines() -> Vec<String> {
    vec![
        "Welcome to my channel!".to_string(),
        "Today we're going to".to_string(),
        "create something amazing".to_string(),
    ]
}
