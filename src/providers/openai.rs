//! OpenAI adapters: Whisper transcription and chat-based caption styling.

use anyhow::Context;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

use super::{CaptionStyle, CaptionStyler, Transcriber, TranscriptSegment, Transcription};
use crate::config::OpenAiConfig;
use crate::upload::UploadedAsset;
use crate::{ReelhookError, Result};

pub const NOT_CONFIGURED_MESSAGE: &str =
    "OpenAI API is not configured. Please add OPENAI_API_KEY to your environment variables.";

const CAPTION_SYSTEM_PROMPT: &str = "You are a caption formatting expert. Return only the formatted captions, one per line, no additional text.";

#[derive(Debug, Deserialize)]
struct WhisperResponse {
    text: String,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    segments: Vec<WhisperSegment>,
}

#[derive(Debug, Deserialize)]
struct WhisperSegment {
    start: f64,
    end: f64,
    text: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Shared HTTP plumbing for both adapters
#[derive(Clone)]
struct OpenAiClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl OpenAiClient {
    fn new(config: &OpenAiConfig, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| ReelhookError::ProviderNotConfigured(NOT_CONFIGURED_MESSAGE.to_string()).into())
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn read_body(response: reqwest::Response) -> Result<String> {
        let status = response.status();
        let body = response.text().await.context("Failed to read OpenAI response")?;

        if !status.is_success() {
            return Err(ReelhookError::ProviderRequest(parse_api_error(status, &body)).into());
        }
        Ok(body)
    }
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<ApiErrorResponse>(body) {
        Ok(parsed) => format!("OpenAI API error ({}): {}", status, parsed.error.message),
        Err(_) => {
            let truncated: String = body.chars().take(500).collect();
            format!("OpenAI API error ({}): {}", status, truncated)
        }
    }
}

fn caption_prompt(text: &str, style: CaptionStyle) -> String {
    match style {
        CaptionStyle::Tiktok => format!(
            "Convert this text into TikTok-style captions (short, punchy lines, max 3-4 words per line): \"{}\"",
            text
        ),
        CaptionStyle::Subtitles => format!(
            "Convert this text into subtitle format (natural breaks, readable length): \"{}\"",
            text
        ),
    }
}

/// One caption per non-blank line of the completion
fn split_caption_lines(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

fn into_transcription(response: WhisperResponse) -> Transcription {
    let segments = response
        .segments
        .into_iter()
        .enumerate()
        .map(|(index, segment)| TranscriptSegment {
            index,
            start: segment.start,
            end: segment.end,
            text: segment.text.trim().to_string(),
        })
        .collect();

    Transcription {
        text: response.text.trim().to_string(),
        segments,
        language: response.language,
    }
}

/// Whisper speech-to-text
pub struct OpenAiTranscriber {
    inner: OpenAiClient,
    model: String,
}

impl OpenAiTranscriber {
    pub fn new(config: &OpenAiConfig) -> Result<Self> {
        Ok(Self {
            // The caller bounds the overall wait; this only guards a hung connection.
            inner: OpenAiClient::new(config, Duration::from_secs(600))?,
            model: config.transcription_model.clone(),
        })
    }
}

#[async_trait]
impl Transcriber for OpenAiTranscriber {
    async fn transcribe(&self, asset: &UploadedAsset) -> Result<Transcription> {
        let key = self.inner.api_key()?;

        let file = Part::bytes(asset.content.to_vec())
            .file_name(asset.name.clone())
            .mime_str(&asset.mime_type)
            .context("Invalid MIME type for transcription upload")?;

        let form = Form::new()
            .part("file", file)
            .text("model", self.model.clone())
            .text("response_format", "verbose_json")
            .text("timestamp_granularities[]", "segment");

        info!("Transcribing {} with {}", asset.name, self.model);

        let response = self
            .inner
            .client
            .post(self.inner.url("audio/transcriptions"))
            .bearer_auth(key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ReelhookError::ProviderRequest(format!("Network error: {}", e)))?;

        let body = OpenAiClient::read_body(response).await?;
        let parsed: WhisperResponse =
            serde_json::from_str(&body).context("Failed to parse transcription response")?;

        let transcription = into_transcription(parsed);
        debug!("Transcription returned {} segments", transcription.segments.len());
        Ok(transcription)
    }
}

/// Chat-completion caption styling
pub struct OpenAiCaptionStyler {
    inner: OpenAiClient,
    model: String,
    max_tokens: u32,
}

impl OpenAiCaptionStyler {
    pub fn new(config: &OpenAiConfig) -> Result<Self> {
        Ok(Self {
            inner: OpenAiClient::new(config, Duration::from_secs(60))?,
            model: config.chat_model.clone(),
            max_tokens: config.caption_max_tokens,
        })
    }
}

#[async_trait]
impl CaptionStyler for OpenAiCaptionStyler {
    async fn style(&self, text: &str, style: CaptionStyle) -> Result<Vec<String>> {
        let key = self.inner.api_key()?;

        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": CAPTION_SYSTEM_PROMPT },
                { "role": "user", "content": caption_prompt(text, style) },
            ],
            "max_tokens": self.max_tokens,
        });

        let response = self
            .inner
            .client
            .post(self.inner.url("chat/completions"))
            .bearer_auth(key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ReelhookError::ProviderRequest(format!("Network error: {}", e)))?;

        let body = OpenAiClient::read_body(response).await?;
        let parsed: ChatResponse =
            serde_json::from_str(&body).context("Failed to parse caption response")?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();

        Ok(split_caption_lines(&content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_transcription_indexes_segments() {
        let response: WhisperResponse = serde_json::from_str(
            r#"{"text":" Hello there. General Kenobi. ","language":"english","segments":[
                {"id":0,"start":0.0,"end":1.4,"text":" Hello there."},
                {"id":1,"start":1.4,"end":3.2,"text":" General Kenobi."}
            ]}"#,
        )
        .unwrap();

        let transcription = into_transcription(response);
        assert_eq!(transcription.text, "Hello there. General Kenobi.");
        assert_eq!(transcription.language.as_deref(), Some("english"));
        assert_eq!(transcription.segments.len(), 2);
        assert_eq!(transcription.segments[1].index, 1);
        assert_eq!(transcription.segments[1].text, "General Kenobi.");
        assert_eq!(transcription.segments[1].end, 3.2);
    }

    #[test]
    fn test_missing_segments_default_to_empty() {
        let response: WhisperResponse = serde_json::from_str(r#"{"text":"hi"}"#).unwrap();
        assert!(into_transcription(response).segments.is_empty());
    }

    #[test]
    fn test_split_caption_lines_drops_blanks() {
        let lines = split_caption_lines("Welcome back\n\n  to my  \nchannel!\n");
        assert_eq!(lines, vec!["Welcome back", "to my", "channel!"]);
    }

    #[test]
    fn test_caption_prompt_by_style() {
        assert!(caption_prompt("hi", CaptionStyle::Tiktok).contains("max 3-4 words per line"));
        assert!(caption_prompt("hi", CaptionStyle::Subtitles).contains("subtitle format"));
    }

    #[test]
    fn test_parse_api_error() {
        let body = r#"{"error":{"message":"Invalid file format.","type":"invalid_request_error"}}"#;
        assert_eq!(
            parse_api_error(StatusCode::BAD_REQUEST, body),
            "OpenAI API error (400 Bad Request): Invalid file format."
        );
    }

    #[tokio::test]
    async fn test_styler_without_key_is_not_configured() {
        let styler = OpenAiCaptionStyler::new(&OpenAiConfig::default()).unwrap();
        let err = styler.style("hello", CaptionStyle::Tiktok).await.unwrap_err();
        assert_eq!(err.to_string(), NOT_CONFIGURED_MESSAGE);
    }
}
