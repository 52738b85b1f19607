use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::providers::CaptionStyle;
use crate::utils::{format_file_size, mask_secret};

/// Environment variable holding the video-generation credential
pub const REPLICATE_TOKEN_ENV: &str = "REPLICATE_API_TOKEN";

/// Environment variable holding the transcription/captioning credential
pub const OPENAI_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Video-generation provider settings
    pub replicate: ReplicateConfig,

    /// Transcription and caption-styling provider settings
    pub openai: OpenAiConfig,

    /// Render and timing parameters for a pipeline run
    pub pipeline: PipelineConfig,

    /// Scripted fallback settings
    pub demo: DemoConfig,

    /// Upload policy and storage location
    pub upload: UploadConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplicateConfig {
    /// API token (overridden by REPLICATE_API_TOKEN)
    pub api_token: Option<String>,

    /// API base URL
    pub base_url: String,

    /// Model id from the capability table
    pub default_model: String,

    /// Delay between status polls in seconds
    pub poll_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    /// API key (overridden by OPENAI_API_KEY)
    pub api_key: Option<String>,

    /// API base URL
    pub base_url: String,

    /// Speech-to-text model
    pub transcription_model: String,

    /// Chat model used for caption styling
    pub chat_model: String,

    /// Token ceiling for a caption-styling completion
    pub caption_max_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Intro clip duration in seconds
    pub duration_secs: u32,

    /// Intro clip frame rate
    pub fps: u32,

    /// Requested intro width before model clamping
    pub width: u32,

    /// Requested intro height before model clamping
    pub height: u32,

    /// Bounded wait for the transcription step
    pub transcription_timeout_secs: u64,

    /// Caption styling flavour
    pub caption_style: CaptionStyle,

    /// Words per line for the local caption fallback
    pub caption_group_size: usize,

    /// Caption timeline length when the transcript has no segments
    pub default_caption_duration: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Always take the scripted path, even with credentials present
    pub force: bool,

    /// Delays between the scripted state changes, in milliseconds
    pub step_delays_ms: Vec<u64>,

    /// Placeholder intro clip
    pub video_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Upload ceiling in bytes
    pub max_bytes: u64,

    /// Accepted MIME types
    pub allowed_types: Vec<String>,

    /// Where stored uploads go (a session temp dir when unset)
    pub storage_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            replicate: ReplicateConfig::default(),
            openai: OpenAiConfig::default(),
            pipeline: PipelineConfig::default(),
            demo: DemoConfig::default(),
            upload: UploadConfig::default(),
        }
    }
}

impl Default for ReplicateConfig {
    fn default() -> Self {
        Self {
            api_token: None,
            base_url: "https://api.replicate.com/v1".to_string(),
            default_model: "zeroscope".to_string(),
            poll_interval_secs: 2,
        }
    }
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            transcription_model: "whisper-1".to_string(),
            chat_model: "gpt-3.5-turbo".to_string(),
            caption_max_tokens: 200,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            duration_secs: 5,
            fps: 30,
            width: 1080,
            height: 1920,
            transcription_timeout_secs: 300,
            caption_style: CaptionStyle::Tiktok,
            caption_group_size: 3,
            default_caption_duration: 10.0,
        }
    }
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            force: false,
            step_delays_ms: vec![2000, 1500, 1000, 1000],
            video_url: "https://sample-videos.com/zip/10/mp4/SampleVideo_1280x720_1mb.mp4"
                .to_string(),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_bytes: 100 * 1024 * 1024,
            allowed_types: vec![
                "video/mp4".to_string(),
                "video/quicktime".to_string(),
                "video/webm".to_string(),
                "video/avi".to_string(),
            ],
            storage_dir: None,
        }
    }
}

impl Config {
    /// Load configuration from the given path or the default locations.
    ///
    /// A missing file yields the defaults. Credentials from the environment
    /// always win over the file.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(path) => Some(path.to_path_buf()),
            None => Self::config_path().ok().filter(|p| p.exists()),
        };

        let mut config = match config_path {
            Some(path) => {
                let content = fs_err::read_to_string(&path)
                    .context("Failed to read config file")?;
                serde_yaml::from_str::<Config>(&content)
                    .with_context(|| format!("Failed to parse config file {}", path.display()))?
            }
            None => Self::default(),
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the given path or the default location
    pub fn save(&self, path: Option<&Path>) -> Result<PathBuf> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::config_path()?,
        };

        if let Some(parent) = config_path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self)
            .context("Failed to serialize config")?;

        fs_err::write(&config_path, content)
            .context("Failed to write config file")?;

        Ok(config_path)
    }

    /// Get configuration file path
    pub fn config_path() -> Result<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("reelhook.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?;

        Ok(config_dir.join("reelhook").join("config.yaml"))
    }

    fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup(REPLICATE_TOKEN_ENV).filter(|v| !v.trim().is_empty()) {
            self.replicate.api_token = Some(token);
        }
        if let Some(key) = lookup(OPENAI_KEY_ENV).filter(|v| !v.trim().is_empty()) {
            self.openai.api_key = Some(key);
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let pipeline = &self.pipeline;
        if pipeline.fps == 0 {
            anyhow::bail!("pipeline.fps must be greater than zero");
        }
        if pipeline.width == 0 || pipeline.height == 0 {
            anyhow::bail!("pipeline.width and pipeline.height must be greater than zero");
        }
        if pipeline.caption_group_size == 0 {
            anyhow::bail!("pipeline.caption_group_size must be greater than zero");
        }
        if pipeline.default_caption_duration <= 0.0 {
            anyhow::bail!("pipeline.default_caption_duration must be positive");
        }
        if self.replicate.poll_interval_secs == 0 {
            anyhow::bail!("replicate.poll_interval_secs must be greater than zero");
        }
        if self.upload.allowed_types.is_empty() {
            anyhow::bail!("upload.allowed_types must list at least one MIME type");
        }

        url::Url::parse(&self.replicate.base_url)
            .context("replicate.base_url is not a valid URL")?;
        url::Url::parse(&self.openai.base_url)
            .context("openai.base_url is not a valid URL")?;
        if self.demo.video_url.trim().is_empty() {
            anyhow::bail!("demo.video_url must not be empty");
        }
        url::Url::parse(&self.demo.video_url)
            .context("demo.video_url is not a valid URL")?;

        Ok(())
    }

    /// Whether every live provider has a credential
    pub fn has_api_keys(&self) -> bool {
        let present = |value: &Option<String>| value.as_deref().is_some_and(|v| !v.trim().is_empty());
        present(&self.replicate.api_token) && present(&self.openai.api_key)
    }

    /// Bounded wait for the transcription step
    pub fn transcription_timeout(&self) -> Duration {
        Duration::from_secs(self.pipeline.transcription_timeout_secs)
    }

    /// Delay between job status polls
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.replicate.poll_interval_secs)
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  Replicate Token: {}", mask_secret(self.replicate.api_token.as_deref()));
        println!("  Replicate Model: {}", self.replicate.default_model);
        println!("  OpenAI Key: {}", mask_secret(self.openai.api_key.as_deref()));
        println!("  Caption Style: {}", self.pipeline.caption_style);
        println!(
            "  Intro: {}s @ {}fps, {}x{}",
            self.pipeline.duration_secs, self.pipeline.fps, self.pipeline.width, self.pipeline.height
        );
        println!("  Transcription Timeout: {}s", self.pipeline.transcription_timeout_secs);
        println!("  Upload Limit: {}", format_file_size(self.upload.max_bytes));
        if let Some(dir) = &self.upload.storage_dir {
            println!("  Storage Dir: {}", dir.display());
        }
        println!("  Demo Mode Forced: {}", self.demo.force);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.upload.max_bytes, 100 * 1024 * 1024);
        assert_eq!(config.demo.step_delays_ms, vec![2000, 1500, 1000, 1000]);
        assert!(!config.has_api_keys());
    }

    #[test]
    fn test_env_overrides_win() {
        let mut config = Config::default();
        config.replicate.api_token = Some("from-file".to_string());

        let env: HashMap<&str, &str> = [
            (REPLICATE_TOKEN_ENV, "from-env"),
            (OPENAI_KEY_ENV, "sk-test"),
        ]
        .into_iter()
        .collect();
        config.apply_env_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.replicate.api_token.as_deref(), Some("from-env"));
        assert_eq!(config.openai.api_key.as_deref(), Some("sk-test"));
        assert!(config.has_api_keys());
    }

    #[test]
    fn test_blank_env_values_are_ignored() {
        let mut config = Config::default();
        config.apply_env_overrides(|_| Some("   ".to_string()));
        assert!(config.replicate.api_token.is_none());
        assert!(config.openai.api_key.is_none());
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = "pipeline:\n  fps: 24\ndemo:\n  force: true\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.pipeline.fps, 24);
        assert_eq!(config.pipeline.width, 1080);
        assert!(config.demo.force);
        assert_eq!(config.replicate.default_model, "zeroscope");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.pipeline.caption_group_size = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.pipeline.default_caption_duration = 0.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.openai.base_url = "not a url".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.replicate.poll_interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_missing_demo_clip() {
        let config: Config = serde_yaml::from_str("demo:\n  video_url: \"\"\n").unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("demo.video_url"));

        let mut config = Config::default();
        config.demo.video_url = "placeholder.mp4".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");

        let mut config = Config::default();
        config.pipeline.caption_style = CaptionStyle::Subtitles;
        config.save(Some(&path)).unwrap();

        let loaded = Config::load(Some(&path)).unwrap();
        assert_eq!(loaded.pipeline.caption_style, CaptionStyle::Subtitles);
    }
}
