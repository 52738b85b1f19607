use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::compositor::ExportQuality;

#[derive(Parser)]
#[command(
    name = "reelhook",
    about = "Reelhook - AI hook intros and auto captions for short-form video",
    version,
    long_about = "Validates a video clip, generates a short AI intro from a hook template, transcribes the clip and turns the transcript into timed, styled captions. Falls back to a scripted demo run when provider credentials are missing."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file (defaults to ./reelhook.yaml or the user config directory)
    #[arg(long, global = true, env = "REELHOOK_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate an AI intro and captions for a video clip
    Generate {
        /// Video file to process (MP4, MOV, WebM or AVI)
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Hook template id (see `reelhook hooks`)
        #[arg(long, default_value = "trending", conflicts_with = "topic")]
        hook: String,

        /// Free-form topic used instead of a hook template
        #[arg(long, value_name = "TOPIC")]
        topic: Option<String>,

        /// Run the scripted demo pipeline even when credentials are configured
        #[arg(long)]
        demo: bool,

        /// Override the MIME type detected from the file extension
        #[arg(long, value_name = "TYPE")]
        mime: Option<String>,

        /// Video model id (zeroscope, svd, animatediff)
        #[arg(long, value_name = "MODEL")]
        model: Option<String>,

        /// Output file path (prints to console if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Write the compositor props bundle into this directory
        #[arg(long, value_name = "DIR")]
        export: Option<PathBuf>,

        /// Render quality preset for the export
        #[arg(long, value_enum, default_value = "medium")]
        quality: ExportQuality,

        /// Also download the generated intro clip into the export directory
        #[arg(long, requires = "export")]
        download_intro: bool,
    },

    /// Check whether a file would be accepted as an upload
    Validate {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Override the MIME type detected from the file extension
        #[arg(long, value_name = "TYPE")]
        mime: Option<String>,
    },

    /// List available hook templates
    Hooks,

    /// Check a video-generation job
    Status {
        /// Provider job id
        #[arg(value_name = "JOB_ID")]
        job_id: String,

        /// Keep polling until the job succeeds or fails
        #[arg(short, long)]
        wait: bool,
    },

    /// Show or initialise the configuration file
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,

        /// Write a configuration file with the default settings
        #[arg(long)]
        init: bool,
    },
}

#[derive(ValueEnum, Clone, Debug)]
pub enum OutputFormat {
    /// Status summary and timed captions
    Text,
    /// JSON report
    Json,
    /// SRT subtitle format
    Srt,
    /// WebVTT format
    Vtt,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Srt => write!(f, "srt"),
            OutputFormat::Vtt => write!(f, "vtt"),
        }
    }
}
