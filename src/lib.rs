//! Reelhook - AI hook intros and auto-generated captions for short videos
//!
//! This library validates an uploaded clip, asks a video-generation provider for a short
//! "hook" intro, transcribes the clip, styles the transcript into caption lines and
//! publishes everything as a single [`state::VideoState`] for preview and export.

pub mod captions;
pub mod cli;
pub mod compositor;
pub mod config;
pub mod hooks;
pub mod output;
pub mod pipeline;
pub mod providers;
pub mod state;
pub mod upload;
pub mod utils;

pub use cli::{Cli, Commands, OutputFormat};
pub use config::Config;
pub use pipeline::{Orchestrator, ProcessingStatus};
pub use state::{StateStore, StateView, VideoState};
pub use upload::{validate_upload, UploadedAsset};

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Error types specific to reelhook
#[derive(thiserror::Error, Debug)]
pub enum ReelhookError {
    #[error("{0}")]
    ProviderNotConfigured(String),

    #[error("Provider request failed: {0}")]
    ProviderRequest(String),

    #[error("Invalid pipeline transition from {from} on {event}")]
    InvalidTransition { from: String, event: String },

    #[error("Cannot {0} while a video is being processed")]
    StateBusy(&'static str),

    #[error("Storage operation failed: {0}")]
    Storage(String),

    #[error("Composition is invalid: {0}")]
    Composition(String),
}
