//! Session state for one editing session.
//!
//! [`StateStore`] is the single writer. Everything else gets a [`StateView`]:
//! a watch receiver carrying the latest snapshot plus a channel for asking the
//! store to apply an action on its next turn.

use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use crate::captions::{active_caption, CaptionSegment, CaptionSource};
use crate::hooks::HookSelection;
use crate::pipeline::ProcessingStatus;
use crate::upload::UploadedAsset;
use crate::{ReelhookError, Result};

/// Current pipeline status plus the message shown next to it
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingState {
    pub status: ProcessingStatus,
    pub message: String,
}

impl ProcessingState {
    pub fn new(status: ProcessingStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn idle() -> Self {
        Self::new(ProcessingStatus::Idle, "")
    }
}

impl Default for ProcessingState {
    fn default() -> Self {
        Self::idle()
    }
}

/// Preview playback position and toggles
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlaybackCursor {
    /// Seconds from the start of the preview
    pub current_time: f64,
    pub is_playing: bool,
    pub is_muted: bool,
}

#[derive(Debug, Clone, Default)]
pub struct VideoState {
    pub selected_file: Option<UploadedAsset>,
    pub selected_hook: Option<HookSelection>,
    pub user_video_url: Option<String>,
    pub ai_video_url: Option<String>,
    pub rendered_montage_url: Option<String>,
    pub captions: Vec<CaptionSegment>,
    pub caption_source: Option<CaptionSource>,
    pub processing: ProcessingState,
    pub playback: PlaybackCursor,
    /// User-visible notes about fallbacks taken during the last run
    pub notices: Vec<String>,
}

impl VideoState {
    pub fn is_processing(&self) -> bool {
        self.processing.status.is_busy()
    }

    /// Caption under the playback cursor
    pub fn current_caption(&self) -> Option<&CaptionSegment> {
        active_caption(&self.captions, self.playback.current_time)
    }

    fn clear_results(&mut self) {
        self.user_video_url = None;
        self.ai_video_url = None;
        self.rendered_montage_url = None;
        self.captions.clear();
        self.caption_source = None;
        self.notices.clear();
        self.processing = ProcessingState::idle();
    }
}

/// Every change to [`VideoState`] goes through one of these
#[derive(Debug, Clone)]
pub enum VideoAction {
    SelectFile(Option<UploadedAsset>),
    /// Also clears previous results and returns to idle
    SelectHook(Option<HookSelection>),
    SetUserVideoUrl(Option<String>),
    SetAiVideoUrl(Option<String>),
    SetRenderedMontageUrl(Option<String>),
    SetCaptions {
        captions: Vec<CaptionSegment>,
        source: CaptionSource,
    },
    SetProcessingState(ProcessingState),
    AddNotice(String),
    SetVideoTime(f64),
    SetPlaying(bool),
    SetMuted(bool),
    ClearProcessingResults,
    ClearVideos,
    Reset,
}

impl VideoAction {
    fn kind(&self) -> &'static str {
        match self {
            VideoAction::SelectFile(_) => "SelectFile",
            VideoAction::SelectHook(_) => "SelectHook",
            VideoAction::SetUserVideoUrl(_) => "SetUserVideoUrl",
            VideoAction::SetAiVideoUrl(_) => "SetAiVideoUrl",
            VideoAction::SetRenderedMontageUrl(_) => "SetRenderedMontageUrl",
            VideoAction::SetCaptions { .. } => "SetCaptions",
            VideoAction::SetProcessingState(_) => "SetProcessingState",
            VideoAction::AddNotice(_) => "AddNotice",
            VideoAction::SetVideoTime(_) => "SetVideoTime",
            VideoAction::SetPlaying(_) => "SetPlaying",
            VideoAction::SetMuted(_) => "SetMuted",
            VideoAction::ClearProcessingResults => "ClearProcessingResults",
            VideoAction::ClearVideos => "ClearVideos",
            VideoAction::Reset => "Reset",
        }
    }

    /// Name used when the action is refused mid-run
    fn busy_label(&self) -> Option<&'static str> {
        match self {
            VideoAction::SelectFile(_) => Some("select a file"),
            VideoAction::SelectHook(_) => Some("change the hook"),
            VideoAction::ClearProcessingResults => Some("clear results"),
            VideoAction::ClearVideos => Some("clear videos"),
            VideoAction::Reset => Some("reset"),
            _ => None,
        }
    }
}

/// Owns the session's [`VideoState`] and publishes every change
pub struct StateStore {
    state: VideoState,
    publisher: watch::Sender<VideoState>,
    request_tx: mpsc::UnboundedSender<VideoAction>,
    request_rx: mpsc::UnboundedReceiver<VideoAction>,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore {
    pub fn new() -> Self {
        let state = VideoState::default();
        let (publisher, _) = watch::channel(state.clone());
        let (request_tx, request_rx) = mpsc::unbounded_channel();

        Self {
            state,
            publisher,
            request_tx,
            request_rx,
        }
    }

    pub fn state(&self) -> &VideoState {
        &self.state
    }

    /// A read-only handle that can also queue requests
    pub fn view(&self) -> StateView {
        StateView {
            receiver: self.publisher.subscribe(),
            requests: self.request_tx.clone(),
        }
    }

    /// Apply an action and publish the result.
    ///
    /// Actions that would pull the rug out from under a running pipeline are
    /// refused with [`ReelhookError::StateBusy`] and leave the state untouched.
    pub fn dispatch(&mut self, action: VideoAction) -> Result<()> {
        if self.state.is_processing() {
            if let Some(label) = action.busy_label() {
                return Err(ReelhookError::StateBusy(label).into());
            }
        }

        debug!("Applying {}", action.kind());
        reduce(&mut self.state, action);
        self.publisher.send_replace(self.state.clone());
        Ok(())
    }

    /// Apply queued view requests. Returns how many were applied; refused ones are logged.
    pub fn apply_requests(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(action) = self.request_rx.try_recv() {
            match self.dispatch(action) {
                Ok(()) => applied += 1,
                Err(e) => warn!("Ignoring queued request: {}", e),
            }
        }
        applied
    }
}

fn reduce(state: &mut VideoState, action: VideoAction) {
    match action {
        VideoAction::SelectFile(file) => state.selected_file = file,
        VideoAction::SelectHook(hook) => {
            state.selected_hook = hook;
            state.clear_results();
        }
        VideoAction::SetUserVideoUrl(url) => state.user_video_url = url,
        VideoAction::SetAiVideoUrl(url) => state.ai_video_url = url,
        VideoAction::SetRenderedMontageUrl(url) => state.rendered_montage_url = url,
        VideoAction::SetCaptions { captions, source } => {
            state.captions = captions;
            state.caption_source = Some(source);
        }
        VideoAction::SetProcessingState(processing) => state.processing = processing,
        VideoAction::AddNotice(notice) => state.notices.push(notice),
        VideoAction::SetVideoTime(time) => state.playback.current_time = time.max(0.0),
        VideoAction::SetPlaying(playing) => state.playback.is_playing = playing,
        VideoAction::SetMuted(muted) => state.playback.is_muted = muted,
        VideoAction::ClearProcessingResults => state.clear_results(),
        VideoAction::ClearVideos => {
            state.selected_file = None;
            state.clear_results();
        }
        VideoAction::Reset => *state = VideoState::default(),
    }
}

/// Read-only view of the session state
#[derive(Clone)]
pub struct StateView {
    receiver: watch::Receiver<VideoState>,
    requests: mpsc::UnboundedSender<VideoAction>,
}

impl StateView {
    /// The most recently published state
    pub fn snapshot(&self) -> VideoState {
        self.receiver.borrow().clone()
    }

    /// Wait for the next published change. Fails once the store is gone.
    pub async fn changed(&mut self) -> Result<VideoState> {
        self.receiver
            .changed()
            .await
            .map_err(|_| anyhow::anyhow!("State store has been dropped"))?;
        Ok(self.receiver.borrow_and_update().clone())
    }

    /// Ask the store to apply `action` the next time it drains requests
    pub fn request(&self, action: VideoAction) -> Result<()> {
        self.requests
            .send(action)
            .map_err(|_| anyhow::anyhow!("State store has been dropped"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::{find_hook, HookSelection};

    fn busy() -> ProcessingState {
        ProcessingState::new(ProcessingStatus::Transcribing, "Transcribing audio...")
    }

    fn hook(id: &str) -> Option<HookSelection> {
        find_hook(id).map(HookSelection::from)
    }

    #[test]
    fn test_select_hook_resets_results() {
        let mut store = StateStore::new();
        store.dispatch(VideoAction::SetAiVideoUrl(Some("https://a/b.mp4".into()))).unwrap();
        store
            .dispatch(VideoAction::SetProcessingState(ProcessingState::new(
                ProcessingStatus::Completed,
                "done",
            )))
            .unwrap();

        store.dispatch(VideoAction::SelectHook(hook("lifestyle"))).unwrap();

        let state = store.state();
        assert_eq!(state.selected_hook.as_ref().unwrap().id, "lifestyle");
        assert!(state.ai_video_url.is_none());
        assert_eq!(state.processing, ProcessingState::idle());
    }

    #[test]
    fn test_conflicting_actions_rejected_while_processing() {
        let mut store = StateStore::new();
        store.dispatch(VideoAction::SelectHook(hook("trending"))).unwrap();
        store.dispatch(VideoAction::SetProcessingState(busy())).unwrap();

        let err = store.dispatch(VideoAction::SelectHook(hook("energetic"))).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot change the hook while a video is being processed"
        );
        assert!(store.dispatch(VideoAction::Reset).is_err());
        assert!(store.dispatch(VideoAction::ClearVideos).is_err());
        assert_eq!(store.state().selected_hook.as_ref().unwrap().id, "trending");

        // Playback still works mid-run
        store.dispatch(VideoAction::SetPlaying(true)).unwrap();
        assert!(store.state().playback.is_playing);
    }

    #[test]
    fn test_clear_videos_drops_file_and_results() {
        let mut store = StateStore::new();
        let asset = UploadedAsset::new(vec![0u8; 4], "video/mp4", "clip.mp4");
        store.dispatch(VideoAction::SelectFile(Some(asset))).unwrap();
        store.dispatch(VideoAction::SelectHook(hook("trending"))).unwrap();
        store
            .dispatch(VideoAction::SetCaptions {
                captions: vec![CaptionSegment::new("hi", 0.0, 1.0)],
                source: CaptionSource::Provider,
            })
            .unwrap();

        store.dispatch(VideoAction::ClearVideos).unwrap();
        let state = store.state();
        assert!(state.selected_file.is_none());
        assert!(state.captions.is_empty());
        assert!(state.caption_source.is_none());
        assert!(state.selected_hook.is_some());
    }

    #[test]
    fn test_playback_cursor() {
        let mut store = StateStore::new();
        store
            .dispatch(VideoAction::SetCaptions {
                captions: crate::captions::demo_captions(),
                source: CaptionSource::Demo,
            })
            .unwrap();
        store.dispatch(VideoAction::SetVideoTime(-3.0)).unwrap();
        assert_eq!(store.state().playback.current_time, 0.0);

        store.dispatch(VideoAction::SetVideoTime(4.5)).unwrap();
        store.dispatch(VideoAction::SetMuted(true)).unwrap();
        assert_eq!(store.state().current_caption().unwrap().text, "create something amazing");
        assert!(store.state().playback.is_muted);
    }

    #[tokio::test]
    async fn test_view_sees_published_changes() {
        let mut store = StateStore::new();
        let mut view = store.view();
        assert_eq!(view.snapshot().processing.status, ProcessingStatus::Idle);

        store.dispatch(VideoAction::SetProcessingState(busy())).unwrap();
        let seen = view.changed().await.unwrap();
        assert_eq!(seen.processing.status, ProcessingStatus::Transcribing);
    }

    #[tokio::test]
    async fn test_view_requests_are_applied_by_the_store() {
        let mut store = StateStore::new();
        let view = store.view();

        view.request(VideoAction::SetMuted(true)).unwrap();
        view.request(VideoAction::SelectHook(hook("comedy"))).unwrap();
        assert!(!store.state().playback.is_muted);

        assert_eq!(store.apply_requests(), 2);
        assert!(store.state().playback.is_muted);
        assert_eq!(view.snapshot().selected_hook.unwrap().id, "comedy");
    }

    #[tokio::test]
    async fn test_busy_requests_are_dropped() {
        let mut store = StateStore::new();
        store.dispatch(VideoAction::SetProcessingState(busy())).unwrap();

        let view = store.view();
        view.request(VideoAction::Reset).unwrap();
        view.request(VideoAction::SetVideoTime(1.0)).unwrap();

        assert_eq!(store.apply_requests(), 1);
        assert!(store.state().is_processing());
    }

    #[tokio::test]
    async fn test_view_fails_after_store_dropped() {
        let store = StateStore::new();
        let mut view = store.view();
        drop(store);
        assert!(view.changed().await.is_err());
        assert!(view.request(VideoAction::SetPlaying(true)).is_err());
    }
}
