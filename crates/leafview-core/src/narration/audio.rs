//! Playback seam between the narration session and whatever plays sound.

use crate::backend::AudioPayload;
use crate::error::BackendResult;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEvent {
    Playing,
    Paused,
    Ended,
    /// The payload could not be decoded or played.
    Failed,
}

/// Callback a handle invokes on every playback transition. May be called from any thread.
pub type PlaybackListener = Arc<dyn Fn(PlaybackEvent) + Send + Sync>;

pub trait AudioHandle: Send + Sync {
    fn play(&self);
    fn pause(&self);
    fn is_paused(&self) -> bool;
    /// Seeks back to the start without changing the play/pause state.
    fn rewind(&self);
}

pub trait AudioOutput: Send + Sync {
    fn create(
        &self,
        audio: &AudioPayload,
        listener: PlaybackListener,
    ) -> BackendResult<Arc<dyn AudioHandle>>;
}
