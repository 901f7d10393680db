//! Media Session Adapter.
//!
//! The media channel is reached through [`MediaPlatform`]; local capture and
//! remote playback through [`LocalTrack`] and [`RemoteTrack`] handles.
//! [`MediaSession`] owns those handles for one session object.

mod session;

pub use session::MediaSession;

use async_trait::async_trait;
use common::secret::SecretString;
use common::types::{LocalId, MediaKind, ParticipantId};

use crate::errors::MediaError;
use crate::events::PlatformEventSink;

/// Where a track is rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderTarget {
    /// Local camera preview.
    LocalPreview,
    /// Video surface for one remote participant.
    RemoteVideo(ParticipantId),
    /// Default audio output.
    AudioOutput,
}

impl RenderTarget {
    /// Target for a remote track of `kind` from `participant_id`.
    #[must_use]
    pub fn for_remote(participant_id: &ParticipantId, kind: MediaKind) -> Self {
        match kind {
            MediaKind::Video => RenderTarget::RemoteVideo(participant_id.clone()),
            MediaKind::Audio => RenderTarget::AudioOutput,
        }
    }
}

/// A local capture track (microphone or camera).
pub trait LocalTrack: Send + Sync {
    fn kind(&self) -> MediaKind;

    /// Mute without unpublishing.
    fn set_muted(&self, muted: bool);

    /// Enable or disable capture.
    fn set_enabled(&self, enabled: bool);

    fn play(&self, target: &RenderTarget);

    /// Release the capture device. Idempotent.
    fn close(&self);
}

/// A subscribed remote track.
pub trait RemoteTrack: Send + Sync {
    fn play(&self, target: &RenderTarget);

    /// Stop playback. Idempotent.
    fn stop(&self);
}

/// Microphone and camera captured together.
pub struct LocalTracks {
    pub audio: Box<dyn LocalTrack>,
    pub video: Box<dyn LocalTrack>,
}

impl LocalTracks {
    pub fn close(&self) {
        self.audio.close();
        self.video.close();
    }
}

/// Real-time media channel binding.
#[async_trait]
pub trait MediaPlatform: Send + Sync {
    /// Join `room` as `local_id`. Remote publish/unpublish callbacks go to
    /// `events`.
    async fn join(
        &self,
        app_id: &str,
        token: &SecretString,
        room: &str,
        local_id: &LocalId,
        events: PlatformEventSink,
    ) -> Result<(), MediaError>;

    /// Open microphone and camera. Both or neither.
    async fn create_local_tracks(&self) -> Result<LocalTracks, MediaError>;

    async fn publish(&self, tracks: &LocalTracks) -> Result<(), MediaError>;

    async fn subscribe(
        &self,
        participant_id: &ParticipantId,
        kind: MediaKind,
    ) -> Result<Box<dyn RemoteTrack>, MediaError>;

    async fn leave(&self) -> Result<(), MediaError>;
}
