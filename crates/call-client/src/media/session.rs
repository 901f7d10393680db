//! `MediaSession` - owner of the media channel membership and local tracks.

use std::sync::Arc;

use common::secret::SecretString;
use common::types::{LocalId, MediaKind, ParticipantId};
use tracing::{debug, info, instrument, warn};

use super::{LocalTracks, MediaPlatform, RenderTarget};
use crate::errors::MediaError;
use crate::events::PlatformEventSink;
use crate::registry::{ClearOutcome, RemoteParticipantRegistry, UpsertOutcome};
use crate::session::SubsystemState;

/// Local capture state. Toggles are no-ops in `Absent`.
enum LocalMedia {
    Absent,
    Published {
        tracks: LocalTracks,
        microphone_muted: bool,
        camera_enabled: bool,
    },
}

/// Media adapter for one session object. Reused across join attempts.
pub struct MediaSession {
    platform: Arc<dyn MediaPlatform>,
    state: SubsystemState,
    local: LocalMedia,
}

impl MediaSession {
    pub fn new(platform: Arc<dyn MediaPlatform>) -> Self {
        Self {
            platform,
            state: SubsystemState::NotStarted,
            local: LocalMedia::Absent,
        }
    }

    #[must_use]
    pub fn state(&self) -> SubsystemState {
        self.state
    }

    #[must_use]
    pub fn has_local_tracks(&self) -> bool {
        matches!(self.local, LocalMedia::Published { .. })
    }

    /// Join the media channel for `room`.
    ///
    /// # Errors
    ///
    /// Returns the platform's `MediaError::Join`; the adapter moves to
    /// `Failed`.
    #[instrument(skip_all, fields(room = %room, local_id = %local_id))]
    pub async fn join(
        &mut self,
        app_id: &str,
        token: &SecretString,
        room: &str,
        local_id: &LocalId,
        events: PlatformEventSink,
    ) -> Result<(), MediaError> {
        self.state = SubsystemState::Starting;

        if let Err(e) = self
            .platform
            .join(app_id, token, room, local_id, events)
            .await
        {
            warn!(target: "call.media", error = %e, "Media join failed");
            self.state = SubsystemState::Failed;
            return Err(e);
        }

        self.state = SubsystemState::Ready;
        debug!(target: "call.media", "Joined media channel");
        Ok(())
    }

    /// Capture microphone and camera and publish both as one unit. On
    /// success the camera plays into the local preview.
    ///
    /// # Errors
    ///
    /// `MediaError::NotReady` before `join`. Capture failure publishes
    /// nothing; publish failure closes both tracks.
    #[instrument(skip_all)]
    pub async fn publish_local(&mut self) -> Result<(), MediaError> {
        if self.state != SubsystemState::Ready {
            return Err(MediaError::NotReady);
        }

        let tracks = self
            .platform
            .create_local_tracks()
            .await
            .inspect_err(|e| warn!(target: "call.media", error = %e, "Local capture failed"))?;

        if let Err(e) = self.platform.publish(&tracks).await {
            warn!(target: "call.media", error = %e, "Local publish failed, releasing tracks");
            tracks.close();
            return Err(e);
        }

        tracks.video.play(&RenderTarget::LocalPreview);
        self.local = LocalMedia::Published {
            tracks,
            microphone_muted: false,
            camera_enabled: true,
        };

        info!(target: "call.media", "Local audio and video published");
        Ok(())
    }

    /// Leave the channel, then close local tracks whatever the leave
    /// outcome. Always ends in `NotStarted` with no local tracks.
    #[instrument(skip_all)]
    pub async fn leave(&mut self) -> Vec<MediaError> {
        let mut failures = Vec::new();

        if matches!(self.state, SubsystemState::Ready | SubsystemState::Starting) {
            if let Err(e) = self.platform.leave().await {
                warn!(target: "call.media", error = %e, "Media leave failed");
                failures.push(e);
            }
        }

        if let LocalMedia::Published { tracks, .. } =
            std::mem::replace(&mut self.local, LocalMedia::Absent)
        {
            tracks.close();
            debug!(target: "call.media", "Local tracks closed");
        }

        self.state = SubsystemState::NotStarted;
        failures
    }

    /// Returns `false` if there is no local microphone track.
    pub fn set_microphone_muted(&mut self, muted: bool) -> bool {
        match &mut self.local {
            LocalMedia::Published {
                tracks,
                microphone_muted,
                ..
            } => {
                tracks.audio.set_muted(muted);
                *microphone_muted = muted;
                true
            }
            LocalMedia::Absent => false,
        }
    }

    /// Returns `false` if there is no local camera track.
    pub fn set_camera_enabled(&mut self, enabled: bool) -> bool {
        match &mut self.local {
            LocalMedia::Published {
                tracks,
                camera_enabled,
                ..
            } => {
                tracks.video.set_enabled(enabled);
                *camera_enabled = enabled;
                true
            }
            LocalMedia::Absent => false,
        }
    }

    /// Flip the microphone. Returns the new muted flag, or `None` without a
    /// local track.
    pub fn toggle_microphone(&mut self) -> Option<bool> {
        let muted = !self.microphone_muted()?;
        self.set_microphone_muted(muted).then_some(muted)
    }

    /// Flip the camera. Returns the new enabled flag, or `None` without a
    /// local track.
    pub fn toggle_camera(&mut self) -> Option<bool> {
        let enabled = !self.camera_enabled()?;
        self.set_camera_enabled(enabled).then_some(enabled)
    }

    #[must_use]
    pub fn microphone_muted(&self) -> Option<bool> {
        match &self.local {
            LocalMedia::Published {
                microphone_muted, ..
            } => Some(*microphone_muted),
            LocalMedia::Absent => None,
        }
    }

    #[must_use]
    pub fn camera_enabled(&self) -> Option<bool> {
        match &self.local {
            LocalMedia::Published { camera_enabled, .. } => Some(*camera_enabled),
            LocalMedia::Absent => None,
        }
    }

    /// Remote `published`: subscribe, start playback, record in `registry`.
    ///
    /// # Errors
    ///
    /// `MediaError::NotReady` outside a joined channel, otherwise the
    /// platform's `MediaError::Subscribe`. The registry is unchanged on error.
    #[instrument(skip_all, fields(participant_id = %participant_id, kind = %kind))]
    pub async fn on_published(
        &self,
        registry: &mut RemoteParticipantRegistry,
        participant_id: &ParticipantId,
        kind: MediaKind,
    ) -> Result<UpsertOutcome, MediaError> {
        if self.state != SubsystemState::Ready {
            return Err(MediaError::NotReady);
        }

        let track = self.platform.subscribe(participant_id, kind).await?;
        track.play(&RenderTarget::for_remote(participant_id, kind));

        Ok(registry.upsert(participant_id, kind, track))
    }

    /// Remote `unpublished`: stop the track and clear that kind.
    pub fn on_unpublished(
        &self,
        registry: &mut RemoteParticipantRegistry,
        participant_id: &ParticipantId,
        kind: MediaKind,
    ) -> ClearOutcome {
        let outcome = registry.clear_kind(participant_id, kind);
        debug!(
            target: "call.media",
            participant_id = %participant_id,
            kind = %kind,
            outcome = ?outcome,
            "Remote track unpublished"
        );
        outcome
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::media::{LocalTrack, RemoteTrack};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct TrackLog {
        events: Mutex<Vec<String>>,
    }

    impl TrackLog {
        fn push(&self, entry: String) {
            self.events.lock().unwrap().push(entry);
        }

        fn entries(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    struct StubLocal {
        kind: MediaKind,
        log: Arc<TrackLog>,
    }

    impl LocalTrack for StubLocal {
        fn kind(&self) -> MediaKind {
            self.kind
        }

        fn set_muted(&self, muted: bool) {
            self.log.push(format!("{}:muted={muted}", self.kind));
        }

        fn set_enabled(&self, enabled: bool) {
            self.log.push(format!("{}:enabled={enabled}", self.kind));
        }

        fn play(&self, target: &RenderTarget) {
            self.log.push(format!("{}:play:{target:?}", self.kind));
        }

        fn close(&self) {
            self.log.push(format!("{}:close", self.kind));
        }
    }

    struct StubRemote;

    impl RemoteTrack for StubRemote {
        fn play(&self, _target: &RenderTarget) {}
        fn stop(&self) {}
    }

    #[derive(Default)]
    struct StubPlatform {
        log: Arc<TrackLog>,
        fail_publish: bool,
        fail_capture: bool,
        fail_leave: bool,
    }

    #[async_trait]
    impl MediaPlatform for StubPlatform {
        async fn join(
            &self,
            _app_id: &str,
            _token: &SecretString,
            room: &str,
            _local_id: &LocalId,
            _events: PlatformEventSink,
        ) -> Result<(), MediaError> {
            self.log.push(format!("join:{room}"));
            Ok(())
        }

        async fn create_local_tracks(&self) -> Result<LocalTracks, MediaError> {
            if self.fail_capture {
                return Err(MediaError::Capture("NotAllowedError".to_string()));
            }
            Ok(LocalTracks {
                audio: Box::new(StubLocal {
                    kind: MediaKind::Audio,
                    log: Arc::clone(&self.log),
                }),
                video: Box::new(StubLocal {
                    kind: MediaKind::Video,
                    log: Arc::clone(&self.log),
                }),
            })
        }

        async fn publish(&self, _tracks: &LocalTracks) -> Result<(), MediaError> {
            self.log.push("publish".to_string());
            if self.fail_publish {
                return Err(MediaError::Publish("rejected".to_string()));
            }
            Ok(())
        }

        async fn subscribe(
            &self,
            participant_id: &ParticipantId,
            kind: MediaKind,
        ) -> Result<Box<dyn RemoteTrack>, MediaError> {
            self.log.push(format!("subscribe:{participant_id}:{kind}"));
            Ok(Box::new(StubRemote))
        }

        async fn leave(&self) -> Result<(), MediaError> {
            self.log.push("leave".to_string());
            if self.fail_leave {
                return Err(MediaError::Leave("socket closed".to_string()));
            }
            Ok(())
        }
    }

    async fn joined(platform: StubPlatform) -> (MediaSession, Arc<TrackLog>) {
        let log = Arc::clone(&platform.log);
        let mut media = MediaSession::new(Arc::new(platform));
        let (sink, _rx) = PlatformEventSink::channel();
        media
            .join("app", &SecretString::from("t"), "standup", &LocalId::from("me"), sink)
            .await
            .unwrap();
        (media, log)
    }

    #[tokio::test]
    async fn test_publish_plays_local_preview() {
        let (mut media, log) = joined(StubPlatform::default()).await;

        media.publish_local().await.unwrap();

        assert!(media.has_local_tracks());
        assert_eq!(
            log.entries(),
            vec!["join:standup", "publish", "video:play:LocalPreview"]
        );
    }

    #[tokio::test]
    async fn test_publish_failure_closes_both_tracks() {
        let (mut media, log) = joined(StubPlatform {
            fail_publish: true,
            ..Default::default()
        })
        .await;

        let result = media.publish_local().await;

        assert!(matches!(result, Err(MediaError::Publish(_))));
        assert!(!media.has_local_tracks());
        let entries = log.entries();
        assert!(entries.contains(&"audio:close".to_string()));
        assert!(entries.contains(&"video:close".to_string()));
    }

    #[tokio::test]
    async fn test_capture_failure_publishes_nothing() {
        let (mut media, log) = joined(StubPlatform {
            fail_capture: true,
            ..Default::default()
        })
        .await;

        assert!(matches!(
            media.publish_local().await,
            Err(MediaError::Capture(_))
        ));
        assert!(!log.entries().contains(&"publish".to_string()));
    }

    #[tokio::test]
    async fn test_publish_before_join_is_not_ready() {
        let mut media = MediaSession::new(Arc::new(StubPlatform::default()));
        assert_eq!(media.publish_local().await, Err(MediaError::NotReady));
    }

    #[test]
    fn test_toggles_without_tracks_are_noops() {
        let mut media = MediaSession::new(Arc::new(StubPlatform::default()));

        assert_eq!(media.toggle_microphone(), None);
        assert_eq!(media.toggle_camera(), None);
        assert!(!media.set_microphone_muted(true));
        assert!(!media.set_camera_enabled(false));
    }

    #[tokio::test]
    async fn test_toggles_flip_state() {
        let (mut media, log) = joined(StubPlatform::default()).await;
        media.publish_local().await.unwrap();

        assert_eq!(media.toggle_microphone(), Some(true));
        assert_eq!(media.toggle_microphone(), Some(false));
        assert_eq!(media.toggle_camera(), Some(false));

        let entries = log.entries();
        assert!(entries.contains(&"audio:muted=true".to_string()));
        assert!(entries.contains(&"audio:muted=false".to_string()));
        assert!(entries.contains(&"video:enabled=false".to_string()));
    }

    #[tokio::test]
    async fn test_leave_closes_tracks_after_leave_failure() {
        let (mut media, log) = joined(StubPlatform {
            fail_leave: true,
            ..Default::default()
        })
        .await;
        media.publish_local().await.unwrap();

        let failures = media.leave().await;

        assert_eq!(failures.len(), 1);
        assert_eq!(media.state(), SubsystemState::NotStarted);
        assert_eq!(media.toggle_microphone(), None);
        let entries = log.entries();
        assert!(entries.ends_with(&[
            "leave".to_string(),
            "audio:close".to_string(),
            "video:close".to_string(),
        ]));
    }

    #[tokio::test]
    async fn test_leave_when_not_started_makes_no_calls() {
        let log = Arc::new(TrackLog::default());
        let mut media = MediaSession::new(Arc::new(StubPlatform {
            log: Arc::clone(&log),
            ..Default::default()
        }));

        assert!(media.leave().await.is_empty());
        assert!(log.entries().is_empty());
    }

    #[tokio::test]
    async fn test_remote_publish_and_unpublish() {
        let (media, log) = joined(StubPlatform::default()).await;
        let mut registry = RemoteParticipantRegistry::new();
        let bob = ParticipantId::new("bob");

        let outcome = media
            .on_published(&mut registry, &bob, MediaKind::Video)
            .await
            .unwrap();
        assert_eq!(outcome, UpsertOutcome::Created);
        assert!(log.entries().contains(&"subscribe:bob:video".to_string()));

        assert_eq!(
            media.on_unpublished(&mut registry, &bob, MediaKind::Video),
            ClearOutcome::Removed
        );
        assert!(registry.is_empty());
    }
}
