//! Mock media platform with observable tracks.
//!
//! Local tracks created by the mock share their state with the platform, so
//! a test can check that the preview was attached, that a toggle reached the
//! track, or that teardown closed it. Remote tracks likewise record `play`
//! and `stop`.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use call_client::errors::MediaError;
use call_client::events::{MediaEvent, PlatformEventSink};
use call_client::media::{LocalTrack, LocalTracks, MediaPlatform, RemoteTrack, RenderTarget};
use common::secret::SecretString;
use common::types::{LocalId, MediaKind, ParticipantId};

use crate::fixtures::CallLog;

/// Media operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaOp {
    Join,
    Capture,
    Publish,
    Subscribe,
    Leave,
}

/// Observable state of one mock local track.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalTrackState {
    pub muted: bool,
    pub enabled: bool,
    pub closed: bool,
    pub played: Vec<RenderTarget>,
}

/// Observable state of one mock remote track.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteTrackState {
    pub played: Vec<RenderTarget>,
    pub stopped: bool,
}

struct MockLocalTrack {
    kind: MediaKind,
    state: Arc<Mutex<LocalTrackState>>,
}

impl LocalTrack for MockLocalTrack {
    fn kind(&self) -> MediaKind {
        self.kind
    }

    fn set_muted(&self, muted: bool) {
        self.state.lock().unwrap().muted = muted;
    }

    fn set_enabled(&self, enabled: bool) {
        self.state.lock().unwrap().enabled = enabled;
    }

    fn play(&self, target: &RenderTarget) {
        self.state.lock().unwrap().played.push(target.clone());
    }

    fn close(&self) {
        self.state.lock().unwrap().closed = true;
    }
}

struct MockRemoteTrack {
    state: Arc<Mutex<RemoteTrackState>>,
}

impl RemoteTrack for MockRemoteTrack {
    fn play(&self, target: &RenderTarget) {
        self.state.lock().unwrap().played.push(target.clone());
    }

    fn stop(&self) {
        self.state.lock().unwrap().stopped = true;
    }
}

type RemoteKey = (ParticipantId, MediaKind);

/// In-memory media platform.
#[derive(Debug)]
pub struct MockMediaPlatform {
    log: CallLog,
    failures: Mutex<HashSet<MediaOp>>,
    sink: Mutex<Option<PlatformEventSink>>,
    local: Mutex<HashMap<MediaKind, Arc<Mutex<LocalTrackState>>>>,
    remote: Mutex<HashMap<RemoteKey, Vec<Arc<Mutex<RemoteTrackState>>>>>,
}

impl MockMediaPlatform {
    #[must_use]
    pub fn builder() -> MockMediaPlatformBuilder {
        MockMediaPlatformBuilder::default()
    }

    #[must_use]
    pub fn healthy() -> Self {
        Self::builder().build()
    }

    /// Make `op` fail (or succeed again) from now on.
    pub fn set_failure(&self, op: MediaOp, fail: bool) {
        let mut failures = self.failures.lock().unwrap();
        if fail {
            failures.insert(op);
        } else {
            failures.remove(&op);
        }
    }

    /// Sink from the most recent `join`.
    pub fn sink(&self) -> Option<PlatformEventSink> {
        self.sink.lock().unwrap().clone()
    }

    /// Push a callback through the most recent join's sink.
    ///
    /// # Panics
    ///
    /// Panics if `join` was never called.
    pub fn emit(&self, event: MediaEvent) -> bool {
        self.sink().expect("emit called before join").emit(event)
    }

    pub fn emit_published(&self, participant_id: &str, kind: MediaKind) -> bool {
        self.emit(MediaEvent::UserPublished {
            participant_id: ParticipantId::new(participant_id),
            kind,
        })
    }

    pub fn emit_unpublished(&self, participant_id: &str, kind: MediaKind) -> bool {
        self.emit(MediaEvent::UserUnpublished {
            participant_id: ParticipantId::new(participant_id),
            kind,
        })
    }

    /// State of the most recently created local track of `kind`.
    pub fn local_track(&self, kind: MediaKind) -> Option<LocalTrackState> {
        self.local
            .lock()
            .unwrap()
            .get(&kind)
            .map(|state| state.lock().unwrap().clone())
    }

    /// Every remote track subscribed for `participant_id`/`kind`, oldest
    /// first.
    pub fn remote_tracks(&self, participant_id: &str, kind: MediaKind) -> Vec<RemoteTrackState> {
        self.remote
            .lock()
            .unwrap()
            .get(&(ParticipantId::new(participant_id), kind))
            .map(|tracks| {
                tracks
                    .iter()
                    .map(|state| state.lock().unwrap().clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn call(&self, entry: String, op: MediaOp) -> Result<(), String> {
        self.log.push(entry);
        if self.failures.lock().unwrap().contains(&op) {
            Err(format!("mock {op:?} failure"))
        } else {
            Ok(())
        }
    }

    fn new_local_track(&self, kind: MediaKind) -> Box<dyn LocalTrack> {
        let state = Arc::new(Mutex::new(LocalTrackState {
            enabled: true,
            ..LocalTrackState::default()
        }));
        self.local.lock().unwrap().insert(kind, Arc::clone(&state));
        Box::new(MockLocalTrack { kind, state })
    }
}

#[async_trait]
impl MediaPlatform for MockMediaPlatform {
    async fn join(
        &self,
        _app_id: &str,
        _token: &SecretString,
        room: &str,
        _local_id: &LocalId,
        events: PlatformEventSink,
    ) -> Result<(), MediaError> {
        self.call(format!("media.join:{room}"), MediaOp::Join)
            .map_err(MediaError::Join)?;
        *self.sink.lock().unwrap() = Some(events);
        Ok(())
    }

    async fn create_local_tracks(&self) -> Result<LocalTracks, MediaError> {
        self.call("media.create_tracks".to_string(), MediaOp::Capture)
            .map_err(MediaError::Capture)?;
        Ok(LocalTracks {
            audio: self.new_local_track(MediaKind::Audio),
            video: self.new_local_track(MediaKind::Video),
        })
    }

    async fn publish(&self, _tracks: &LocalTracks) -> Result<(), MediaError> {
        self.call("media.publish".to_string(), MediaOp::Publish)
            .map_err(MediaError::Publish)
    }

    async fn subscribe(
        &self,
        participant_id: &ParticipantId,
        kind: MediaKind,
    ) -> Result<Box<dyn RemoteTrack>, MediaError> {
        self.call(
            format!("media.subscribe:{participant_id}:{kind}"),
            MediaOp::Subscribe,
        )
        .map_err(|reason| MediaError::Subscribe {
            participant_id: participant_id.clone(),
            kind,
            reason,
        })?;

        let state = Arc::new(Mutex::new(RemoteTrackState::default()));
        self.remote
            .lock()
            .unwrap()
            .entry((participant_id.clone(), kind))
            .or_default()
            .push(Arc::clone(&state));
        Ok(Box::new(MockRemoteTrack { state }))
    }

    async fn leave(&self) -> Result<(), MediaError> {
        self.call("media.leave".to_string(), MediaOp::Leave)
            .map_err(MediaError::Leave)
    }
}

/// Builder for `MockMediaPlatform`.
#[derive(Debug, Default)]
pub struct MockMediaPlatformBuilder {
    failures: HashSet<MediaOp>,
    log: Option<CallLog>,
}

impl MockMediaPlatformBuilder {
    #[must_use]
    pub fn fail(mut self, op: MediaOp) -> Self {
        self.failures.insert(op);
        self
    }

    /// Record calls into a log shared with other mocks.
    #[must_use]
    pub fn call_log(mut self, log: CallLog) -> Self {
        self.log = Some(log);
        self
    }

    #[must_use]
    pub fn build(self) -> MockMediaPlatform {
        MockMediaPlatform {
            log: self.log.unwrap_or_default(),
            failures: Mutex::new(self.failures),
            sink: Mutex::new(None),
            local: Mutex::new(HashMap::new()),
            remote: Mutex::new(HashMap::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_tracks_are_observable() {
        let media = MockMediaPlatform::healthy();
        let tracks = media.create_local_tracks().await.unwrap();

        tracks.audio.set_muted(true);
        tracks.video.play(&RenderTarget::LocalPreview);
        tracks.close();

        let audio = media.local_track(MediaKind::Audio).unwrap();
        assert!(audio.muted);
        assert!(audio.closed);

        let video = media.local_track(MediaKind::Video).unwrap();
        assert!(video.enabled);
        assert_eq!(video.played, vec![RenderTarget::LocalPreview]);
    }

    #[tokio::test]
    async fn test_subscribe_failure_names_participant() {
        let media = MockMediaPlatform::builder().fail(MediaOp::Subscribe).build();
        let result = media
            .subscribe(&ParticipantId::new("bob"), MediaKind::Audio)
            .await;

        assert!(matches!(
            result,
            Err(MediaError::Subscribe { ref participant_id, .. }) if participant_id.as_str() == "bob"
        ));
        assert!(media.remote_tracks("bob", MediaKind::Audio).is_empty());
    }
}
