//! `SessionController` - the session state machine.
//!
//! Owns one session object: the credential source, both platform adapters,
//! the remote participant registry and the presence roster. All mutation goes
//! through `&mut self`, so the owner (normally [`SessionActor`]) serializes
//! commands and platform events.
//!
//! # Generations
//!
//! Every `start_session` bumps the generation and hands the platforms a
//! [`PlatformEventSink`] stamped with it. Envelopes carrying any other
//! generation are dropped, so callbacks from a torn-down join can never
//! touch the next one.
//!
//! # Teardown
//!
//! A failed start and an explicit `end_session` run the same best-effort
//! release: media leave, local tracks closed, channel leave, logout, registry
//! cleared. Every step runs even if an earlier one fails.
//!
//! [`SessionActor`]: super::SessionActor

use std::sync::Arc;
use std::time::Instant;

use common::types::{LocalId, MediaKind, ParticipantId};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, instrument, warn};

use super::state::{Session, SessionSnapshot, SessionState};
use crate::broker::{CredentialPair, CredentialSource};
use crate::errors::{ChannelError, FailurePhase, MediaError, SessionError};
use crate::events::{
    MediaEvent, MessagingEvent, PlatformEnvelope, PlatformEvent, PlatformEventReceiver,
    PlatformEventSink, SessionEvent, StatusSource,
};
use crate::media::{MediaPlatform, MediaSession};
use crate::messaging::{
    encode_chat, ChannelUpdate, InboundMessage, MessagingChannel, MessagingPlatform,
    NoopSignalingHandler, SignalingHandler,
};
use crate::observability::metrics;
use crate::registry::{ClearOutcome, PresenceRoster, RemoteParticipantRegistry, UpsertOutcome};

/// Collaborators for one session object.
#[derive(Clone)]
pub struct SessionParts {
    pub media_app_id: String,
    pub credentials: Arc<dyn CredentialSource>,
    pub messaging: Arc<dyn MessagingPlatform>,
    pub media: Arc<dyn MediaPlatform>,
    pub signaling: Arc<dyn SignalingHandler>,
}

impl SessionParts {
    /// Parts with the default (logging) signaling handler.
    pub fn new(
        media_app_id: impl Into<String>,
        credentials: Arc<dyn CredentialSource>,
        messaging: Arc<dyn MessagingPlatform>,
        media: Arc<dyn MediaPlatform>,
    ) -> Self {
        Self {
            media_app_id: media_app_id.into(),
            credentials,
            messaging,
            media,
            signaling: Arc::new(NoopSignalingHandler),
        }
    }

    #[must_use]
    pub fn with_signaling(mut self, signaling: Arc<dyn SignalingHandler>) -> Self {
        self.signaling = signaling;
        self
    }
}

/// Session state machine. See the module docs.
pub struct SessionController {
    media_app_id: String,
    credentials: Arc<dyn CredentialSource>,
    messaging: MessagingChannel,
    media: MediaSession,
    registry: RemoteParticipantRegistry,
    roster: PresenceRoster,
    state: SessionState,
    session: Option<Session>,
    last_error: Option<String>,
    generation: u64,
    platform_sink: PlatformEventSink,
    events: mpsc::Sender<SessionEvent>,
}

impl SessionController {
    /// Create an idle controller.
    ///
    /// Returns the receiving half of the platform event channel; feed its
    /// envelopes to [`handle_platform_event`](Self::handle_platform_event).
    pub fn new(
        parts: SessionParts,
        events: mpsc::Sender<SessionEvent>,
    ) -> (Self, PlatformEventReceiver) {
        let (platform_sink, platform_events) = PlatformEventSink::channel();

        let controller = Self {
            media_app_id: parts.media_app_id,
            credentials: parts.credentials,
            messaging: MessagingChannel::new(parts.messaging, parts.signaling),
            media: MediaSession::new(parts.media),
            registry: RemoteParticipantRegistry::new(),
            roster: PresenceRoster::new(),
            state: SessionState::Idle,
            session: None,
            last_error: None,
            generation: 0,
            platform_sink,
            events,
        };

        (controller, platform_events)
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            session: self.session.clone(),
            generation: self.generation,
            last_error: self.last_error.clone(),
            messaging: self.messaging.state(),
            media: self.media.state(),
            microphone_muted: self.media.microphone_muted(),
            camera_enabled: self.media.camera_enabled(),
            remote_participants: self.registry.participants(),
        }
    }

    // ------------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------------

    /// Join `room_name` as `display_name`.
    ///
    /// Runs credentials, messaging login and channel join, then media join
    /// and local publish. The first failure aborts the rest, releases
    /// whatever was acquired, emits one `Error` event and returns to `Idle`.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` for a blank name (no state change, no event)
    /// - `AlreadyStarted` unless `Idle`
    /// - the failing step's `Broker`, `Channel` or `Media` error
    #[instrument(skip_all, name = "call.session.start", fields(room = %room_name.trim()))]
    pub async fn start_session(
        &mut self,
        display_name: &str,
        room_name: &str,
    ) -> Result<(), SessionError> {
        let display_name = display_name.trim();
        let room_name = room_name.trim();

        if display_name.is_empty() {
            return Err(SessionError::InvalidArgument(
                "Display name must not be empty".to_string(),
            ));
        }
        if room_name.is_empty() {
            return Err(SessionError::InvalidArgument(
                "Room name must not be empty".to_string(),
            ));
        }
        if self.state != SessionState::Idle {
            return Err(SessionError::AlreadyStarted(self.state));
        }

        let started = Instant::now();
        self.generation += 1;
        self.last_error = None;

        let local_id = LocalId::generate();
        self.session = Some(Session {
            local_id: local_id.clone(),
            display_name: display_name.to_string(),
            room_name: room_name.to_string(),
        });
        metrics::record_session_start();

        info!(
            target: "call.controller",
            local_id = %local_id,
            generation = self.generation,
            "Starting session"
        );

        self.transition(SessionState::Acquiring);
        let credentials = match self.acquire_credentials(&local_id, room_name).await {
            Ok(credentials) => credentials,
            Err(e) => return Err(self.abort_start(FailurePhase::Credentials, e).await),
        };

        let sink = self.platform_sink.for_generation(self.generation);

        self.transition(SessionState::JoiningMessaging);
        if let Err(e) = self
            .join_messaging(&local_id, &credentials, room_name, sink.clone())
            .await
        {
            return Err(self.abort_start(FailurePhase::MessagingJoin, e.into()).await);
        }

        self.transition(SessionState::JoiningMedia);
        if let Err(e) = self
            .join_media(&local_id, &credentials, room_name, sink)
            .await
        {
            return Err(self.abort_start(FailurePhase::MediaJoin, e.into()).await);
        }

        self.emit(SessionEvent::LocalMediaReady {
            local_id: local_id.clone(),
        });
        self.transition(SessionState::Active);

        metrics::record_session_join_duration(started.elapsed());
        info!(
            target: "call.controller",
            local_id = %local_id,
            elapsed_ms = started.elapsed().as_millis(),
            "Session active"
        );
        Ok(())
    }

    /// Leave the room. No-op when `Idle`.
    ///
    /// Teardown failures are reported as `Error` events with phase
    /// `Teardown` and never stop the remaining steps.
    #[instrument(skip_all, name = "call.session.end")]
    pub async fn end_session(&mut self) {
        if self.state == SessionState::Idle {
            debug!(target: "call.controller", "end_session while idle, nothing to do");
            return;
        }

        info!(target: "call.controller", generation = self.generation, "Ending session");
        self.transition(SessionState::Leaving);

        for failure in self.release_subsystems().await {
            self.last_error = Some(failure.client_message());
            self.emit(SessionEvent::Error {
                phase: FailurePhase::Teardown,
                message: failure.client_message(),
            });
        }

        self.session = None;
        self.transition(SessionState::Idle);
    }

    /// Broadcast a chat message. On success a self-authored copy is emitted
    /// as `MessageReceived` with origin `Local`.
    ///
    /// # Errors
    ///
    /// `NotJoined` unless `Active`, `InvalidArgument` for blank text, or the
    /// send failure (also emitted as an `Error` event; the session stays up).
    #[instrument(skip_all, name = "call.session.send_chat")]
    pub async fn send_chat_message(&mut self, text: &str) -> Result<(), SessionError> {
        let (display_name, text) = self.outbound_text(text)?;
        let payload = encode_chat(text, &display_name)?;

        match self.messaging.broadcast(&payload).await {
            Ok(()) => {
                self.emit(SessionEvent::MessageReceived(InboundMessage::local_echo(
                    &display_name,
                    text,
                    payload,
                )));
                Ok(())
            }
            Err(e) => Err(self.report_send_failure(e)),
        }
    }

    /// Send a chat message to one member.
    ///
    /// # Errors
    ///
    /// Same as [`send_chat_message`](Self::send_chat_message), plus
    /// `InvalidArgument` for a blank peer ID.
    #[instrument(skip_all, name = "call.session.send_direct")]
    pub async fn send_direct_message(
        &mut self,
        peer_id: &str,
        text: &str,
    ) -> Result<(), SessionError> {
        let peer_id = peer_id.trim();
        let (display_name, text) = self.outbound_text(text)?;
        if peer_id.is_empty() {
            return Err(SessionError::InvalidArgument(
                "Recipient must not be empty".to_string(),
            ));
        }
        let payload = encode_chat(text, &display_name)?;

        match self.messaging.send_direct(peer_id, &payload).await {
            Ok(()) => {
                self.emit(SessionEvent::MessageReceived(InboundMessage::local_echo(
                    &display_name,
                    text,
                    payload,
                )));
                Ok(())
            }
            Err(e) => Err(self.report_send_failure(e)),
        }
    }

    /// Flip the microphone mute. `None` (and no error) without a local track.
    pub fn toggle_microphone(&mut self) -> Option<bool> {
        let muted = self.media.toggle_microphone();
        debug!(target: "call.controller", muted = ?muted, "Microphone toggled");
        muted
    }

    /// Flip the camera. `None` (and no error) without a local track.
    pub fn toggle_camera(&mut self) -> Option<bool> {
        let enabled = self.media.toggle_camera();
        debug!(target: "call.controller", enabled = ?enabled, "Camera toggled");
        enabled
    }

    // ------------------------------------------------------------------------
    // Platform events
    // ------------------------------------------------------------------------

    /// Apply one platform callback. Envelopes from another generation, or
    /// arriving while `Idle`, are dropped.
    pub async fn handle_platform_event(&mut self, envelope: PlatformEnvelope) {
        if envelope.generation != self.generation || self.state == SessionState::Idle {
            debug!(
                target: "call.controller",
                event_generation = envelope.generation,
                current_generation = self.generation,
                state = ?self.state,
                "Dropping stale platform event"
            );
            metrics::record_stale_event();
            return;
        }

        match envelope.event {
            PlatformEvent::Messaging(event) => self.handle_messaging_event(event),
            PlatformEvent::Media(event) => self.handle_media_event(event).await,
        }
    }

    fn handle_messaging_event(&mut self, event: MessagingEvent) {
        let Some(update) = self.messaging.route(event) else {
            return;
        };

        match update {
            ChannelUpdate::Connection { state, label } => {
                self.emit(SessionEvent::StatusChanged {
                    source: StatusSource::Messaging(state),
                    label,
                });
            }
            ChannelUpdate::Message(message) => {
                metrics::record_message_received(message.kind);
                self.emit(SessionEvent::MessageReceived(message));
            }
            ChannelUpdate::MemberJoined(member_id) => {
                self.emit(SessionEvent::MessageReceived(InboundMessage::presence(
                    member_id.as_str(),
                    format!("{member_id} joined the room"),
                )));
                self.announce_joined(member_id);
            }
            ChannelUpdate::MemberLeft(member_id) => {
                self.emit(SessionEvent::MessageReceived(InboundMessage::presence(
                    member_id.as_str(),
                    format!("{member_id} left the room"),
                )));
                if self.registry.remove(&member_id) {
                    metrics::set_remote_participants(self.registry.len());
                }
                self.announce_left(member_id);
            }
        }
    }

    async fn handle_media_event(&mut self, event: MediaEvent) {
        match event {
            MediaEvent::UserPublished {
                participant_id,
                kind,
            } => {
                let outcome = self
                    .media
                    .on_published(&mut self.registry, &participant_id, kind)
                    .await;
                match outcome {
                    Ok(UpsertOutcome::Created) => {
                        metrics::set_remote_participants(self.registry.len());
                        self.announce_joined(participant_id);
                    }
                    Ok(UpsertOutcome::Updated | UpsertOutcome::Replaced) => {}
                    Err(e) => self.report_subscribe_failure(&participant_id, kind, e),
                }
            }
            MediaEvent::UserUnpublished {
                participant_id,
                kind,
            } => {
                let outcome = self
                    .media
                    .on_unpublished(&mut self.registry, &participant_id, kind);
                if outcome == ClearOutcome::Removed {
                    metrics::set_remote_participants(self.registry.len());
                    self.announce_left(participant_id);
                }
            }
        }
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    async fn acquire_credentials(
        &self,
        local_id: &LocalId,
        room_name: &str,
    ) -> Result<CredentialPair, SessionError> {
        let started = Instant::now();
        let result = self.credentials.fetch_credentials(local_id, room_name).await;
        let outcome = if result.is_ok() { "success" } else { "error" };
        metrics::record_credential_fetch(outcome, started.elapsed());
        result.map_err(SessionError::from)
    }

    async fn join_messaging(
        &mut self,
        local_id: &LocalId,
        credentials: &CredentialPair,
        room_name: &str,
        sink: PlatformEventSink,
    ) -> Result<(), ChannelError> {
        self.messaging
            .connect(local_id, &credentials.messaging_token, sink)
            .await?;
        self.messaging.join_channel(room_name).await
    }

    async fn join_media(
        &mut self,
        local_id: &LocalId,
        credentials: &CredentialPair,
        room_name: &str,
        sink: PlatformEventSink,
    ) -> Result<(), MediaError> {
        self.media
            .join(
                &self.media_app_id,
                &credentials.media_token,
                room_name,
                local_id,
                sink,
            )
            .await?;
        self.media.publish_local().await
    }

    /// Failed start: report once, release everything, return to `Idle`.
    async fn abort_start(&mut self, phase: FailurePhase, error: SessionError) -> SessionError {
        warn!(
            target: "call.controller",
            phase = phase.as_str(),
            error = %error,
            "Session start failed"
        );
        metrics::record_session_failure(phase);

        let message = error.client_message();
        self.last_error = Some(message.clone());
        self.emit(SessionEvent::Error { phase, message });

        // Compensating teardown. Failures here are logged and counted only;
        // the caller already has the originating error.
        let leftovers = self.release_subsystems().await;
        if !leftovers.is_empty() {
            debug!(
                target: "call.controller",
                count = leftovers.len(),
                "Compensating teardown reported failures"
            );
        }

        self.session = None;
        self.transition(SessionState::Idle);
        error
    }

    /// Best-effort release of both subsystems and all remote state.
    async fn release_subsystems(&mut self) -> Vec<SessionError> {
        let mut failures = Vec::new();

        for e in self.media.leave().await {
            metrics::record_teardown_error("media_leave");
            failures.push(SessionError::Teardown(e.to_string()));
        }

        for e in self.messaging.leave().await {
            let step = match e {
                ChannelError::Logout(_) => "logout",
                _ => "channel_leave",
            };
            metrics::record_teardown_error(step);
            failures.push(SessionError::Teardown(e.to_string()));
        }

        let removed = self.registry.clear();
        self.roster.clear();
        metrics::set_remote_participants(0);

        debug!(
            target: "call.controller",
            removed_participants = removed,
            failures = failures.len(),
            "Subsystems released"
        );
        failures
    }

    /// Validate an outbound message. Returns the display name and trimmed text.
    fn outbound_text<'a>(&self, text: &'a str) -> Result<(String, &'a str), SessionError> {
        let session = match (&self.session, self.state) {
            (Some(session), SessionState::Active) => session,
            _ => return Err(SessionError::NotJoined),
        };

        let text = text.trim();
        if text.is_empty() {
            return Err(SessionError::InvalidArgument(
                "Message must not be empty".to_string(),
            ));
        }

        Ok((session.display_name.clone(), text))
    }

    fn report_send_failure(&mut self, error: ChannelError) -> SessionError {
        warn!(target: "call.controller", error = %error, "Message send failed");
        let error = SessionError::from(error);
        self.emit(SessionEvent::Error {
            phase: FailurePhase::MessageSend,
            message: error.client_message(),
        });
        error
    }

    fn report_subscribe_failure(
        &mut self,
        participant_id: &ParticipantId,
        kind: MediaKind,
        error: MediaError,
    ) {
        warn!(
            target: "call.controller",
            participant_id = %participant_id,
            kind = %kind,
            error = %error,
            "Remote subscribe failed"
        );
        metrics::record_subscribe_failure(kind);
        let error = SessionError::from(error);
        self.emit(SessionEvent::Error {
            phase: FailurePhase::Subscribe,
            message: error.client_message(),
        });
    }

    fn announce_joined(&mut self, participant_id: ParticipantId) {
        if self.roster.mark_present(&participant_id) {
            debug!(target: "call.controller", participant_id = %participant_id, "Participant joined");
            self.emit(SessionEvent::ParticipantJoined { participant_id });
        }
    }

    fn announce_left(&mut self, participant_id: ParticipantId) {
        if self.roster.mark_departed(&participant_id) {
            debug!(target: "call.controller", participant_id = %participant_id, "Participant left");
            self.emit(SessionEvent::ParticipantLeft { participant_id });
        }
    }

    fn transition(&mut self, next: SessionState) {
        debug!(
            target: "call.controller",
            from = ?self.state,
            to = ?next,
            "Session state transition"
        );
        self.state = next;
        self.emit(SessionEvent::StatusChanged {
            source: StatusSource::Session(next),
            label: next.label().to_string(),
        });
    }

    /// Deliver to the presentation layer without waiting.
    ///
    /// A full buffer drops the event; the controller never stalls on a
    /// receiver that is not being drained, so cancellation and teardown still
    /// run. A closed receiver is not an error: the session keeps running
    /// headless.
    fn emit(&self, event: SessionEvent) {
        match self.events.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                warn!(
                    target: "call.controller",
                    event = event.name(),
                    "Session event buffer full, dropping event"
                );
                metrics::record_event_dropped();
            }
            Err(TrySendError::Closed(_)) => {
                debug!(target: "call.controller", "Session event receiver closed");
            }
        }
    }
}
