//! Event types flowing into and out of a session.
//!
//! Inbound: platform bindings push every callback (connection state, peer and
//! channel text, presence, remote publish/unpublish) into one
//! [`PlatformEventSink`]. Each envelope carries the session generation that
//! registered the callback, so events from a previous session can be fenced
//! out.
//!
//! Outbound: [`SessionEvent`] is the only contract toward the presentation
//! layer. Every variant carries enough data to render without further queries.

use common::types::{LocalId, MediaKind, ParticipantId};
use tokio::sync::mpsc;

use crate::errors::FailurePhase;
use crate::messaging::{ConnectionState, InboundMessage};
use crate::session::SessionState;

// ----------------------------------------------------------------------------
// Outbound
// ----------------------------------------------------------------------------

/// What a `StatusChanged` event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusSource {
    /// Session lifecycle transition.
    Session(SessionState),
    /// Messaging network connection state.
    Messaging(ConnectionState),
}

/// Notification emitted to the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    StatusChanged {
        source: StatusSource,
        /// Human-readable phase label.
        label: String,
    },
    MessageReceived(InboundMessage),
    ParticipantJoined {
        participant_id: ParticipantId,
    },
    ParticipantLeft {
        participant_id: ParticipantId,
    },
    /// Local audio and video are published and the preview is attached.
    LocalMediaReady {
        local_id: LocalId,
    },
    Error {
        phase: FailurePhase,
        /// Client-safe description.
        message: String,
    },
}

impl SessionEvent {
    /// Variant name, for logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::StatusChanged { .. } => "status_changed",
            SessionEvent::MessageReceived(_) => "message_received",
            SessionEvent::ParticipantJoined { .. } => "participant_joined",
            SessionEvent::ParticipantLeft { .. } => "participant_left",
            SessionEvent::LocalMediaReady { .. } => "local_media_ready",
            SessionEvent::Error { .. } => "error",
        }
    }
}

// ----------------------------------------------------------------------------
// Inbound
// ----------------------------------------------------------------------------

/// Callbacks from the messaging network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessagingEvent {
    ConnectionStateChanged {
        state: ConnectionState,
        reason: String,
    },
    /// Point-to-point text from another member.
    PeerMessage { peer_id: String, text: String },
    /// Text broadcast on the joined channel.
    ChannelMessage { member_id: String, text: String },
    MemberJoined { member_id: ParticipantId },
    MemberLeft { member_id: ParticipantId },
}

/// Callbacks from the media channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaEvent {
    UserPublished {
        participant_id: ParticipantId,
        kind: MediaKind,
    },
    UserUnpublished {
        participant_id: ParticipantId,
        kind: MediaKind,
    },
}

/// Any platform callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformEvent {
    Messaging(MessagingEvent),
    Media(MediaEvent),
}

impl From<MessagingEvent> for PlatformEvent {
    fn from(event: MessagingEvent) -> Self {
        PlatformEvent::Messaging(event)
    }
}

impl From<MediaEvent> for PlatformEvent {
    fn from(event: MediaEvent) -> Self {
        PlatformEvent::Media(event)
    }
}

/// A platform event tagged with the session generation that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformEnvelope {
    pub generation: u64,
    pub event: PlatformEvent,
}

/// Receiving half of the platform event channel.
pub type PlatformEventReceiver = mpsc::UnboundedReceiver<PlatformEnvelope>;

/// Sending half handed to platform bindings at login/join time.
///
/// Cloning is cheap. The sink is unbounded so platform callbacks never block;
/// the session processes envelopes one at a time in arrival order.
#[derive(Debug, Clone)]
pub struct PlatformEventSink {
    sender: mpsc::UnboundedSender<PlatformEnvelope>,
    generation: u64,
}

impl PlatformEventSink {
    /// Create the single platform event channel for one session object.
    #[must_use]
    pub fn channel() -> (Self, PlatformEventReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self {
                sender,
                generation: 0,
            },
            receiver,
        )
    }

    /// A sink on the same channel that tags events with `generation`.
    #[must_use]
    pub fn for_generation(&self, generation: u64) -> Self {
        Self {
            sender: self.sender.clone(),
            generation,
        }
    }

    /// Generation stamped on emitted events.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Push an event. Returns `false` if the session is gone.
    pub fn emit(&self, event: impl Into<PlatformEvent>) -> bool {
        self.sender
            .send(PlatformEnvelope {
                generation: self.generation,
                event: event.into(),
            })
            .is_ok()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_tags_generation() {
        let (sink, mut rx) = PlatformEventSink::channel();
        let gen3 = sink.for_generation(3);

        assert!(gen3.emit(MediaEvent::UserPublished {
            participant_id: ParticipantId::new("bob"),
            kind: MediaKind::Audio,
        }));
        assert!(sink.emit(MessagingEvent::MemberJoined {
            member_id: ParticipantId::new("carol"),
        }));

        let first = rx.try_recv().unwrap();
        assert_eq!(first.generation, 3);
        assert!(matches!(first.event, PlatformEvent::Media(_)));

        let second = rx.try_recv().unwrap();
        assert_eq!(second.generation, 0);
        assert!(matches!(second.event, PlatformEvent::Messaging(_)));
    }

    #[test]
    fn test_emit_after_receiver_dropped() {
        let (sink, rx) = PlatformEventSink::channel();
        drop(rx);

        assert!(!sink.emit(MessagingEvent::MemberLeft {
            member_id: ParticipantId::new("bob"),
        }));
    }
}
