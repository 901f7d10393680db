//! Call client error types.
//!
//! Subsystem errors (`BrokerError`, `ChannelError`, `MediaError`) carry
//! internal detail for logs. `SessionError::client_message` is what reaches
//! the presentation layer and never contains tokens or service URLs.

use common::types::{MediaKind, ParticipantId};
use thiserror::Error;

use crate::session::SessionState;

/// Credential fetch or parse failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BrokerError {
    /// The HTTP request could not be sent or completed.
    #[error("Request to {endpoint} failed: {reason}")]
    Request {
        endpoint: &'static str,
        reason: String,
    },

    /// The token service answered with a non-success status.
    #[error("{endpoint} returned status {status}")]
    Status { endpoint: &'static str, status: u16 },

    /// The response body could not be decoded.
    #[error("Invalid response from {endpoint}: {reason}")]
    InvalidResponse {
        endpoint: &'static str,
        reason: String,
    },

    /// The response body has no usable `token` field.
    #[error("{endpoint} response did not contain a token")]
    MissingToken { endpoint: &'static str },

    /// The token service base URL is unusable.
    #[error("Invalid token service URL: {0}")]
    Configuration(String),
}

impl BrokerError {
    /// Endpoint that produced the failure, if any.
    #[must_use]
    pub fn endpoint(&self) -> Option<&'static str> {
        match self {
            BrokerError::Request { endpoint, .. }
            | BrokerError::Status { endpoint, .. }
            | BrokerError::InvalidResponse { endpoint, .. }
            | BrokerError::MissingToken { endpoint } => Some(endpoint),
            BrokerError::Configuration(_) => None,
        }
    }
}

/// Messaging network failure (login, join, send, leave).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChannelError {
    #[error("Messaging login failed: {0}")]
    Login(String),

    #[error("Channel join failed: {0}")]
    Join(String),

    #[error("Message send failed: {0}")]
    Send(String),

    #[error("Channel leave failed: {0}")]
    Leave(String),

    #[error("Messaging logout failed: {0}")]
    Logout(String),

    /// Operation requires a joined channel.
    #[error("Messaging channel is not ready")]
    NotReady,
}

/// Media platform failure (join, capture, publish, subscribe, leave).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MediaError {
    #[error("Media join failed: {0}")]
    Join(String),

    #[error("Local capture failed: {0}")]
    Capture(String),

    #[error("Local publish failed: {0}")]
    Publish(String),

    #[error("Subscribe to {participant_id} {kind} failed: {reason}")]
    Subscribe {
        participant_id: ParticipantId,
        kind: MediaKind,
        reason: String,
    },

    #[error("Media leave failed: {0}")]
    Leave(String),

    /// Operation requires a joined media channel.
    #[error("Media session is not ready")]
    NotReady,
}

/// Phase in which a reported failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailurePhase {
    /// Credential acquisition.
    Credentials,
    /// Messaging login or channel join.
    MessagingJoin,
    /// Media join or local publish.
    MediaJoin,
    /// Outbound chat or direct message.
    MessageSend,
    /// Remote track subscription.
    Subscribe,
    /// Leave, logout or local track release.
    Teardown,
}

impl FailurePhase {
    /// Stable lowercase label, used in logs and metric labels.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FailurePhase::Credentials => "credentials",
            FailurePhase::MessagingJoin => "messaging_join",
            FailurePhase::MediaJoin => "media_join",
            FailurePhase::MessageSend => "message_send",
            FailurePhase::Subscribe => "subscribe",
            FailurePhase::Teardown => "teardown",
        }
    }
}

/// Errors returned by session operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    /// An argument was empty or otherwise unusable.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// `start_session` was called while a session exists.
    #[error("Session already started (state: {0:?})")]
    AlreadyStarted(SessionState),

    #[error("Credential error: {0}")]
    Broker(#[from] BrokerError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    /// Operation attempted outside the `Active` state.
    #[error("Not joined")]
    NotJoined,

    /// Failure during leave. Never blocks the remaining teardown steps.
    #[error("Teardown error: {0}")]
    Teardown(String),

    /// Session actor mailbox closed or dropped a reply.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SessionError {
    /// Phase the failure belongs to. `None` for precondition errors.
    #[must_use]
    pub fn phase(&self) -> Option<FailurePhase> {
        match self {
            SessionError::Broker(_) => Some(FailurePhase::Credentials),
            SessionError::Channel(ChannelError::Send(_) | ChannelError::NotReady) => {
                Some(FailurePhase::MessageSend)
            }
            SessionError::Channel(ChannelError::Leave(_) | ChannelError::Logout(_))
            | SessionError::Media(MediaError::Leave(_))
            | SessionError::Teardown(_) => Some(FailurePhase::Teardown),
            SessionError::Channel(_) => Some(FailurePhase::MessagingJoin),
            SessionError::Media(MediaError::Subscribe { .. }) => Some(FailurePhase::Subscribe),
            SessionError::Media(_) => Some(FailurePhase::MediaJoin),
            SessionError::InvalidArgument(_)
            | SessionError::AlreadyStarted(_)
            | SessionError::NotJoined
            | SessionError::Internal(_) => None,
        }
    }

    /// Returns a client-safe message (no internal details).
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            SessionError::InvalidArgument(msg) => msg.clone(),
            SessionError::AlreadyStarted(_) => "A call is already in progress".to_string(),
            SessionError::Broker(_) => "Could not obtain call credentials".to_string(),
            SessionError::Channel(ChannelError::Send(_)) => {
                "Message could not be delivered".to_string()
            }
            SessionError::Channel(_) => "Could not connect to the chat channel".to_string(),
            SessionError::Media(MediaError::Capture(_)) => {
                "Could not access microphone or camera".to_string()
            }
            SessionError::Media(MediaError::Subscribe {
                participant_id,
                kind,
                ..
            }) => format!("Could not receive {kind} from {participant_id}"),
            SessionError::Media(_) => "Could not connect to the media channel".to_string(),
            SessionError::NotJoined => "Not in a call".to_string(),
            SessionError::Teardown(_) => "Leaving the call did not complete cleanly".to_string(),
            SessionError::Internal(_) => "An internal error occurred".to_string(),
        }
    }
}
