//! Mock messaging platform.
//!
//! Records every call into a [`CallLog`], fails the operations it is told
//! to fail, and keeps the `PlatformEventSink` from `login` so tests can
//! inject callbacks.
//!
//! # Example
//!
//! ```rust,ignore
//! use call_test_utils::{MessagingOp, MockMessagingPlatform};
//!
//! let messaging = MockMessagingPlatform::builder()
//!     .fail(MessagingOp::Join)
//!     .build();
//! ```

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use call_client::errors::ChannelError;
use call_client::events::{MessagingEvent, PlatformEventSink};
use call_client::messaging::{ConnectionState, InboundMessage, MessagingPlatform, SignalingHandler};
use common::secret::SecretString;
use common::types::{LocalId, ParticipantId};

use crate::fixtures::CallLog;

/// Messaging operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessagingOp {
    Login,
    Join,
    Send,
    Leave,
    Logout,
}

/// Destination of a sent message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendTarget {
    Channel(String),
    Peer(String),
}

/// A message the session sent through the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub target: SendTarget,
    pub text: String,
}

/// In-memory messaging platform.
#[derive(Debug)]
pub struct MockMessagingPlatform {
    log: CallLog,
    failures: Mutex<HashSet<MessagingOp>>,
    sink: Mutex<Option<PlatformEventSink>>,
    sent: Mutex<Vec<SentMessage>>,
}

impl MockMessagingPlatform {
    #[must_use]
    pub fn builder() -> MockMessagingPlatformBuilder {
        MockMessagingPlatformBuilder::default()
    }

    /// Platform on which every operation succeeds.
    #[must_use]
    pub fn healthy() -> Self {
        Self::builder().build()
    }

    /// Make `op` fail (or succeed again) from now on.
    pub fn set_failure(&self, op: MessagingOp, fail: bool) {
        let mut failures = self.failures.lock().unwrap();
        if fail {
            failures.insert(op);
        } else {
            failures.remove(&op);
        }
    }

    /// Messages sent so far, in order.
    pub fn sent_messages(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }

    /// Sink from the most recent `login`.
    pub fn sink(&self) -> Option<PlatformEventSink> {
        self.sink.lock().unwrap().clone()
    }

    /// Push a callback through the most recent login's sink.
    ///
    /// # Panics
    ///
    /// Panics if `login` was never called.
    pub fn emit(&self, event: MessagingEvent) -> bool {
        self.sink()
            .expect("emit called before login")
            .emit(event)
    }

    pub fn emit_channel_message(&self, member_id: &str, text: &str) -> bool {
        self.emit(MessagingEvent::ChannelMessage {
            member_id: member_id.to_string(),
            text: text.to_string(),
        })
    }

    pub fn emit_peer_message(&self, peer_id: &str, text: &str) -> bool {
        self.emit(MessagingEvent::PeerMessage {
            peer_id: peer_id.to_string(),
            text: text.to_string(),
        })
    }

    pub fn emit_member_joined(&self, member_id: &str) -> bool {
        self.emit(MessagingEvent::MemberJoined {
            member_id: ParticipantId::new(member_id),
        })
    }

    pub fn emit_member_left(&self, member_id: &str) -> bool {
        self.emit(MessagingEvent::MemberLeft {
            member_id: ParticipantId::new(member_id),
        })
    }

    pub fn emit_connection_state(&self, state: ConnectionState, reason: &str) -> bool {
        self.emit(MessagingEvent::ConnectionStateChanged {
            state,
            reason: reason.to_string(),
        })
    }

    fn call(&self, entry: String, op: MessagingOp) -> Result<(), String> {
        self.log.push(entry);
        if self.failures.lock().unwrap().contains(&op) {
            Err(format!("mock {op:?} failure"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl MessagingPlatform for MockMessagingPlatform {
    async fn login(
        &self,
        identity: &LocalId,
        _token: &SecretString,
        events: PlatformEventSink,
    ) -> Result<(), ChannelError> {
        self.call(format!("messaging.login:{identity}"), MessagingOp::Login)
            .map_err(ChannelError::Login)?;
        *self.sink.lock().unwrap() = Some(events);
        Ok(())
    }

    async fn join_channel(&self, channel: &str) -> Result<(), ChannelError> {
        self.call(format!("messaging.join:{channel}"), MessagingOp::Join)
            .map_err(ChannelError::Join)
    }

    async fn send_channel_message(&self, channel: &str, text: &str) -> Result<(), ChannelError> {
        self.call(format!("messaging.send:{channel}"), MessagingOp::Send)
            .map_err(ChannelError::Send)?;
        self.sent.lock().unwrap().push(SentMessage {
            target: SendTarget::Channel(channel.to_string()),
            text: text.to_string(),
        });
        Ok(())
    }

    async fn send_peer_message(&self, peer_id: &str, text: &str) -> Result<(), ChannelError> {
        self.call(format!("messaging.send_peer:{peer_id}"), MessagingOp::Send)
            .map_err(ChannelError::Send)?;
        self.sent.lock().unwrap().push(SentMessage {
            target: SendTarget::Peer(peer_id.to_string()),
            text: text.to_string(),
        });
        Ok(())
    }

    async fn leave_channel(&self, channel: &str) -> Result<(), ChannelError> {
        self.call(format!("messaging.leave:{channel}"), MessagingOp::Leave)
            .map_err(ChannelError::Leave)
    }

    async fn logout(&self) -> Result<(), ChannelError> {
        self.call("messaging.logout".to_string(), MessagingOp::Logout)
            .map_err(ChannelError::Logout)
    }
}

/// Builder for `MockMessagingPlatform`.
#[derive(Debug, Default)]
pub struct MockMessagingPlatformBuilder {
    failures: HashSet<MessagingOp>,
    log: Option<CallLog>,
}

impl MockMessagingPlatformBuilder {
    #[must_use]
    pub fn fail(mut self, op: MessagingOp) -> Self {
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
    pub fn build(self) -> MockMessagingPlatform {
        MockMessagingPlatform {
            log: self.log.unwrap_or_default(),
            failures: Mutex::new(self.failures),
            sink: Mutex::new(None),
            sent: Mutex::new(Vec::new()),
        }
    }
}

/// Signaling handler that keeps every message it receives.
#[derive(Debug, Default)]
pub struct RecordingSignalingHandler {
    received: Mutex<Vec<InboundMessage>>,
}

impl RecordingSignalingHandler {
    pub fn received(&self) -> Vec<InboundMessage> {
        self.received.lock().unwrap().clone()
    }
}

impl SignalingHandler for RecordingSignalingHandler {
    fn on_signal(&self, message: &InboundMessage) {
        self.received.lock().unwrap().push(message.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_calls_and_failures() {
        let log = CallLog::default();
        let messaging = MockMessagingPlatform::builder()
            .fail(MessagingOp::Join)
            .call_log(log.clone())
            .build();
        let (sink, _rx) = PlatformEventSink::channel();

        messaging
            .login(&LocalId::from("me"), &SecretString::from("t"), sink)
            .await
            .unwrap();
        assert!(messaging.join_channel("room").await.is_err());

        messaging.set_failure(MessagingOp::Join, false);
        assert!(messaging.join_channel("room").await.is_ok());

        assert_eq!(
            log.entries(),
            vec!["messaging.login:me", "messaging.join:room", "messaging.join:room"]
        );
    }

    #[tokio::test]
    async fn test_emit_uses_login_sink() {
        let messaging = MockMessagingPlatform::healthy();
        let (sink, mut rx) = PlatformEventSink::channel();

        messaging
            .login(&LocalId::from("me"), &SecretString::from("t"), sink.for_generation(4))
            .await
            .unwrap();
        assert!(messaging.emit_member_joined("bob"));

        let envelope = rx.try_recv().unwrap();
        assert_eq!(envelope.generation, 4);
    }
}
