//! `MessagingChannel` - session-side owner of the messaging network binding.
//!
//! Tracks login and channel membership as explicit [`SubsystemState`] and
//! turns raw [`MessagingEvent`]s into [`ChannelUpdate`]s the controller can
//! act on. Signaling payloads are diverted to the [`SignalingHandler`].

use std::sync::Arc;

use common::secret::SecretString;
use common::types::{LocalId, ParticipantId};
use tracing::{debug, info, instrument, warn};

use super::classify::{classify, InboundMessage, MessageKind, MessageOrigin};
use super::{ConnectionState, MessagingPlatform, SignalingHandler};
use crate::errors::ChannelError;
use crate::events::{MessagingEvent, PlatformEventSink};
use crate::session::SubsystemState;

/// Result of routing one messaging event.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelUpdate {
    Connection {
        state: ConnectionState,
        label: String,
    },
    Message(InboundMessage),
    MemberJoined(ParticipantId),
    MemberLeft(ParticipantId),
}

/// Messaging adapter for one session object. Reused across join attempts.
pub struct MessagingChannel {
    platform: Arc<dyn MessagingPlatform>,
    signaling: Arc<dyn SignalingHandler>,
    state: SubsystemState,
    logged_in: bool,
    channel_name: String,
}

impl MessagingChannel {
    pub fn new(platform: Arc<dyn MessagingPlatform>, signaling: Arc<dyn SignalingHandler>) -> Self {
        Self {
            platform,
            signaling,
            state: SubsystemState::NotStarted,
            logged_in: false,
            channel_name: String::new(),
        }
    }

    #[must_use]
    pub fn state(&self) -> SubsystemState {
        self.state
    }

    /// Log in to the messaging network.
    ///
    /// # Errors
    ///
    /// Returns `ChannelError::Login` from the platform; the adapter moves to
    /// `Failed`.
    #[instrument(skip_all, fields(identity = %identity))]
    pub async fn connect(
        &mut self,
        identity: &LocalId,
        token: &SecretString,
        events: PlatformEventSink,
    ) -> Result<(), ChannelError> {
        self.state = SubsystemState::Starting;

        if let Err(e) = self.platform.login(identity, token, events).await {
            warn!(target: "call.messaging", error = %e, "Messaging login failed");
            self.state = SubsystemState::Failed;
            return Err(e);
        }

        self.logged_in = true;
        debug!(target: "call.messaging", "Logged in to messaging network");
        Ok(())
    }

    /// Join `name` after a successful `connect`.
    ///
    /// # Errors
    ///
    /// `ChannelError::NotReady` without a login, otherwise the platform's
    /// `ChannelError::Join`.
    #[instrument(skip_all, fields(channel = %name))]
    pub async fn join_channel(&mut self, name: &str) -> Result<(), ChannelError> {
        if !self.logged_in {
            return Err(ChannelError::NotReady);
        }

        if let Err(e) = self.platform.join_channel(name).await {
            warn!(target: "call.messaging", error = %e, "Channel join failed");
            self.state = SubsystemState::Failed;
            return Err(e);
        }

        self.channel_name = name.to_string();
        self.state = SubsystemState::Ready;
        info!(target: "call.messaging", channel = %name, "Joined messaging channel");
        Ok(())
    }

    /// Leave the channel, then log out. Both steps are attempted; failures
    /// are returned, not raised. Always ends in `NotStarted`.
    #[instrument(skip_all)]
    pub async fn leave(&mut self) -> Vec<ChannelError> {
        let mut failures = Vec::new();

        if self.state == SubsystemState::Ready {
            if let Err(e) = self.platform.leave_channel(&self.channel_name).await {
                warn!(target: "call.messaging", error = %e, "Channel leave failed");
                failures.push(e);
            }
        }

        if self.logged_in {
            if let Err(e) = self.platform.logout().await {
                warn!(target: "call.messaging", error = %e, "Messaging logout failed");
                failures.push(e);
            }
        }

        self.state = SubsystemState::NotStarted;
        self.logged_in = false;
        self.channel_name.clear();
        failures
    }

    /// Broadcast `text` on the joined channel.
    ///
    /// # Errors
    ///
    /// `ChannelError::NotReady` unless `Ready`, otherwise the platform's
    /// `ChannelError::Send`.
    pub async fn broadcast(&self, text: &str) -> Result<(), ChannelError> {
        if self.state != SubsystemState::Ready {
            return Err(ChannelError::NotReady);
        }
        self.platform
            .send_channel_message(&self.channel_name, text)
            .await
    }

    /// Deliver `text` to a single member.
    ///
    /// # Errors
    ///
    /// Same as [`broadcast`](Self::broadcast).
    pub async fn send_direct(&self, peer_id: &str, text: &str) -> Result<(), ChannelError> {
        if self.state != SubsystemState::Ready {
            return Err(ChannelError::NotReady);
        }
        self.platform.send_peer_message(peer_id, text).await
    }

    /// Translate a platform callback. Returns `None` for signaling, which is
    /// handed to the signaling hook instead.
    pub fn route(&self, event: MessagingEvent) -> Option<ChannelUpdate> {
        let message = match event {
            MessagingEvent::ConnectionStateChanged { state, reason } => {
                debug!(
                    target: "call.messaging",
                    state = ?state,
                    reason = %reason,
                    "Connection state changed"
                );
                return Some(ChannelUpdate::Connection {
                    state,
                    label: state.label(&reason),
                });
            }
            MessagingEvent::MemberJoined { member_id } => {
                return Some(ChannelUpdate::MemberJoined(member_id));
            }
            MessagingEvent::MemberLeft { member_id } => {
                return Some(ChannelUpdate::MemberLeft(member_id));
            }
            MessagingEvent::PeerMessage { peer_id, text } => {
                classify(&peer_id, &text, MessageOrigin::Peer)
            }
            MessagingEvent::ChannelMessage { member_id, text } => {
                classify(&member_id, &text, MessageOrigin::Channel)
            }
        };

        if message.kind == MessageKind::Signaling {
            self.signaling.on_signal(&message);
            return None;
        }

        Some(ChannelUpdate::Message(message))
    }
}
