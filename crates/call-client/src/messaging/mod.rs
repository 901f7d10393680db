//! Messaging Channel Adapter.
//!
//! Wraps the real-time messaging network: login, channel join, broadcast,
//! point-to-point text, presence and connection state. Platform bindings
//! implement [`MessagingPlatform`] and push callbacks into the
//! [`PlatformEventSink`] handed to them at login.

mod channel;
mod classify;

pub use channel::{ChannelUpdate, MessagingChannel};
pub use classify::{
    classify, encode_chat, InboundMessage, MessageKind, MessageOrigin, CHAT_TYPE, SIGNALING_TYPES,
};

use async_trait::async_trait;
use common::secret::SecretString;
use common::types::LocalId;
use tracing::debug;

use crate::errors::ChannelError;
use crate::events::PlatformEventSink;

/// Connection state reported by the messaging network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Reconnecting,
    Disconnected,
    Aborted,
}

impl ConnectionState {
    /// Map a platform state name (`CONNECTED`, `RECONNECTING`, ...).
    ///
    /// Unknown names map to `Disconnected`.
    #[must_use]
    pub fn from_platform(name: &str) -> Self {
        match name.to_ascii_uppercase().as_str() {
            "CONNECTING" => ConnectionState::Connecting,
            "CONNECTED" => ConnectionState::Connected,
            "RECONNECTING" => ConnectionState::Reconnecting,
            "ABORTED" => ConnectionState::Aborted,
            _ => ConnectionState::Disconnected,
        }
    }

    /// Human-readable status label: "Connected", or "Disconnected (<reason>)"
    /// for every other state.
    #[must_use]
    pub fn label(self, reason: &str) -> String {
        if self.is_connected() {
            "Connected".to_string()
        } else if reason.is_empty() {
            "Disconnected".to_string()
        } else {
            format!("Disconnected ({reason})")
        }
    }

    /// True once the network reports a usable connection.
    #[must_use]
    pub fn is_connected(self) -> bool {
        self == ConnectionState::Connected
    }
}

/// Real-time messaging network binding.
///
/// Implementations must deliver every callback (connection state, peer
/// text, channel text, member join/leave) through `events` and must not
/// call back into the session directly.
#[async_trait]
pub trait MessagingPlatform: Send + Sync {
    /// Log in as `identity`. Callbacks registered here go to `events`.
    async fn login(
        &self,
        identity: &LocalId,
        token: &SecretString,
        events: PlatformEventSink,
    ) -> Result<(), ChannelError>;

    async fn join_channel(&self, channel: &str) -> Result<(), ChannelError>;

    async fn send_channel_message(&self, channel: &str, text: &str) -> Result<(), ChannelError>;

    async fn send_peer_message(&self, peer_id: &str, text: &str) -> Result<(), ChannelError>;

    async fn leave_channel(&self, channel: &str) -> Result<(), ChannelError>;

    async fn logout(&self) -> Result<(), ChannelError>;
}

/// Receives call-negotiation messages (`offer`, `answer`, `ice-candidate`).
///
/// Signaling is never shown as chat.
pub trait SignalingHandler: Send + Sync {
    fn on_signal(&self, message: &InboundMessage);
}

/// Default handler: logs the signal and drops it.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSignalingHandler;

impl SignalingHandler for NoopSignalingHandler {
    fn on_signal(&self, message: &InboundMessage) {
        debug!(
            target: "call.messaging",
            sender_id = %message.sender_id,
            "Signaling message ignored"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_state_from_platform() {
        assert_eq!(
            ConnectionState::from_platform("CONNECTED"),
            ConnectionState::Connected
        );
        assert_eq!(
            ConnectionState::from_platform("reconnecting"),
            ConnectionState::Reconnecting
        );
        assert_eq!(
            ConnectionState::from_platform("ABORTED"),
            ConnectionState::Aborted
        );
        assert_eq!(
            ConnectionState::from_platform("SOMETHING_NEW"),
            ConnectionState::Disconnected
        );
    }

    #[test]
    fn test_connection_state_labels() {
        assert_eq!(ConnectionState::Connected.label("LOGIN_SUCCESS"), "Connected");
        assert_eq!(
            ConnectionState::Reconnecting.label("INTERRUPTED"),
            "Disconnected (INTERRUPTED)"
        );
        assert_eq!(
            ConnectionState::Aborted.label("REMOTE_LOGIN"),
            "Disconnected (REMOTE_LOGIN)"
        );
        assert_eq!(ConnectionState::Disconnected.label(""), "Disconnected");
        assert!(!ConnectionState::Connecting.is_connected());
    }
}
