//! Inbound text classification and the chat wire payload.
//!
//! Every text delivered over the messaging network (peer or channel) goes
//! through [`classify`]:
//!
//! | Input | Kind | Payload |
//! |-------|------|---------|
//! | not JSON | `Unstructured` | raw text |
//! | `type` is `offer`, `answer` or `ice-candidate` | `Signaling` | raw text |
//! | `type` is `chat` with a string `message` | `Chat` | `message` |
//! | any other JSON | `Unstructured` | raw text |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::ChannelError;

/// `type` value of a chat payload.
pub const CHAT_TYPE: &str = "chat";

/// `type` values reserved for call negotiation.
pub const SIGNALING_TYPES: [&str; 3] = ["offer", "answer", "ice-candidate"];

/// Classification of an inbound text payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Chat,
    System,
    Signaling,
    Unstructured,
}

impl MessageKind {
    /// Stable lowercase label, used in logs and metric labels.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::Chat => "chat",
            MessageKind::System => "system",
            MessageKind::Signaling => "signaling",
            MessageKind::Unstructured => "unstructured",
        }
    }
}

/// Where a message came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOrigin {
    /// Point-to-point delivery from another member.
    Peer,
    /// Broadcast on the joined channel.
    Channel,
    /// Authored by this session (synthesized echo).
    Local,
    /// Generated from a presence event.
    Presence,
}

/// A classified message ready for the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub sender_id: String,
    pub kind: MessageKind,
    /// Display text: the chat `message` field, or the raw text otherwise.
    pub payload: String,
    pub raw_text: String,
    pub origin: MessageOrigin,
    pub received_at: DateTime<Utc>,
}

impl InboundMessage {
    /// Echo of a message this session sent.
    #[must_use]
    pub fn local_echo(sender: &str, text: &str, raw_text: String) -> Self {
        Self {
            sender_id: sender.to_string(),
            kind: MessageKind::Chat,
            payload: text.to_string(),
            raw_text,
            origin: MessageOrigin::Local,
            received_at: Utc::now(),
        }
    }

    /// System notice generated from a presence change.
    #[must_use]
    pub fn presence(member_id: &str, text: String) -> Self {
        Self {
            sender_id: member_id.to_string(),
            kind: MessageKind::System,
            raw_text: text.clone(),
            payload: text,
            origin: MessageOrigin::Presence,
            received_at: Utc::now(),
        }
    }

    /// True if this session authored the message.
    #[must_use]
    pub fn is_self_authored(&self) -> bool {
        self.origin == MessageOrigin::Local
    }
}

/// Chat payload as exchanged on the channel.
#[derive(Debug, Serialize)]
struct OutboundChat<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    message: &'a str,
    sender: &'a str,
}

/// Chat fields read from an inbound payload.
#[derive(Deserialize)]
struct InboundChat {
    message: String,
    #[serde(default)]
    sender: Option<String>,
}

/// Encode a chat message for broadcast.
///
/// # Errors
///
/// Returns `ChannelError::Send` if serialization fails.
pub fn encode_chat(message: &str, sender: &str) -> Result<String, ChannelError> {
    serde_json::to_string(&OutboundChat {
        kind: CHAT_TYPE,
        message,
        sender,
    })
    .map_err(|e| ChannelError::Send(format!("Failed to encode chat payload: {e}")))
}

/// Classify one inbound text payload.
///
/// `transport_sender` is the member or peer ID reported by the platform. A
/// chat payload's `sender` field takes precedence over it.
#[must_use]
pub fn classify(transport_sender: &str, raw_text: &str, origin: MessageOrigin) -> InboundMessage {
    let unstructured = || InboundMessage {
        sender_id: transport_sender.to_string(),
        kind: MessageKind::Unstructured,
        payload: raw_text.to_string(),
        raw_text: raw_text.to_string(),
        origin,
        received_at: Utc::now(),
    };

    let Ok(value) = serde_json::from_str::<Value>(raw_text) else {
        return unstructured();
    };

    let Some(message_type) = value.get("type").and_then(Value::as_str) else {
        return unstructured();
    };

    if SIGNALING_TYPES.contains(&message_type) {
        return InboundMessage {
            kind: MessageKind::Signaling,
            ..unstructured()
        };
    }

    if message_type != CHAT_TYPE {
        return unstructured();
    }

    match serde_json::from_value::<InboundChat>(value) {
        Ok(chat) => InboundMessage {
            sender_id: chat
                .sender
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| transport_sender.to_string()),
            kind: MessageKind::Chat,
            payload: chat.message,
            raw_text: raw_text.to_string(),
            origin,
            received_at: Utc::now(),
        },
        Err(_) => unstructured(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_unstructured() {
        let msg = classify("peer-7", "hello there", MessageOrigin::Peer);

        assert_eq!(msg.kind, MessageKind::Unstructured);
        assert_eq!(msg.payload, msg.raw_text);
        assert_eq!(msg.payload, "hello there");
        assert_eq!(msg.sender_id, "peer-7");
    }

    #[test]
    fn test_unparseable_text_round_trips() {
        for raw in ["", "{", "{\"type\": chat}", "[1, 2", "null-ish", "😀 émoji"] {
            let msg = classify("m", raw, MessageOrigin::Channel);
            assert_eq!(msg.kind, MessageKind::Unstructured, "input: {raw:?}");
            assert_eq!(msg.payload, raw);
            assert_eq!(msg.raw_text, raw);
        }
    }

    #[test]
    fn test_chat_payload() {
        let raw = r#"{"type":"chat","message":"hi","sender":"bob"}"#;
        let msg = classify("member-123", raw, MessageOrigin::Channel);

        assert_eq!(msg.kind, MessageKind::Chat);
        assert_eq!(msg.sender_id, "bob");
        assert_eq!(msg.payload, "hi");
        assert_eq!(msg.raw_text, raw);
        assert_eq!(msg.origin, MessageOrigin::Channel);
    }

    #[test]
    fn test_chat_without_sender_uses_transport_sender() {
        let msg = classify("member-9", r#"{"type":"chat","message":"yo"}"#, MessageOrigin::Peer);

        assert_eq!(msg.kind, MessageKind::Chat);
        assert_eq!(msg.sender_id, "member-9");
    }

    #[test]
    fn test_chat_without_message_is_unstructured() {
        let raw = r#"{"type":"chat","sender":"bob"}"#;
        let msg = classify("m", raw, MessageOrigin::Channel);

        assert_eq!(msg.kind, MessageKind::Unstructured);
        assert_eq!(msg.payload, raw);
    }

    #[test]
    fn test_signaling_types() {
        for signal in SIGNALING_TYPES {
            let raw = format!(r#"{{"type":"{signal}","sdp":"v=0"}}"#);
            let msg = classify("peer-1", &raw, MessageOrigin::Peer);
            assert_eq!(msg.kind, MessageKind::Signaling);
            assert_eq!(msg.raw_text, raw);
        }
    }

    #[test]
    fn test_other_json_is_unstructured() {
        for raw in [r#"{"type":"user-joined"}"#, r#"{"message":"x"}"#, "42", "[1,2]"] {
            let msg = classify("m", raw, MessageOrigin::Channel);
            assert_eq!(msg.kind, MessageKind::Unstructured, "input: {raw}");
            assert_eq!(msg.payload, raw);
        }
    }

    #[test]
    fn test_encode_chat_is_classified_as_chat() {
        let raw = encode_chat("see you \"soon\"", "alice").unwrap();
        let msg = classify("alice-uid", &raw, MessageOrigin::Channel);

        assert_eq!(msg.kind, MessageKind::Chat);
        assert_eq!(msg.payload, "see you \"soon\"");
        assert_eq!(msg.sender_id, "alice");
    }

    #[test]
    fn test_local_echo_is_self_authored() {
        let msg = InboundMessage::local_echo("alice", "hi", "{}".to_string());
        assert!(msg.is_self_authored());
        assert_eq!(msg.kind, MessageKind::Chat);
    }
}
