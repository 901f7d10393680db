//! Message types for the session actor mailbox.
//!
//! Commands from [`SessionHandle`](super::SessionHandle) travel over
//! `tokio::sync::mpsc`; replies come back on `tokio::sync::oneshot`.

use tokio::sync::oneshot;

use super::state::SessionSnapshot;
use crate::errors::SessionError;

/// Messages sent to `SessionActor`.
#[derive(Debug)]
pub enum SessionMessage {
    /// Join a room.
    Start {
        display_name: String,
        room_name: String,
        respond_to: oneshot::Sender<Result<(), SessionError>>,
    },

    /// Leave the current room. Replies once teardown has finished.
    End { respond_to: oneshot::Sender<()> },

    /// Broadcast a chat message to the room.
    SendChat {
        text: String,
        respond_to: oneshot::Sender<Result<(), SessionError>>,
    },

    /// Send a chat message to one member.
    SendDirect {
        peer_id: String,
        text: String,
        respond_to: oneshot::Sender<Result<(), SessionError>>,
    },

    ToggleMicrophone {
        /// New muted flag, `None` without a local track.
        respond_to: oneshot::Sender<Option<bool>>,
    },

    ToggleCamera {
        /// New enabled flag, `None` without a local track.
        respond_to: oneshot::Sender<Option<bool>>,
    },

    GetSnapshot {
        respond_to: oneshot::Sender<SessionSnapshot>,
    },
}
