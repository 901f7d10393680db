//! Session lifecycle and subsystem states.

use common::types::LocalId;

use crate::registry::RemoteParticipant;

/// Session lifecycle.
///
/// `Idle -> Acquiring -> JoiningMessaging -> JoiningMedia -> Active -> Leaving -> Idle`.
/// A failure in any joining state returns directly to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Acquiring,
    JoiningMessaging,
    JoiningMedia,
    Active,
    Leaving,
}

impl SessionState {
    /// Label shown to the user for this phase.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            SessionState::Idle => "Not connected",
            SessionState::Acquiring => "Getting credentials...",
            SessionState::JoiningMessaging => "Joining chat...",
            SessionState::JoiningMedia => "Joining video...",
            SessionState::Active => "Connected",
            SessionState::Leaving => "Leaving...",
        }
    }
}

/// State of one platform adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubsystemState {
    #[default]
    NotStarted,
    Starting,
    Ready,
    Failed,
}

/// One join attempt. Exists from `start_session` until the session returns
/// to `Idle`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub local_id: LocalId,
    pub display_name: String,
    pub room_name: String,
}

/// Point-in-time view of a session object, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub session: Option<Session>,
    pub generation: u64,
    /// Client-safe message of the most recent failure. Survives the return
    /// to `Idle`; cleared by the next `start_session`.
    pub last_error: Option<String>,
    pub messaging: SubsystemState,
    pub media: SubsystemState,
    pub microphone_muted: Option<bool>,
    pub camera_enabled: Option<bool>,
    pub remote_participants: Vec<RemoteParticipant>,
}
