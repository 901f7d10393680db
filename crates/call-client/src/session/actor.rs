//! `SessionActor` - runs a [`SessionController`] on its own task.
//!
//! The actor owns the controller and serializes everything that touches it:
//! commands arriving on the mailbox from [`SessionHandle`]s, and platform
//! envelopes arriving on the platform event channel. Each channel is drained
//! in FIFO order and no two handlers ever run concurrently, so an
//! `end_session` sent while a `start_session` is in flight runs after the
//! start completes.
//!
//! Across the two channels the loop is biased: cancellation first, then
//! every pending platform envelope, then the next command. A callback that
//! is already queued when a command arrives is applied before that command.
//!
//! The actor stops when its `CancellationToken` fires or every handle is
//! dropped. In both cases it ends the session first.

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use super::controller::{SessionController, SessionParts};
use super::messages::SessionMessage;
use super::state::SessionSnapshot;
use crate::errors::SessionError;
use crate::events::{PlatformEventReceiver, SessionEvent};

/// Mailbox buffer for session commands.
const SESSION_CHANNEL_BUFFER: usize = 64;

/// Handle to a running `SessionActor`. Cheap to clone.
#[derive(Clone, Debug)]
pub struct SessionHandle {
    sender: mpsc::Sender<SessionMessage>,
    cancel_token: CancellationToken,
}

impl SessionHandle {
    /// Join a room. Resolves once the session is `Active` or has failed back
    /// to `Idle`.
    pub async fn start_session(
        &self,
        display_name: impl Into<String>,
        room_name: impl Into<String>,
    ) -> Result<(), SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionMessage::Start {
            display_name: display_name.into(),
            room_name: room_name.into(),
            respond_to: tx,
        })
        .await?;

        Self::receive(rx).await?
    }

    /// Leave the room. Resolves once teardown has finished.
    pub async fn end_session(&self) -> Result<(), SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionMessage::End { respond_to: tx }).await?;
        Self::receive(rx).await
    }

    pub async fn send_chat_message(&self, text: impl Into<String>) -> Result<(), SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionMessage::SendChat {
            text: text.into(),
            respond_to: tx,
        })
        .await?;

        Self::receive(rx).await?
    }

    pub async fn send_direct_message(
        &self,
        peer_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Result<(), SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionMessage::SendDirect {
            peer_id: peer_id.into(),
            text: text.into(),
            respond_to: tx,
        })
        .await?;

        Self::receive(rx).await?
    }

    /// Returns the new muted flag, or `None` without a local track.
    pub async fn toggle_microphone(&self) -> Result<Option<bool>, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionMessage::ToggleMicrophone { respond_to: tx })
            .await?;
        Self::receive(rx).await
    }

    /// Returns the new enabled flag, or `None` without a local track.
    pub async fn toggle_camera(&self) -> Result<Option<bool>, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionMessage::ToggleCamera { respond_to: tx })
            .await?;
        Self::receive(rx).await
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionMessage::GetSnapshot { respond_to: tx })
            .await?;
        Self::receive(rx).await
    }

    /// Stop the actor. The current session is ended first.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    async fn send(&self, message: SessionMessage) -> Result<(), SessionError> {
        self.sender
            .send(message)
            .await
            .map_err(|e| SessionError::Internal(format!("channel send failed: {e}")))
    }

    async fn receive<T>(rx: oneshot::Receiver<T>) -> Result<T, SessionError> {
        rx.await
            .map_err(|e| SessionError::Internal(format!("response receive failed: {e}")))
    }
}

/// Actor task wrapping one `SessionController`.
pub struct SessionActor {
    controller: SessionController,
    receiver: mpsc::Receiver<SessionMessage>,
    platform_events: PlatformEventReceiver,
    cancel_token: CancellationToken,
}

impl SessionActor {
    /// Build a controller from `parts` and spawn the actor.
    ///
    /// Returns the handle, the outward event stream (bounded by
    /// `event_buffer`) and the task handle.
    pub fn spawn(
        parts: SessionParts,
        event_buffer: usize,
        cancel_token: CancellationToken,
    ) -> (SessionHandle, mpsc::Receiver<SessionEvent>, JoinHandle<()>) {
        let (event_tx, event_rx) = mpsc::channel(event_buffer.max(1));
        let (controller, platform_events) = SessionController::new(parts, event_tx);
        let (handle, task) = Self::spawn_with_controller(controller, platform_events, cancel_token);
        (handle, event_rx, task)
    }

    /// Spawn around an existing controller.
    pub fn spawn_with_controller(
        controller: SessionController,
        platform_events: PlatformEventReceiver,
        cancel_token: CancellationToken,
    ) -> (SessionHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(SESSION_CHANNEL_BUFFER);

        let actor = Self {
            controller,
            receiver,
            platform_events,
            cancel_token: cancel_token.clone(),
        };

        let task = tokio::spawn(actor.run());

        (
            SessionHandle {
                sender,
                cancel_token,
            },
            task,
        )
    }

    #[instrument(skip_all, name = "call.actor.session")]
    async fn run(mut self) {
        info!(target: "call.actor", "SessionActor started");

        loop {
            tokio::select! {
                biased;

                () = self.cancel_token.cancelled() => {
                    info!(target: "call.actor", "SessionActor received cancellation signal");
                    break;
                }

                Some(envelope) = self.platform_events.recv() => {
                    self.controller.handle_platform_event(envelope).await;
                }

                message = self.receiver.recv() => {
                    match message {
                        Some(message) => self.handle_message(message).await,
                        None => {
                            debug!(target: "call.actor", "All session handles dropped");
                            break;
                        }
                    }
                }
            }
        }

        self.controller.end_session().await;
        info!(target: "call.actor", "SessionActor stopped");
    }

    async fn handle_message(&mut self, message: SessionMessage) {
        match message {
            SessionMessage::Start {
                display_name,
                room_name,
                respond_to,
            } => {
                let result = self
                    .controller
                    .start_session(&display_name, &room_name)
                    .await;
                let _ = respond_to.send(result);
            }
            SessionMessage::End { respond_to } => {
                self.controller.end_session().await;
                let _ = respond_to.send(());
            }
            SessionMessage::SendChat { text, respond_to } => {
                let result = self.controller.send_chat_message(&text).await;
                let _ = respond_to.send(result);
            }
            SessionMessage::SendDirect {
                peer_id,
                text,
                respond_to,
            } => {
                let result = self.controller.send_direct_message(&peer_id, &text).await;
                let _ = respond_to.send(result);
            }
            SessionMessage::ToggleMicrophone { respond_to } => {
                let _ = respond_to.send(self.controller.toggle_microphone());
            }
            SessionMessage::ToggleCamera { respond_to } => {
                let _ = respond_to.send(self.controller.toggle_camera());
            }
            SessionMessage::GetSnapshot { respond_to } => {
                let _ = respond_to.send(self.controller.snapshot());
            }
        }
    }
}
