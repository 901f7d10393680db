//! Shared fixtures: call log, `TestSession` harness and event filters.

use std::sync::{Arc, Mutex};

use call_client::errors::{BrokerError, FailurePhase};
use call_client::events::{PlatformEventReceiver, SessionEvent, StatusSource};
use call_client::messaging::{InboundMessage, SignalingHandler};
use call_client::session::{SessionController, SessionParts, SessionState};
use common::types::ParticipantId;
use tokio::sync::mpsc;

use crate::mock_broker::MockCredentialSource;
use crate::mock_media::{MediaOp, MockMediaPlatform, MockMediaPlatformBuilder};
use crate::mock_messaging::{MessagingOp, MockMessagingPlatform, MockMessagingPlatformBuilder};

/// Media app ID used by `TestSession`.
pub const TEST_APP_ID: &str = "test-app";

/// Event buffer large enough that no test drops an event.
pub const TEST_EVENT_BUFFER: usize = 1024;

/// Ordered record of platform calls, shared across mocks.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// True if any entry equals `entry` or starts with `entry:`.
    pub fn contains(&self, entry: &str) -> bool {
        self.position(entry).is_some()
    }

    /// Index of the first entry matching `entry` (see `contains`).
    pub fn position(&self, entry: &str) -> Option<usize> {
        let prefix = format!("{entry}:");
        self.0
            .lock()
            .unwrap()
            .iter()
            .position(|e| e == entry || e.starts_with(&prefix))
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }
}

/// A `SessionController` wired to mocks that share one `CallLog`.
///
/// The controller is driven directly, without an actor task. Platform
/// callbacks emitted through the mocks sit in `platform_events` until
/// [`pump`](Self::pump) is called.
pub struct TestSession {
    pub controller: SessionController,
    pub events: mpsc::Receiver<SessionEvent>,
    pub platform_events: PlatformEventReceiver,
    pub broker: Arc<MockCredentialSource>,
    pub messaging: Arc<MockMessagingPlatform>,
    pub media: Arc<MockMediaPlatform>,
    pub log: CallLog,
}

impl TestSession {
    /// Session where every collaborator succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    #[must_use]
    pub fn builder() -> TestSessionBuilder {
        TestSessionBuilder::default()
    }

    /// Start with the default names and assert success.
    ///
    /// # Panics
    ///
    /// Panics if the start fails.
    pub async fn start(&mut self) {
        self.controller
            .start_session("alice", "standup")
            .await
            .expect("session start failed");
    }

    /// Feed every queued platform envelope to the controller. Returns how
    /// many were delivered.
    pub async fn pump(&mut self) -> usize {
        let mut delivered = 0;
        while let Ok(envelope) = self.platform_events.try_recv() {
            self.controller.handle_platform_event(envelope).await;
            delivered += 1;
        }
        delivered
    }

    /// Take every session event emitted so far.
    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}

impl Default for TestSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TestSession`.
#[derive(Default)]
pub struct TestSessionBuilder {
    broker_failure: Option<BrokerError>,
    messaging_failures: Vec<MessagingOp>,
    media_failures: Vec<MediaOp>,
    signaling: Option<Arc<dyn SignalingHandler>>,
}

impl TestSessionBuilder {
    #[must_use]
    pub fn fail_broker(mut self, error: BrokerError) -> Self {
        self.broker_failure = Some(error);
        self
    }

    #[must_use]
    pub fn fail_messaging(mut self, op: MessagingOp) -> Self {
        self.messaging_failures.push(op);
        self
    }

    #[must_use]
    pub fn fail_media(mut self, op: MediaOp) -> Self {
        self.media_failures.push(op);
        self
    }

    #[must_use]
    pub fn signaling(mut self, handler: Arc<dyn SignalingHandler>) -> Self {
        self.signaling = Some(handler);
        self
    }

    #[must_use]
    pub fn build(self) -> TestSession {
        let log = CallLog::default();

        let mut broker = MockCredentialSource::builder().call_log(log.clone());
        if let Some(error) = self.broker_failure {
            broker = broker.fail_with(error);
        }
        let broker = Arc::new(broker.build());

        let messaging = self
            .messaging_failures
            .into_iter()
            .fold(
                MockMessagingPlatform::builder().call_log(log.clone()),
                MockMessagingPlatformBuilder::fail,
            );
        let messaging = Arc::new(messaging.build());

        let media = self
            .media_failures
            .into_iter()
            .fold(
                MockMediaPlatform::builder().call_log(log.clone()),
                MockMediaPlatformBuilder::fail,
            );
        let media = Arc::new(media.build());

        let mut parts = SessionParts::new(
            TEST_APP_ID,
            broker.clone(),
            messaging.clone(),
            media.clone(),
        );
        if let Some(handler) = self.signaling {
            parts = parts.with_signaling(handler);
        }

        let (events_tx, events) = mpsc::channel(TEST_EVENT_BUFFER);
        let (controller, platform_events) = SessionController::new(parts, events_tx);

        TestSession {
            controller,
            events,
            platform_events,
            broker,
            messaging,
            media,
            log,
        }
    }
}

// ----------------------------------------------------------------------------
// Event filters
// ----------------------------------------------------------------------------

/// Session lifecycle states, in emission order.
pub fn session_states(events: &[SessionEvent]) -> Vec<SessionState> {
    events
        .iter()
        .filter_map(|event| match event {
            SessionEvent::StatusChanged {
                source: StatusSource::Session(state),
                ..
            } => Some(*state),
            _ => None,
        })
        .collect()
}

/// Labels of messaging connection status events.
pub fn connection_labels(events: &[SessionEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| match event {
            SessionEvent::StatusChanged {
                source: StatusSource::Messaging(_),
                label,
            } => Some(label.clone()),
            _ => None,
        })
        .collect()
}

pub fn messages(events: &[SessionEvent]) -> Vec<InboundMessage> {
    events
        .iter()
        .filter_map(|event| match event {
            SessionEvent::MessageReceived(message) => Some(message.clone()),
            _ => None,
        })
        .collect()
}

pub fn errors(events: &[SessionEvent]) -> Vec<(FailurePhase, String)> {
    events
        .iter()
        .filter_map(|event| match event {
            SessionEvent::Error { phase, message } => Some((*phase, message.clone())),
            _ => None,
        })
        .collect()
}

pub fn joined_ids(events: &[SessionEvent]) -> Vec<ParticipantId> {
    events
        .iter()
        .filter_map(|event| match event {
            SessionEvent::ParticipantJoined { participant_id } => Some(participant_id.clone()),
            _ => None,
        })
        .collect()
}

pub fn left_ids(events: &[SessionEvent]) -> Vec<ParticipantId> {
    events
        .iter()
        .filter_map(|event| match event {
            SessionEvent::ParticipantLeft { participant_id } => Some(participant_id.clone()),
            _ => None,
        })
        .collect()
}
