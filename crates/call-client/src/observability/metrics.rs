//! Metrics definitions for the call client.
//!
//! All metrics follow Prometheus naming conventions:
//! - `call_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Every label is bounded by an enum in this crate:
//! - `phase`: `FailurePhase` (6 values)
//! - `kind`: `MessageKind` (4 values) or `MediaKind` (2 values)
//! - `step`: teardown steps (3 values)
//! - `outcome`: success, error

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

use crate::errors::FailurePhase;
use crate::messaging::MessageKind;
use common::types::MediaKind;

/// Initialize the Prometheus recorder and return its handle.
///
/// Must be called before any metrics are recorded. Not called by the library;
/// the binary installs it when metrics are enabled.
///
/// # Errors
///
/// Returns error if a recorder is already installed.
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        // Token service round trip
        .set_buckets_for_metric(
            Matcher::Prefix("call_credential_fetch".to_string()),
            &[0.010, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000],
        )
        .map_err(|e| format!("Failed to set credential fetch buckets: {e}"))?
        // Full join: credentials + messaging + media + publish
        .set_buckets_for_metric(
            Matcher::Prefix("call_session_join".to_string()),
            &[0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000, 30.000],
        )
        .map_err(|e| format!("Failed to set session join buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus metrics recorder: {e}"))
}

// ============================================================================
// Session lifecycle
// ============================================================================

/// Metric: `call_session_starts_total`
pub fn record_session_start() {
    counter!("call_session_starts_total").increment(1);
}

/// Metric: `call_session_failures_total`
/// Labels: `phase`
pub fn record_session_failure(phase: FailurePhase) {
    counter!("call_session_failures_total", "phase" => phase.as_str()).increment(1);
}

/// Time from `start_session` to `Active`.
///
/// Metric: `call_session_join_duration_seconds`
pub fn record_session_join_duration(duration: Duration) {
    histogram!("call_session_join_duration_seconds").record(duration.as_secs_f64());
}

/// Metric: `call_teardown_errors_total`
/// Labels: `step` (`media_leave`, `channel_leave`, `logout`)
pub fn record_teardown_error(step: &'static str) {
    counter!("call_teardown_errors_total", "step" => step).increment(1);
}

// ============================================================================
// Credentials
// ============================================================================

/// Metric: `call_credential_fetch_duration_seconds`
/// Labels: `outcome`
pub fn record_credential_fetch(outcome: &'static str, duration: Duration) {
    histogram!("call_credential_fetch_duration_seconds", "outcome" => outcome)
        .record(duration.as_secs_f64());
}

// ============================================================================
// Steady state
// ============================================================================

/// Metric: `call_messages_received_total`
/// Labels: `kind`
pub fn record_message_received(kind: MessageKind) {
    counter!("call_messages_received_total", "kind" => kind.as_str()).increment(1);
}

/// Metric: `call_subscribe_failures_total`
/// Labels: `kind`
pub fn record_subscribe_failure(kind: MediaKind) {
    counter!("call_subscribe_failures_total", "kind" => kind.as_str()).increment(1);
}

/// Metric: `call_remote_participants`
pub fn set_remote_participants(count: usize) {
    // usize to f64 is exact for any realistic room size
    #[allow(clippy::cast_precision_loss)]
    gauge!("call_remote_participants").set(count as f64);
}

/// Platform events dropped because they belong to an earlier session.
///
/// Metric: `call_stale_events_total`
pub fn record_stale_event() {
    counter!("call_stale_events_total").increment(1);
}

/// Session events dropped because the outward buffer was full.
///
/// Metric: `call_events_dropped_total`
pub fn record_event_dropped() {
    counter!("call_events_dropped_total").increment(1);
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use metrics_util::debugging::{DebugValue, DebuggingRecorder};
    use metrics_util::MetricKind;

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_session_start();
        record_session_failure(FailurePhase::Credentials);
        record_teardown_error("logout");
        record_message_received(MessageKind::Chat);
        set_remote_participants(3);
        record_stale_event();
        record_event_dropped();
    }

    #[test]
    fn test_metrics_are_captured() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            record_session_start();
            record_session_failure(FailurePhase::MediaJoin);
            record_session_failure(FailurePhase::MediaJoin);
            record_message_received(MessageKind::Unstructured);
            record_subscribe_failure(MediaKind::Video);
            set_remote_participants(2);
            record_credential_fetch("success", Duration::from_millis(40));
        });

        let snapshot = snapshotter.snapshot().into_vec();
        let find = |name: &str| {
            snapshot
                .iter()
                .find(|(key, _, _, _)| key.key().name() == name)
                .map(|(key, _, _, value)| {
                    let first_label = key.key().labels().next().map(|l| l.value().to_string());
                    (key.kind(), first_label, value)
                })
        };

        let (kind, label, value) = find("call_session_failures_total").unwrap();
        assert_eq!(kind, MetricKind::Counter);
        assert_eq!(label.as_deref(), Some("media_join"));
        assert_eq!(value, &DebugValue::Counter(2));

        let (kind, _, value) = find("call_remote_participants").unwrap();
        assert_eq!(kind, MetricKind::Gauge);
        assert_eq!(value, &DebugValue::Gauge(2.0.into()));

        let (_, label, _) = find("call_messages_received_total").unwrap();
        assert_eq!(label.as_deref(), Some("unstructured"));

        assert!(find("call_session_starts_total").is_some());
        assert!(find("call_credential_fetch_duration_seconds").is_some());
        assert!(find("call_subscribe_failures_total").is_some());
    }
}
