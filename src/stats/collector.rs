//! Metrics collection for streamed chat responses

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::config::StatsFormat;

/// How a relayed stream ended
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "detail")]
pub enum StreamOutcome {
    /// Still being polled
    Streaming,
    Completed,
    /// Ended with an error line sent to the client
    Failed(String),
    /// Body dropped before the upstream finished
    ClientDisconnected,
}

/// Collected metrics from one chat response stream
#[derive(Debug, Clone, Serialize)]
pub struct StreamMetrics {
    /// Unique request ID
    pub request_id: String,
    /// Timestamp of the request
    pub timestamp: DateTime<Utc>,
    /// Model name
    pub model: String,
    /// Input message count after augmentation
    pub input_messages: usize,
    /// Whether web context was prepended
    pub augmented: bool,
    /// Text fragments forwarded to the client
    pub fragments: usize,
    /// Bytes forwarded to the client, error lines included
    pub bytes: usize,
    /// Time until the first fragment in ms
    pub first_fragment_ms: Option<f64>,
    /// Total stream duration in ms
    pub duration_ms: f64,
    pub outcome: StreamOutcome,
}

impl StreamMetrics {
    pub fn new(request_id: Uuid, model: &str, input_messages: usize, augmented: bool) -> Self {
        Self {
            request_id: request_id.to_string(),
            timestamp: Utc::now(),
            model: model.to_string(),
            input_messages,
            augmented,
            fragments: 0,
            bytes: 0,
            first_fragment_ms: None,
            duration_ms: 0.0,
            outcome: StreamOutcome::Streaming,
        }
    }
}

/// Tracks a stream as it is relayed and logs its metrics exactly once, when
/// dropped. Dropping covers client disconnects, where the body stream is
/// discarded without being polled to the end.
pub struct StreamRecorder {
    metrics: StreamMetrics,
    start: Instant,
    format: Option<StatsFormat>,
}

impl StreamRecorder {
    /// `format` of `None` disables logging
    pub fn new(metrics: StreamMetrics, format: Option<StatsFormat>) -> Self {
        Self {
            metrics,
            start: Instant::now(),
            format,
        }
    }

    pub fn record_fragment(&mut self, len: usize) {
        if self.metrics.first_fragment_ms.is_none() {
            self.metrics.first_fragment_ms = Some(millis(self.start.elapsed()));
        }
        self.metrics.fragments += 1;
        self.metrics.bytes += len;
    }

    pub fn record_error_line(&mut self, len: usize, error: &str) {
        self.metrics.bytes += len;
        self.metrics.outcome = StreamOutcome::Failed(error.to_string());
    }

    pub fn complete(&mut self) {
        if self.metrics.outcome == StreamOutcome::Streaming {
            self.metrics.outcome = StreamOutcome::Completed;
        }
    }

    pub fn metrics(&self) -> &StreamMetrics {
        &self.metrics
    }
}

impl Drop for StreamRecorder {
    fn drop(&mut self) {
        if self.metrics.outcome == StreamOutcome::Streaming {
            self.metrics.outcome = StreamOutcome::ClientDisconnected;
            tracing::info!(
                request_id = %self.metrics.request_id,
                "Client disconnected mid-stream, upstream call dropped"
            );
        }
        self.metrics.duration_ms = millis(self.start.elapsed());

        if let Some(format) = self.format {
            tracing::info!("{}", super::format_metrics(&self.metrics, format));
        }
    }
}

fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics() -> StreamMetrics {
        StreamMetrics::new(Uuid::new_v4(), "gemini-test", 2, false)
    }

    #[test]
    fn test_new_metrics() {
        let m = metrics();
        assert_eq!(m.model, "gemini-test");
        assert_eq!(m.input_messages, 2);
        assert_eq!(m.fragments, 0);
        assert_eq!(m.outcome, StreamOutcome::Streaming);
        assert!(Uuid::parse_str(&m.request_id).is_ok());
    }

    #[test]
    fn test_record_fragments() {
        let mut recorder = StreamRecorder::new(metrics(), None);
        recorder.record_fragment(3);
        recorder.record_fragment(2);
        recorder.complete();

        let m = recorder.metrics();
        assert_eq!(m.fragments, 2);
        assert_eq!(m.bytes, 5);
        assert!(m.first_fragment_ms.is_some());
        assert_eq!(m.outcome, StreamOutcome::Completed);
    }

    #[test]
    fn test_error_outcome_survives_complete() {
        let mut recorder = StreamRecorder::new(metrics(), None);
        recorder.record_fragment(3);
        recorder.record_error_line(20, "network error: reset");
        recorder.complete();

        let m = recorder.metrics();
        assert_eq!(m.bytes, 23);
        assert_eq!(m.outcome, StreamOutcome::Failed("network error: reset".to_string()));
    }

    #[test]
    fn test_outcome_serde() {
        let value = serde_json::to_value(StreamOutcome::Failed("boom".to_string())).unwrap();
        assert_eq!(value, serde_json::json!({"status": "failed", "detail": "boom"}));

        let value = serde_json::to_value(StreamOutcome::Completed).unwrap();
        assert_eq!(value, serde_json::json!({"status": "completed"}));
    }
}
