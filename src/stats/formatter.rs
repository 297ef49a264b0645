//! Stats formatting for different output formats

use super::{StreamMetrics, StreamOutcome};
use crate::config::StatsFormat;

/// Format metrics according to the configured format
pub fn format_metrics(metrics: &StreamMetrics, format: StatsFormat) -> String {
    match format {
        StatsFormat::Compact => format_compact(metrics),
        StatsFormat::Json => format_json(metrics),
    }
}

/// Single-line format
fn format_compact(m: &StreamMetrics) -> String {
    let ttff = m
        .first_fragment_ms
        .map(|ms| format!("{:.0}ms", ms))
        .unwrap_or_else(|| "-".to_string());

    let outcome = match &m.outcome {
        StreamOutcome::Streaming => "streaming".to_string(),
        StreamOutcome::Completed => "completed".to_string(),
        StreamOutcome::Failed(e) => format!("failed ({})", e),
        StreamOutcome::ClientDisconnected => "client disconnected".to_string(),
    };

    format!(
        "← id={} model={} msgs={}{} fragments={} bytes={} first={} total={:.0}ms {}",
        short_id(&m.request_id),
        m.model,
        m.input_messages,
        if m.augmented { " +web" } else { "" },
        m.fragments,
        m.bytes,
        ttff,
        m.duration_ms,
        outcome
    )
}

/// JSON format
fn format_json(m: &StreamMetrics) -> String {
    serde_json::to_string(m).unwrap_or_else(|_| "{}".to_string())
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}
