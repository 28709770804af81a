//! Metrics collection.
//!
//! # Metrics
//! - `operator_events_total` (counter): watch events by kind
//! - `operator_event_retries_total` (counter): retries by outcome
//! - `operator_commits_total` (counter): stage commits by result
//! - `operator_flushes_total` (counter): segment flushes by result
//! - `operator_pending_stages` (gauge): stages waiting in the debounce timer
//!
//! # Design Decisions
//! - Facade only; the embedding process installs an exporter

use metrics::{counter, gauge};

/// Record a watch event.
pub fn record_event(kind: &str) {
    counter!("operator_events_total", "kind" => kind.to_string()).increment(1);
}

/// Record a retry decision ("scheduled", "dropped", "exhausted").
pub fn record_event_retry(outcome: &'static str) {
    counter!("operator_event_retries_total", "outcome" => outcome).increment(1);
}

/// Record one stage commit ("synced", "deleted", "failed").
pub fn record_commit(result: &'static str) {
    counter!("operator_commits_total", "result" => result).increment(1);
}

/// Record one segment flush.
pub fn record_flush(success: bool) {
    let result = if success { "ok" } else { "error" };
    counter!("operator_flushes_total", "result" => result).increment(1);
}

/// Record stages still waiting for their debounce window.
pub fn record_pending_stages(count: usize) {
    gauge!("operator_pending_stages").set(count as f64);
}
