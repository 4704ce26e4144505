//! Session client metrics
//!
//! - `session_calls_total` (counter): labels `outcome`, `method`
//! - `session_refresh_exchanges_total` (counter): label `outcome`
//!
//! Calls are no-ops until the embedding binary installs a recorder.

/// Record a settled call. `outcome` is `"ok"` or an `ErrorKind` label.
pub fn record_call(outcome: &str, method: &str) {
    metrics::counter!(
        "session_calls_total",
        "outcome" => outcome.to_string(),
        "method" => method.to_string()
    )
    .increment(1);
}

/// Record a settled refresh exchange (`RefreshOutcome::label`).
pub fn record_refresh(outcome: &str) {
    metrics::counter!("session_refresh_exchanges_total", "outcome" => outcome.to_string())
        .increment(1);
}
