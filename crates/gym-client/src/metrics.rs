//! Client metrics
//!
//! Recorded through the `metrics` facade; the host app installs a recorder
//! if it wants them:
//!
//! - `api_requests_total` (counter): labels `method`, `outcome`
//! - `api_request_duration_seconds` (histogram): label `outcome`
//! - `api_refresh_total` (counter): label `outcome`
//! - `api_replays_total` (counter)
//!
//! `outcome` is `ok` or an `ErrorKind` label.

/// Record one finished pipeline call, replays included.
pub fn record_request(method: &str, outcome: &str, duration_secs: f64) {
    metrics::counter!("api_requests_total", "method" => method.to_string(), "outcome" => outcome.to_string())
        .increment(1);
    metrics::histogram!("api_request_duration_seconds", "outcome" => outcome.to_string())
        .record(duration_secs);
}

/// Record a finished refresh: `success`, `failure` or `superseded`.
pub fn record_refresh(outcome: &str) {
    metrics::counter!("api_refresh_total", "outcome" => outcome.to_string()).increment(1);
}

/// Record a request replayed with a refreshed credential.
pub fn record_replay() {
    metrics::counter!("api_replays_total").increment(1);
}
