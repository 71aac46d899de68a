//! Pipeline metrics.
//!
//! Counters and histograms for remote calls, retries and stage caches.
//! Recording is a no-op unless the host process installs a recorder.

use std::time::Duration;

use metrics::{counter, histogram};
use podthumb_models::Stage;

/// Metric name constants for consistency.
pub mod names {
    /// Remote model calls by stage.
    pub const REMOTE_CALLS_TOTAL: &str = "podthumb_remote_calls_total";

    /// Retry attempts by operation.
    pub const RETRIES_TOTAL: &str = "podthumb_retries_total";

    /// Stage cache hits by stage.
    pub const CACHE_HITS_TOTAL: &str = "podthumb_cache_hits_total";

    /// Stage cache misses by stage.
    pub const CACHE_MISSES_TOTAL: &str = "podthumb_cache_misses_total";

    /// Wall-clock stage latency in seconds.
    pub const STAGE_LATENCY_SECONDS: &str = "podthumb_stage_latency_seconds";
}

pub fn record_remote_call(stage: Stage) {
    counter!(names::REMOTE_CALLS_TOTAL, "stage" => stage.as_str()).increment(1);
}

pub fn record_retry(operation: &str) {
    counter!(names::RETRIES_TOTAL, "operation" => operation.to_string()).increment(1);
}

pub fn record_cache(stage: Stage, hit: bool) {
    if hit {
        counter!(names::CACHE_HITS_TOTAL, "stage" => stage.as_str()).increment(1);
    } else {
        counter!(names::CACHE_MISSES_TOTAL, "stage" => stage.as_str()).increment(1);
    }
}

pub fn record_stage_latency(stage: Stage, elapsed: Duration) {
    histogram!(names::STAGE_LATENCY_SECONDS, "stage" => stage.as_str())
        .record(elapsed.as_secs_f64());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names() {
        assert!(names::REMOTE_CALLS_TOTAL.starts_with("podthumb_"));
        assert!(names::RETRIES_TOTAL.contains("retries"));
        assert!(names::STAGE_LATENCY_SECONDS.ends_with("_seconds"));
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_remote_call(Stage::Identify);
        record_retry("headshot");
        record_cache(Stage::Compose, true);
        record_stage_latency(Stage::Headshot, Duration::from_millis(5));
    }
}
