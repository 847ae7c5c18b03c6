// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for allowlist-sync.
//!
//! Uses the `metrics` crate for backend-agnostic metrics collection.
//! The embedding process is responsible for choosing the exporter.
//!
//! # Metric Naming Convention
//! - `allowlist_sync_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Labels
//! - `strategy`: legacy, batched
//! - `outcome`: success, error, timeout, cancelled
//! - `list`: allowed, blocked
//! - `operation`: create, delete, purge, load

use std::time::{Duration, Instant};

use metrics::{counter, gauge, histogram};

/// Record the end of one sync cycle
pub fn record_cycle(strategy: &str, outcome: &str) {
    counter!(
        "allowlist_sync_cycles_total",
        "strategy" => strategy.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

pub fn record_cycle_duration(duration: Duration) {
    histogram!("allowlist_sync_cycle_seconds").record(duration.as_secs_f64());
}

/// Current number of identities in the served snapshot
pub fn set_allowlist_size(size: usize) {
    gauge!("allowlist_sync_allowlist_size").set(size as f64);
}

/// Identities received from one range query
pub fn record_page_fetched(list: &str, count: usize) {
    counter!("allowlist_sync_range_queries_total", "list" => list.to_string()).increment(1);
    counter!("allowlist_sync_identities_fetched_total", "list" => list.to_string()).increment(count as u64);
}

pub fn record_registry_error(call: &str) {
    counter!("allowlist_sync_registry_errors_total", "call" => call.to_string()).increment(1);
}

pub fn record_persistence_error(operation: &str) {
    counter!("allowlist_sync_persistence_errors_total", "operation" => operation.to_string()).increment(1);
}

/// Identities restored from the store on startup
pub fn record_bootstrap(loaded: usize, duration: Duration) {
    gauge!("allowlist_sync_bootstrap_identities").set(loaded as f64);
    histogram!("allowlist_sync_bootstrap_seconds").record(duration.as_secs_f64());
}

/// Records the cycle duration histogram when dropped.
pub struct CycleTimer {
    start: Instant,
}

impl CycleTimer {
    #[must_use]
    pub fn start() -> Self {
        Self { start: Instant::now() }
    }
}

impl Drop for CycleTimer {
    fn drop(&mut self) {
        record_cycle_duration(self.start.elapsed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_util::debugging::{DebugValue, DebuggingRecorder};

    #[test]
    fn test_recorders_without_exporter_do_not_panic() {
        record_cycle("legacy", "success");
        record_page_fetched("allowed", 10);
        record_registry_error("latest_block_height");
        record_persistence_error("create");
        record_bootstrap(5, Duration::from_millis(3));
        set_allowlist_size(5);
        let _timer = CycleTimer::start();
    }

    #[test]
    fn test_cycle_counter_is_labelled() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            record_cycle("batched", "success");
            record_cycle("batched", "success");
            record_cycle("legacy", "error");
        });

        let mut batched_success = 0;
        let mut legacy_error = 0;
        for (key, _, _, value) in snapshotter.snapshot().into_vec() {
            if key.key().name() != "allowlist_sync_cycles_total" {
                continue;
            }
            let labels: Vec<(String, String)> = key
                .key()
                .labels()
                .map(|l| (l.key().to_string(), l.value().to_string()))
                .collect();
            if let DebugValue::Counter(n) = value {
                if labels.contains(&("strategy".into(), "batched".into())) {
                    batched_success = n;
                } else if labels.contains(&("outcome".into(), "error".into())) {
                    legacy_error = n;
                }
            }
        }

        assert_eq!(batched_success, 2);
        assert_eq!(legacy_error, 1);
    }

    #[test]
    fn test_allowlist_size_gauge() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || set_allowlist_size(42));

        let gauge = snapshotter
            .snapshot()
            .into_vec()
            .into_iter()
            .find(|(key, _, _, _)| key.key().name() == "allowlist_sync_allowlist_size")
            .map(|(_, _, _, value)| value);

        match gauge {
            Some(DebugValue::Gauge(v)) => assert_eq!(v.into_inner(), 42.0),
            other => panic!("expected gauge, got {:?}", other),
        }
    }
}
