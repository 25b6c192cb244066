// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for docgrid.
//!
//! Uses the `metrics` crate for backend-agnostic metrics collection.
//! The embedding application is responsible for choosing the exporter.
//!
//! # Metric Naming Convention
//! - `docgrid_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Labels
//! - `compiler`: schema, query, filter
//! - `operation`: append, insert_after, delete_at, read, ...
//! - `status`: success, error

use metrics::{counter, gauge, histogram};
use std::time::{Duration, Instant};

fn status(success: bool) -> &'static str {
    if success { "success" } else { "error" }
}

/// Record a compile attempt (schema, query or filter)
pub fn record_compile(compiler: &str, success: bool) {
    counter!(
        "docgrid_compile_total",
        "compiler" => compiler.to_string(),
        "status" => status(success)
    )
    .increment(1);
}

/// Record a grid operation
pub fn record_grid_operation(operation: &str, success: bool) {
    counter!(
        "docgrid_grid_operations_total",
        "operation" => operation.to_string(),
        "status" => status(success)
    )
    .increment(1);
}

/// Record grid operation latency
pub fn record_grid_latency(operation: &str, duration: Duration) {
    histogram!(
        "docgrid_grid_operation_seconds",
        "operation" => operation.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Record rows touched by a reindex transaction (insert-after / delete-at)
pub fn record_reindex_shift(operation: &str, rows: usize) {
    histogram!(
        "docgrid_reindex_shift_rows",
        "operation" => operation.to_string()
    )
    .record(rows as f64);
}

/// Set the current row count of a grid
pub fn set_grid_rows(grid: &str, rows: u64) {
    gauge!(
        "docgrid_grid_rows",
        "grid" => grid.to_string()
    )
    .set(rows as f64);
}

/// Record a delete/update that affected a different row count than expected
pub fn record_storage_inconsistency(operation: &str) {
    counter!(
        "docgrid_storage_inconsistencies_total",
        "operation" => operation.to_string()
    )
    .increment(1);
}

// ═══════════════════════════════════════════════════════════════════════════
// SEARCH - Query, aggregate and index operations
// ═══════════════════════════════════════════════════════════════════════════

/// Record a search or aggregate query
pub fn record_search_query(kind: &str, success: bool) {
    counter!(
        "docgrid_search_queries_total",
        "kind" => kind.to_string(),
        "status" => status(success)
    )
    .increment(1);
}

/// Record search latency
pub fn record_search_latency(kind: &str, duration: Duration) {
    histogram!(
        "docgrid_search_seconds",
        "kind" => kind.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Record search result count
pub fn record_search_results(count: usize) {
    histogram!("docgrid_search_results").record(count as f64);
}

/// Record index operation (create, drop, skip)
pub fn record_index_operation(operation: &str, success: bool) {
    counter!(
        "docgrid_index_operations_total",
        "operation" => operation.to_string(),
        "status" => status(success)
    )
    .increment(1);
}

/// Record a lease lock outcome (acquired, timeout, released, lost)
pub fn record_lock(outcome: &str) {
    counter!(
        "docgrid_lock_total",
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// A timing guard that records grid latency on drop
pub struct LatencyTimer {
    operation: &'static str,
    start: Instant,
}

impl LatencyTimer {
    /// Start a new latency timer
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            start: Instant::now(),
        }
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        record_grid_latency(self.operation, self.start.elapsed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_util::debugging::{DebugValue, DebuggingRecorder};

    #[test]
    fn test_record_functions_without_recorder() {
        record_compile("query", true);
        record_grid_operation("append", false);
        record_grid_latency("read", Duration::from_micros(100));
        record_reindex_shift("insert_after", 3);
        set_grid_rows("people", 42);
        record_storage_inconsistency("delete_at");
        record_search_query("search", true);
        record_search_latency("aggregate", Duration::from_millis(2));
        record_search_results(0);
        record_index_operation("create", true);
        record_lock("timeout");
    }

    #[test]
    fn test_counter_is_labelled() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            record_storage_inconsistency("delete_at");
            record_storage_inconsistency("delete_at");
        });

        let snapshot = snapshotter.snapshot().into_vec();
        let (key, _, _, value) = snapshot
            .iter()
            .find(|(k, _, _, _)| k.key().name() == "docgrid_storage_inconsistencies_total")
            .unwrap();
        assert!(key.key().labels().any(|l| l.key() == "operation" && l.value() == "delete_at"));
        assert_eq!(*value, DebugValue::Counter(2));
    }

    #[test]
    fn test_latency_timer() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            let _timer = LatencyTimer::new("append");
            std::thread::sleep(Duration::from_micros(10));
        });

        let snapshot = snapshotter.snapshot().into_vec();
        assert!(snapshot
            .iter()
            .any(|(k, _, _, _)| k.key().name() == "docgrid_grid_operation_seconds"));
    }
}
