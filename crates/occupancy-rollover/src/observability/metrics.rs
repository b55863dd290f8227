//! Metrics definitions for the occupancy rollover.
//!
//! All metrics follow Prometheus naming conventions:
//! - `rollover_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `trigger`: 2 values (manual, scheduled)
//! - `status`: bounded by `RolloverError::error_type` plus `success`
//! - `operation`: bounded by code (find_assessments_by_date, create_snapshot, etc.)
//!
//! No recorder is installed here; the hosting application chooses the exporter.

use metrics::{counter, histogram};
use std::time::Duration;

// ============================================================================
// Rollover Run Metrics
// ============================================================================

/// Record a completed rollover attempt.
///
/// Metric: `rollover_runs_total`, `rollover_duration_seconds`
/// Labels: `trigger`, `status`
pub fn record_rollover(trigger: &str, status: &str, duration: Duration) {
    histogram!("rollover_duration_seconds",
        "trigger" => trigger.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("rollover_runs_total",
        "trigger" => trigger.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record snapshots written to occupancy history.
///
/// Metric: `rollover_snapshots_created_total`
pub fn record_snapshots_created(count: u64) {
    counter!("rollover_snapshots_created_total").increment(count);
}

// ============================================================================
// Database Metrics
// ============================================================================

/// Record a database query.
///
/// Metric: `rollover_db_queries_total`, `rollover_db_query_duration_seconds`
/// Labels: `operation`, `status`
pub fn record_db_query(operation: &str, status: &str, duration: Duration) {
    histogram!("rollover_db_query_duration_seconds",
        "operation" => operation.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("rollover_db_queries_total",
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Status label for a query result.
pub fn query_status<T, E>(result: &Result<T, E>) -> &'static str {
    if result.is_ok() {
        "success"
    } else {
        "error"
    }
}
