//! Shared metrics recording for storage engines.

use crate::Result;
use std::time::Instant;

/// Records `storage_operations_total` and `storage_operation_duration_ms`
/// for one engine call.
pub fn record_operation_metrics(
    backend: &'static str,
    operation: &'static str,
    start: Instant,
    status: &'static str,
) {
    metrics::counter!(
        "storage_operations_total",
        "backend" => backend,
        "operation" => operation,
        "status" => status
    )
    .increment(1);
    metrics::histogram!(
        "storage_operation_duration_ms",
        "backend" => backend,
        "operation" => operation,
        "status" => status
    )
    .record(start.elapsed().as_secs_f64() * 1000.0);
}

/// Records metrics for a finished operation and passes the result through.
pub fn observe<T>(
    backend: &'static str,
    operation: &'static str,
    start: Instant,
    result: Result<T>,
) -> Result<T> {
    let status = if result.is_ok() { "success" } else { "error" };
    record_operation_metrics(backend, operation, start, status);
    result
}
