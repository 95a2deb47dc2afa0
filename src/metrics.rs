//! Optional counters for the matching worker, emitted via the `metrics`
//! facade so any recorder (Prometheus, statsd, ...) the host process installs
//! picks them up. Compiled in only under the `metrics` feature; every call
//! site in [`crate::worker`] is a single `cfg`-gated function call.

use metrics::counter;

/// Metric names.
pub mod names {
    pub const ORDERS_SUBMITTED_TOTAL: &str = "clob_engine_orders_submitted_total";
    pub const TRADES_COMMITTED_TOTAL: &str = "clob_engine_trades_committed_total";
    pub const COMMIT_FAILURES_TOTAL: &str = "clob_engine_commit_failures_total";
    pub const HALTS_TOTAL: &str = "clob_engine_halts_total";
}

/// Label keys.
pub mod labels {
    pub const STATUS: &str = "status";
}

/// One order finished admission/matching with `status`.
pub fn record_order_submitted(status: &'static str) {
    counter!(names::ORDERS_SUBMITTED_TOTAL, labels::STATUS => status).increment(1);
}

/// A batch of `count` trades was durably committed.
pub fn record_trades_committed(count: usize) {
    counter!(names::TRADES_COMMITTED_TOTAL).increment(count as u64);
}

/// A commit to the transactional sink failed.
pub fn record_commit_failure() {
    counter!(names::COMMIT_FAILURES_TOTAL).increment(1);
}

/// The engine halted, whether from a breaker trip or a commit failure.
pub fn record_halt() {
    counter!(names::HALTS_TOTAL).increment(1);
}
