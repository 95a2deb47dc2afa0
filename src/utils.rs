//! Small time helpers. Wall clocks can run backward, so these are used only
//! for display and audit fields; the monotonic per-book sequence counter is
//! the sole authority for time priority.

use std::time::{SystemTime, UNIX_EPOCH};

/// Nanoseconds since the Unix epoch, for `Order::submitted_at` and
/// `Trade::executed_at`. Not used for ordering — only for display/audit.
pub fn current_time_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

/// Milliseconds since the Unix epoch, for snapshot timestamps.
pub fn current_time_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
