//! Errors raised by the sequencer's admission path.

use thiserror::Error;

/// Returned when the bounded task queue cannot accept another task because
/// the matching worker is not draining it fast enough.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("task queue is full")]
pub struct QueueFullError;
