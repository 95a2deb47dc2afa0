//! Error taxonomy: validation (returned to caller, no state change), fatal
//! (halts the engine), and the `EngineError` that unifies both.
//!
//! Admission-kind rejections (queue-full, market-closed, ...) are *not*
//! errors — they are `MatchStatus` values inside a successful `MatchResult`.
//! An `EngineError` only ever represents something that halts the engine.

use crate::types::{OrderId, Price, Quantity};
use thiserror::Error;

/// Rejected before ever reaching the sequencer: malformed input. No book
/// state changes as a result of a validation error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("quantity must be strictly positive, got {quantity}")]
    NonPositiveQuantity { quantity: Quantity },

    #[error("price must be strictly positive, got {price}")]
    NonPositivePrice { price: Price },

    #[error("iceberg display_qty {display_qty} exceeds quantity {quantity}")]
    DisplayQtyExceedsQuantity {
        display_qty: Quantity,
        quantity: Quantity,
    },

    #[error("fill-or-kill orders cannot also be post-only")]
    FokPostOnlyConflict,

    #[error("pegged orders require a non-negative offset, got {offset}")]
    InvalidPegOffset { offset: Price },

    #[error("order {order_id} submitted for symbol {got}, but this engine serves {expected}")]
    SymbolMismatch {
        order_id: OrderId,
        expected: String,
        got: String,
    },
}

/// Fatal conditions: post-match commit failure, or an invariant violation
/// detected after a match (e.g. a crossed book). Both halt the engine and
/// are never returned in-band to a submitting caller — the caller's next
/// submit observes `MatchStatus::RejectedEngineHalted`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EngineError {
    #[error("order validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("post-match commit failed, engine halted: {0}")]
    Commit(#[from] crate::committer::CommitError),

    #[error("invariant violation detected, engine halted: {0}")]
    InvariantViolation(String),
}
