//! # CLOB Matching Engine
//!
//! A per-symbol central limit order book (CLOB) matching engine: one
//! [`Engine`] instance owns exactly one symbol's book, sequencer, and
//! post-match commit pipeline.
//!
//! ## Architecture
//!
//! - [`book`] — the price-ordered ladders and their invariants (C1).
//! - [`breaker`] — the tick-to-tick circuit breaker (C2).
//! - [`matching`] — the continuous matching algorithm and pre-match gates (C3).
//! - [`repricing`] — pegged order re-pricing, run before each match cycle.
//! - [`auction`] — the single-price call auction.
//! - [`sequencer`] — the bounded MPSC task queue (C4).
//! - [`worker`] — the single OS thread that owns the book exclusively.
//! - [`committer`] — transactional trade persistence + outbox handoff (C5).
//! - [`metrics`] — counters for orders, trades, commit failures and halts (feature `metrics`).
//! - [`snapshot`] — the read-replica depth snapshot contract.
//! - [`recovery`] — deterministic replay from an external active-order source (C6).
//! - [`engine`] — the façade transport adapters call into.
//!
//! Only `engine::Engine` is meant to be embedded by a transport layer; the
//! other modules are `pub` so downstream crates can unit test against the
//! same types the engine uses internally.

pub mod auction;
pub mod book;
pub mod breaker;
pub mod committer;
pub mod config;
pub mod engine;
pub mod error;
pub mod matching;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod order;
pub mod prelude;
pub mod recovery;
pub mod repricing;
pub mod sequencer;
pub mod snapshot;
pub mod trade;
pub mod types;
mod utils;
pub mod worker;

pub use engine::Engine;
pub use error::{EngineError, ValidationError};
pub use order::{Order, RestingOrder};
pub use trade::{MatchResult, MatchStatus, Trade};
pub use types::{Condition, MarketStatus, OrderFlags, OrderId, Peg, Price, Quantity, Side, TimeInForce, TradeId, UserId};
