//! Convenience re-export for embedding crates: `use clob_engine::prelude::*;`
//! pulls in the engine façade, its configuration, and the value types every
//! call site needs.

pub use crate::config::EngineConfig;
pub use crate::engine::Engine;
pub use crate::error::{EngineError, ValidationError};
pub use crate::order::{Order, RestingOrder};
pub use crate::trade::{AuctionResult, CancelResult, CancelStatus, MatchResult, MatchStatus, Trade};
pub use crate::types::{
    Condition, MarketStatus, OrderFlags, OrderId, Peg, Price, Quantity, Side, TimeInForce, TradeId, UserId,
};
