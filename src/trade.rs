//! Trade and match-result output types.

use crate::types::{OrderId, Price, Quantity, TradeId, UserId};
use serde::{Deserialize, Serialize};

/// A single executed trade. Immutable once returned from a match function;
/// only the committer (C5) may act on it further, by persisting it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    pub trade_id: TradeId,
    pub symbol: String,
    pub buy_order_id: OrderId,
    pub sell_order_id: OrderId,
    pub buy_user_id: UserId,
    pub sell_user_id: UserId,
    /// The maker's (resting order's) price, not the taker's limit.
    pub price: Price,
    pub quantity: Quantity,
    /// Nanoseconds since the Unix epoch.
    pub executed_at: u64,
}

/// The terminal or interim status of a submitted order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchStatus {
    Matched,
    PartiallyMatched,
    New,
    CancelledFakRemainder,
    CancelledFokNotFilled,
    RejectedAonInsufficient,
    RejectedPostOnly,
    RejectedPriceOutOfCage,
    RejectedMarketClosed,
    RejectedQueueFull,
    RejectedEngineHalted,
}

impl MatchStatus {
    /// Admission/validation rejections never mutate book state.
    pub fn is_rejection(self) -> bool {
        matches!(
            self,
            MatchStatus::CancelledFokNotFilled
                | MatchStatus::RejectedAonInsufficient
                | MatchStatus::RejectedPostOnly
                | MatchStatus::RejectedPriceOutOfCage
                | MatchStatus::RejectedMarketClosed
                | MatchStatus::RejectedQueueFull
                | MatchStatus::RejectedEngineHalted
        )
    }

    /// Stable label for this status, for metrics and structured logging.
    pub fn as_str(self) -> &'static str {
        match self {
            MatchStatus::Matched => "matched",
            MatchStatus::PartiallyMatched => "partially_matched",
            MatchStatus::New => "new",
            MatchStatus::CancelledFakRemainder => "cancelled_fak_remainder",
            MatchStatus::CancelledFokNotFilled => "cancelled_fok_not_filled",
            MatchStatus::RejectedAonInsufficient => "rejected_aon_insufficient",
            MatchStatus::RejectedPostOnly => "rejected_post_only",
            MatchStatus::RejectedPriceOutOfCage => "rejected_price_out_of_cage",
            MatchStatus::RejectedMarketClosed => "rejected_market_closed",
            MatchStatus::RejectedQueueFull => "rejected_queue_full",
            MatchStatus::RejectedEngineHalted => "rejected_engine_halted",
        }
    }
}

/// The result of submitting a single order to the matching worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub order_id: OrderId,
    pub trades: Vec<Trade>,
    pub remaining_quantity: Quantity,
    pub status: MatchStatus,
}

impl MatchResult {
    pub fn rejected(order_id: OrderId, status: MatchStatus, remaining_quantity: Quantity) -> Self {
        Self {
            order_id,
            trades: Vec::new(),
            remaining_quantity,
            status,
        }
    }
}

/// The result of a `CancelOrder` task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelResult {
    pub success: bool,
    pub status: CancelStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CancelStatus {
    Cancelled,
    OrderNotFound,
}

/// The result of running a call auction: every trade the equilibrium price
/// generated, plus the chosen price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionResult {
    pub equilibrium_price: Option<Price>,
    pub trades: Vec<Trade>,
}
