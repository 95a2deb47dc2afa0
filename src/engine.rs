//! The façade a transport layer embeds: owns the sequencer's producer
//! handle and the matching worker thread, validates admission-time
//! invariants that don't need the book, and turns task outcomes back into
//! public result types.

use crate::committer::{ClearingDispatcher, InMemorySink, NullDispatcher, TransactionalSink};
use crate::config::EngineConfig;
use crate::error::{EngineError, ValidationError};
use crate::matching::Core;
use crate::order::Order;
use crate::recovery::{recover, ActiveOrderSource, RecoveryError};
use crate::sequencer::{self, MatchTask, TaskOutcome, TaskQueue};
use crate::snapshot::OrderBookSnapshot;
use crate::trade::{AuctionResult, CancelResult, MatchResult, MatchStatus};
use crate::types::{MarketStatus, OrderId, Price};
use crate::worker::{self, WorkerHandle};
use std::sync::Arc;

pub struct Engine {
    queue: TaskQueue,
    worker: WorkerHandle,
    symbol: String,
}

impl Engine {
    /// A fresh engine with an in-memory trade sink and no clearing
    /// dispatch — suitable for embedding tests and examples.
    pub fn new(config: EngineConfig) -> Self {
        Self::with_sink(config, Arc::new(InMemorySink::new()), Arc::new(NullDispatcher))
    }

    pub fn with_sink(config: EngineConfig, sink: Arc<dyn TransactionalSink>, dispatcher: Arc<dyn ClearingDispatcher>) -> Self {
        let symbol = config.symbol.clone();
        let (queue, receiver) = sequencer::bounded(config.queue_capacity);
        let core = Core::new(config);
        let worker = worker::spawn(core, receiver, sink, dispatcher);
        Self { queue, worker, symbol }
    }

    /// Construct an engine whose book is rebuilt from `source` before the
    /// worker thread ever accepts live traffic.
    pub fn recovered(
        config: EngineConfig,
        sink: Arc<dyn TransactionalSink>,
        dispatcher: Arc<dyn ClearingDispatcher>,
        source: &dyn ActiveOrderSource,
    ) -> Result<Self, RecoveryError> {
        let symbol = config.symbol.clone();
        let (queue, receiver) = sequencer::bounded(config.queue_capacity);
        let mut core = Core::new(config);
        recover(&mut core, source)?;
        let worker = worker::spawn(core, receiver, sink, dispatcher);
        Ok(Self { queue, worker, symbol })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn is_halted(&self) -> bool {
        self.worker.is_halted()
    }

    pub fn submit_order(&self, order: Order) -> Result<MatchResult, EngineError> {
        validate(&order, &self.symbol)?;
        let order_id = order.order_id;
        let quantity = order.quantity;
        match self.queue.try_submit(MatchTask::Submit(order)) {
            Ok(completion) => Ok(expect_submitted(completion, order_id)),
            Err(_) => Ok(MatchResult::rejected(order_id, MatchStatus::RejectedQueueFull, quantity)),
        }
    }

    pub fn cancel_order(&self, order_id: OrderId) -> CancelResult {
        match self.queue.try_submit(MatchTask::Cancel(order_id)) {
            Ok(completion) => match completion.blocking_recv() {
                Ok(TaskOutcome::Cancelled(result)) => result,
                _ => CancelResult {
                    success: false,
                    status: crate::trade::CancelStatus::OrderNotFound,
                },
            },
            Err(_) => CancelResult {
                success: false,
                status: crate::trade::CancelStatus::OrderNotFound,
            },
        }
    }

    pub fn run_auction(&self) -> Option<AuctionResult> {
        let completion = self.queue.try_submit(MatchTask::RunAuction).ok()?;
        match completion.blocking_recv() {
            Ok(TaskOutcome::Auctioned(result)) => Some(result),
            _ => None,
        }
    }

    pub fn snapshot(&self, depth: usize) -> Option<OrderBookSnapshot> {
        let completion = self.queue.try_submit(MatchTask::Snapshot { depth }).ok()?;
        match completion.blocking_recv() {
            Ok(TaskOutcome::Snapshot(snap)) => Some(snap),
            _ => None,
        }
    }

    pub fn halt(&self) {
        let _ = self.queue.try_submit(MatchTask::Halt).map(|c| c.blocking_recv());
    }

    pub fn resume(&self) {
        let _ = self.queue.try_submit(MatchTask::Resume).map(|c| c.blocking_recv());
    }

    pub fn set_status(&self, status: MarketStatus) {
        let _ = self.queue.try_submit(MatchTask::SetStatus(status)).map(|c| c.blocking_recv());
    }

    pub fn set_base_price(&self, price: Price) {
        let _ = self.queue.try_submit(MatchTask::SetBasePrice(price)).map(|c| c.blocking_recv());
    }
}

fn expect_submitted(completion: tokio::sync::oneshot::Receiver<TaskOutcome>, order_id: OrderId) -> MatchResult {
    match completion.blocking_recv() {
        Ok(TaskOutcome::Submitted(result)) => result,
        _ => MatchResult::rejected(order_id, MatchStatus::RejectedEngineHalted, crate::types::Quantity::zero()),
    }
}

fn validate(order: &Order, symbol: &str) -> Result<(), ValidationError> {
    if order.symbol != symbol {
        return Err(ValidationError::SymbolMismatch {
            order_id: order.order_id,
            expected: symbol.to_string(),
            got: order.symbol.clone(),
        });
    }
    if !order.quantity.is_positive() {
        return Err(ValidationError::NonPositiveQuantity { quantity: order.quantity });
    }
    if !order.price.is_positive() {
        return Err(ValidationError::NonPositivePrice { price: order.price });
    }
    if order.is_iceberg() && order.display_qty.0 > order.quantity.0 {
        return Err(ValidationError::DisplayQtyExceedsQuantity {
            display_qty: order.display_qty,
            quantity: order.quantity,
        });
    }
    if order.tif == crate::types::TimeInForce::Fok && order.is_post_only() {
        return Err(ValidationError::FokPostOnlyConflict);
    }
    let offset = match order.peg {
        crate::types::Peg::BestBid(offset) | crate::types::Peg::BestAsk(offset) => Some(offset),
        _ => None,
    };
    if let Some(offset) = offset {
        if offset.0.is_sign_negative() {
            return Err(ValidationError::InvalidPegOffset { offset });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Condition, OrderFlags, Peg, Side, TimeInForce, Quantity, UserId};
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn order(symbol: &str, price: i64, qty: i64) -> Order {
        Order {
            order_id: OrderId::new(),
            symbol: symbol.into(),
            side: Side::Buy,
            price: Price::new(Decimal::from(price)),
            quantity: Quantity::new(Decimal::from(qty)),
            user_id: UserId(Uuid::new_v4()),
            tif: TimeInForce::Gtc,
            condition: Condition::None,
            flags: OrderFlags::empty(),
            display_qty: Quantity::new(Decimal::from(qty)),
            peg: Peg::None,
            submitted_at: 0,
        }
    }

    #[test]
    fn rejects_symbol_mismatch_before_reaching_the_queue() {
        let engine = Engine::new(EngineConfig::new("BTC/USD"));
        let result = engine.submit_order(order("ETH/USD", 100, 1));
        assert!(matches!(result, Err(EngineError::Validation(ValidationError::SymbolMismatch { .. }))));
    }

    #[test]
    fn trading_round_trip() {
        let engine = Engine::new(EngineConfig::new("BTC/USD"));
        engine.set_status(MarketStatus::Trading);
        engine.submit_order(order("BTC/USD", 100, 10)).unwrap();
        let mut taker = order("BTC/USD", 100, 4);
        taker.side = Side::Sell;
        let result = engine.submit_order(taker).unwrap();
        assert_eq!(result.status, MatchStatus::Matched);
        assert_eq!(result.trades.len(), 1);
    }

    #[test]
    fn cancel_unknown_order_reports_not_found() {
        let engine = Engine::new(EngineConfig::new("BTC/USD"));
        let result = engine.cancel_order(OrderId::new());
        assert!(!result.success);
    }
}
