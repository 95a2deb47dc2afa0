//! The order book: two price-indexed ladders, an order index, and the
//! pegged-order set. Exclusively owned by the matching worker thread — no
//! lock protects it because no other thread ever touches it.

mod level;

pub use level::PriceLevel;

use crate::order::{Order, RestingOrder};
use crate::types::{OrderId, Price, Quantity, Side};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Where a resting order currently lives, for O(log n) cancellation.
#[derive(Debug, Clone, Copy)]
struct OrderLocation {
    side: Side,
    price: Price,
}

pub struct OrderBook {
    pub symbol: String,
    /// Keyed ascending; best bid is the maximum key (`.next_back()`).
    bids: BTreeMap<Price, PriceLevel>,
    /// Keyed ascending; best ask is the minimum key (`.next()`).
    asks: BTreeMap<Price, PriceLevel>,
    index: HashMap<OrderId, OrderLocation>,
    pegged: HashSet<OrderId>,
    next_sequence: u64,
    pub last_trade_price: Option<Price>,
}

impl OrderBook {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            index: HashMap::new(),
            pegged: HashSet::new(),
            next_sequence: 0,
            last_trade_price: None,
        }
    }

    fn ladder(&self, side: Side) -> &BTreeMap<Price, PriceLevel> {
        match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        }
    }

    fn ladder_mut(&mut self, side: Side) -> &mut BTreeMap<Price, PriceLevel> {
        match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        }
    }

    pub fn bids(&self) -> &BTreeMap<Price, PriceLevel> {
        &self.bids
    }

    pub fn asks(&self) -> &BTreeMap<Price, PriceLevel> {
        &self.asks
    }

    pub fn best_bid(&self) -> Option<(Price, &PriceLevel)> {
        self.bids.iter().next_back().map(|(p, l)| (*p, l))
    }

    pub fn best_ask(&self) -> Option<(Price, &PriceLevel)> {
        self.asks.iter().next().map(|(p, l)| (*p, l))
    }

    pub fn best_bid_price(&self) -> Option<Price> {
        self.bids.keys().next_back().copied()
    }

    pub fn best_ask_price(&self) -> Option<Price> {
        self.asks.keys().next().copied()
    }

    pub(crate) fn next_sequence(&mut self) -> u64 {
        let seq = self.next_sequence;
        self.next_sequence += 1;
        seq
    }

    /// Insert a freshly-submitted `Order` as a new resting order. Used for
    /// first-time admission only; residual/refresh/reprice re-insertion goes
    /// through [`Self::insert_resting`] so the fresh-`sequence` rule is
    /// applied uniformly.
    pub fn insert_new(&mut self, order: &Order) -> OrderId {
        let seq = self.next_sequence();
        let resting = RestingOrder::from_order(order, seq);
        self.insert_resting(resting)
    }

    /// Insert a `RestingOrder` at the tail of its price level, assigning a
    /// fresh `sequence` (this is what "loses priority" for iceberg refresh
    /// and peg reprice: callers must NOT reuse the old sequence).
    pub fn insert_resting(&mut self, mut resting: RestingOrder) -> OrderId {
        resting.sequence = self.next_sequence();
        let id = resting.order_id;
        let side = resting.side;
        let price = resting.price;
        if resting.is_pegged() {
            self.pegged.insert(id);
        }
        self.index.insert(id, OrderLocation { side, price });
        self.ladder_mut(side)
            .entry(price)
            .or_insert_with(|| PriceLevel::new(price))
            .push_back(resting);
        id
    }

    /// Remove a resting order by id, dropping its level if it becomes empty.
    /// Cancels always succeed regardless of market status.
    pub fn remove(&mut self, order_id: OrderId) -> Option<RestingOrder> {
        let loc = self.index.remove(&order_id)?;
        self.pegged.remove(&order_id);
        let ladder = self.ladder_mut(loc.side);
        let level = ladder.get_mut(&loc.price)?;
        let removed = level.remove(order_id);
        if level.is_empty() {
            ladder.remove(&loc.price);
        }
        removed
    }

    pub fn contains(&self, order_id: OrderId) -> bool {
        self.index.contains_key(&order_id)
    }

    /// Look up a resting order without removing it.
    pub fn peek(&self, order_id: OrderId) -> Option<&RestingOrder> {
        let loc = self.index.get(&order_id)?;
        self.ladder(loc.side).get(&loc.price)?.iter().find(|o| o.order_id == order_id)
    }

    /// Mutable access to one side's ladder, for the matching worker only.
    pub(crate) fn ladder_for_side_mut(&mut self, side: Side) -> &mut BTreeMap<Price, PriceLevel> {
        self.ladder_mut(side)
    }

    /// Both ladders mutably at once, as disjoint field borrows — needed by
    /// the call auction, which matches buy and sell orders against each
    /// other in the same step.
    pub(crate) fn both_ladders_mut(&mut self) -> (&mut BTreeMap<Price, PriceLevel>, &mut BTreeMap<Price, PriceLevel>) {
        (&mut self.bids, &mut self.asks)
    }

    /// Drop the index/pegged-set bookkeeping for a fully-filled maker. The
    /// level itself must already have been popped by the caller.
    pub(crate) fn forget_order(&mut self, order_id: OrderId) {
        self.index.remove(&order_id);
        self.pegged.remove(&order_id);
    }

    /// Drop an empty level at `price` on `side`, if present.
    pub(crate) fn prune_if_empty(&mut self, side: Side, price: Price) {
        let ladder = self.ladder_mut(side);
        if ladder.get(&price).map(|l| l.is_empty()).unwrap_or(false) {
            ladder.remove(&price);
        }
    }

    pub fn pegged_ids(&self) -> Vec<OrderId> {
        self.pegged.iter().copied().collect()
    }

    pub fn is_pegged(&self, order_id: OrderId) -> bool {
        self.pegged.contains(&order_id)
    }

    /// Up to `depth` `(price, visible_quantity)` pairs in priority order.
    pub fn aggregate_depth(&self, side: Side, depth: usize) -> Vec<(Price, Quantity)> {
        match side {
            Side::Buy => self
                .bids
                .iter()
                .rev()
                .take(depth)
                .map(|(p, l)| (*p, l.visible_quantity()))
                .collect(),
            Side::Sell => self
                .asks
                .iter()
                .take(depth)
                .map(|(p, l)| (*p, l.visible_quantity()))
                .collect(),
        }
    }

    /// True if the best bid has reached or passed the best ask. The matching
    /// worker never leaves the book in this state between tasks.
    pub fn is_crossed(&self) -> bool {
        match (self.best_bid_price(), self.best_ask_price()) {
            (Some(bid), Some(ask)) => bid >= ask,
            _ => false,
        }
    }

    pub fn order_count(&self) -> usize {
        self.index.len()
    }

    /// Sum of `remaining_qty` across the whole book — used by the invariant
    /// test that checks quantity conservation.
    pub fn total_resting_quantity(&self) -> Quantity {
        self.bids
            .values()
            .chain(self.asks.values())
            .fold(Quantity::zero(), |acc, l| acc + l.total_quantity())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::Order;
    use crate::types::{Condition, OrderFlags, Peg, TimeInForce, UserId};
    use rust_decimal::Decimal;

    fn order(side: Side, price: i64, qty: i64) -> Order {
        Order {
            order_id: OrderId::new(),
            symbol: "BTC/USD".into(),
            side,
            price: Price::new(Decimal::from(price)),
            quantity: Quantity::new(Decimal::from(qty)),
            user_id: UserId(uuid::Uuid::new_v4()),
            tif: TimeInForce::Gtc,
            condition: Condition::None,
            flags: OrderFlags::empty(),
            display_qty: Quantity::new(Decimal::from(qty)),
            peg: Peg::None,
            submitted_at: 0,
        }
    }

    #[test]
    fn insert_then_cancel_restores_prior_state() {
        let mut book = OrderBook::new("BTC/USD");
        assert!(book.best_bid().is_none());

        let o = order(Side::Buy, 100, 10);
        let id = book.insert_new(&o);
        assert_eq!(book.order_count(), 1);
        assert_eq!(book.best_bid_price(), Some(Price::new(Decimal::from(100))));

        book.remove(id);
        assert_eq!(book.order_count(), 0);
        assert!(book.best_bid().is_none());
    }

    #[test]
    fn levels_are_fifo_by_insertion() {
        let mut book = OrderBook::new("BTC/USD");
        let a = order(Side::Sell, 100, 5);
        let b = order(Side::Sell, 100, 5);
        book.insert_new(&a);
        book.insert_new(&b);

        let (_, level) = book.best_ask().unwrap();
        let ids: Vec<_> = level.iter().map(|o| o.order_id).collect();
        assert_eq!(ids, vec![a.order_id, b.order_id]);
    }

    #[test]
    fn empty_level_is_removed() {
        let mut book = OrderBook::new("BTC/USD");
        let o = order(Side::Sell, 100, 5);
        let id = book.insert_new(&o);
        book.remove(id);
        assert!(book.asks().is_empty());
    }

    #[test]
    fn never_crossed_when_disjoint() {
        let mut book = OrderBook::new("BTC/USD");
        book.insert_new(&order(Side::Buy, 99, 1));
        book.insert_new(&order(Side::Sell, 100, 1));
        assert!(!book.is_crossed());
    }
}
