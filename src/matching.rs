//! The single-threaded authority over the book: pre-match gates, continuous
//! matching, residual disposition, and cancel. Every mutation of the book
//! happens through [`Core`]; `Core` is only ever touched by the matching
//! worker thread.

use crate::book::OrderBook;
use crate::breaker::CircuitBreaker;
use crate::config::EngineConfig;
use crate::order::{Order, RestingOrder};
use crate::trade::{CancelResult, CancelStatus, MatchResult, MatchStatus, Trade};
use crate::types::{Condition, MarketStatus, OrderId, Price, Quantity, Side, TimeInForce};
use crate::utils::current_time_nanos;

/// Everything the worker owns exclusively: the book, the breaker, market
/// status, and the trade-id generator. Never shared across threads.
pub struct Core {
    pub(crate) book: OrderBook,
    pub(crate) breaker: CircuitBreaker,
    pub(crate) status: MarketStatus,
    pub(crate) config: EngineConfig,
    pub(crate) next_trade_id: u64,
}

impl Core {
    pub fn new(config: EngineConfig) -> Self {
        let breaker = CircuitBreaker::new(config.breaker_threshold_pct, config.breaker_cooldown);
        let symbol = config.symbol.clone();
        Self {
            book: OrderBook::new(symbol),
            breaker,
            status: MarketStatus::Init,
            config,
            next_trade_id: 0,
        }
    }

    /// Submit an order through the full pre-match-gate + matching pipeline.
    /// Returns the result for this order plus whether the breaker just
    /// tripped the engine into a halted state.
    pub fn submit(&mut self, order: Order) -> (MatchResult, bool) {
        // Gate 1: status. Orders may be admitted to the book during the
        // pre-open auction collection window as well as continuous trading;
        // a halted market rejects with a distinct status from a closed one,
        // since the caller needs to tell "try again later" apart from
        // "the engine tripped and needs intervention".
        if self.status == MarketStatus::Halted {
            return (
                MatchResult::rejected(order.order_id, MatchStatus::RejectedEngineHalted, order.quantity),
                false,
            );
        }
        if !matches!(self.status, MarketStatus::Trading | MarketStatus::Auction) {
            return (
                MatchResult::rejected(order.order_id, MatchStatus::RejectedMarketClosed, order.quantity),
                false,
            );
        }

        // During the auction collection window orders only ever rest; no
        // continuous matching happens until `run_auction` fires.
        if self.status == MarketStatus::Auction {
            let mut resting = RestingOrder::from_order(&order, 0);
            resting.remaining_qty = order.quantity;
            self.book.insert_resting(resting);
            return (
                MatchResult {
                    order_id: order.order_id,
                    trades: Vec::new(),
                    remaining_quantity: order.quantity,
                    status: MatchStatus::New,
                },
                false,
            );
        }

        // Gate 2: price cage.
        if let Some(last) = self.book.last_trade_price {
            if !last.0.is_zero() {
                let lo = last.0 * (rust_decimal::Decimal::ONE - self.config.price_cage_pct);
                let hi = last.0 * (rust_decimal::Decimal::ONE + self.config.price_cage_pct);
                if order.price.0 < lo || order.price.0 > hi {
                    return (
                        MatchResult::rejected(order.order_id, MatchStatus::RejectedPriceOutOfCage, order.quantity),
                        false,
                    );
                }
            }
        }

        // Gate 3: reprice pegged resting orders before matching begins.
        let mut side_trades = Vec::new();
        let reprice_halted = crate::repricing::reprice_pegged_orders(self, &mut side_trades);
        if reprice_halted {
            let mut result = MatchResult::rejected(order.order_id, MatchStatus::RejectedEngineHalted, order.quantity);
            result.trades = side_trades;
            return (result, true);
        }

        // Gate 4: FOK / AON probe.
        let opposite = order.side.opposite();
        let achievable = probe(&self.book, opposite, order.side, order.price, order.quantity);
        if order.tif == TimeInForce::Fok && achievable < order.quantity {
            let mut result = MatchResult::rejected(order.order_id, MatchStatus::CancelledFokNotFilled, order.quantity);
            result.trades = side_trades;
            return (result, false);
        }
        if order.condition == Condition::Aon && achievable < order.quantity {
            let mut result = MatchResult::rejected(order.order_id, MatchStatus::RejectedAonInsufficient, order.quantity);
            result.trades = side_trades;
            return (result, false);
        }

        // Gate 5: post-only.
        if order.is_post_only() && would_cross(&self.book, order.side, order.price) {
            let mut result = MatchResult::rejected(order.order_id, MatchStatus::RejectedPostOnly, order.quantity);
            result.trades = side_trades;
            return (result, false);
        }

        let (mut trades, remaining, breaker_tripped) = continuous_match(
            &mut self.book,
            &mut self.breaker,
            &self.config,
            order.side,
            order.order_id,
            order.user_id,
            order.quantity,
            order.price,
            &order.symbol,
            &mut self.next_trade_id,
        );

        if breaker_tripped {
            self.status = MarketStatus::Halted;
        }

        let mut all_trades = side_trades;
        all_trades.append(&mut trades);

        let status = if breaker_tripped {
            // Halt takes precedence: no residual disposition, the worker
            // stops processing further tasks anyway.
            if remaining < order.quantity {
                MatchStatus::PartiallyMatched
            } else {
                MatchStatus::RejectedEngineHalted
            }
        } else if remaining.is_zero() {
            MatchStatus::Matched
        } else if matches!(order.tif, TimeInForce::Fak | TimeInForce::Fok) {
            // Residual disposition: FAK/FOK never rest.
            MatchStatus::CancelledFakRemainder
        } else {
            // Residual disposition: insert the remainder.
            let mut resting = RestingOrder::from_order(&order, 0);
            resting.remaining_qty = remaining;
            resting.display_qty = if resting.is_iceberg() {
                resting.display_qty.min(remaining)
            } else {
                remaining
            };
            self.book.insert_resting(resting);
            if remaining < order.quantity {
                MatchStatus::PartiallyMatched
            } else {
                MatchStatus::New
            }
        };

        (
            MatchResult {
                order_id: order.order_id,
                trades: all_trades,
                remaining_quantity: remaining,
                status,
            },
            breaker_tripped,
        )
    }

    /// Cancel always succeeds regardless of market status.
    pub fn cancel(&mut self, order_id: OrderId) -> CancelResult {
        match self.book.remove(order_id) {
            Some(_) => CancelResult {
                success: true,
                status: CancelStatus::Cancelled,
            },
            None => CancelResult {
                success: false,
                status: CancelStatus::OrderNotFound,
            },
        }
    }
}

/// Would `price` immediately cross the opposite side?
pub(crate) fn would_cross(book: &OrderBook, side: Side, price: Price) -> bool {
    match side {
        Side::Buy => book.best_ask_price().map(|ask| price >= ask).unwrap_or(false),
        Side::Sell => book.best_bid_price().map(|bid| price <= bid).unwrap_or(false),
    }
}

/// Conservative FOK/AON probe: walks the opposite side without mutating
/// state, summing matchable quantity including hidden iceberg reserves. The
/// probe "sees through" refreshes because a taker that fully commits to
/// consuming a level will trigger every refresh it needs.
pub(crate) fn probe(book: &OrderBook, opposite: Side, _taker_side: Side, limit: Price, needed: Quantity) -> Quantity {
    let mut total = Quantity::zero();
    let levels: Box<dyn Iterator<Item = (&Price, &crate::book::PriceLevel)>> = match opposite {
        Side::Buy => Box::new(book.bids().iter().rev()),
        Side::Sell => Box::new(book.asks().iter()),
    };
    for (price, level) in levels {
        let satisfies = match opposite {
            Side::Buy => *price >= limit,
            Side::Sell => *price <= limit,
        };
        if !satisfies {
            break;
        }
        total = total + level.total_quantity();
        if total >= needed {
            break;
        }
    }
    total
}

/// The core continuous-matching walk shared by ordinary submission and
/// pegged-reprice resubmission.
#[allow(clippy::too_many_arguments)]
pub(crate) fn continuous_match(
    book: &mut OrderBook,
    breaker: &mut CircuitBreaker,
    config: &EngineConfig,
    taker_side: Side,
    taker_order_id: OrderId,
    taker_user_id: crate::types::UserId,
    mut remaining: Quantity,
    limit: Price,
    symbol: &str,
    next_trade_id: &mut u64,
) -> (Vec<Trade>, Quantity, bool) {
    let mut trades = Vec::new();
    let opposite = taker_side.opposite();
    let mut breaker_tripped = false;

    'levels: loop {
        if remaining.is_zero() {
            break;
        }
        let best_price = match opposite {
            Side::Buy => book.best_bid_price(),
            Side::Sell => book.best_ask_price(),
        };
        let Some(price) = best_price else { break };
        let satisfies = match taker_side {
            Side::Buy => price <= limit,
            Side::Sell => price >= limit,
        };
        if !satisfies {
            break;
        }

        loop {
            if remaining.is_zero() {
                break;
            }
            let ladder = book.ladder_for_side_mut(opposite);
            let Some(level) = ladder.get_mut(&price) else { break };
            let Some(maker) = level.front_mut() else { break };

            let match_qty = remaining.min(maker.available_qty());
            if !breaker.check_price(maker.price) {
                breaker_tripped = true;
                break 'levels;
            }

            let (buy_order_id, sell_order_id, buy_user_id, sell_user_id) = match taker_side {
                Side::Buy => (taker_order_id, maker.order_id, taker_user_id, maker.user_id),
                Side::Sell => (maker.order_id, taker_order_id, maker.user_id, taker_user_id),
            };
            let trade_id = *next_trade_id;
            *next_trade_id += 1;
            trades.push(Trade {
                trade_id: crate::types::TradeId(trade_id),
                symbol: symbol.to_string(),
                buy_order_id,
                sell_order_id,
                buy_user_id,
                sell_user_id,
                price: maker.price,
                quantity: match_qty,
                executed_at: current_time_nanos(),
            });

            maker.remaining_qty = maker.remaining_qty - match_qty;
            maker.display_qty = maker.display_qty - match_qty;
            remaining = remaining - match_qty;
            let last_trade_price = maker.price;

            let maker_id = maker.order_id;
            let maker_is_iceberg = maker.is_iceberg();
            let maker_exhausted_display = maker.display_qty.is_zero();
            let maker_hidden = maker.hidden_qty;
            let maker_fully_filled = maker.remaining_qty.is_zero();

            if maker_fully_filled {
                level.pop_front();
                book.forget_order(maker_id);
                book.prune_if_empty(opposite, price);
            } else if maker_is_iceberg && maker_exhausted_display && maker_hidden.is_positive() {
                let mut refreshed = level.pop_front().expect("front just matched");
                book.prune_if_empty(opposite, price);
                let refresh_size = refresh_quantity(config, refreshed.original_quantity, refreshed.hidden_qty);
                refreshed.display_qty = refresh_size;
                refreshed.hidden_qty = refreshed.hidden_qty - refresh_size;
                // Refreshing loses time priority: reinsert at the tail with
                // a fresh sequence.
                book.insert_resting(refreshed);
            }
            book.last_trade_price = Some(last_trade_price);
        }
    }

    (trades, remaining, breaker_tripped)
}

/// `min(hidden_qty, max(original_quantity * refresh_fraction, 1))`.
pub(crate) fn refresh_quantity(config: &EngineConfig, original_quantity: Quantity, hidden_qty: Quantity) -> Quantity {
    let floor = Quantity::new(rust_decimal::Decimal::ONE);
    let fraction = Quantity::new(original_quantity.0 * config.iceberg_refresh_fraction);
    hidden_qty.min(fraction.max_or(floor))
}

impl Quantity {
    fn max_or(self, floor: Quantity) -> Quantity {
        if self.0 > floor.0 { self } else { floor }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{OrderFlags, Peg, UserId};
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn cfg() -> EngineConfig {
        EngineConfig::new("BTC/USD")
    }

    fn mk_order(side: Side, price: i64, qty: i64, tif: TimeInForce) -> Order {
        Order {
            order_id: OrderId::new(),
            symbol: "BTC/USD".into(),
            side,
            price: Price::new(Decimal::from(price)),
            quantity: Quantity::new(Decimal::from(qty)),
            user_id: UserId(Uuid::new_v4()),
            tif,
            condition: Condition::None,
            flags: OrderFlags::empty(),
            display_qty: Quantity::new(Decimal::from(qty)),
            peg: Peg::None,
            submitted_at: 0,
        }
    }

    fn trading_core() -> Core {
        let mut core = Core::new(cfg());
        core.status = MarketStatus::Trading;
        core
    }

    #[test]
    fn simple_cross() {
        let mut core = trading_core();
        core.submit(mk_order(Side::Sell, 100, 10, TimeInForce::Gtc));
        let (result, halted) = core.submit(mk_order(Side::Buy, 101, 6, TimeInForce::Gtc));
        assert!(!halted);
        assert_eq!(result.status, MatchStatus::Matched);
        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.trades[0].price, Price::new(Decimal::from(100)));
        assert_eq!(result.trades[0].quantity, Quantity::new(Decimal::from(6)));
        assert_eq!(core.book.best_ask_price(), Some(Price::new(Decimal::from(100))));
        assert_eq!(core.book.best_bid().is_none(), true);
    }

    #[test]
    fn price_time_priority() {
        let mut core = trading_core();
        let a = mk_order(Side::Sell, 100, 5, TimeInForce::Gtc);
        let b = mk_order(Side::Sell, 100, 5, TimeInForce::Gtc);
        core.submit(a.clone());
        core.submit(b.clone());
        let (result, _) = core.submit(mk_order(Side::Buy, 100, 7, TimeInForce::Gtc));
        assert_eq!(result.trades.len(), 2);
        assert_eq!(result.trades[0].sell_order_id, a.order_id);
        assert_eq!(result.trades[0].quantity, Quantity::new(Decimal::from(5)));
        assert_eq!(result.trades[1].sell_order_id, b.order_id);
        assert_eq!(result.trades[1].quantity, Quantity::new(Decimal::from(2)));
    }

    #[test]
    fn fok_failure_leaves_book_unchanged() {
        let mut core = trading_core();
        core.submit(mk_order(Side::Sell, 100, 10, TimeInForce::Gtc));
        let (result, _) = core.submit(mk_order(Side::Buy, 100, 15, TimeInForce::Fok));
        assert_eq!(result.status, MatchStatus::CancelledFokNotFilled);
        assert!(result.trades.is_empty());
        assert_eq!(
            core.book.aggregate_depth(Side::Sell, 1),
            vec![(Price::new(Decimal::from(100)), Quantity::new(Decimal::from(10)))]
        );
    }

    #[test]
    fn post_only_rejection_leaves_book_unchanged() {
        let mut core = trading_core();
        core.submit(mk_order(Side::Sell, 100, 10, TimeInForce::Gtc));
        let mut taker = mk_order(Side::Buy, 101, 5, TimeInForce::Gtc);
        taker.flags |= OrderFlags::POST_ONLY;
        let (result, _) = core.submit(taker);
        assert_eq!(result.status, MatchStatus::RejectedPostOnly);
        assert!(result.trades.is_empty());
        assert_eq!(core.book.order_count(), 1);
    }

    #[test]
    fn iceberg_refresh_loses_priority() {
        let mut core = trading_core();
        let mut iceberg = mk_order(Side::Sell, 100, 100, TimeInForce::Gtc);
        iceberg.flags |= OrderFlags::ICEBERG;
        iceberg.display_qty = Quantity::new(Decimal::from(10));
        core.submit(iceberg.clone());
        let x = mk_order(Side::Sell, 100, 20, TimeInForce::Gtc);
        core.submit(x.clone());

        let (result, _) = core.submit(mk_order(Side::Buy, 100, 15, TimeInForce::Gtc));
        assert_eq!(result.trades.len(), 2);
        assert_eq!(result.trades[0].sell_order_id, iceberg.order_id);
        assert_eq!(result.trades[0].quantity, Quantity::new(Decimal::from(10)));
        assert_eq!(result.trades[1].sell_order_id, x.order_id);
        assert_eq!(result.trades[1].quantity, Quantity::new(Decimal::from(5)));

        // I has 90 remaining (10 filled), refreshed to display=10 hidden=80,
        // resting at the tail; total resting for I is still 90.
        let level = core.book.asks().get(&Price::new(Decimal::from(100))).unwrap();
        let resting: Vec<_> = level.iter().collect();
        assert_eq!(resting.len(), 2);
        assert_eq!(resting[0].order_id, x.order_id);
        assert_eq!(resting[1].order_id, iceberg.order_id);
        assert_eq!(resting[1].remaining_qty, Quantity::new(Decimal::from(90)));
        assert_eq!(resting[1].display_qty, Quantity::new(Decimal::from(10)));
        assert_eq!(resting[1].hidden_qty, Quantity::new(Decimal::from(70)));
        assert_eq!(resting[0].remaining_qty, Quantity::new(Decimal::from(15)));
    }

    #[test]
    fn circuit_breaker_trip_halts_and_suppresses_trade() {
        let mut core = trading_core();
        core.book.last_trade_price = Some(Price::new(Decimal::from(100)));
        core.breaker.set_reference_price(Price::new(Decimal::from(100)));
        // Widen the price cage so the 20% move is admissible to the book,
        // letting the circuit breaker be the one that trips.
        core.config.price_cage_pct = Decimal::new(50, 2);
        core.submit(mk_order(Side::Sell, 120, 1, TimeInForce::Gtc));

        let (result, halted) = core.submit(mk_order(Side::Buy, 120, 1, TimeInForce::Gtc));
        assert!(halted);
        assert!(result.trades.is_empty());
        assert_eq!(core.status, MarketStatus::Halted);

        let (next, _) = core.submit(mk_order(Side::Buy, 120, 1, TimeInForce::Gtc));
        assert_eq!(next.status, MatchStatus::RejectedEngineHalted);
    }
}
