//! Pegged-order repricing pass: before each task is matched, every resting
//! pegged order is re-evaluated against the current best bid/ask and moved
//! if its formula now yields a different price. A reprice that lands past
//! the opposite touch is not just a book update — it becomes an aggressive
//! order and is run back through continuous matching.

use crate::matching::{continuous_match, Core};
use crate::trade::Trade;
use crate::types::{Peg, Price, Side};

/// Reprice every pegged order once. Returns `true` if the circuit breaker
/// tripped while matching a reprice-triggered cross, in which case the
/// caller must halt immediately.
pub(crate) fn reprice_pegged_orders(core: &mut Core, trades: &mut Vec<Trade>) -> bool {
    let ids = core.book.pegged_ids();
    for order_id in ids {
        if !core.book.contains(order_id) {
            continue; // already consumed by an earlier reprice in this pass
        }
        let Some(resting) = core.book.peek(order_id) else { continue };
        let Some(target) = target_price(core, order_id, resting.side, resting.peg) else {
            continue;
        };
        if target == resting.price {
            continue;
        }

        let mut order = core.book.remove(order_id).expect("just peeked");
        order.price = target;

        let crosses = match order.side {
            Side::Buy => core.book.best_ask_price().map(|ask| target >= ask).unwrap_or(false),
            Side::Sell => core.book.best_bid_price().map(|bid| target <= bid).unwrap_or(false),
        };

        if !crosses {
            // Still passive at the new price: reinsert, losing priority.
            core.book.insert_resting(order);
            continue;
        }

        let symbol = core.book.symbol.clone();
        let (mut new_trades, remaining, tripped) = continuous_match(
            &mut core.book,
            &mut core.breaker,
            &core.config,
            order.side,
            order.order_id,
            order.user_id,
            order.remaining_qty,
            target,
            &symbol,
            &mut core.next_trade_id,
        );
        trades.append(&mut new_trades);
        if tripped {
            return true;
        }
        if !remaining.is_zero() {
            order.remaining_qty = remaining;
            order.display_qty = if order.is_iceberg() {
                order.display_qty.min(remaining)
            } else {
                remaining
            };
            core.book.insert_resting(order);
        }
    }
    false
}

/// The price a pegged order's formula currently yields, or `None` if the
/// reference side of the book is empty. The order's own resting price is
/// excluded from the reference computation so a pegged order never chases
/// itself.
fn target_price(core: &Core, order_id: crate::types::OrderId, side: Side, peg: Peg) -> Option<Price> {
    let bid = best_excluding(core, Side::Buy, order_id);
    let ask = best_excluding(core, Side::Sell, order_id);
    let _ = side;
    match peg {
        Peg::None => None,
        Peg::Mid => {
            let (bid, ask) = (bid?, ask?);
            Some(Price::new((bid.0 + ask.0) / rust_decimal::Decimal::from(2)))
        }
        Peg::BestBid(offset) => Some(Price::new(bid?.0 + offset.0)),
        Peg::BestAsk(offset) => Some(Price::new(ask?.0 - offset.0)),
    }
}

/// The best price on `side`, ignoring `exclude`'s own contribution to its
/// level (it may still be the sole resident of the top level).
fn best_excluding(core: &Core, side: Side, exclude: crate::types::OrderId) -> Option<Price> {
    let ladder = match side {
        Side::Buy => core.book.bids(),
        Side::Sell => core.book.asks(),
    };
    let levels: Box<dyn Iterator<Item = (&Price, &crate::book::PriceLevel)>> = match side {
        Side::Buy => Box::new(ladder.iter().rev()),
        Side::Sell => Box::new(ladder.iter()),
    };
    for (price, level) in levels {
        if level.iter().any(|o| o.order_id != exclude) {
            return Some(*price);
        }
    }
    None
}
