//! Opening/reopening call auction: find the equilibrium price that
//! maximizes executable volume, match every eligible order at that single
//! price, and reset the circuit breaker's reference price without ever
//! consulting it.

use crate::matching::Core;
use crate::trade::{AuctionResult, Trade};
use crate::types::{Price, Quantity, TradeId};
use crate::utils::current_time_nanos;
use std::collections::BTreeSet;

impl Core {
    pub fn run_auction(&mut self) -> AuctionResult {
        let candidates = candidate_prices(self);
        let Some((p_star, executable)) = best_price(self, &candidates) else {
            return AuctionResult {
                equilibrium_price: None,
                trades: Vec::new(),
            };
        };

        let trades = if executable.is_zero() {
            Vec::new()
        } else {
            execute_at(self, p_star, executable)
        };

        self.breaker.set_reference_price(p_star);
        if let Some(last) = trades.last() {
            self.book.last_trade_price = Some(last.price);
        }

        AuctionResult {
            equilibrium_price: Some(p_star),
            trades,
        }
    }
}

fn candidate_prices(core: &Core) -> BTreeSet<Price> {
    core.book.bids().keys().chain(core.book.asks().keys()).copied().collect()
}

/// Cumulative buy quantity available at or above `price`.
fn cumulative_buy(core: &Core, price: Price) -> Quantity {
    core.book
        .bids()
        .range(price..)
        .fold(Quantity::zero(), |acc, (_, level)| acc + level.total_quantity())
}

/// Cumulative sell quantity available at or below `price`.
fn cumulative_sell(core: &Core, price: Price) -> Quantity {
    core.book
        .asks()
        .range(..=price)
        .fold(Quantity::zero(), |acc, (_, level)| acc + level.total_quantity())
}

/// The equilibrium price: maximum executable volume, ties broken by minimum
/// imbalance, then by the higher price.
fn best_price(core: &Core, candidates: &BTreeSet<Price>) -> Option<(Price, Quantity)> {
    let mut best: Option<(Price, Quantity, Quantity)> = None; // (price, executable, imbalance)
    for &price in candidates {
        let buy = cumulative_buy(core, price);
        let sell = cumulative_sell(core, price);
        let executable = buy.min(sell);
        let imbalance = if buy.0 >= sell.0 {
            Quantity::new(buy.0 - sell.0)
        } else {
            Quantity::new(sell.0 - buy.0)
        };
        let better = match &best {
            None => true,
            Some((bp, bexec, bimb)) => {
                if executable.0 != bexec.0 {
                    executable.0 > bexec.0
                } else if imbalance.0 != bimb.0 {
                    imbalance.0 < bimb.0
                } else {
                    price > *bp
                }
            }
        };
        if better {
            best = Some((price, executable, imbalance));
        }
    }
    best.map(|(p, exec, _)| (p, exec))
}

/// Match eligible orders on both sides at the fixed price `p_star` until
/// `executable` quantity has traded.
fn execute_at(core: &mut Core, p_star: Price, executable: Quantity) -> Vec<Trade> {
    let mut trades = Vec::new();
    let mut remaining = executable;

    while !remaining.is_zero() {
        let Some(bid_price) = core.book.best_bid_price() else { break };
        if bid_price < p_star {
            break;
        }
        let Some(ask_price) = core.book.best_ask_price() else { break };
        if ask_price > p_star {
            break;
        }

        let buy_order_id;
        let sell_order_id;
        let buy_user_id;
        let sell_user_id;
        let trade_qty;
        let buy_exhausted;
        let sell_exhausted;

        {
            let (bids, asks) = core.book.both_ladders_mut();
            let buyer = bids.get_mut(&bid_price).expect("best bid price exists").front_mut().expect("non-empty level");
            let seller = asks.get_mut(&ask_price).expect("best ask price exists").front_mut().expect("non-empty level");

            trade_qty = buyer.remaining_qty.min(seller.remaining_qty).min(remaining);

            buy_order_id = buyer.order_id;
            buy_user_id = buyer.user_id;
            buyer.remaining_qty = buyer.remaining_qty - trade_qty;
            buyer.display_qty = buyer.display_qty - buyer.display_qty.min(trade_qty);
            buy_exhausted = buyer.remaining_qty.is_zero();

            sell_order_id = seller.order_id;
            sell_user_id = seller.user_id;
            seller.remaining_qty = seller.remaining_qty - trade_qty;
            seller.display_qty = seller.display_qty - seller.display_qty.min(trade_qty);
            sell_exhausted = seller.remaining_qty.is_zero();
        }

        if buy_exhausted {
            core.book.ladder_for_side_mut(crate::types::Side::Buy).get_mut(&bid_price).unwrap().pop_front();
            core.book.forget_order(buy_order_id);
            core.book.prune_if_empty(crate::types::Side::Buy, bid_price);
        }
        if sell_exhausted {
            core.book.ladder_for_side_mut(crate::types::Side::Sell).get_mut(&ask_price).unwrap().pop_front();
            core.book.forget_order(sell_order_id);
            core.book.prune_if_empty(crate::types::Side::Sell, ask_price);
        }

        let trade_id = core.next_trade_id;
        core.next_trade_id += 1;
        trades.push(Trade {
            trade_id: TradeId(trade_id),
            symbol: core.book.symbol.clone(),
            buy_order_id,
            sell_order_id,
            buy_user_id,
            sell_user_id,
            price: p_star,
            quantity: trade_qty,
            executed_at: current_time_nanos(),
        });

        remaining = remaining - trade_qty;
    }

    trades
}
