//! Property tests against the public `Engine`: no sequence of admitted
//! orders should ever leave the book crossed or lose quantity, and FIFO
//! priority at a single price level must hold regardless of order sizes.

use clob_engine::config::EngineConfig;
use clob_engine::engine::Engine;
use clob_engine::order::Order;
use clob_engine::types::{Condition, MarketStatus, OrderFlags, OrderId, Peg, Price, Quantity, Side, TimeInForce, UserId};
use proptest::prelude::*;
use rust_decimal::Decimal;
use uuid::Uuid;

fn arb_side() -> impl Strategy<Value = Side> {
    prop_oneof![Just(Side::Buy), Just(Side::Sell)]
}

fn arb_tif() -> impl Strategy<Value = TimeInForce> {
    prop_oneof![Just(TimeInForce::Gtc), Just(TimeInForce::Fak), Just(TimeInForce::Fok)]
}

/// Prices confined to a narrow band so crosses and fills actually happen
/// often enough to exercise the matching loop, not just near-misses.
fn arb_order() -> impl Strategy<Value = Order> {
    (arb_side(), 95i64..=105, 1i64..=20, arb_tif()).prop_map(|(side, price, qty, tif)| Order {
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
    })
}

fn trading_engine() -> Engine {
    let engine = Engine::new(EngineConfig::new("BTC/USD"));
    engine.set_status(MarketStatus::Trading);
    engine
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// The book is never crossed after any admitted order, for as long as
    /// the engine stays up: the matching loop always drains every crossable
    /// level before returning control.
    #[test]
    fn book_is_never_left_crossed(orders in prop::collection::vec(arb_order(), 1..30)) {
        let engine = trading_engine();
        for order in orders {
            if engine.is_halted() {
                break;
            }
            engine.submit_order(order).unwrap();
            let snap = engine.snapshot(usize::MAX).unwrap();
            if let (Some(bid), Some(ask)) = (snap.best_bid(), snap.best_ask()) {
                prop_assert!(bid.price < ask.price);
            }
        }
    }

    /// What's left resting can never exceed what was ever admitted.
    #[test]
    fn quantity_is_conserved_across_every_submission(orders in prop::collection::vec(arb_order(), 1..30)) {
        let engine = trading_engine();
        let mut submitted_total = Decimal::ZERO;

        for order in orders {
            if engine.is_halted() {
                break;
            }
            submitted_total += order.quantity.0;
            engine.submit_order(order).unwrap();
        }

        let snap = engine.snapshot(usize::MAX).unwrap();
        let resting_total: Decimal = snap.bids.iter().chain(snap.asks.iter()).map(|l| l.quantity.0).sum();
        prop_assert!(resting_total <= submitted_total);
        prop_assert!(resting_total >= Decimal::ZERO);
    }

    /// Two orders resting at the same price must always report trades in the
    /// order they were admitted: sequence is the sole FIFO tie-breaker.
    #[test]
    fn same_price_orders_fill_in_admission_order(quantities in prop::collection::vec(1i64..=10, 2..10)) {
        let engine = trading_engine();
        let mut ids = Vec::new();
        let mut total = Decimal::ZERO;
        for &qty in &quantities {
            let o = Order {
                order_id: OrderId::new(),
                symbol: "BTC/USD".into(),
                side: Side::Sell,
                price: Price::new(Decimal::from(100)),
                quantity: Quantity::new(Decimal::from(qty)),
                user_id: UserId(Uuid::new_v4()),
                tif: TimeInForce::Gtc,
                condition: Condition::None,
                flags: OrderFlags::empty(),
                display_qty: Quantity::new(Decimal::from(qty)),
                peg: Peg::None,
                submitted_at: 0,
            };
            ids.push(o.order_id);
            total += Decimal::from(qty);
            engine.submit_order(o).unwrap();
        }

        let sweep = Order {
            order_id: OrderId::new(),
            symbol: "BTC/USD".into(),
            side: Side::Buy,
            price: Price::new(Decimal::from(100)),
            quantity: Quantity::new(total),
            user_id: UserId(Uuid::new_v4()),
            tif: TimeInForce::Gtc,
            condition: Condition::None,
            flags: OrderFlags::empty(),
            display_qty: Quantity::new(total),
            peg: Peg::None,
            submitted_at: 0,
        };
        let result = engine.submit_order(sweep).unwrap();

        let fill_order: Vec<_> = result.trades.iter().map(|t| t.sell_order_id).collect();
        prop_assert_eq!(fill_order, ids);
    }
}
