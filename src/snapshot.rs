//! Order book snapshots for market data distribution and recovery
//! verification: a depth-limited view of both ladders plus a checksum over
//! the serialized payload so a consumer can detect truncation or corruption
//! in transit.

use crate::book::OrderBook;
use crate::types::{Price, Quantity, Side};
use crate::utils::current_time_millis;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthLevel {
    pub price: Price,
    pub quantity: Quantity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBookSnapshot {
    pub format_version: u32,
    pub symbol: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
    /// Best-first.
    pub bids: Vec<DepthLevel>,
    /// Best-first.
    pub asks: Vec<DepthLevel>,
    /// SHA-256 over the canonical JSON encoding of every other field, with
    /// this field itself absent. Lets a downstream consumer detect a
    /// truncated or corrupted transmission.
    pub checksum: String,
}

impl OrderBookSnapshot {
    pub fn best_bid(&self) -> Option<&DepthLevel> {
        self.bids.first()
    }

    pub fn best_ask(&self) -> Option<&DepthLevel> {
        self.asks.first()
    }

    pub fn verify_checksum(&self) -> bool {
        compute_checksum(&self.symbol, self.timestamp, &self.bids, &self.asks) == self.checksum
    }
}

/// Build a checksummed snapshot of the book's top `depth` levels per side.
pub fn take_snapshot(book: &OrderBook, depth: usize) -> OrderBookSnapshot {
    let bids = book
        .aggregate_depth(Side::Buy, depth)
        .into_iter()
        .map(|(price, quantity)| DepthLevel { price, quantity })
        .collect::<Vec<_>>();
    let asks = book
        .aggregate_depth(Side::Sell, depth)
        .into_iter()
        .map(|(price, quantity)| DepthLevel { price, quantity })
        .collect::<Vec<_>>();
    let timestamp = current_time_millis();
    let checksum = compute_checksum(&book.symbol, timestamp, &bids, &asks);
    OrderBookSnapshot {
        format_version: SNAPSHOT_FORMAT_VERSION,
        symbol: book.symbol.clone(),
        timestamp,
        bids,
        asks,
        checksum,
    }
}

fn compute_checksum(symbol: &str, timestamp: u64, bids: &[DepthLevel], asks: &[DepthLevel]) -> String {
    #[derive(Serialize)]
    struct Payload<'a> {
        symbol: &'a str,
        timestamp: u64,
        bids: &'a [DepthLevel],
        asks: &'a [DepthLevel],
    }
    let payload = Payload { symbol, timestamp, bids, asks };
    let bytes = serde_json::to_vec(&payload).expect("snapshot payload always serializes");
    let digest = Sha256::digest(&bytes);
    hex_encode(&digest)
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        write!(out, "{byte:02x}").expect("writing to a String never fails");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::Order;
    use crate::types::{Condition, OrderFlags, OrderId, Peg, TimeInForce, UserId};
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn order(side: Side, price: i64, qty: i64) -> Order {
        Order {
            order_id: OrderId::new(),
            symbol: "BTC/USD".into(),
            side,
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
    fn snapshot_checksum_detects_tampering() {
        let mut book = OrderBook::new("BTC/USD");
        book.insert_new(&order(Side::Buy, 100, 5));
        book.insert_new(&order(Side::Sell, 101, 3));
        let mut snap = take_snapshot(&book, 10);
        assert!(snap.verify_checksum());

        snap.bids[0].quantity = Quantity::new(Decimal::from(999));
        assert!(!snap.verify_checksum());
    }

    #[test]
    fn snapshot_respects_depth_limit() {
        let mut book = OrderBook::new("BTC/USD");
        for p in 90..100 {
            book.insert_new(&order(Side::Buy, p, 1));
        }
        let snap = take_snapshot(&book, 3);
        assert_eq!(snap.bids.len(), 3);
        assert_eq!(snap.bids[0].price, Price::new(Decimal::from(99)));
    }
}
