//! Deterministic recovery (C6): rebuild a book from an external system of
//! record instead of a local write-ahead log. Recovery pages through the
//! source in submission order so that priority reconstructed from
//! `submitted_at` matches the original book exactly, and is idempotent —
//! replaying the same page twice must not duplicate resting orders.

use crate::matching::Core;
use crate::order::RestingOrder;
use crate::types::{Condition, OrderFlags, OrderId, Peg, Price, Quantity, Side, TimeInForce, UserId};
use thiserror::Error;

pub const RECOVERY_PAGE_SIZE: usize = 500;

#[derive(Debug, Error)]
pub enum RecoveryError {
    #[error("active order source failed: {0}")]
    Source(String),
}

/// One still-open order as reported by the external system of record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalOrder {
    pub order_id: OrderId,
    pub side: Side,
    pub price: Price,
    pub quantity: Quantity,
    pub filled_quantity: Quantity,
    pub user_id: UserId,
    pub tif: TimeInForce,
    pub condition: Condition,
    pub flags: OrderFlags,
    pub display_qty: Quantity,
    pub peg: Peg,
    pub submitted_at: u64,
}

/// The external system the engine recovers its resting orders from on
/// startup. Implementations page through orders for a symbol in ascending
/// `submitted_at` order.
pub trait ActiveOrderSource {
    fn fetch_page(&self, symbol: &str, after: Option<OrderId>, limit: usize) -> Result<Vec<ExternalOrder>, RecoveryError>;
}

/// Page through `source` for `core`'s symbol and rebuild the book. Returns
/// the number of orders recovered.
pub fn recover(core: &mut Core, source: &dyn ActiveOrderSource) -> Result<usize, RecoveryError> {
    let symbol = core.book.symbol.clone();
    let mut after = None;
    let mut recovered = 0usize;

    loop {
        let page = source.fetch_page(&symbol, after, RECOVERY_PAGE_SIZE)?;
        if page.is_empty() {
            break;
        }
        after = page.last().map(|o| o.order_id);

        for external in &page {
            if core.book.contains(external.order_id) {
                continue; // already recovered: replay is idempotent
            }
            let remaining = external.quantity - external.filled_quantity;
            if remaining.is_zero() {
                continue;
            }
            let mut resting = RestingOrder {
                order_id: external.order_id,
                side: external.side,
                price: external.price,
                user_id: external.user_id,
                tif: external.tif,
                condition: external.condition,
                flags: external.flags,
                peg: external.peg,
                submitted_at: external.submitted_at,
                original_quantity: external.quantity,
                remaining_qty: remaining,
                display_qty: external.display_qty.min(remaining),
                hidden_qty: Quantity::zero(),
                sequence: 0,
            };
            if resting.is_iceberg() {
                resting.hidden_qty = remaining - resting.display_qty;
            } else {
                resting.display_qty = remaining;
            }
            core.book.insert_resting(resting);
            recovered += 1;
        }

        if page.len() < RECOVERY_PAGE_SIZE {
            break;
        }
    }

    Ok(recovered)
}
