//! `Order` is the immutable external request; `RestingOrder` is the
//! engine-internal mutable state once an order is resting in the book.

use crate::types::{Condition, OrderFlags, OrderId, Peg, Price, Quantity, Side, TimeInForce, UserId};

/// An incoming order request. Immutable once constructed; the engine never
/// mutates the fields a caller supplied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub order_id: OrderId,
    pub symbol: String,
    pub side: Side,
    /// Required even for pegged orders: treated as the initial peg price
    /// until the first reprice pass runs.
    pub price: Price,
    pub quantity: Quantity,
    pub user_id: UserId,
    pub tif: TimeInForce,
    pub condition: Condition,
    pub flags: OrderFlags,
    /// Iceberg visible size. Ignored unless `flags` contains `ICEBERG`.
    /// Must be `<= quantity`.
    pub display_qty: Quantity,
    pub peg: Peg,
    /// Nanosecond monotonic timestamp assigned by the engine on acceptance;
    /// the sole authority for time priority before a `sequence` is assigned.
    pub submitted_at: u64,
}

impl Order {
    pub fn is_post_only(&self) -> bool {
        self.flags.contains(OrderFlags::POST_ONLY)
    }

    pub fn is_iceberg(&self) -> bool {
        self.flags.contains(OrderFlags::ICEBERG)
    }

    /// The hidden reserve: `quantity - display_qty` for iceberg orders, else zero.
    pub fn hidden_qty(&self) -> Quantity {
        if self.is_iceberg() {
            self.quantity - self.display_qty
        } else {
            Quantity::zero()
        }
    }

    /// The portion of `quantity` initially visible in the book.
    pub fn initial_display_qty(&self) -> Quantity {
        if self.is_iceberg() {
            self.display_qty
        } else {
            self.quantity
        }
    }
}

/// An `Order` plus the mutable state the book tracks once it is resting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestingOrder {
    pub order_id: OrderId,
    pub side: Side,
    pub price: Price,
    pub user_id: UserId,
    pub tif: TimeInForce,
    pub condition: Condition,
    pub flags: OrderFlags,
    pub peg: Peg,
    pub submitted_at: u64,

    /// The order's original total quantity at admission. Needed by iceberg
    /// refresh sizing (`max(original_quantity * refresh_fraction, floor)`),
    /// which must not drift as `remaining_qty` shrinks.
    pub original_quantity: Quantity,
    pub remaining_qty: Quantity,
    pub display_qty: Quantity,
    pub hidden_qty: Quantity,

    /// Monotonic counter assigned on insertion into a level; sole authority
    /// for FIFO tie-breaking at identical price. Reassigned (losing priority)
    /// on iceberg refresh and on peg reprice.
    pub sequence: u64,
}

impl RestingOrder {
    pub fn from_order(order: &Order, sequence: u64) -> Self {
        Self {
            order_id: order.order_id,
            side: order.side,
            price: order.price,
            user_id: order.user_id,
            tif: order.tif,
            condition: order.condition,
            flags: order.flags,
            peg: order.peg,
            submitted_at: order.submitted_at,
            original_quantity: order.quantity,
            remaining_qty: order.quantity,
            display_qty: order.initial_display_qty(),
            hidden_qty: order.hidden_qty(),
            sequence,
        }
    }

    pub fn is_iceberg(&self) -> bool {
        self.flags.contains(OrderFlags::ICEBERG)
    }

    /// The quantity a probe/match may see at this order: `display_qty` for
    /// iceberg makers, `remaining_qty` otherwise.
    pub fn available_qty(&self) -> Quantity {
        if self.is_iceberg() {
            self.display_qty
        } else {
            self.remaining_qty
        }
    }

    pub fn is_pegged(&self) -> bool {
        self.peg.is_pegged()
    }
}
