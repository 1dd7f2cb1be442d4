//! Order and trade data model.
//!
//! `InternalOrder` is the resident representation once an order has cleared
//! gateway validation: amounts are scaled integers (see [`crate::money`]), never
//! floats, and every mutation goes through checked arithmetic.

use serde::{Deserialize, Serialize};

/// Which side of the book an order rests on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

/// Time-in-force / execution style requested at order entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    /// Good-Til-Cancelled limit order: rests on the book if it does not fully match.
    Limit,
    /// Market order: matches against best available liquidity, never rests.
    Market,
}

/// Lifecycle state of an order as tracked by the matching engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Accepted, not yet matched or resting.
    New,
    /// Resting on the book, no fills yet.
    Active,
    /// Some quantity filled, remainder still active.
    PartiallyFilled,
    /// Fully filled.
    Filled,
    /// Cancelled by user request or cancel-the-maker self-trade prevention.
    Cancelled,
    /// Rejected at validation; never entered the book.
    Rejected,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Cancelled | OrderStatus::Rejected
        )
    }
}

/// An order once it has passed validation and balance freeze, ready for the book.
///
/// Prices and quantities are scaled integers at the symbol's configured precision
/// (see `SymbolManager`), not decimals: a price of "30000.50" at 2 display decimals
/// and 6 internal decimals is stored as `30_000_500_000`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternalOrder {
    pub order_id: u64,
    pub user_id: u64,
    pub symbol_id: u32,
    pub price: u64,
    pub qty: u64,
    pub filled_qty: u64,
    pub side: Side,
    pub order_type: OrderType,
    pub status: OrderStatus,
    /// Bumped on any mutation (fill, partial fill, cancel); lets subscribers
    /// detect stale views of the same order_id.
    pub lock_version: u64,
    /// Sequence number assigned at ingestion, used for price-time priority
    /// tie-breaking and for idempotent replay against the durability writer.
    pub seq_id: u64,
    pub ingested_at_ns: u64,
}

impl InternalOrder {
    pub fn new(order_id: u64, user_id: u64, symbol_id: u32, price: u64, qty: u64, side: Side) -> Self {
        Self {
            order_id,
            user_id,
            symbol_id,
            price,
            qty,
            filled_qty: 0,
            side,
            order_type: OrderType::Limit,
            status: OrderStatus::New,
            lock_version: 0,
            seq_id: 0,
            ingested_at_ns: 0,
        }
    }

    pub fn remaining_qty(&self) -> u64 {
        self.qty.saturating_sub(self.filled_qty)
    }

    pub fn is_fully_filled(&self) -> bool {
        self.filled_qty >= self.qty
    }

    /// Apply a fill of `qty` at the book, bumping status and version.
    pub fn apply_fill(&mut self, qty: u64) {
        self.filled_qty = self.filled_qty.saturating_add(qty).min(self.qty);
        self.status = if self.is_fully_filled() {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };
        self.lock_version += 1;
    }

    pub fn mark_resting(&mut self) {
        if matches!(self.status, OrderStatus::New) {
            self.status = OrderStatus::Active;
            self.lock_version += 1;
        }
    }

    pub fn mark_cancelled(&mut self) {
        self.status = OrderStatus::Cancelled;
        self.lock_version += 1;
    }
}

/// A completed match between a resting (maker) and incoming (taker) order.
///
/// Executes at the maker's price, per price-time priority convention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    pub trade_id: u64,
    pub symbol_id: u32,
    pub buyer_order_id: u64,
    pub buyer_user_id: u64,
    pub seller_order_id: u64,
    pub seller_user_id: u64,
    /// Maker's price: the price at which both legs settle.
    pub price: u64,
    pub qty: u64,
    /// Which side was the taker (the order that arrived and crossed the book).
    pub taker_side: Side,
    pub executed_at_ns: u64,
}

impl Trade {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        trade_id: u64,
        symbol_id: u32,
        buyer_order_id: u64,
        buyer_user_id: u64,
        seller_order_id: u64,
        seller_user_id: u64,
        price: u64,
        qty: u64,
        taker_side: Side,
        executed_at_ns: u64,
    ) -> Self {
        Self {
            trade_id,
            symbol_id,
            buyer_order_id,
            buyer_user_id,
            seller_order_id,
            seller_user_id,
            price,
            qty,
            taker_side,
            executed_at_ns,
        }
    }
}

/// Outcome of submitting an order to the matching engine: the (possibly
/// updated) order plus any trades it produced.
#[derive(Debug, Clone)]
pub struct OrderResult {
    pub order: InternalOrder,
    pub trades: Vec<Trade>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_order_has_zero_fill() {
        let o = InternalOrder::new(1, 10, 0, 100, 50, Side::Buy);
        assert_eq!(o.remaining_qty(), 50);
        assert_eq!(o.status, OrderStatus::New);
    }

    #[test]
    fn apply_fill_transitions_partial_then_filled() {
        let mut o = InternalOrder::new(1, 10, 0, 100, 50, Side::Buy);
        o.apply_fill(20);
        assert_eq!(o.status, OrderStatus::PartiallyFilled);
        assert_eq!(o.remaining_qty(), 30);
        o.apply_fill(30);
        assert_eq!(o.status, OrderStatus::Filled);
        assert_eq!(o.remaining_qty(), 0);
    }

    #[test]
    fn apply_fill_never_overfills() {
        let mut o = InternalOrder::new(1, 10, 0, 100, 50, Side::Buy);
        o.apply_fill(1000);
        assert_eq!(o.filled_qty, 50);
        assert_eq!(o.status, OrderStatus::Filled);
    }

    #[test]
    fn terminal_states() {
        assert!(OrderStatus::Filled.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(OrderStatus::Rejected.is_terminal());
        assert!(!OrderStatus::Active.is_terminal());
        assert!(!OrderStatus::New.is_terminal());
    }

    #[test]
    fn mark_resting_only_from_new() {
        let mut o = InternalOrder::new(1, 10, 0, 100, 50, Side::Buy);
        o.mark_resting();
        assert_eq!(o.status, OrderStatus::Active);
        let v = o.lock_version;
        o.mark_resting();
        assert_eq!(o.lock_version, v);
    }
}
