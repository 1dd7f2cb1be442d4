//! Matching Engine (C3): validates orders, freezes funds, matches against the
//! book with price-time priority, settles trades, and emits events.
//!
//! One `MatchingEngine` instance owns exactly one symbol's [`OrderBook`] and
//! is driven exclusively by that symbol's single-writer task (§5) — nothing
//! here takes a lock on the book itself, since only one task ever touches it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::errors::EngineError;
use crate::event_bus::{EngineEvent, EventBus};
use crate::ledger::{AccountKey, AssetLedger};
use crate::messages::RejectReason;
use crate::models::{InternalOrder, OrderResult, OrderType, Side, Trade};
use crate::orderbook::{DepthSnapshot, OrderBook};
use crate::symbol_manager::{SymbolInfo, SymbolManager};

/// Converts a scaled price and a scaled base quantity into the corresponding
/// scaled quote amount: `price * qty / 10^base_decimals`.
///
/// Uses `u128` for the intermediate product so a full-precision price times
/// a large quantity never overflows before the division.
fn quote_amount(price: u64, qty: u64, base_decimals: u32) -> u64 {
    let base_unit = 10u128.pow(base_decimals);
    ((price as u128 * qty as u128) / base_unit) as u64
}

/// One symbol's matching engine: order book, validation rules, and the
/// monotonic id/seq counters that are this task's exclusive responsibility.
pub struct MatchingEngine {
    symbol_id: u32,
    base_asset_id: u32,
    quote_asset_id: u32,
    base_decimals: u32,
    symbol_mgr: Arc<SymbolManager>,
    ledger: Arc<AssetLedger>,
    event_bus: Arc<EventBus>,
    book: OrderBook,
    next_order_id: u64,
    next_seq: u64,
    /// Set on an unrecoverable invariant violation; once halted the symbol
    /// refuses new orders until an operator reconciles and restarts it.
    halted: bool,
    /// Mirrors `halted` for readers outside the single-writer task (e.g. the
    /// `GET /health` handler's `symbolsHalted` list), which cannot safely
    /// borrow the engine itself.
    halted_signal: Option<Arc<AtomicBool>>,
}

impl MatchingEngine {
    /// `seed_order_id` comes from the durability writer's last-seen id at
    /// startup (or 0 on a cold store), per the order-id scope decision in
    /// the design notes.
    pub fn new(
        symbol_id: u32,
        symbol_mgr: Arc<SymbolManager>,
        ledger: Arc<AssetLedger>,
        event_bus: Arc<EventBus>,
        seed_order_id: u64,
    ) -> Result<Self, EngineError> {
        let info = symbol_mgr
            .get_symbol_info_by_id(symbol_id)
            .ok_or_else(|| EngineError::Validation(format!("unknown symbol {symbol_id}")))?;
        let base_decimals = symbol_mgr
            .assets
            .get(&info.base_asset_id)
            .ok_or_else(|| EngineError::Validation(format!("unknown base asset for symbol {symbol_id}")))?
            .decimals;

        event_bus.register_symbol(symbol_id);

        Ok(Self {
            symbol_id,
            base_asset_id: info.base_asset_id,
            quote_asset_id: info.quote_asset_id,
            base_decimals,
            symbol_mgr,
            ledger,
            event_bus,
            book: OrderBook::new(),
            next_order_id: seed_order_id,
            next_seq: 0,
            halted: false,
            halted_signal: None,
        })
    }

    /// Wire an externally-readable halt flag, shared with this symbol's
    /// [`crate::pipeline::SymbolHandle`] so `GET /health` can report halted
    /// symbols without going through the single-writer task's queue.
    pub fn set_halt_signal(&mut self, signal: Arc<AtomicBool>) {
        signal.store(self.halted, Ordering::Relaxed);
        self.halted_signal = Some(signal);
    }

    pub fn symbol_id(&self) -> u32 {
        self.symbol_id
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Halt or resume the symbol. Halted symbols reject `place_order` but
    /// still allow cancels, per the symbol-halt operation.
    pub fn set_halted(&mut self, halted: bool) {
        self.halted = halted;
        if let Some(signal) = &self.halted_signal {
            signal.store(halted, Ordering::Relaxed);
        }
    }

    /// A ledger failure anywhere after the order has been inserted into the
    /// book means the book and ledger have diverged — per §7 this is an
    /// invariant violation, fatal for the symbol. Halts further `place_order`
    /// calls (cancels still proceed) and surfaces the original cause in the
    /// operational alarm, but returns a typed `SymbolHalted` to the caller so
    /// the failure is never mistaken for an ordinary rejection.
    fn halt_on_post_insert_failure(&mut self, cause: EngineError) -> EngineError {
        self.set_halted(true);
        tracing::error!(
            symbol_id = self.symbol_id,
            %cause,
            "post-insert ledger failure, halting symbol for operator reconciliation"
        );
        EngineError::SymbolHalted(self.symbol_id)
    }

    pub fn depth(&self, limit: usize) -> DepthSnapshot {
        self.book.get_depth(limit)
    }

    fn next_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    fn publish(&mut self, event: EngineEvent) {
        self.event_bus.publish(self.symbol_id, event);
    }

    fn symbol_info(&self) -> &SymbolInfo {
        self.symbol_mgr
            .get_symbol_info_by_id(self.symbol_id)
            .expect("symbol looked up at construction time")
    }

    fn validate(&self, price: Option<u64>, qty: u64, order_type: OrderType, side: Side) -> Result<(), EngineError> {
        if self.halted {
            return Err(EngineError::SymbolHalted(self.symbol_id));
        }
        let info = self.symbol_info();
        if !info.active {
            return Err(EngineError::SymbolHalted(self.symbol_id));
        }
        if qty == 0 || !info.qty_on_tick(qty) || !info.qty_in_bounds(qty) {
            return Err(EngineError::Validation(format!(
                "quantity {qty} fails tick/bounds check for symbol {}",
                self.symbol_id
            )));
        }
        match order_type {
            OrderType::Limit => {
                let price = price.ok_or_else(|| EngineError::Validation("limit order requires a price".into()))?;
                if price == 0 || !info.price_on_tick(price) {
                    return Err(EngineError::Validation(format!(
                        "price {price} fails tick check for symbol {}",
                        self.symbol_id
                    )));
                }
            }
            OrderType::Market => {
                let opposite_best = match side {
                    Side::Buy => self.book.best_ask(),
                    Side::Sell => self.book.best_bid(),
                };
                if opposite_best.is_none() {
                    return Err(EngineError::NoLiquidity(0));
                }
            }
        }
        Ok(())
    }

    /// `placeOrder`: validate, freeze, insert, match, settle.
    pub async fn place_order(
        &mut self,
        user_id: u64,
        side: Side,
        order_type: OrderType,
        price: Option<u64>,
        qty: u64,
        now_ns: u64,
    ) -> Result<OrderResult, EngineError> {
        self.validate(price, qty, order_type, side)?;

        // Market Buy freezes against a bestAsk snapshot taken here, at the
        // start of this call, which is race-free because this task is the
        // sole mutator of the symbol's book.
        let reference_price = match (order_type, side) {
            (OrderType::Limit, _) => price.expect("validated above"),
            (OrderType::Market, Side::Buy) => self.book.best_ask().ok_or(EngineError::NoLiquidity(0))?,
            (OrderType::Market, Side::Sell) => 0,
        };

        let (freeze_asset, freeze_amount) = match side {
            Side::Buy => (self.quote_asset_id, quote_amount(reference_price, qty, self.base_decimals)),
            Side::Sell => (self.base_asset_id, qty),
        };

        self.ledger.freeze(user_id, freeze_asset, freeze_amount).await?;

        let order_id = self.next_order_id;
        self.next_order_id += 1;
        let seq = self.next_seq();

        let mut order = InternalOrder::new(order_id, user_id, self.symbol_id, price.unwrap_or(0), qty, side);
        order.order_type = order_type;
        order.seq_id = seq;
        order.ingested_at_ns = now_ns;

        self.publish(EngineEvent::OrderAccepted {
            symbol_id: self.symbol_id,
            seq,
            order: order.clone(),
        });

        let mut trades = Vec::new();
        let mut spent_on_buy = 0u64;
        let mut book_changed = false;

        loop {
            if order.is_fully_filled() {
                break;
            }
            let maker_side = side.opposite();
            let Some(maker_ref) = self.book.peek_best(maker_side) else {
                break;
            };

            let crosses = match order_type {
                OrderType::Market => true,
                OrderType::Limit => match side {
                    Side::Buy => maker_ref.price <= order.price,
                    Side::Sell => maker_ref.price >= order.price,
                },
            };
            if !crosses {
                break;
            }

            if maker_ref.user_id == user_id {
                // Self-trade prevention: cancel the maker, unfreeze its
                // remainder, and keep matching against the next level.
                let maker = self.book.pop_best(maker_side).expect("peeked above");
                book_changed = true;
                if let Err(e) = self.cancel_resting_order(maker).await {
                    return Err(self.halt_on_post_insert_failure(e));
                }
                continue;
            }

            let match_qty = maker_ref.remaining_qty().min(order.remaining_qty());
            let trade_price = maker_ref.price;

            let mut maker = self.book.pop_best(maker_side).expect("peeked above");
            book_changed = true;

            if let Err(e) = self.settle_trade(&order, &maker, trade_price, match_qty).await {
                // The book is now inconsistent with the ledger (maker already
                // removed, order partially processed): per §7 this is fatal
                // for the symbol, not a per-request rejection.
                return Err(self.halt_on_post_insert_failure(e));
            }

            // Price improvement: a buy taker reserved funds at its own limit
            // (or the bestAsk snapshot for Market) but trades clear at the
            // maker's price, which is always <= that reference. Refund the
            // difference for this fill immediately.
            if side == Side::Buy {
                let reserved = quote_amount(reference_price, match_qty, self.base_decimals);
                let spent = quote_amount(trade_price, match_qty, self.base_decimals);
                spent_on_buy += spent;
                if reserved > spent {
                    self.ledger
                        .unfreeze(user_id, self.quote_asset_id, reserved - spent)
                        .await?;
                }
            }

            order.apply_fill(match_qty);
            maker.apply_fill(match_qty);

            let trade_id = self.book.next_trade_id();
            let (buyer_order_id, buyer_user_id, seller_order_id, seller_user_id) = match side {
                Side::Buy => (order.order_id, order.user_id, maker.order_id, maker.user_id),
                Side::Sell => (maker.order_id, maker.user_id, order.order_id, order.user_id),
            };
            let trade = Trade::new(
                trade_id,
                self.symbol_id,
                buyer_order_id,
                buyer_user_id,
                seller_order_id,
                seller_user_id,
                trade_price,
                match_qty,
                side,
                now_ns,
            );
            trades.push(trade.clone());
            let trade_seq = self.next_seq();
            self.publish(EngineEvent::TradeExecuted {
                symbol_id: self.symbol_id,
                seq: trade_seq,
                trade,
            });

            if maker.is_fully_filled() {
                let fill_seq = self.next_seq();
                self.publish(EngineEvent::OrderFilled {
                    symbol_id: self.symbol_id,
                    seq: fill_seq,
                    order: maker,
                });
            } else {
                self.book.push_front(maker);
            }
        }

        match order.order_type {
            OrderType::Limit => {
                if !order.is_fully_filled() {
                    order.mark_resting();
                    self.book.rest_order(order.clone());
                    book_changed = true;
                }
            }
            OrderType::Market => {
                if !order.is_fully_filled() {
                    let remainder = if side == Side::Buy {
                        freeze_amount.saturating_sub(spent_on_buy)
                    } else {
                        order.remaining_qty()
                    };
                    if remainder > 0 {
                        if let Err(e) = self.ledger.unfreeze(user_id, freeze_asset, remainder).await {
                            return Err(self.halt_on_post_insert_failure(e));
                        }
                    }
                    order.mark_cancelled();
                }
            }
        }

        if order.is_fully_filled() {
            let fill_seq = self.next_seq();
            self.publish(EngineEvent::OrderFilled {
                symbol_id: self.symbol_id,
                seq: fill_seq,
                order: order.clone(),
            });
        }

        if book_changed {
            let seq = self.next_seq();
            self.publish(EngineEvent::OrderBookChanged {
                symbol_id: self.symbol_id,
                seq,
            });
        }

        Ok(OrderResult { order, trades })
    }

    /// Settle one trade: buyer pays quote and receives base; seller pays
    /// base and receives quote. Two ledger legs, each internally lock-ordered.
    async fn settle_trade(
        &self,
        order: &InternalOrder,
        maker: &InternalOrder,
        trade_price: u64,
        match_qty: u64,
    ) -> Result<(), EngineError> {
        let (buyer_id, seller_id) = match order.side {
            Side::Buy => (order.user_id, maker.user_id),
            Side::Sell => (maker.user_id, order.user_id),
        };
        let quote_amt = quote_amount(trade_price, match_qty, self.base_decimals);

        self.ledger
            .settle(
                AccountKey::new(buyer_id, self.quote_asset_id),
                quote_amt,
                AccountKey::new(seller_id, self.quote_asset_id),
                quote_amt,
            )
            .await?;
        self.ledger
            .settle(
                AccountKey::new(seller_id, self.base_asset_id),
                match_qty,
                AccountKey::new(buyer_id, self.base_asset_id),
                match_qty,
            )
            .await?;
        Ok(())
    }

    /// Cancel a resting order already removed from the book (self-trade
    /// prevention path): unfreeze its remainder and emit `OrderCanceled`.
    async fn cancel_resting_order(&mut self, mut maker: InternalOrder) -> Result<(), EngineError> {
        let (asset, amount) = match maker.side {
            Side::Buy => (
                self.quote_asset_id,
                quote_amount(maker.price, maker.remaining_qty(), self.base_decimals),
            ),
            Side::Sell => (self.base_asset_id, maker.remaining_qty()),
        };
        if amount > 0 {
            self.ledger.unfreeze(maker.user_id, asset, amount).await?;
        }
        maker.mark_cancelled();
        let seq = self.next_seq();
        self.publish(EngineEvent::OrderCanceled {
            symbol_id: self.symbol_id,
            seq,
            order: maker,
        });
        Ok(())
    }

    /// `cancelOrder`: only the owning user may cancel; terminal orders
    /// reject with `AlreadyTerminal`.
    pub async fn cancel_order(&mut self, user_id: u64, order_id: u64) -> Result<InternalOrder, EngineError> {
        let preview = self
            .book
            .peek_order(order_id)
            .ok_or(EngineError::AlreadyTerminal(order_id))?;
        if preview.user_id != user_id {
            return Err(EngineError::AlreadyTerminal(order_id));
        }

        let mut order = self
            .book
            .remove_order_by_id(order_id)
            .ok_or(EngineError::AlreadyTerminal(order_id))?;

        let (asset, amount) = match order.side {
            Side::Buy => (
                self.quote_asset_id,
                quote_amount(order.price, order.remaining_qty(), self.base_decimals),
            ),
            Side::Sell => (self.base_asset_id, order.remaining_qty()),
        };
        if amount > 0 {
            self.ledger.unfreeze(user_id, asset, amount).await?;
        }
        order.mark_cancelled();

        let cancel_seq = self.next_seq();
        self.publish(EngineEvent::OrderCanceled {
            symbol_id: self.symbol_id,
            seq: cancel_seq,
            order: order.clone(),
        });
        let book_seq = self.next_seq();
        self.publish(EngineEvent::OrderBookChanged {
            symbol_id: self.symbol_id,
            seq: book_seq,
        });

        Ok(order)
    }

    /// Reject an order before it ever touches the book: used by callers that
    /// want a typed rejection reason fanned out over the event bus.
    pub fn reject(&mut self, user_id: u64, reason: RejectReason) {
        let seq = self.next_seq();
        self.publish(EngineEvent::OrderRejected {
            symbol_id: self.symbol_id,
            seq,
            user_id,
            reason,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppConfig, AssetConfig, DurabilityConfig, SymbolConfig, UpstreamConfig};

    fn test_config() -> AppConfig {
        AppConfig {
            bind_addr: "0.0.0.0:8080".into(),
            assets: vec![
                AssetConfig { asset_id: 1, asset: "BTC".into(), decimals: 8, display_decimals: 6 },
                AssetConfig { asset_id: 2, asset: "USDT".into(), decimals: 6, display_decimals: 2 },
            ],
            symbols: vec![SymbolConfig {
                symbol_id: 1,
                symbol: "BTC_USDT".into(),
                base_asset_id: 1,
                quote_asset_id: 2,
                price_decimal: 2,
                price_display_decimal: 2,
                price_tick: 1,
                qty_tick: 1,
                min_qty: 1,
                max_qty: 0,
                halted: false,
            }],
            upstream: UpstreamConfig {
                url: "wss://stream.example.com/ws".into(),
                business_url: None,
                intervals: vec!["1m".into()],
                order_book_depth: 5,
                reconnect_interval_secs: 2,
                reconnect_attempts_per_window: 5,
                reconnect_window_secs: 60,
            },
            throttle: Default::default(),
            queues: Default::default(),
            logging: Default::default(),
            durability: DurabilityConfig { dsn: "taos://localhost:6041".into(), batch_size: 256, flush_interval_ms: 50 },
            jwt_secret: "test".into(),
        }
    }

    fn scale(whole: u64, decimals: u32) -> u64 {
        whole * 10u64.pow(decimals)
    }

    fn new_engine() -> MatchingEngine {
        let symbol_mgr = Arc::new(SymbolManager::from_config(&test_config()));
        let ledger = Arc::new(AssetLedger::new());
        let bus = Arc::new(EventBus::new(1024));
        MatchingEngine::new(1, symbol_mgr, ledger, bus, 1).unwrap()
    }

    #[tokio::test]
    async fn single_cross_fills_both_orders_completely() {
        let mut engine = new_engine();
        let price = scale(50_000, 2);
        let qty = scale(1, 8);

        engine.ledger.deposit(2, 2, scale(10_000, 6)).await.unwrap();
        engine.ledger.deposit(1, 1, qty).await.unwrap();

        engine
            .place_order(1, Side::Sell, OrderType::Limit, Some(price), qty, 0)
            .await
            .unwrap();
        let result = engine
            .place_order(2, Side::Buy, OrderType::Limit, Some(price), qty, 1)
            .await
            .unwrap();

        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.trades[0].price, price);
        assert_eq!(result.trades[0].qty, qty);
        assert_eq!(engine.ledger.snapshot(2, 1).await, (qty, 0));
        assert_eq!(engine.ledger.snapshot(2, 2).await, (0, 0));
        assert_eq!(engine.ledger.snapshot(1, 2).await, (scale(50_000, 6), 0));
        assert_eq!(engine.book.get_depth(5).bids.len(), 0);
        assert_eq!(engine.book.get_depth(5).asks.len(), 0);
    }

    #[tokio::test]
    async fn partial_fill_leaves_maker_resting() {
        let mut engine = new_engine();
        let price = scale(50_000, 2);
        let full_qty = scale(2, 8);
        let buy_qty = scale(1, 8);

        engine.ledger.deposit(2, 2, scale(100_000, 6)).await.unwrap();
        engine.ledger.deposit(1, 1, full_qty).await.unwrap();

        engine
            .place_order(1, Side::Sell, OrderType::Limit, Some(price), full_qty, 0)
            .await
            .unwrap();
        engine
            .place_order(2, Side::Buy, OrderType::Limit, Some(price), buy_qty, 1)
            .await
            .unwrap();

        let depth = engine.book.get_depth(5);
        assert_eq!(depth.asks.len(), 1);
        assert_eq!(depth.asks[0], (price, full_qty - buy_qty));
    }

    #[tokio::test]
    async fn self_trade_cancels_the_maker() {
        let mut engine = new_engine();
        let price = scale(50_000, 2);
        let qty = scale(1, 8);

        engine.ledger.deposit(1, 1, qty).await.unwrap();
        engine.ledger.deposit(1, 2, scale(100_000, 6)).await.unwrap();

        engine
            .place_order(1, Side::Sell, OrderType::Limit, Some(price), qty, 0)
            .await
            .unwrap();
        let result = engine
            .place_order(1, Side::Buy, OrderType::Limit, Some(price), qty, 1)
            .await
            .unwrap();

        assert_eq!(result.trades.len(), 0);
        let depth = engine.book.get_depth(5);
        assert_eq!(depth.asks.len(), 0);
        assert_eq!(depth.bids.len(), 1);
        assert_eq!(engine.ledger.snapshot(1, 1).await, (qty, 0));
    }

    #[tokio::test]
    async fn market_buy_with_no_liquidity_is_rejected() {
        let mut engine = new_engine();
        engine.ledger.deposit(1, 2, scale(100_000, 6)).await.unwrap();
        let err = engine
            .place_order(1, Side::Buy, OrderType::Market, None, scale(1, 8), 0)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "NO_LIQUIDITY");
    }

    #[tokio::test]
    async fn cancel_refunds_frozen_balance() {
        let mut engine = new_engine();
        let price = scale(50_000, 2);
        let qty = scale(1, 8);
        engine.ledger.deposit(1, 2, scale(50_000, 6)).await.unwrap();

        let result = engine
            .place_order(1, Side::Buy, OrderType::Limit, Some(price), qty, 0)
            .await
            .unwrap();
        engine.cancel_order(1, result.order.order_id).await.unwrap();

        assert_eq!(engine.ledger.snapshot(1, 2).await, (scale(50_000, 6), 0));
        assert_eq!(engine.book.get_depth(5).bids.len(), 0);
    }

    #[tokio::test]
    async fn cancel_of_already_terminal_order_fails() {
        let mut engine = new_engine();
        let price = scale(50_000, 2);
        let qty = scale(1, 8);
        engine.ledger.deposit(1, 2, scale(50_000, 6)).await.unwrap();

        let result = engine
            .place_order(1, Side::Buy, OrderType::Limit, Some(price), qty, 0)
            .await
            .unwrap();
        engine.cancel_order(1, result.order.order_id).await.unwrap();
        let err = engine.cancel_order(1, result.order.order_id).await.unwrap_err();
        assert_eq!(err.code(), "ALREADY_TERMINAL");
    }

    #[tokio::test]
    async fn cancel_by_a_different_user_is_rejected() {
        let mut engine = new_engine();
        let price = scale(50_000, 2);
        let qty = scale(1, 8);
        engine.ledger.deposit(1, 2, scale(50_000, 6)).await.unwrap();

        let result = engine
            .place_order(1, Side::Buy, OrderType::Limit, Some(price), qty, 0)
            .await
            .unwrap();
        let err = engine.cancel_order(999, result.order.order_id).await.unwrap_err();
        assert_eq!(err.code(), "ALREADY_TERMINAL");
    }

    #[tokio::test]
    async fn multi_level_sweep_matches_each_maker_at_its_own_price() {
        let mut engine = new_engine();
        let qty = scale(1, 8);
        engine.ledger.deposit(10, 1, qty).await.unwrap();
        engine.ledger.deposit(11, 1, qty).await.unwrap();
        engine.ledger.deposit(12, 1, qty).await.unwrap();
        engine.ledger.deposit(2, 2, scale(1_000_000, 6)).await.unwrap();

        engine
            .place_order(10, Side::Sell, OrderType::Limit, Some(scale(50_000, 2)), qty, 0)
            .await
            .unwrap();
        engine
            .place_order(11, Side::Sell, OrderType::Limit, Some(scale(50_100, 2)), qty, 0)
            .await
            .unwrap();
        engine
            .place_order(12, Side::Sell, OrderType::Limit, Some(scale(50_200, 2)), qty, 0)
            .await
            .unwrap();

        let result = engine
            .place_order(2, Side::Buy, OrderType::Limit, Some(scale(50_200, 2)), qty * 3, 1)
            .await
            .unwrap();

        assert_eq!(result.trades.len(), 3);
        assert_eq!(result.trades[0].price, scale(50_000, 2));
        assert_eq!(result.trades[1].price, scale(50_100, 2));
        assert_eq!(result.trades[2].price, scale(50_200, 2));
        assert!(result.order.is_fully_filled());
        assert_eq!(engine.book.get_depth(5).asks.len(), 0);
    }

    #[tokio::test]
    async fn halted_symbol_rejects_new_orders() {
        let mut engine = new_engine();
        engine.halted = true;
        let err = engine
            .place_order(1, Side::Buy, OrderType::Limit, Some(scale(50_000, 2)), scale(1, 8), 0)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "SYMBOL_HALTED");
    }

    #[tokio::test]
    async fn post_insert_ledger_failure_halts_the_symbol() {
        let mut engine = new_engine();
        let price = scale(50_000, 2);
        let qty = scale(1, 8);

        engine.ledger.deposit(1, 1, qty).await.unwrap();
        engine.ledger.deposit(2, 2, scale(100_000, 6)).await.unwrap();

        engine
            .place_order(1, Side::Sell, OrderType::Limit, Some(price), qty, 0)
            .await
            .unwrap();
        // Simulate a book/ledger divergence: drain the resting maker's frozen
        // base out from under it, so the settle leg below fails.
        engine.ledger.unfreeze(1, 1, qty).await.unwrap();

        let err = engine
            .place_order(2, Side::Buy, OrderType::Limit, Some(price), qty, 1)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "SYMBOL_HALTED");
        assert!(engine.is_halted());
    }

    #[tokio::test]
    async fn halted_symbol_still_allows_cancel() {
        let mut engine = new_engine();
        let price = scale(50_000, 2);
        let qty = scale(1, 8);
        engine.ledger.deposit(1, 2, scale(50_000, 6)).await.unwrap();
        let result = engine
            .place_order(1, Side::Buy, OrderType::Limit, Some(price), qty, 0)
            .await
            .unwrap();

        engine.halted = true;
        engine.cancel_order(1, result.order.order_id).await.unwrap();
        assert_eq!(engine.ledger.snapshot(1, 2).await, (scale(50_000, 6), 0));
    }
}
