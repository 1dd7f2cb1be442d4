//! Durability Writer (C8): best-effort, batched, off the hot path, per §4.8.
//!
//! Grounded in the teacher's `persistence::repository` `async_trait`
//! abstraction and `persistence::schema`'s TDengine table shapes, but the
//! traffic direction is reversed: the teacher's repositories are read-only
//! query helpers driven by the REST gateway, while this writes
//! `OrderAccepted`/`TradeExecuted`/`OrderCanceled`/`OrderFilled` events
//! consumed off the Event Bus. The write path is a bounded `tokio::mpsc`
//! queue drained in batches (`DurabilityConfig::batch_size` /
//! `flush_interval_ms`), consistent with §5's queue-everywhere concurrency
//! model: a full queue never blocks a symbol's single-writer task — events
//! are dropped and counted instead, per the "never back-pressures the
//! matching path" contract.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::event_bus::EngineEvent;
use crate::models::{InternalOrder, OrderStatus, Trade};

/// One durable record, derived from an [`EngineEvent`]. Kept separate from
/// `EngineEvent` itself so the write-side shape can evolve (e.g. add a
/// `cid` column) without touching the Event Bus's wire type.
#[derive(Debug, Clone)]
pub enum DurableRecord {
    OrderAccepted(InternalOrder),
    OrderCanceled(InternalOrder),
    OrderFilled(InternalOrder),
    TradeExecuted(Trade),
}

/// Abstracts the backing store so tests can substitute an in-memory fake
/// without a live TDengine instance. Mirrors the teacher's
/// `OrderRepository`/`TradeRepository` trait split, but `write_batch` takes
/// ownership of a whole batch rather than one row at a time.
#[async_trait]
pub trait DurabilityStore: Send + Sync {
    async fn write_batch(&self, records: &[DurableRecord]) -> anyhow::Result<()>;
}

/// Tracks whether the store has failed recently, surfaced at `GET /health`
/// (§4.8: "on repeated write failure, surface a health signal").
#[derive(Debug, Default)]
pub struct DurabilityHealth {
    consecutive_failures: AtomicU64,
    degraded: AtomicBool,
}

impl DurabilityHealth {
    const DEGRADED_THRESHOLD: u64 = 3;

    fn record_success(&self) {
        self.consecutive_failures.store(0, Ordering::Relaxed);
        self.degraded.store(false, Ordering::Relaxed);
    }

    fn record_failure(&self) {
        let n = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
        if n >= Self::DEGRADED_THRESHOLD {
            self.degraded.store(true, Ordering::Relaxed);
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Relaxed)
    }
}

/// Best-effort batched writer. Owns the receiving end of a bounded mpsc
/// queue; `handle()` gives producers a cheap `try_send`-based sender.
pub struct DurabilityWriter<S: DurabilityStore> {
    store: S,
    batch_size: usize,
    flush_interval: std::time::Duration,
    health: Arc<DurabilityHealth>,
}

#[derive(Clone)]
pub struct DurabilityHandle {
    tx: tokio::sync::mpsc::Sender<DurableRecord>,
    health: Arc<DurabilityHealth>,
}

impl DurabilityHandle {
    /// Non-blocking by design: the matching path must never suspend here.
    /// A full queue drops the event — acceptable per §4.8's best-effort
    /// contract — and is counted via `tracing`.
    pub fn try_enqueue(&self, record: DurableRecord) {
        if self.tx.try_send(record).is_err() {
            tracing::warn!("durability queue full, dropping record");
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.health.is_degraded()
    }

    /// Translates an engine event into the subset of durable records C8
    /// cares about (§4.8: `OrderAccepted`, `TradeExecuted`, `OrderCanceled`,
    /// `OrderFilled`). `OrderRejected` and `OrderBookChanged` carry nothing
    /// worth persisting long-term and are intentionally not mapped.
    pub fn observe_engine_event(&self, event: &EngineEvent) {
        match event {
            EngineEvent::OrderAccepted { order, .. } => {
                self.try_enqueue(DurableRecord::OrderAccepted(order.clone()));
            }
            EngineEvent::OrderCanceled { order, .. } => {
                self.try_enqueue(DurableRecord::OrderCanceled(order.clone()));
            }
            EngineEvent::OrderFilled { order, .. } => {
                self.try_enqueue(DurableRecord::OrderFilled(order.clone()));
            }
            EngineEvent::TradeExecuted { trade, .. } => {
                self.try_enqueue(DurableRecord::TradeExecuted(trade.clone()));
            }
            EngineEvent::OrderBookChanged { .. } | EngineEvent::OrderRejected { .. } => {}
        }
    }
}

impl<S: DurabilityStore + 'static> DurabilityWriter<S> {
    pub fn new(store: S, batch_size: usize, flush_interval: std::time::Duration) -> Self {
        Self {
            store,
            batch_size,
            flush_interval,
            health: Arc::new(DurabilityHealth::default()),
        }
    }

    /// Spawns the batching loop and returns a handle producers can clone
    /// freely. `queue_capacity` is `QueueConfig::durability_capacity`.
    pub fn spawn(self, queue_capacity: usize) -> DurabilityHandle {
        let (tx, rx) = tokio::sync::mpsc::channel(queue_capacity);
        let health = self.health.clone();
        tokio::spawn(self.run(rx));
        DurabilityHandle { tx, health }
    }

    async fn run(self, mut rx: tokio::sync::mpsc::Receiver<DurableRecord>) {
        let mut batch = Vec::with_capacity(self.batch_size);
        let mut ticker = tokio::time::interval(self.flush_interval);

        loop {
            tokio::select! {
                maybe_record = rx.recv() => {
                    match maybe_record {
                        Some(record) => {
                            batch.push(record);
                            if batch.len() >= self.batch_size {
                                self.flush(&mut batch).await;
                            }
                        }
                        None => {
                            self.flush(&mut batch).await;
                            return;
                        }
                    }
                }
                _ = ticker.tick() => {
                    self.flush(&mut batch).await;
                }
            }
        }
    }

    async fn flush(&self, batch: &mut Vec<DurableRecord>) {
        if batch.is_empty() {
            return;
        }
        match self.store.write_batch(batch).await {
            Ok(()) => {
                self.health.record_success();
            }
            Err(e) => {
                self.health.record_failure();
                tracing::error!(error = %e, dropped = batch.len(), "durability batch write failed");
            }
        }
        batch.clear();
    }
}

/// TDengine-backed implementation. SQL shapes mirror
/// `persistence::schema`'s `orders`/`trades` super tables.
pub struct TDengineDurabilityStore {
    taos: Arc<taos::Taos>,
}

impl TDengineDurabilityStore {
    pub fn new(taos: Arc<taos::Taos>) -> Self {
        Self { taos }
    }

    fn order_insert_sql(order: &InternalOrder, status_override: Option<OrderStatus>) -> String {
        let status = status_override.unwrap_or(order.status) as u8;
        format!(
            "INSERT INTO orders_{} USING orders TAGS ({}) VALUES (now, {}, {}, {}, {}, {}, {}, {}, {}, '')",
            order.symbol_id,
            order.symbol_id,
            order.order_id,
            order.user_id,
            order.side as u8,
            order.order_type as u8,
            order.price,
            order.qty,
            order.filled_qty,
            status,
        )
    }

    fn trade_insert_sql(trade: &Trade) -> String {
        let (order_id, user_id) = match trade.taker_side {
            crate::models::Side::Buy => (trade.buyer_order_id, trade.buyer_user_id),
            crate::models::Side::Sell => (trade.seller_order_id, trade.seller_user_id),
        };
        format!(
            "INSERT INTO trades_{} USING trades TAGS ({}) VALUES (now, {}, {}, {}, {}, {}, {}, 0, 0)",
            trade.symbol_id,
            trade.symbol_id,
            trade.trade_id,
            order_id,
            user_id,
            trade.taker_side as u8,
            trade.price,
            trade.qty,
        )
    }
}

#[async_trait]
impl DurabilityStore for TDengineDurabilityStore {
    async fn write_batch(&self, records: &[DurableRecord]) -> anyhow::Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut statements = Vec::with_capacity(records.len());
        for record in records {
            let sql = match record {
                DurableRecord::OrderAccepted(order) => Self::order_insert_sql(order, None),
                DurableRecord::OrderCanceled(order) => {
                    Self::order_insert_sql(order, Some(OrderStatus::Cancelled))
                }
                DurableRecord::OrderFilled(order) => {
                    Self::order_insert_sql(order, Some(OrderStatus::Filled))
                }
                DurableRecord::TradeExecuted(trade) => Self::trade_insert_sql(trade),
            };
            statements.push(sql);
        }

        let combined = statements.join(" ");
        self.taos
            .exec(combined)
            .await
            .map_err(|e| anyhow::anyhow!("TDengine batch write failed: {e}"))?;
        Ok(())
    }
}

/// In-memory fake for tests, mirroring the teacher's pattern of keeping
/// repository traits substitutable.
#[cfg(test)]
pub struct InMemoryDurabilityStore {
    pub written: std::sync::Mutex<Vec<DurableRecord>>,
    pub fail_next: AtomicBool,
}

#[cfg(test)]
impl InMemoryDurabilityStore {
    pub fn new() -> Self {
        Self {
            written: std::sync::Mutex::new(Vec::new()),
            fail_next: AtomicBool::new(false),
        }
    }
}

#[cfg(test)]
#[async_trait]
impl DurabilityStore for InMemoryDurabilityStore {
    async fn write_batch(&self, records: &[DurableRecord]) -> anyhow::Result<()> {
        if self.fail_next.swap(false, Ordering::Relaxed) {
            anyhow::bail!("simulated failure");
        }
        self.written.lock().unwrap().extend_from_slice(records);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Side;
    use std::sync::Arc as StdArc;
    use std::time::Duration;

    fn sample_order() -> InternalOrder {
        InternalOrder::new(1, 1, 1, 50_000, 1_000, Side::Buy)
    }

    #[tokio::test]
    async fn batches_flush_at_size_threshold() {
        let store = StdArc::new(InMemoryDurabilityStore::new());
        let writer = DurabilityWriter::new(CloneStore(store.clone()), 2, Duration::from_secs(60));
        let handle = writer.spawn(16);

        handle.try_enqueue(DurableRecord::OrderAccepted(sample_order()));
        handle.try_enqueue(DurableRecord::OrderAccepted(sample_order()));

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(store.written.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn batches_flush_on_timer_below_threshold() {
        let store = StdArc::new(InMemoryDurabilityStore::new());
        let writer =
            DurabilityWriter::new(CloneStore(store.clone()), 100, Duration::from_millis(15));
        let handle = writer.spawn(16);

        handle.try_enqueue(DurableRecord::OrderAccepted(sample_order()));
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(store.written.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn repeated_failures_mark_degraded() {
        let store = StdArc::new(InMemoryDurabilityStore::new());
        store.fail_next.store(true, Ordering::Relaxed);
        let health = Arc::new(DurabilityHealth::default());
        health.record_failure();
        health.record_failure();
        assert!(!health.is_degraded());
        health.record_failure();
        assert!(health.is_degraded());
    }

    #[tokio::test]
    async fn engine_event_translation_skips_book_changed() {
        let store = StdArc::new(InMemoryDurabilityStore::new());
        let writer = DurabilityWriter::new(CloneStore(store.clone()), 1, Duration::from_secs(60));
        let handle = writer.spawn(16);

        handle.observe_engine_event(&EngineEvent::OrderBookChanged {
            symbol_id: 1,
            seq: 1,
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(store.written.lock().unwrap().is_empty());
    }

    /// Wraps a shared `Arc<InMemoryDurabilityStore>` so the test can keep
    /// its own reference while also handing one to `DurabilityWriter`.
    struct CloneStore(StdArc<InMemoryDurabilityStore>);

    #[async_trait]
    impl DurabilityStore for CloneStore {
        async fn write_batch(&self, records: &[DurableRecord]) -> anyhow::Result<()> {
            self.0.write_batch(records).await
        }
    }
}
