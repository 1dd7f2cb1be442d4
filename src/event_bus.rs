//! Event Bus (C4): in-process typed pub/sub fanning engine events out to the
//! snapshot publisher and durability writer.
//!
//! One `tokio::sync::broadcast` channel per symbol, registered up front at
//! startup. Publish from a symbol's single-writer task is non-blocking: a
//! full channel never backs up the matching path, since `broadcast::Sender`
//! only trims its ring buffer and makes the oldest entries unavailable to
//! slow receivers rather than blocking the sender. A receiver that falls far
//! enough behind observes `RecvError::Lagged(n)` on its next `recv().await`
//! and must treat that as "resubscribe with a fresh snapshot" per §4.4 —
//! never silently skip the gap.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::messages::RejectReason;
use crate::models::{InternalOrder, Trade};

/// A single engine event. Every variant carries the `{symbol_id, seq}` pair
/// so a consumer can detect gaps even across event kinds.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    OrderAccepted {
        symbol_id: u32,
        seq: u64,
        order: InternalOrder,
    },
    OrderRejected {
        symbol_id: u32,
        seq: u64,
        user_id: u64,
        reason: RejectReason,
    },
    OrderCanceled {
        symbol_id: u32,
        seq: u64,
        order: InternalOrder,
    },
    /// Emitted once an order reaches terminal `Filled` status, whether as
    /// the taker that completed the incoming `placeOrder` call or as a
    /// maker fully consumed inside the match loop.
    OrderFilled {
        symbol_id: u32,
        seq: u64,
        order: InternalOrder,
    },
    TradeExecuted {
        symbol_id: u32,
        seq: u64,
        trade: Trade,
    },
    OrderBookChanged {
        symbol_id: u32,
        seq: u64,
    },
}

impl EngineEvent {
    pub fn symbol_id(&self) -> u32 {
        match self {
            EngineEvent::OrderAccepted { symbol_id, .. }
            | EngineEvent::OrderRejected { symbol_id, .. }
            | EngineEvent::OrderCanceled { symbol_id, .. }
            | EngineEvent::OrderFilled { symbol_id, .. }
            | EngineEvent::TradeExecuted { symbol_id, .. }
            | EngineEvent::OrderBookChanged { symbol_id, .. } => *symbol_id,
        }
    }

    pub fn seq(&self) -> u64 {
        match self {
            EngineEvent::OrderAccepted { seq, .. }
            | EngineEvent::OrderRejected { seq, .. }
            | EngineEvent::OrderCanceled { seq, .. }
            | EngineEvent::OrderFilled { seq, .. }
            | EngineEvent::TradeExecuted { seq, .. }
            | EngineEvent::OrderBookChanged { seq, .. } => *seq,
        }
    }
}

/// Per-symbol broadcast fan-out. `register_symbol` must be called once at
/// startup for every symbol before any task publishes or subscribes to it.
#[derive(Debug)]
pub struct EventBus {
    channels: DashMap<u32, broadcast::Sender<EngineEvent>>,
    capacity: usize,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: DashMap::new(),
            capacity,
        }
    }

    /// Idempotent: creates the symbol's channel if it doesn't exist yet.
    pub fn register_symbol(&self, symbol_id: u32) {
        self.channels
            .entry(symbol_id)
            .or_insert_with(|| broadcast::channel(self.capacity).0);
    }

    /// Publish an event for `symbol_id`. A no-op if nobody has subscribed yet
    /// (broadcast returns an error when there are zero receivers; that is not
    /// a failure worth surfacing — market data with no subscribers is fine).
    pub fn publish(&self, symbol_id: u32, event: EngineEvent) {
        if let Some(sender) = self.channels.get(&symbol_id) {
            let _ = sender.send(event);
        }
    }

    /// Subscribe to a symbol's event stream. Returns `None` if the symbol was
    /// never registered.
    pub fn subscribe(&self, symbol_id: u32) -> Option<broadcast::Receiver<EngineEvent>> {
        self.channels.get(&symbol_id).map(|s| s.subscribe())
    }
}

pub type SharedEventBus = Arc<EventBus>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Side;

    #[tokio::test]
    async fn publish_before_subscribe_is_silently_dropped() {
        let bus = EventBus::new(16);
        bus.register_symbol(1);
        bus.publish(
            1,
            EngineEvent::OrderBookChanged {
                symbol_id: 1,
                seq: 1,
            },
        );
        // no receivers yet: nothing to assert other than "it didn't panic"
    }

    #[tokio::test]
    async fn subscriber_receives_published_events_in_order() {
        let bus = EventBus::new(16);
        bus.register_symbol(1);
        let mut rx = bus.subscribe(1).unwrap();

        bus.publish(
            1,
            EngineEvent::OrderBookChanged {
                symbol_id: 1,
                seq: 1,
            },
        );
        bus.publish(
            1,
            EngineEvent::TradeExecuted {
                symbol_id: 1,
                seq: 2,
                trade: Trade::new(1, 1, 10, 100, 11, 200, 50_000, 1, Side::Buy, 0),
            },
        );

        let first = rx.recv().await.unwrap();
        assert_eq!(first.seq(), 1);
        let second = rx.recv().await.unwrap();
        assert_eq!(second.seq(), 2);
    }

    #[tokio::test]
    async fn unregistered_symbol_subscribe_returns_none() {
        let bus = EventBus::new(16);
        assert!(bus.subscribe(99).is_none());
    }

    #[tokio::test]
    async fn slow_subscriber_observes_lagged_error() {
        let bus = EventBus::new(2);
        bus.register_symbol(1);
        let mut rx = bus.subscribe(1).unwrap();

        for seq in 0..5 {
            bus.publish(
                1,
                EngineEvent::OrderBookChanged {
                    symbol_id: 1,
                    seq,
                },
            );
        }

        let err = rx.recv().await.unwrap_err();
        assert!(matches!(err, broadcast::error::RecvError::Lagged(_)));
    }
}
