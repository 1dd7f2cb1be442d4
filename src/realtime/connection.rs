//! Connection registry and topic fan-out for the Realtime Fabric (C7).
//!
//! Grounded on the teacher's `websocket/connection.rs`
//! (`ConnectionManager{DashMap<UserId, Vec<(ConnectionId, WsSender)>>}`) but
//! reworked around topics rather than user ids, since market data fan-out is
//! topic-scoped, not user-scoped: `subscribe`/`unsubscribe`/`broadcast` are
//! added here in the same `DashMap`-based style the teacher's
//! `websocket/handler.rs` already assumed existed.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{broadcast, mpsc};

use crate::errors::RealtimeError;
use crate::realtime::messages::ServerEvent;
use crate::realtime::subscription::SubscriptionHandle;

pub type ConnId = u64;

/// A registered client connection: its outbound queue and whether it
/// presented a valid bearer token at connect time.
struct Connection {
    tx: mpsc::Sender<ServerEvent>,
    authenticated: bool,
}

/// Per-topic broadcast channel plus the last value pushed, so a fresh
/// subscriber can be caught up immediately (§4.7: "On subscribe the fabric
/// immediately delivers the cached last snapshot if available").
struct TopicState {
    sender: broadcast::Sender<ServerEvent>,
    last: Option<ServerEvent>,
}

pub struct ConnectionManager {
    connections: DashMap<ConnId, Connection>,
    topics: DashMap<String, TopicState>,
    next_conn_id: AtomicU64,
    topic_capacity: usize,
    subscriber_queue_size: usize,
}

impl ConnectionManager {
    pub fn new(topic_capacity: usize, subscriber_queue_size: usize) -> Self {
        Self {
            connections: DashMap::new(),
            topics: DashMap::new(),
            next_conn_id: AtomicU64::new(1),
            topic_capacity,
            subscriber_queue_size,
        }
    }

    /// Registers a new connection and returns its id plus the receiving end
    /// of its bounded outbound queue (the handler task drains this to the
    /// socket).
    pub fn register(&self, authenticated: bool) -> (ConnId, mpsc::Receiver<ServerEvent>) {
        let conn_id = self.next_conn_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.subscriber_queue_size);
        self.connections.insert(conn_id, Connection { tx, authenticated });
        (conn_id, rx)
    }

    pub fn remove(&self, conn_id: ConnId) {
        self.connections.remove(&conn_id);
    }

    pub fn is_authenticated(&self, conn_id: ConnId) -> bool {
        self.connections
            .get(&conn_id)
            .map(|c| c.authenticated)
            .unwrap_or(false)
    }

    fn topic_entry(&self, topic: &str) -> broadcast::Sender<ServerEvent> {
        self.topics
            .entry(topic.to_string())
            .or_insert_with(|| TopicState {
                sender: broadcast::channel(self.topic_capacity).0,
                last: None,
            })
            .sender
            .clone()
    }

    /// Publishes an event to a topic and caches it as the "last" value.
    /// Called by the Market-Data Relay (C6) and the Snapshot/Delta Publisher
    /// glue in the orchestration layer, never directly by client handlers.
    pub fn publish(&self, topic: &str, event: ServerEvent) {
        let sender = self.topic_entry(topic);
        let _ = sender.send(event.clone());
        if let Some(mut state) = self.topics.get_mut(topic) {
            state.last = Some(event);
        }
    }

    /// Sends an event directly to one connection (acks, errors) without
    /// going through a topic's broadcast fan-out. Best-effort: a full queue
    /// silently drops the message rather than blocking the caller.
    pub fn publish_to_conn_best_effort(&self, conn_id: ConnId, event: ServerEvent) {
        if let Some(conn) = self.connections.get(&conn_id) {
            let _ = conn.tx.try_send(event);
        }
    }

    fn last_snapshot(&self, topic: &str) -> Option<ServerEvent> {
        self.topics.get(topic).and_then(|s| s.last.clone())
    }

    /// Subscribes `conn_id` to `topic`, spawning a forwarding task that
    /// copies broadcast events into the connection's outbound queue. Returns
    /// a [`SubscriptionHandle`] the caller uses to unsubscribe later.
    ///
    /// If the connection's queue is already full when a forwarded event
    /// arrives, the subscription is dropped and an `Error` event is pushed
    /// (best-effort) telling the client to resubscribe (§5 back-pressure
    /// policy: "overflow -> subscriber marked lagged and forced
    /// resubscribe").
    pub fn subscribe(
        &self,
        conn_id: ConnId,
        topic: &str,
    ) -> Result<SubscriptionHandle, RealtimeError> {
        let conn_tx = self
            .connections
            .get(&conn_id)
            .map(|c| c.tx.clone())
            .ok_or(RealtimeError::SendOverflow)?;

        if let Some(snapshot) = self.last_snapshot(topic) {
            let _ = conn_tx.try_send(snapshot);
        }

        let mut rx = self.topic_entry(topic).subscribe();
        let topic_owned = topic.to_string();
        let join = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        if conn_tx.try_send(event).is_err() {
                            let _ = conn_tx
                                .try_send(ServerEvent::Error {
                                    message: format!(
                                        "subscriber lagged on {topic_owned}, resubscribe"
                                    ),
                                })
                                .ok();
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => {
                        let _ = conn_tx
                            .try_send(ServerEvent::Error {
                                message: format!("lagged on {topic_owned}, resubscribe"),
                            })
                            .ok();
                        break;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Ok(SubscriptionHandle {
            topic: topic.to_string(),
            forward_task: join.abort_handle(),
        })
    }
}

pub type SharedConnectionManager = Arc<ConnectionManager>;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_before_subscribe_is_cached_and_replayed() {
        let mgr = ConnectionManager::new(16, 16);
        mgr.publish(
            "price:BTC_USDT",
            ServerEvent::Error {
                message: "seed".into(),
            },
        );
        let (conn_id, mut rx) = mgr.register(false);
        let _handle = mgr.subscribe(conn_id, "price:BTC_USDT").unwrap();
        let first = rx.recv().await.unwrap();
        assert!(matches!(first, ServerEvent::Error { .. }));
    }

    #[tokio::test]
    async fn unsubscribe_stops_forwarding() {
        let mgr = ConnectionManager::new(16, 16);
        let (conn_id, mut rx) = mgr.register(false);
        let handle = mgr.subscribe(conn_id, "trades:BTC_USDT").unwrap();
        handle.unsubscribe();
        mgr.publish(
            "trades:BTC_USDT",
            ServerEvent::Error {
                message: "after-unsub".into(),
            },
        );
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn unauthenticated_connection_defaults_not_authenticated() {
        let mgr = ConnectionManager::new(16, 16);
        let (conn_id, _rx) = mgr.register(false);
        assert!(!mgr.is_authenticated(conn_id));
    }
}
