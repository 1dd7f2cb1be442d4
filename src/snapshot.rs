//! Snapshot/Delta Publisher (C5): turns `OrderBookChanged` events into
//! throttled, deduplicated market-data pushes, and applies the same
//! dedup/throttle discipline to ticker and candle updates.
//!
//! Holds the read-side depth cache gateway queries serve from directly
//! (`get_snapshot`), separate from the throttled push decision
//! (`on_order_book_changed`) that feeds the realtime fabric.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::RwLock;
use std::time::{Duration, Instant};

use rustc_hash::FxHashMap;

use crate::config::ThrottleConfig;
use crate::orderbook::DepthSnapshot;

pub const DEPTH_TOP_N: usize = 20;

/// A level-book push: either a full top-N snapshot or a delta of changed
/// levels only (`qty == 0` denotes a deleted level).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepthPushKind {
    Snapshot,
    Delta,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepthPush {
    pub symbol_id: u32,
    pub kind: DepthPushKind,
    pub bids: Vec<(u64, u64)>,
    pub asks: Vec<(u64, u64)>,
    pub update_id: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickerPush {
    pub symbol_id: u32,
    pub last_price: u64,
    pub best_bid: Option<u64>,
    pub best_ask: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandlePush {
    pub symbol_id: u32,
    pub open: u64,
    pub high: u64,
    pub low: u64,
    pub close: u64,
    pub volume: u64,
    pub closed: bool,
}

fn fingerprint_levels(bids: &[(u64, u64)], asks: &[(u64, u64)]) -> u64 {
    let mut hasher = DefaultHasher::new();
    bids.hash(&mut hasher);
    0xFFFF_FFFFu64.hash(&mut hasher); // side separator
    asks.hash(&mut hasher);
    hasher.finish()
}

/// Levels present in `curr` but absent or changed vs `prev`, plus levels
/// that disappeared (emitted with `qty = 0`). Sorted by price for
/// determinism.
fn diff_levels(prev: &[(u64, u64)], curr: &[(u64, u64)]) -> Vec<(u64, u64)> {
    let prev_map: FxHashMap<u64, u64> = prev.iter().copied().collect();
    let curr_map: FxHashMap<u64, u64> = curr.iter().copied().collect();

    let mut out = Vec::new();
    for (&price, &qty) in &curr_map {
        if prev_map.get(&price) != Some(&qty) {
            out.push((price, qty));
        }
    }
    for &price in prev_map.keys() {
        if !curr_map.contains_key(&price) {
            out.push((price, 0));
        }
    }
    out.sort_by_key(|&(p, _)| p);
    out
}

#[derive(Default)]
struct DepthState {
    cache: DepthSnapshot,
    last_fingerprint: Option<u64>,
    last_pushed: Option<(Vec<(u64, u64)>, Vec<(u64, u64)>)>,
    last_push_at: Option<Instant>,
    last_snapshot_at: Option<Instant>,
}

#[derive(Default)]
struct ThrottleState {
    last_fingerprint: Option<u64>,
    last_push_at: Option<Instant>,
}

/// Per-symbol push throttling for depth, ticker, and candle streams.
pub struct SnapshotPublisher {
    depth_throttle: Duration,
    ticker_throttle: Duration,
    candle_throttle: Duration,
    snapshot_interval: Duration,
    depth: RwLock<FxHashMap<u32, DepthState>>,
    ticker: RwLock<FxHashMap<u32, ThrottleState>>,
    candle: RwLock<FxHashMap<(u32, String), ThrottleState>>,
}

impl SnapshotPublisher {
    pub fn new(config: &ThrottleConfig) -> Self {
        Self {
            depth_throttle: Duration::from_millis(config.orderbook_ms),
            ticker_throttle: Duration::from_millis(config.ticker_ms),
            candle_throttle: Duration::from_millis(config.candle_ms),
            snapshot_interval: Duration::from_millis(config.snapshot_interval_ms),
            depth: RwLock::new(FxHashMap::default()),
            ticker: RwLock::new(FxHashMap::default()),
            candle: RwLock::new(FxHashMap::default()),
        }
    }

    /// Called by a symbol's single-writer task after any book mutation, to
    /// keep the read-side cache current for direct queries.
    pub fn update_depth_cache(&self, symbol_id: u32, snapshot: DepthSnapshot) {
        let mut map = self.depth.write().unwrap();
        map.entry(symbol_id).or_default().cache = snapshot;
    }

    /// Read-only top-N snapshot for `GET /orderbook/{symbol}`.
    pub fn get_snapshot(&self, symbol_id: u32, limit: usize) -> DepthSnapshot {
        let map = self.depth.read().unwrap();
        match map.get(&symbol_id) {
            Some(state) => DepthSnapshot::new(
                state.cache.bids.iter().take(limit).copied().collect(),
                state.cache.asks.iter().take(limit).copied().collect(),
                state.cache.update_id,
            ),
            None => DepthSnapshot::empty(),
        }
    }

    /// React to `OrderBookChanged(symbol)`: dedup/throttle/classify against
    /// the cached depth, returning the push to emit (if any).
    pub fn on_order_book_changed(&self, symbol_id: u32, now: Instant) -> Option<DepthPush> {
        let mut map = self.depth.write().unwrap();
        let state = map.entry(symbol_id).or_default();

        let bids: Vec<(u64, u64)> = state.cache.bids.iter().take(DEPTH_TOP_N).copied().collect();
        let asks: Vec<(u64, u64)> = state.cache.asks.iter().take(DEPTH_TOP_N).copied().collect();
        let fingerprint = fingerprint_levels(&bids, &asks);

        if state.last_fingerprint == Some(fingerprint) {
            return None; // dedup: book unchanged since the last push
        }

        if let Some(last) = state.last_push_at {
            if now.duration_since(last) < self.depth_throttle {
                // throttle: remember the fingerprint, coalesce into the next tick
                state.last_fingerprint = Some(fingerprint);
                return None;
            }
        }

        let gap_exceeded = state
            .last_snapshot_at
            .map(|t| now.duration_since(t) >= self.snapshot_interval)
            .unwrap_or(true);
        let kind = if state.last_pushed.is_none() || gap_exceeded {
            DepthPushKind::Snapshot
        } else {
            DepthPushKind::Delta
        };

        let (out_bids, out_asks) = match kind {
            DepthPushKind::Snapshot => (bids.clone(), asks.clone()),
            DepthPushKind::Delta => {
                let (prev_bids, prev_asks) = state.last_pushed.clone().unwrap_or_default();
                (diff_levels(&prev_bids, &bids), diff_levels(&prev_asks, &asks))
            }
        };

        let update_id = state.cache.update_id;
        state.last_fingerprint = Some(fingerprint);
        state.last_pushed = Some((bids, asks));
        state.last_push_at = Some(now);
        if kind == DepthPushKind::Snapshot {
            state.last_snapshot_at = Some(now);
        }

        Some(DepthPush {
            symbol_id,
            kind,
            bids: out_bids,
            asks: out_asks,
            update_id,
        })
    }

    /// Analogous dedup/throttle for ticker updates (1 s default interval).
    pub fn on_ticker_update(
        &self,
        symbol_id: u32,
        last_price: u64,
        best_bid: Option<u64>,
        best_ask: Option<u64>,
        now: Instant,
    ) -> Option<TickerPush> {
        let mut map = self.ticker.write().unwrap();
        let state = map.entry(symbol_id).or_default();

        let mut hasher = DefaultHasher::new();
        last_price.hash(&mut hasher);
        best_bid.hash(&mut hasher);
        best_ask.hash(&mut hasher);
        let fingerprint = hasher.finish();

        if state.last_fingerprint == Some(fingerprint) {
            return None;
        }
        if let Some(last) = state.last_push_at {
            if now.duration_since(last) < self.ticker_throttle {
                state.last_fingerprint = Some(fingerprint);
                return None;
            }
        }

        state.last_fingerprint = Some(fingerprint);
        state.last_push_at = Some(now);
        Some(TickerPush {
            symbol_id,
            last_price,
            best_bid,
            best_ask,
        })
    }

    /// Analogous dedup/throttle for open candles (1.5 s default interval).
    /// Closed candles are always emitted, bypassing throttle entirely.
    pub fn on_candle_update(&self, interval: &str, candle: CandlePush, now: Instant) -> Option<CandlePush> {
        if candle.closed {
            return Some(candle);
        }

        let key = (candle.symbol_id, interval.to_string());
        let mut map = self.candle.write().unwrap();
        let state = map.entry(key).or_default();

        let mut hasher = DefaultHasher::new();
        candle.open.hash(&mut hasher);
        candle.high.hash(&mut hasher);
        candle.low.hash(&mut hasher);
        candle.close.hash(&mut hasher);
        candle.volume.hash(&mut hasher);
        let fingerprint = hasher.finish();

        if state.last_fingerprint == Some(fingerprint) {
            return None;
        }
        if let Some(last) = state.last_push_at {
            if now.duration_since(last) < self.candle_throttle {
                state.last_fingerprint = Some(fingerprint);
                return None;
            }
        }

        state.last_fingerprint = Some(fingerprint);
        state.last_push_at = Some(now);
        Some(candle)
    }
}
