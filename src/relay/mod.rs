//! Market-Data Relay (C6): maintains the upstream connection, normalizes
//! upstream messages, and fans them out as reference market data. Never
//! writes to the local Order Book or Asset Ledger — purely informational.

pub mod normalize;
pub mod upstream;

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;

use crate::realtime::connection::SharedConnectionManager;
use crate::realtime::messages::{
    topic_kline, topic_price, topic_trades, KLinePayload, PriceData, ServerEvent, TradePayload,
};
use crate::snapshot::{CandlePush, SnapshotPublisher};
use crate::symbol_manager::SymbolManager;

use normalize::NormalizedEvent;
pub use upstream::{ConnectionState, RelayHealth, UpstreamRelay};

/// Drains normalized upstream events and pushes them through the
/// Snapshot/Delta Publisher's throttle (for ticker/candle dedup) before
/// fanning them out on the realtime fabric's `price:{sym}` / `kline:{sym}:{itv}`
/// / `trades:{sym}` topics, per §4.6's four normalized channels. Upstream
/// trades are republished on `trades:{sym}` alongside the venue's own
/// executed trades (distinguishable by `trade_id`) — for symbols with no
/// local liquidity yet, the upstream feed is the only source of trade
/// prints. `Depth` is the one channel intentionally not re-published here:
/// `orderbook:{sym}` is already owned end-to-end by the local matching
/// engine's `OrderBookChanged` → `SnapshotPublisher` path, and pushing a
/// second, disagreeing depth view onto the same topic from upstream data
/// would contradict the venue's own authoritative book (see DESIGN.md's
/// Open Question decisions).
pub async fn run_relay_fanout(
    mut rx: mpsc::Receiver<NormalizedEvent>,
    symbol_mgr: Arc<SymbolManager>,
    publisher: Arc<SnapshotPublisher>,
    connections: SharedConnectionManager,
) {
    while let Some(event) = rx.recv().await {
        let symbol = event.symbol().to_string();
        let Some(symbol_id) = symbol_mgr.get_symbol_id(&symbol) else {
            tracing::debug!(%symbol, "upstream event for unknown symbol, dropping");
            continue;
        };

        match event {
            NormalizedEvent::Ticker {
                last,
                high24h,
                low24h,
                volume24h,
                change_percent,
                ..
            } => {
                let Some(last_scaled) = symbol_mgr.parse_price(&last.to_string(), symbol_id) else {
                    continue;
                };
                if publisher
                    .on_ticker_update(symbol_id, last_scaled.to_raw(), None, None, Instant::now())
                    .is_some()
                {
                    connections.publish(
                        &topic_price(&symbol),
                        ServerEvent::PriceUpdate {
                            payload: PriceData {
                                symbol: symbol.clone(),
                                last: last.to_string(),
                                high24h: high24h.to_string(),
                                low24h: low24h.to_string(),
                                volume24h: volume24h.to_string(),
                                change_percent: change_percent.to_string(),
                            },
                        },
                    );
                }
            }
            NormalizedEvent::Candle {
                interval,
                open,
                high,
                low,
                close,
                volume,
                closed,
                ..
            } => {
                let (Some(open), Some(high), Some(low), Some(close), Some(volume)) = (
                    symbol_mgr.parse_price(&open.to_string(), symbol_id),
                    symbol_mgr.parse_price(&high.to_string(), symbol_id),
                    symbol_mgr.parse_price(&low.to_string(), symbol_id),
                    symbol_mgr.parse_price(&close.to_string(), symbol_id),
                    symbol_mgr.parse_qty(&volume.to_string(), symbol_id),
                ) else {
                    continue;
                };
                let candle = CandlePush {
                    symbol_id,
                    open: open.to_raw(),
                    high: high.to_raw(),
                    low: low.to_raw(),
                    close: close.to_raw(),
                    volume: volume.to_raw(),
                    closed,
                };
                if let Some(pushed) = publisher.on_candle_update(&interval, candle, Instant::now())
                {
                    connections.publish(
                        &topic_kline(&symbol, &interval),
                        ServerEvent::KLineUpdate {
                            payload: KLinePayload {
                                symbol: symbol.clone(),
                                interval: interval.clone(),
                                open: symbol_mgr
                                    .format_price(pushed.open.into(), symbol_id)
                                    .unwrap_or_default(),
                                high: symbol_mgr
                                    .format_price(pushed.high.into(), symbol_id)
                                    .unwrap_or_default(),
                                low: symbol_mgr
                                    .format_price(pushed.low.into(), symbol_id)
                                    .unwrap_or_default(),
                                close: symbol_mgr
                                    .format_price(pushed.close.into(), symbol_id)
                                    .unwrap_or_default(),
                                volume: symbol_mgr
                                    .format_qty(pushed.volume.into(), symbol_id)
                                    .unwrap_or_default(),
                                closed: pushed.closed,
                            },
                            is_new_kline: pushed.closed,
                        },
                    );
                }
            }
            NormalizedEvent::Depth { .. } => {
                tracing::trace!(%symbol, "upstream depth received, not republished (local book is authoritative)");
            }
            NormalizedEvent::Trade {
                trade_id,
                price,
                qty,
                side,
                ts,
                ..
            } => {
                let (Some(price_scaled), Some(qty_scaled)) = (
                    symbol_mgr.parse_price(&price.to_string(), symbol_id),
                    symbol_mgr.parse_qty(&qty.to_string(), symbol_id),
                ) else {
                    continue;
                };
                connections.publish(
                    &topic_trades(&symbol),
                    ServerEvent::TradeUpdate {
                        payload: TradePayload {
                            symbol: symbol.clone(),
                            trade_id,
                            price: symbol_mgr
                                .format_price(price_scaled, symbol_id)
                                .unwrap_or_default(),
                            qty: symbol_mgr
                                .format_qty(qty_scaled, symbol_id)
                                .unwrap_or_default(),
                            side,
                            ts,
                        },
                    },
                );
            }
        }
    }
}
