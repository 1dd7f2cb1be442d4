//! Wire shapes for the upstream feed (§6 "Upstream feed") and their
//! normalization into the internal push types the Snapshot/Delta Publisher
//! and Realtime Fabric understand.
//!
//! The upstream JSON shapes below are deliberately loose (plain `String`
//! prices, optional fields) because we do not control the upstream schema;
//! [`NormalizedEvent`] is the strict internal representation everything
//! downstream of the relay actually consumes.

use rust_decimal::Decimal;
use serde::Deserialize;

/// One level of a depth update, as the upstream sends it.
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamLevel {
    pub price: Decimal,
    pub qty: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UpstreamMessage {
    Ticker {
        symbol: String,
        last: Decimal,
        high24h: Decimal,
        low24h: Decimal,
        volume24h: Decimal,
        #[serde(rename = "changePercent")]
        change_percent: Decimal,
        ts: i64,
    },
    Depth {
        symbol: String,
        #[serde(rename = "isSnapshot")]
        is_snapshot: bool,
        bids: Vec<UpstreamLevel>,
        asks: Vec<UpstreamLevel>,
        ts: i64,
    },
    Trade {
        symbol: String,
        #[serde(rename = "tradeId")]
        trade_id: u64,
        price: Decimal,
        qty: Decimal,
        side: String,
        ts: i64,
    },
    Candle {
        symbol: String,
        interval: String,
        #[serde(rename = "openTime")]
        open_time: i64,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: Decimal,
        closed: bool,
        ts: i64,
    },
}

/// The normalized shape every upstream message is parsed into before it is
/// handed to the publisher / realtime fabric. Keeping this separate from
/// `UpstreamMessage` means a future upstream with a different wire format
/// only needs a new `parse` function, not changes downstream.
#[derive(Debug, Clone)]
pub enum NormalizedEvent {
    Ticker {
        symbol: String,
        last: Decimal,
        high24h: Decimal,
        low24h: Decimal,
        volume24h: Decimal,
        change_percent: Decimal,
    },
    Depth {
        symbol: String,
        is_snapshot: bool,
        bids: Vec<(Decimal, Decimal)>,
        asks: Vec<(Decimal, Decimal)>,
    },
    Trade {
        symbol: String,
        trade_id: u64,
        price: Decimal,
        qty: Decimal,
        side: String,
        ts: i64,
    },
    Candle {
        symbol: String,
        interval: String,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: Decimal,
        closed: bool,
    },
}

impl NormalizedEvent {
    pub fn symbol(&self) -> &str {
        match self {
            NormalizedEvent::Ticker { symbol, .. }
            | NormalizedEvent::Depth { symbol, .. }
            | NormalizedEvent::Trade { symbol, .. }
            | NormalizedEvent::Candle { symbol, .. } => symbol,
        }
    }
}

/// Parse one upstream text frame into a normalized event.
///
/// Unknown/unsupported upstream shapes are not an error at this layer: the
/// relay logs and drops them rather than tearing down the connection over a
/// single malformed or unrecognized message.
pub fn parse_upstream_message(text: &str) -> Result<NormalizedEvent, crate::errors::RelayError> {
    let msg: UpstreamMessage = serde_json::from_str(text)
        .map_err(|e| crate::errors::RelayError::Parse(e.to_string()))?;

    Ok(match msg {
        UpstreamMessage::Ticker {
            symbol,
            last,
            high24h,
            low24h,
            volume24h,
            change_percent,
            ..
        } => NormalizedEvent::Ticker {
            symbol,
            last,
            high24h,
            low24h,
            volume24h,
            change_percent,
        },
        UpstreamMessage::Depth {
            symbol,
            is_snapshot,
            bids,
            asks,
            ..
        } => NormalizedEvent::Depth {
            symbol,
            is_snapshot,
            bids: bids.into_iter().map(|l| (l.price, l.qty)).collect(),
            asks: asks.into_iter().map(|l| (l.price, l.qty)).collect(),
        },
        UpstreamMessage::Trade {
            symbol,
            trade_id,
            price,
            qty,
            side,
            ts,
        } => NormalizedEvent::Trade {
            symbol,
            trade_id,
            price,
            qty,
            side,
            ts,
        },
        UpstreamMessage::Candle {
            symbol,
            interval,
            open,
            high,
            low,
            close,
            volume,
            closed,
            ..
        } => NormalizedEvent::Candle {
            symbol,
            interval,
            open,
            high,
            low,
            close,
            volume,
            closed,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ticker() {
        let text = r#"{"kind":"ticker","symbol":"BTC_USDT","last":"50000","high24h":"51000","low24h":"49000","volume24h":"120.5","changePercent":"1.2","ts":1000}"#;
        let ev = parse_upstream_message(text).unwrap();
        match ev {
            NormalizedEvent::Ticker { symbol, last, .. } => {
                assert_eq!(symbol, "BTC_USDT");
                assert_eq!(last, Decimal::from(50000));
            }
            _ => panic!("expected ticker"),
        }
    }

    #[test]
    fn parses_depth_snapshot() {
        let text = r#"{"kind":"depth","symbol":"BTC_USDT","isSnapshot":true,"bids":[{"price":"100","qty":"1"}],"asks":[],"ts":1}"#;
        let ev = parse_upstream_message(text).unwrap();
        match ev {
            NormalizedEvent::Depth {
                is_snapshot, bids, ..
            } => {
                assert!(is_snapshot);
                assert_eq!(bids.len(), 1);
            }
            _ => panic!("expected depth"),
        }
    }

    #[test]
    fn rejects_malformed_json() {
        let err = parse_upstream_message("not json").unwrap_err();
        assert_eq!(err.code(), "UPSTREAM_PARSE_ERROR");
    }
}
