//! Wire messages for the Realtime Fabric (C7), per §4.7. Method and event
//! names are normative for wire compatibility — do not rename variants.

use serde::{Deserialize, Serialize};

fn default_depth() -> u32 {
    5
}

/// Client-invocable operations.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "method")]
pub enum ClientMessage {
    SubscribeKLineData { symbol: String, interval: String },
    UnsubscribeKLineData { symbol: String, interval: String },
    SubscribePriceData { symbols: Vec<String> },
    UnsubscribePriceData { symbols: Vec<String> },
    SubscribeOrderBook {
        symbol: String,
        #[serde(default = "default_depth")]
        depth: u32,
    },
    UnsubscribeOrderBook { symbol: String },
    SubscribeTicker { symbol: String },
    UnsubscribeTicker { symbol: String },
    SubscribeTrades { symbol: String },
    UnsubscribeTrades { symbol: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct PriceData {
    pub symbol: String,
    pub last: String,
    pub high24h: String,
    pub low24h: String,
    pub volume24h: String,
    pub change_percent: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderBookLevel {
    pub price: String,
    pub qty: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderBookPayload {
    pub symbol: String,
    pub bids: Vec<OrderBookLevel>,
    pub asks: Vec<OrderBookLevel>,
    pub update_id: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TradePayload {
    pub symbol: String,
    pub trade_id: u64,
    pub price: String,
    pub qty: String,
    pub side: String,
    pub ts: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct KLinePayload {
    pub symbol: String,
    pub interval: String,
    pub open: String,
    pub high: String,
    pub low: String,
    pub close: String,
    pub volume: String,
    pub closed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TickerPayload {
    pub symbol: String,
    pub last_price: String,
    pub best_bid: String,
    pub best_ask: String,
}

/// Server-initiated events.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum ServerEvent {
    KLineUpdate {
        payload: KLinePayload,
        is_new_kline: bool,
    },
    PriceUpdate {
        payload: PriceData,
    },
    OrderBookData {
        payload: OrderBookPayload,
    },
    OrderBookUpdate {
        payload: OrderBookPayload,
    },
    TradeUpdate {
        payload: TradePayload,
    },
    LastTradeAndMid {
        payload: TickerPayload,
    },
    KLineSubscribed { symbol: String, interval: String },
    PriceSubscribed { symbols: Vec<String> },
    OrderBookSubscribed { symbol: String, depth: u32 },
    TickerSubscribed { symbol: String },
    TradesSubscribed { symbol: String },
    KLineUnsubscribed { symbol: String, interval: String },
    PriceUnsubscribed { symbols: Vec<String> },
    OrderBookUnsubscribed { symbol: String },
    TickerUnsubscribed { symbol: String },
    TradesUnsubscribed { symbol: String },
    Error {
        message: String,
    },
}

/// Topic keys, per §4.7's `price:{sym}` / `orderbook:{sym}` / `kline:{sym}:{itv}`
/// / `trades:{sym}` scheme.
pub fn topic_price(symbol: &str) -> String {
    format!("price:{symbol}")
}
pub fn topic_orderbook(symbol: &str) -> String {
    format!("orderbook:{symbol}")
}
pub fn topic_kline(symbol: &str, interval: &str) -> String {
    format!("kline:{symbol}:{interval}")
}
pub fn topic_trades(symbol: &str) -> String {
    format!("trades:{symbol}")
}

/// All current topics are public (§4.7: "unauthenticated connections may
/// receive only public topics (price, orderbook, kline, trades)"). Kept as a
/// function rather than a constant `true` so a future private topic has a
/// place to plug in without touching every call site.
pub fn topic_requires_auth(_topic: &str) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_keys_match_spec_scheme() {
        assert_eq!(topic_price("BTC_USDT"), "price:BTC_USDT");
        assert_eq!(topic_orderbook("BTC_USDT"), "orderbook:BTC_USDT");
        assert_eq!(topic_kline("BTC_USDT", "1m"), "kline:BTC_USDT:1m");
        assert_eq!(topic_trades("BTC_USDT"), "trades:BTC_USDT");
    }

    #[test]
    fn client_message_deserializes_subscribe_orderbook_with_default_depth() {
        let json = r#"{"method":"SubscribeOrderBook","symbol":"BTC_USDT"}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        match msg {
            ClientMessage::SubscribeOrderBook { symbol, depth } => {
                assert_eq!(symbol, "BTC_USDT");
                assert_eq!(depth, 5);
            }
            _ => panic!("wrong variant"),
        }
    }
}
