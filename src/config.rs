//! Venue configuration: assets, symbols, upstream feed, and runtime knobs.
//!
//! Loaded once at startup from a YAML file (see `config.example.yaml`), with
//! environment overrides layered on top the way the rest of the ecosystem does it.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use crate::core_types::{AssetId, UserId};

/// Asset configuration: precision and display rules.
///
/// `decimals` is the internal storage precision (never changed once live);
/// `display_decimals` is the client-facing precision and can be tuned freely.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetConfig {
    pub asset_id: AssetId,
    pub asset: String,
    pub decimals: u32,
    pub display_decimals: u32,
}

/// Trading pair configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolConfig {
    pub symbol_id: u32,
    pub symbol: String,
    pub base_asset_id: AssetId,
    pub quote_asset_id: AssetId,
    pub price_decimal: u32,
    pub price_display_decimal: u32,
    /// Minimum price increment, in scaled price units. 0 disables the check.
    #[serde(default)]
    pub price_tick: u64,
    /// Minimum quantity increment, in scaled base units. 0 disables the check.
    #[serde(default)]
    pub qty_tick: u64,
    #[serde(default)]
    pub min_qty: u64,
    /// 0 means unbounded.
    #[serde(default)]
    pub max_qty: u64,
    /// Whether the symbol currently accepts new orders. Halted symbols
    /// reject `place_order` but still allow cancels, per §4.3 Symbol halt.
    #[serde(default)]
    pub halted: bool,
}

/// Upstream market-data feed this venue mirrors for reference pricing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    pub url: String,
    /// Optional secondary channel some upstream feeds use for certain candle
    /// types (e.g. mark-price candles); `None` if the primary `url` serves
    /// everything this venue subscribes to.
    #[serde(default)]
    pub business_url: Option<String>,
    /// Candle intervals to subscribe to on (re)connect.
    #[serde(default = "default_intervals")]
    pub intervals: Vec<String>,
    /// Depth levels requested from the upstream feed's order-book channel.
    #[serde(default = "default_order_book_depth")]
    pub order_book_depth: usize,
    #[serde(default = "default_reconnect_interval_secs")]
    pub reconnect_interval_secs: u64,
    #[serde(default = "default_reconnect_attempts_per_window")]
    pub reconnect_attempts_per_window: u32,
    #[serde(default = "default_reconnect_window_secs")]
    pub reconnect_window_secs: u64,
}

fn default_intervals() -> Vec<String> {
    vec!["1m".to_string()]
}
fn default_order_book_depth() -> usize {
    5
}
fn default_reconnect_interval_secs() -> u64 {
    2
}
fn default_reconnect_attempts_per_window() -> u32 {
    5
}
fn default_reconnect_window_secs() -> u64 {
    60
}

impl UpstreamConfig {
    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_secs(self.reconnect_interval_secs)
    }

    pub fn reconnect_window(&self) -> Duration {
        Duration::from_secs(self.reconnect_window_secs)
    }
}

/// Snapshot/delta publisher throttle windows, per §4.5.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThrottleConfig {
    #[serde(default = "default_orderbook_throttle_ms")]
    pub orderbook_ms: u64,
    #[serde(default = "default_ticker_throttle_ms")]
    pub ticker_ms: u64,
    #[serde(default = "default_candle_throttle_ms")]
    pub candle_ms: u64,
    /// Coalesced-gap threshold beyond which the next depth push is a full
    /// snapshot rather than a delta (§4.5 "snapshot interval").
    #[serde(default = "default_snapshot_interval_ms")]
    pub snapshot_interval_ms: u64,
}

fn default_orderbook_throttle_ms() -> u64 {
    250
}
fn default_ticker_throttle_ms() -> u64 {
    1000
}
fn default_candle_throttle_ms() -> u64 {
    1500
}
fn default_snapshot_interval_ms() -> u64 {
    3000
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            orderbook_ms: default_orderbook_throttle_ms(),
            ticker_ms: default_ticker_throttle_ms(),
            candle_ms: default_candle_throttle_ms(),
            snapshot_interval_ms: default_snapshot_interval_ms(),
        }
    }
}

/// Bounded queue sizes for the single-writer-per-symbol pipeline, per §5.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "default_inbound_capacity")]
    pub inbound_capacity: usize,
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,
    #[serde(default = "default_durability_capacity")]
    pub durability_capacity: usize,
    /// Per-subscriber bounded outbound queue on the realtime fabric (§5, §6
    /// `subscriberQueueSize`). Overflow marks the subscriber lagged and
    /// forces a resubscribe rather than blocking the publisher.
    #[serde(default = "default_subscriber_queue_size")]
    pub subscriber_queue_size: usize,
}

fn default_inbound_capacity() -> usize {
    10_000
}
fn default_event_bus_capacity() -> usize {
    65536
}
fn default_durability_capacity() -> usize {
    65536
}
fn default_subscriber_queue_size() -> usize {
    1024
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            inbound_capacity: default_inbound_capacity(),
            event_bus_capacity: default_event_bus_capacity(),
            durability_capacity: default_durability_capacity(),
            subscriber_queue_size: default_subscriber_queue_size(),
        }
    }
}

/// Logging configuration, consumed by [`crate::logging::init_logging`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_log_file")]
    pub log_file: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_rotation")]
    pub rotation: String,
    #[serde(default)]
    pub use_json: bool,
    #[serde(default = "default_true")]
    pub enable_tracing: bool,
}

fn default_log_dir() -> String {
    "logs".to_string()
}
fn default_log_file() -> String {
    "spotventure.log".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_rotation() -> String {
    "daily".to_string()
}
fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            log_file: default_log_file(),
            log_level: default_log_level(),
            rotation: default_rotation(),
            use_json: false,
            enable_tracing: true,
        }
    }
}

/// TDengine durability backend connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DurabilityConfig {
    pub dsn: String,
    #[serde(default = "default_durability_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_durability_flush_ms")]
    pub flush_interval_ms: u64,
}

fn default_durability_batch_size() -> usize {
    256
}
fn default_durability_flush_ms() -> u64 {
    50
}

/// Complete venue configuration, loaded from YAML at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub bind_addr: String,
    pub assets: Vec<AssetConfig>,
    pub symbols: Vec<SymbolConfig>,
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub throttle: ThrottleConfig,
    #[serde(default)]
    pub queues: QueueConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    pub durability: DurabilityConfig,
    /// HMAC/RSA key material for validating realtime-fabric bearer tokens (§4.7).
    pub jwt_secret: String,
}

impl AppConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let cfg: AppConfig = serde_yaml::from_str(&raw)?;
        Ok(cfg)
    }

    pub fn asset_map(&self) -> FxHashMap<AssetId, AssetConfig> {
        self.assets
            .iter()
            .cloned()
            .map(|a| (a.asset_id, a))
            .collect()
    }

    pub fn symbol_by_id(&self, symbol_id: u32) -> Option<&SymbolConfig> {
        self.symbols.iter().find(|s| s.symbol_id == symbol_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_yaml() {
        let yaml = r#"
bind_addr: "0.0.0.0:8080"
jwt_secret: "test-secret"
assets:
  - asset_id: 1
    asset: "BTC"
    decimals: 8
    display_decimals: 6
  - asset_id: 2
    asset: "USDT"
    decimals: 6
    display_decimals: 2
symbols:
  - symbol_id: 1
    symbol: "BTC_USDT"
    base_asset_id: 1
    quote_asset_id: 2
    price_decimal: 6
    price_display_decimal: 2
upstream:
  url: "wss://stream.example.com/ws"
durability:
  dsn: "taos://localhost:6041"
"#;
        let cfg: AppConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.assets.len(), 2);
        assert_eq!(cfg.throttle.orderbook_ms, 250);
        assert_eq!(cfg.queues.inbound_capacity, 10_000);
        assert!(cfg.symbol_by_id(1).is_some());
        assert!(!cfg.symbol_by_id(1).unwrap().halted);
    }
}
