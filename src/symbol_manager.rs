//! Static venue metadata: asset precision and trading-pair validation rules.
//!
//! Built once at startup from [`crate::config::AppConfig`] and shared read-only
//! (`Arc<SymbolManager>`) across the gateway, matching engine, and realtime
//! fabric. Everything here is plain lookups — no interior mutability, since
//! the symbol/asset list is fixed for the process lifetime.

use crate::config::{AppConfig, AssetId};
use crate::money::MoneyFormatter;
use rustc_hash::FxHashMap;

/// Precision and naming for one asset.
#[derive(Debug, Clone)]
pub struct AssetInfo {
    pub asset_id: AssetId,
    pub name: String,
    /// Internal storage precision (scaled-integer decimals).
    pub decimals: u32,
    /// Client-facing display precision.
    pub display_decimals: u32,
}

/// Trading-pair metadata and order validation bounds.
#[derive(Debug, Clone)]
pub struct SymbolInfo {
    pub symbol: String,
    pub symbol_id: u32,
    pub base_asset_id: AssetId,
    pub quote_asset_id: AssetId,
    pub price_decimal: u32,
    pub price_display_decimal: u32,
    /// Minimum price increment, in scaled price units. An order whose price
    /// is not a multiple of this is rejected.
    pub price_tick: u64,
    /// Minimum quantity increment, in scaled base units.
    pub qty_tick: u64,
    pub min_qty: u64,
    pub max_qty: u64,
    /// Whether the symbol currently accepts new orders.
    pub active: bool,
}

impl SymbolInfo {
    /// Whether `price` falls on a valid tick boundary.
    pub fn price_on_tick(&self, price: u64) -> bool {
        self.price_tick == 0 || price % self.price_tick == 0
    }

    /// Whether `qty` falls on a valid tick boundary.
    pub fn qty_on_tick(&self, qty: u64) -> bool {
        self.qty_tick == 0 || qty % self.qty_tick == 0
    }

    /// Whether `qty` falls within the configured min/max band.
    pub fn qty_in_bounds(&self, qty: u64) -> bool {
        qty >= self.min_qty && (self.max_qty == 0 || qty <= self.max_qty)
    }
}

/// Resolves symbol names/ids and asset ids to their static configuration.
#[derive(Debug, Clone, Default)]
pub struct SymbolManager {
    pub symbol_to_id: FxHashMap<String, u32>,
    pub symbol_info: FxHashMap<u32, SymbolInfo>,
    pub assets: FxHashMap<AssetId, AssetInfo>,
}

impl SymbolManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from venue configuration: one [`AssetInfo`] per configured asset,
    /// one [`SymbolInfo`] per configured symbol.
    pub fn from_config(config: &AppConfig) -> Self {
        let mut mgr = Self::new();
        for asset in &config.assets {
            mgr.assets.insert(
                asset.asset_id,
                AssetInfo {
                    asset_id: asset.asset_id,
                    name: asset.asset.clone(),
                    decimals: asset.decimals,
                    display_decimals: asset.display_decimals,
                },
            );
        }
        for symbol in &config.symbols {
            mgr.symbol_to_id.insert(symbol.symbol.clone(), symbol.symbol_id);
            mgr.symbol_info.insert(
                symbol.symbol_id,
                SymbolInfo {
                    symbol: symbol.symbol.clone(),
                    symbol_id: symbol.symbol_id,
                    base_asset_id: symbol.base_asset_id,
                    quote_asset_id: symbol.quote_asset_id,
                    price_decimal: symbol.price_decimal,
                    price_display_decimal: symbol.price_display_decimal,
                    price_tick: symbol.price_tick,
                    qty_tick: symbol.qty_tick,
                    min_qty: symbol.min_qty,
                    max_qty: symbol.max_qty,
                    active: !symbol.halted,
                },
            );
        }
        mgr
    }

    pub fn get_symbol_id(&self, symbol: &str) -> Option<u32> {
        self.symbol_to_id.get(symbol).copied()
    }

    pub fn get_symbol_info(&self, symbol: &str) -> Option<&SymbolInfo> {
        let id = self.get_symbol_id(symbol)?;
        self.symbol_info.get(&id)
    }

    pub fn get_symbol_info_by_id(&self, id: u32) -> Option<&SymbolInfo> {
        self.symbol_info.get(&id)
    }

    pub fn get_asset_name(&self, asset_id: AssetId) -> Option<&str> {
        self.assets.get(&asset_id).map(|a| a.name.as_str())
    }

    pub fn symbol_count(&self) -> usize {
        self.symbol_info.len()
    }

    pub fn iter_symbols(&self) -> impl Iterator<Item = (&u32, &SymbolInfo)> {
        self.symbol_info.iter()
    }

    /// Format quantity for display (internal `ScaledAmount` -> String).
    pub fn format_qty(&self, value: crate::money::ScaledAmount, symbol_id: u32) -> Option<String> {
        crate::money::format_qty(value, symbol_id, self).ok()
    }

    /// Format price for display (internal `ScaledAmount` -> String).
    pub fn format_price(&self, value: crate::money::ScaledAmount, symbol_id: u32) -> Option<String> {
        crate::money::format_price(value, symbol_id, self).ok()
    }

    /// Parse a client-supplied quantity string into a scaled integer.
    pub fn parse_qty(&self, amount_str: &str, symbol_id: u32) -> Option<crate::money::ScaledAmount> {
        crate::money::parse_qty(amount_str, symbol_id, self).ok()
    }

    /// Parse a client-supplied price string into a scaled integer.
    pub fn parse_price(&self, price_str: &str, symbol_id: u32) -> Option<crate::money::ScaledAmount> {
        crate::money::parse_price(price_str, symbol_id, self).ok()
    }

    pub fn money_formatter(&self, symbol_id: u32) -> Option<MoneyFormatter<'_>> {
        MoneyFormatter::new(self, symbol_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppConfig, AssetConfig, DurabilityConfig, SymbolConfig, UpstreamConfig};

    fn sample_config() -> AppConfig {
        AppConfig {
            bind_addr: "0.0.0.0:8080".into(),
            assets: vec![
                AssetConfig {
                    asset_id: 1,
                    asset: "BTC".into(),
                    decimals: 8,
                    display_decimals: 6,
                },
                AssetConfig {
                    asset_id: 2,
                    asset: "USDT".into(),
                    decimals: 6,
                    display_decimals: 2,
                },
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
                min_qty: 1000,
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
            durability: DurabilityConfig {
                dsn: "taos://localhost:6041".into(),
                batch_size: 256,
                flush_interval_ms: 50,
            },
            jwt_secret: "test".into(),
        }
    }

    #[test]
    fn builds_from_config() {
        let mgr = SymbolManager::from_config(&sample_config());
        assert_eq!(mgr.symbol_count(), 1);
        assert_eq!(mgr.get_symbol_id("BTC_USDT"), Some(1));
        let info = mgr.get_symbol_info_by_id(1).unwrap();
        assert!(info.active);
        assert_eq!(info.base_asset_id, 1);
    }

    #[test]
    fn tick_and_bounds_checks() {
        let mgr = SymbolManager::from_config(&sample_config());
        let info = mgr.get_symbol_info_by_id(1).unwrap();
        assert!(info.price_on_tick(100));
        assert!(info.qty_on_tick(1000));
        assert!(info.qty_in_bounds(1000));
        assert!(!info.qty_in_bounds(500));
    }

    #[test]
    fn format_and_parse_roundtrip() {
        let mgr = SymbolManager::from_config(&sample_config());
        let qty = mgr.parse_qty("1.5", 1).unwrap();
        assert_eq!(mgr.format_qty(qty, 1).unwrap(), "1.500000");
        let price = mgr.parse_price("30000.12", 1).unwrap();
        assert_eq!(mgr.format_price(price, 1).unwrap(), "30000.12");
    }
}
