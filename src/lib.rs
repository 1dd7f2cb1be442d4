//! spotventure - a spot cryptocurrency trading venue.
//!
//! A per-symbol central limit order book matching engine with atomic balance
//! settlement, real-time market-data dissemination, and an upstream
//! market-data relay, built step by step.
//!
//! # Modules
//!
//! - [`core_types`] / [`config`] - fundamental type aliases and venue configuration
//! - [`errors`] - stable, coded error types for every component
//! - [`money`] / [`balance`] - scaled-integer amounts and the enforced balance type
//! - [`models`] - order and trade data model
//! - [`symbol_manager`] - asset/symbol registry, precision, and formatting
//! - [`ledger`] - Asset Ledger (C1): per-account balances, freeze/settle
//! - [`orderbook`] - Order Book (C2): price-time priority book
//! - [`engine`] - Matching Engine (C3): validate, match, settle
//! - [`event_bus`] - Event Bus (C4): per-symbol broadcast of engine events
//! - [`snapshot`] - Snapshot/Delta Publisher (C5): throttled depth/ticker/candle pushes
//! - [`relay`] - Market-Data Relay (C6): upstream feed connection and normalization
//! - [`realtime`] - Realtime Fabric (C7): websocket push transport
//! - [`durability`] - Durability Writer (C8): best-effort batched persistence
//! - [`gateway`] - REST Gateway (C9): HTTP surface over the engine
//! - [`pipeline`] - per-symbol orchestration: single-writer task + fan-out
//! - [`messages`] - reject-reason codes shared between the engine and gateway
//! - [`logging`] - tracing setup

pub mod core_types;

pub mod config;

pub mod balance;
pub mod durability;
pub mod engine;
pub mod errors;
pub mod event_bus;
pub mod gateway;
pub mod ledger;
pub mod logging;
pub mod messages;
pub mod models;
pub mod money;
pub mod orderbook;
pub mod pipeline;
pub mod realtime;
pub mod relay;
pub mod snapshot;
pub mod symbol_manager;

pub use config::AppConfig;
pub use core_types::{AssetId, OrderId, SeqNum, TradeId, UserId};
pub use engine::MatchingEngine;
pub use errors::{BookError, EngineError, GatewayError, LedgerError, RealtimeError, RelayError};
pub use event_bus::{EngineEvent, EventBus, SharedEventBus};
pub use ledger::{AccountKey, AssetLedger};
pub use models::{InternalOrder, OrderResult, OrderStatus, OrderType, Side, Trade};
pub use orderbook::{DepthSnapshot, OrderBook};
pub use pipeline::{SymbolHandle, SymbolRouter};
pub use snapshot::SnapshotPublisher;
pub use symbol_manager::SymbolManager;
