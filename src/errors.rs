//! Error types for each component of the venue.
//!
//! Every error carries a stable `code()` for API responses and log correlation,
//! mirroring the `error_codes` constants used at the gateway boundary.

use thiserror::Error;

/// Errors from the asset ledger (C1): freeze, unfreeze, settle.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("user {user_id} has no balance entry for asset {asset_id}")]
    AccountNotFound { user_id: u64, asset_id: u32 },

    #[error("insufficient available balance: need {need}, have {have}")]
    InsufficientFunds { need: u64, have: u64 },

    #[error("insufficient frozen balance: need {need}, have {have}")]
    InsufficientFrozen { need: u64, have: u64 },

    #[error("balance arithmetic overflow")]
    Overflow,
}

impl LedgerError {
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::AccountNotFound { .. } => "ACCOUNT_NOT_FOUND",
            LedgerError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            LedgerError::InsufficientFrozen { .. } => "INSUFFICIENT_FROZEN",
            LedgerError::Overflow => "BALANCE_OVERFLOW",
        }
    }
}

/// Errors from the order book (C2): insert/remove/lookup.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BookError {
    #[error("order {0} not found in book")]
    OrderNotFound(u64),

    #[error("order {0} already resting in book")]
    DuplicateOrder(u64),
}

impl BookError {
    pub fn code(&self) -> &'static str {
        match self {
            BookError::OrderNotFound(_) => "ORDER_NOT_FOUND",
            BookError::DuplicateOrder(_) => "DUPLICATE_ORDER",
        }
    }
}

/// Errors from the matching engine (C3): validation, freeze, and matching.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("invalid order: {0}")]
    Validation(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Book(#[from] BookError),

    #[error("symbol {0} is halted")]
    SymbolHalted(u32),

    #[error("order {0} is already in a terminal state")]
    AlreadyTerminal(u64),

    #[error("no liquidity available to fill order {0}")]
    NoLiquidity(u64),
}

impl EngineError {
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::Validation(_) => "VALIDATION",
            EngineError::Ledger(e) => e.code(),
            EngineError::Book(e) => e.code(),
            EngineError::SymbolHalted(_) => "SYMBOL_HALTED",
            EngineError::AlreadyTerminal(_) => "ALREADY_TERMINAL",
            EngineError::NoLiquidity(_) => "NO_LIQUIDITY",
        }
    }
}

/// Errors from the upstream market-data relay (C6).
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("upstream connection failed: {0}")]
    Connect(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("failed to parse upstream message: {0}")]
    Parse(String),

    #[error("reconnect budget exhausted ({attempts} attempts in window)")]
    ReconnectExhausted { attempts: u32 },
}

impl RelayError {
    pub fn code(&self) -> &'static str {
        match self {
            RelayError::Connect(_) => "UPSTREAM_CONNECT_FAILED",
            RelayError::Parse(_) => "UPSTREAM_PARSE_ERROR",
            RelayError::ReconnectExhausted { .. } => "RECONNECT_EXHAUSTED",
        }
    }
}

/// Errors from the realtime fabric (C7): subscriptions and auth.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RealtimeError {
    #[error("invalid or missing bearer token")]
    Unauthorized,

    #[error("unknown topic: {0}")]
    UnknownTopic(String),

    #[error("client send queue overflowed, connection dropped")]
    SendOverflow,
}

impl RealtimeError {
    pub fn code(&self) -> &'static str {
        match self {
            RealtimeError::Unauthorized => "UNAUTHORIZED",
            RealtimeError::UnknownTopic(_) => "UNKNOWN_TOPIC",
            RealtimeError::SendOverflow => "SEND_OVERFLOW",
        }
    }
}

/// Errors surfaced by the REST gateway (C9).
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::BadRequest(_) => "BAD_REQUEST",
            GatewayError::Engine(e) => e.code(),
            GatewayError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            GatewayError::Internal(_) => "INTERNAL",
        }
    }

    pub fn status(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            GatewayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::Engine(EngineError::Validation(_)) => StatusCode::BAD_REQUEST,
            GatewayError::Engine(EngineError::Ledger(LedgerError::InsufficientFunds { .. })) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            GatewayError::Engine(EngineError::Book(BookError::OrderNotFound(_))) => {
                StatusCode::NOT_FOUND
            }
            GatewayError::Engine(EngineError::SymbolHalted(_)) => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::Engine(_) => StatusCode::BAD_REQUEST,
            GatewayError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
