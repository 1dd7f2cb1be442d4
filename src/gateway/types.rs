//! REST request/response DTOs and the uniform response envelope (§6).

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::errors::GatewayError;
use crate::models::{OrderStatus, OrderType, Side};

/// Uniform envelope every non-raw-object endpoint responds with.
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiEnvelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiEnvelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            message: None,
        }
    }

    pub fn ok_with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            message: Some(message.into()),
        }
    }
}

impl ApiEnvelope<()> {
    pub fn err(error: &GatewayError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.code().to_string()),
            message: Some(error.to_string()),
        }
    }
}

/// `POST /api/trading/orders` request body.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    /// Caller-supplied identity. Credential issuance and verification are an
    /// external collaborator (§1 Out of scope); the gateway trusts the value
    /// given here the same way it trusts the upstream auth proxy in front of it.
    pub user_id: u64,
    pub symbol: String,
    pub side: ApiSide,
    #[serde(rename = "type")]
    pub order_type: ApiOrderType,
    pub quantity: String,
    #[serde(default)]
    pub price: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ApiSide {
    Buy,
    Sell,
}

impl From<ApiSide> for Side {
    fn from(s: ApiSide) -> Self {
        match s {
            ApiSide::Buy => Side::Buy,
            ApiSide::Sell => Side::Sell,
        }
    }
}

impl From<Side> for ApiSide {
    fn from(s: Side) -> Self {
        match s {
            Side::Buy => ApiSide::Buy,
            Side::Sell => ApiSide::Sell,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ApiOrderType {
    Limit,
    Market,
}

impl From<ApiOrderType> for OrderType {
    fn from(t: ApiOrderType) -> Self {
        match t {
            ApiOrderType::Limit => OrderType::Limit,
            ApiOrderType::Market => OrderType::Market,
        }
    }
}

fn order_status_str(status: OrderStatus) -> &'static str {
    match status {
        OrderStatus::New => "pending",
        OrderStatus::Active => "active",
        OrderStatus::PartiallyFilled => "partially_filled",
        OrderStatus::Filled => "filled",
        OrderStatus::Cancelled => "cancelled",
        OrderStatus::Rejected => "rejected",
    }
}

/// `POST /api/trading/orders` response data.
#[derive(Debug, Serialize, ToSchema)]
pub struct OrderResponseData {
    pub id: u64,
    #[serde(rename = "orderId")]
    pub order_id: u64,
    pub symbol: String,
    pub side: ApiSide,
    #[serde(rename = "type")]
    pub order_type: ApiOrderType,
    pub quantity: String,
    pub price: Option<String>,
    #[serde(rename = "filledQuantity")]
    pub filled_quantity: String,
    pub status: &'static str,
    #[serde(rename = "createdAt")]
    pub created_at: i64,
}

impl OrderResponseData {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        order_id: u64,
        symbol: String,
        side: Side,
        order_type: OrderType,
        quantity: String,
        price: Option<String>,
        filled_quantity: String,
        status: OrderStatus,
        created_at: i64,
    ) -> Self {
        Self {
            id: order_id,
            order_id,
            symbol,
            side: side.into(),
            order_type: match order_type {
                OrderType::Limit => ApiOrderType::Limit,
                OrderType::Market => ApiOrderType::Market,
            },
            quantity,
            price,
            filled_quantity,
            status: order_status_str(status),
            created_at,
        }
    }
}

/// `DELETE /api/trading/orders/{id}` response data.
#[derive(Debug, Serialize, ToSchema)]
pub struct CancelResponseData {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderBookLevelData {
    pub price: String,
    pub amount: String,
    pub total: String,
}

/// `GET /api/trading/orderbook/{symbol}` response data.
#[derive(Debug, Serialize, ToSchema)]
pub struct OrderBookResponseData {
    pub symbol: String,
    pub bids: Vec<OrderBookLevelData>,
    pub asks: Vec<OrderBookLevelData>,
    pub timestamp: i64,
}

/// `GET /health` response data, per §6's added operational endpoint.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponseData {
    pub status: &'static str,
    #[serde(rename = "timestampMs")]
    pub timestamp_ms: i64,
    #[serde(rename = "uptimeSecs")]
    pub uptime_secs: u64,
    #[serde(rename = "symbolCount")]
    pub symbol_count: usize,
    #[serde(rename = "symbolsHalted")]
    pub symbols_halted: Vec<String>,
    #[serde(rename = "durabilityDegraded")]
    pub durability_degraded: bool,
    #[serde(rename = "queueDepths")]
    pub queue_depths: Vec<SymbolQueueDepth>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SymbolQueueDepth {
    pub symbol: String,
    pub depth: usize,
}
