//! REST handlers for the trading surface (§6). Thin: parse, route to the
//! target symbol's single-writer task, translate the typed result back into
//! the uniform envelope. No state lives here beyond request-scoped validation.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use crate::errors::GatewayError;
use crate::models::OrderType;

use super::state::AppState;
use super::types::{
    ApiEnvelope, CancelResponseData, CreateOrderRequest, HealthResponseData,
    OrderBookLevelData, OrderBookResponseData, OrderResponseData, SymbolQueueDepth,
};

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Wraps a [`GatewayError`] into the uniform envelope with the right status code.
pub struct GatewayFailure(pub GatewayError);

impl IntoResponse for GatewayFailure {
    fn into_response(self) -> Response {
        let status = self.0.status();
        (status, Json(ApiEnvelope::err(&self.0))).into_response()
    }
}

impl From<GatewayError> for GatewayFailure {
    fn from(e: GatewayError) -> Self {
        GatewayFailure(e)
    }
}

/// `POST /api/trading/orders`
#[utoipa::path(
    post,
    path = "/api/trading/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 200, description = "Order accepted", body = OrderResponseData),
        (status = 400, description = "Validation failure"),
        (status = 422, description = "Insufficient funds"),
        (status = 503, description = "Symbol halted"),
    ),
    tag = "Trading"
)]
pub async fn create_order(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<Json<ApiEnvelope<OrderResponseData>>, GatewayFailure> {
    let symbol_id = state
        .symbol_mgr
        .get_symbol_id(&req.symbol)
        .ok_or_else(|| GatewayError::BadRequest(format!("unknown symbol {}", req.symbol)))?;

    let handle = state
        .router
        .get(symbol_id)
        .ok_or_else(|| GatewayError::Internal(format!("no pipeline for symbol {}", req.symbol)))?;

    let order_type: OrderType = req.order_type.into();

    let qty = state
        .symbol_mgr
        .parse_qty(&req.quantity, symbol_id)
        .ok_or_else(|| GatewayError::BadRequest("invalid quantity".to_string()))?
        .to_raw();

    let price = match (&order_type, &req.price) {
        (OrderType::Limit, Some(p)) => Some(
            state
                .symbol_mgr
                .parse_price(p, symbol_id)
                .ok_or_else(|| GatewayError::BadRequest("invalid price".to_string()))?
                .to_raw(),
        ),
        (OrderType::Limit, None) => {
            return Err(GatewayError::BadRequest("limit order requires a price".to_string()).into())
        }
        (OrderType::Market, _) => None,
    };

    tracing::info!(user_id = req.user_id, symbol = %req.symbol, ?order_type, "order request received");

    let result = handle
        .place_order(req.user_id, req.side.into(), order_type, price, qty)
        .await
        .map_err(GatewayError::from)?;

    let order = result.order;
    let price_str = price
        .map(|p| state.symbol_mgr.format_price(p.into(), symbol_id).unwrap_or_default());
    let data = OrderResponseData::new(
        order.order_id,
        req.symbol.clone(),
        order.side,
        order.order_type,
        state
            .symbol_mgr
            .format_qty(order.qty.into(), symbol_id)
            .unwrap_or_default(),
        price_str,
        state
            .symbol_mgr
            .format_qty(order.filled_qty.into(), symbol_id)
            .unwrap_or_default(),
        order.status,
        now_ms(),
    );

    Ok(Json(ApiEnvelope::ok(data)))
}

#[derive(Debug, Deserialize)]
pub struct CancelOrderQuery {
    /// Ownership check and symbol routing both need information the path
    /// alone doesn't carry; callers supply both as query parameters.
    pub user_id: u64,
    pub symbol: String,
}

/// `DELETE /api/trading/orders/{id}`
#[utoipa::path(
    delete,
    path = "/api/trading/orders/{id}",
    params(
        ("id" = u64, Path, description = "Order id"),
        ("user_id" = u64, Query, description = "Owning user id"),
        ("symbol" = String, Query, description = "Symbol the order belongs to"),
    ),
    responses(
        (status = 200, description = "Cancellation result", body = CancelResponseData),
        (status = 404, description = "Order not found"),
    ),
    tag = "Trading"
)]
pub async fn cancel_order(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<u64>,
    Query(query): Query<CancelOrderQuery>,
) -> Result<Json<ApiEnvelope<CancelResponseData>>, GatewayFailure> {
    let symbol_id = state
        .symbol_mgr
        .get_symbol_id(&query.symbol)
        .ok_or_else(|| GatewayError::BadRequest(format!("unknown symbol {}", query.symbol)))?;

    let handle = state
        .router
        .get(symbol_id)
        .ok_or_else(|| GatewayError::Internal(format!("no pipeline for symbol {}", query.symbol)))?;

    handle
        .cancel_order(query.user_id, order_id)
        .await
        .map_err(GatewayError::from)?;

    Ok(Json(ApiEnvelope::ok(CancelResponseData {
        success: true,
        message: format!("order {order_id} cancelled"),
    })))
}

#[derive(Debug, Deserialize)]
pub struct DepthQuery {
    #[serde(default = "default_depth")]
    pub depth: usize,
}

fn default_depth() -> usize {
    20
}

/// `GET /api/trading/orderbook/{symbol}?depth=N`
#[utoipa::path(
    get,
    path = "/api/trading/orderbook/{symbol}",
    params(
        ("symbol" = String, Path, description = "Symbol, e.g. BTC_USDT"),
        ("depth" = Option<usize>, Query, description = "Number of price levels per side"),
    ),
    responses(
        (status = 200, description = "Order book snapshot", body = OrderBookResponseData),
        (status = 400, description = "Unknown symbol"),
    ),
    tag = "Market Data"
)]
pub async fn get_orderbook(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
    Query(query): Query<DepthQuery>,
) -> Result<Json<ApiEnvelope<OrderBookResponseData>>, GatewayFailure> {
    let symbol_id = state
        .symbol_mgr
        .get_symbol_id(&symbol)
        .ok_or_else(|| GatewayError::BadRequest(format!("unknown symbol {symbol}")))?;

    let snapshot = state.publisher.get_snapshot(symbol_id, query.depth);

    let to_levels = |levels: &[(u64, u64)]| -> Vec<OrderBookLevelData> {
        let mut running = 0u64;
        levels
            .iter()
            .map(|(price, qty)| {
                running = running.saturating_add(*qty);
                OrderBookLevelData {
                    price: state
                        .symbol_mgr
                        .format_price((*price).into(), symbol_id)
                        .unwrap_or_default(),
                    amount: state
                        .symbol_mgr
                        .format_qty((*qty).into(), symbol_id)
                        .unwrap_or_default(),
                    total: state
                        .symbol_mgr
                        .format_qty(running.into(), symbol_id)
                        .unwrap_or_default(),
                }
            })
            .collect()
    };

    let data = OrderBookResponseData {
        symbol,
        bids: to_levels(&snapshot.bids),
        asks: to_levels(&snapshot.asks),
        timestamp: now_ms(),
    };

    Ok(Json(ApiEnvelope::ok(data)))
}

/// `GET /health`
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service health", body = HealthResponseData)),
    tag = "System"
)]
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let queue_depths = state
        .router
        .iter()
        .filter_map(|(symbol_id, handle)| {
            state
                .symbol_mgr
                .get_symbol_info_by_id(*symbol_id)
                .map(|info| SymbolQueueDepth {
                    symbol: info.symbol.clone(),
                    depth: handle.queue_depth(),
                })
        })
        .collect();

    let symbols_halted = state
        .router
        .iter()
        .filter(|(_, handle)| handle.is_halted())
        .filter_map(|(symbol_id, _)| {
            state
                .symbol_mgr
                .get_symbol_info_by_id(*symbol_id)
                .map(|info| info.symbol.clone())
        })
        .collect::<Vec<_>>();

    let data = HealthResponseData {
        status: if state.durability.is_degraded() || !symbols_halted.is_empty() {
            "degraded"
        } else {
            "healthy"
        },
        timestamp_ms: now_ms(),
        uptime_secs: state.uptime_secs(),
        symbol_count: state.symbol_mgr.symbol_count(),
        symbols_halted,
        durability_degraded: state.durability.is_degraded(),
        queue_depths,
    };

    (StatusCode::OK, Json(ApiEnvelope::ok(data)))
}
