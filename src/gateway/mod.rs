//! REST Gateway (C9): the HTTP collaborator in front of the matching engine.
//! Owns no state beyond request-scoped validation — every handler either
//! enqueues onto the target symbol's inbound queue or performs a direct read
//! against the Snapshot/Delta Publisher's cache (§4.9).

pub mod handlers;
pub mod state;
pub mod types;

use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Spot Trading Venue API",
        version = "1.0.0",
        description = "REST surface over the matching engine: order entry, cancellation, and order-book reads."
    ),
    paths(
        handlers::create_order,
        handlers::cancel_order,
        handlers::get_orderbook,
        handlers::health,
    ),
    components(schemas(
        types::CreateOrderRequest,
        types::OrderResponseData,
        types::CancelResponseData,
        types::OrderBookResponseData,
        types::OrderBookLevelData,
        types::HealthResponseData,
        types::ApiSide,
        types::ApiOrderType,
    )),
    tags(
        (name = "Trading", description = "Order entry and cancellation"),
        (name = "Market Data", description = "Order book reads"),
        (name = "System", description = "Operational endpoints"),
    )
)]
struct ApiDoc;

/// Builds the REST router mounted alongside the realtime fabric's websocket
/// upgrade endpoint (see the composition root).
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/trading/orders", post(handlers::create_order))
        .route("/api/trading/orders/{id}", delete(handlers::cancel_order))
        .route(
            "/api/trading/orderbook/{symbol}",
            get(handlers::get_orderbook),
        )
        .route("/health", get(handlers::health))
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(state)
}
