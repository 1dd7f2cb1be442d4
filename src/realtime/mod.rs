//! Realtime Fabric (C7): persistent bidirectional push transport for market
//! data, per §4.7. Replaces the teacher's `websocket/` module: same
//! `ConnectionManager`/axum-handler shape, topic-scoped instead of
//! user-scoped, with an explicit [`subscription::SubscriptionHandle`]
//! instead of disposer closures (§9 redesign flag).

pub mod auth;
pub mod connection;
pub mod handler;
pub mod messages;
pub mod subscription;

pub use connection::{ConnectionManager, SharedConnectionManager};
pub use handler::ws_handler;
pub use messages::{ClientMessage, ServerEvent};
pub use subscription::SubscriptionHandle;

/// Shared state the axum router hands to the ws upgrade handler.
pub struct RealtimeState {
    pub connections: SharedConnectionManager,
    pub jwt_secret: String,
}

impl RealtimeState {
    pub fn new(connections: SharedConnectionManager, jwt_secret: String) -> Self {
        Self {
            connections,
            jwt_secret,
        }
    }
}
