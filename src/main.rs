//! spotventure - composition root.
//!
//! Loads configuration, builds the shared singletons (Asset Ledger, Event
//! Bus, Symbol Manager, Snapshot Publisher), spawns one pipeline per
//! configured symbol, spawns the Durability Writer and the upstream
//! Market-Data Relay, then serves the REST gateway and realtime fabric on a
//! single axum router.

use std::sync::Arc;

use axum::Router;
use spotventure::config::AppConfig;
use spotventure::durability::{DurabilityWriter, TDengineDurabilityStore};
use spotventure::event_bus::EventBus;
use spotventure::gateway::AppState;
use spotventure::ledger::AssetLedger;
use spotventure::pipeline::{spawn_symbol_pipeline, SymbolRouter};
use spotventure::realtime::{ConnectionManager, RealtimeState};
use spotventure::snapshot::SnapshotPublisher;
use spotventure::symbol_manager::SymbolManager;
use spotventure::MatchingEngine;

fn config_path() -> String {
    std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.yaml".to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load(&config_path())?;
    let _log_guard = spotventure::logging::init_logging(&config);

    tracing::info!(bind_addr = %config.bind_addr, symbols = config.symbols.len(), "starting spotventure");

    let symbol_mgr = Arc::new(SymbolManager::from_config(&config));
    let ledger = Arc::new(AssetLedger::new());
    let event_bus = Arc::new(EventBus::new(config.queues.event_bus_capacity));
    let publisher = Arc::new(SnapshotPublisher::new(&config.throttle));
    let connections = Arc::new(ConnectionManager::new(
        config.queues.event_bus_capacity,
        config.queues.subscriber_queue_size,
    ));

    let taos = taos::TaosBuilder::from_dsn(&config.durability.dsn)?
        .build()
        .await?;
    let durability_store = TDengineDurabilityStore::new(Arc::new(taos));
    let durability = DurabilityWriter::new(
        durability_store,
        config.durability.batch_size,
        std::time::Duration::from_millis(config.durability.flush_interval_ms),
    )
    .spawn(config.queues.durability_capacity);

    let mut router = SymbolRouter::new();
    for symbol in &config.symbols {
        let engine = MatchingEngine::new(
            symbol.symbol_id,
            symbol_mgr.clone(),
            ledger.clone(),
            event_bus.clone(),
            0,
        )?;
        let handle = spawn_symbol_pipeline(
            engine,
            config.queues.inbound_capacity,
            event_bus.clone(),
            publisher.clone(),
            connections.clone(),
            durability.clone(),
            symbol_mgr.clone(),
        );
        router.insert(handle);
    }

    let (upstream_tx, upstream_rx) = tokio::sync::mpsc::channel(config.queues.inbound_capacity);
    let tracked_symbols: Vec<String> = config.symbols.iter().map(|s| s.symbol.clone()).collect();
    let upstream_relay =
        spotventure::relay::UpstreamRelay::new(config.upstream.clone(), tracked_symbols);
    tokio::spawn(async move {
        upstream_relay.run(upstream_tx).await;
    });
    tokio::spawn(spotventure::relay::run_relay_fanout(
        upstream_rx,
        symbol_mgr.clone(),
        publisher.clone(),
        connections.clone(),
    ));

    let gateway_state = Arc::new(AppState::new(
        router,
        symbol_mgr.clone(),
        publisher.clone(),
        durability,
    ));
    let realtime_state = Arc::new(RealtimeState::new(connections, config.jwt_secret.clone()));

    let realtime_router = Router::new()
        .route(
            "/ws",
            axum::routing::get(spotventure::realtime::ws_handler),
        )
        .with_state(realtime_state);

    let app = Router::new()
        .merge(spotventure::gateway::router(gateway_state))
        .merge(realtime_router);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(bind_addr = %config.bind_addr, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}
