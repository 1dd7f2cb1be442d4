//! Shared state handed to every gateway handler.

use std::sync::Arc;
use std::time::Instant;

use crate::durability::DurabilityHandle;
use crate::pipeline::SymbolRouter;
use crate::snapshot::SnapshotPublisher;
use crate::symbol_manager::SymbolManager;

pub struct AppState {
    pub router: SymbolRouter,
    pub symbol_mgr: Arc<SymbolManager>,
    pub publisher: Arc<SnapshotPublisher>,
    pub durability: DurabilityHandle,
    started_at: Instant,
}

impl AppState {
    pub fn new(
        router: SymbolRouter,
        symbol_mgr: Arc<SymbolManager>,
        publisher: Arc<SnapshotPublisher>,
        durability: DurabilityHandle,
    ) -> Self {
        Self {
            router,
            symbol_mgr,
            publisher,
            durability,
            started_at: Instant::now(),
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
