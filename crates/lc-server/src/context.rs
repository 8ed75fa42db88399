//! Application context shared across route handlers via Axum state.
//!
//! [`AppContext`] bundles the broadcast channel handles with the immutable
//! infrastructure (configuration, tools, events) in `Arc`s so it is cheap to
//! clone per request.

use std::sync::Arc;
use std::time::Instant;

use lc_av::ToolRegistry;
use lc_channel::{ClientRegistry, PrefetchStream};
use lc_core::config::Config;
use lc_core::events::EventBus;

#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    /// Session queues served by the delivery endpoints.
    pub registry: Arc<ClientRegistry>,
    /// Prefetch cache, reported by the status route. `None` when the HTTP
    /// surface runs without a pipeline behind it.
    pub prefetch: Option<PrefetchStream>,
    pub event_bus: Arc<EventBus>,
    pub tools: Arc<ToolRegistry>,
    pub started_at: Instant,
}

impl AppContext {
    pub fn new(
        config: Arc<Config>,
        registry: Arc<ClientRegistry>,
        event_bus: Arc<EventBus>,
        tools: Arc<ToolRegistry>,
    ) -> Self {
        Self {
            config,
            registry,
            prefetch: None,
            event_bus,
            tools,
            started_at: Instant::now(),
        }
    }

    pub fn with_prefetch(mut self, prefetch: PrefetchStream) -> Self {
        self.prefetch = Some(prefetch);
        self
    }
}
