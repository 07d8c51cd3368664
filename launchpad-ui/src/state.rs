//! Shared application state for the UI server.

use std::sync::Arc;

use tokio::sync::broadcast;

use launchpad::io::api::ConsoleApi;
use launchpad::io::config::ConsoleConfig;
use launchpad::io::render::RenderEvent;
use launchpad::orchestrator::Orchestrator;

use crate::sse::BroadcastSink;

/// Shared state accessible from all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// The single kiosk session driven by the front-end.
    pub orchestrator: Orchestrator,
    /// Render events fanned out to SSE clients.
    pub event_tx: Arc<broadcast::Sender<RenderEvent>>,
}

impl AppState {
    pub fn new(api: Arc<dyn ConsoleApi>, config: &ConsoleConfig) -> Self {
        let (event_tx, _) = broadcast::channel(64);
        let event_tx = Arc::new(event_tx);
        let sink = Arc::new(BroadcastSink::new(Arc::clone(&event_tx)));
        Self {
            orchestrator: Orchestrator::new(api, sink, config),
            event_tx,
        }
    }
}
