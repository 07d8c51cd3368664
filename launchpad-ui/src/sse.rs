//! Server-Sent Events stream of render events.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use launchpad::io::render::{RenderEvent, RenderSink, TracingSink};

use crate::state::AppState;

/// Render sink that publishes every event to connected SSE clients.
///
/// Events emitted while no client is connected are only logged.
pub struct BroadcastSink {
    tx: Arc<broadcast::Sender<RenderEvent>>,
}

impl BroadcastSink {
    pub fn new(tx: Arc<broadcast::Sender<RenderEvent>>) -> Self {
        Self { tx }
    }
}

impl RenderSink for BroadcastSink {
    fn emit(&self, event: RenderEvent) {
        if let Err(broadcast::error::SendError(event)) = self.tx.send(event) {
            debug!("no SSE clients connected");
            TracingSink.emit(event);
        }
    }
}

fn render_event(event: &RenderEvent) -> Option<Event> {
    match serde_json::to_string(event) {
        Ok(json) => Some(Event::default().event("render").data(json)),
        Err(err) => {
            warn!(error = %err, "failed to serialize render event");
            None
        }
    }
}

/// SSE endpoint handler.
///
/// The first event carries the current session snapshot so a reconnecting
/// front-end can redraw before live events arrive.
pub async fn events_handler(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut rx = state.event_tx.subscribe();
    let snapshot = serde_json::to_string(&state.orchestrator.snapshot())
        .unwrap_or_else(|_| "{}".to_string());

    let stream = async_stream::stream! {
        yield Ok(Event::default().event("connected").data(snapshot));

        loop {
            match rx.recv().await {
                Ok(event) => {
                    if let Some(event) = render_event(&event) {
                        yield Ok(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "SSE client lagged, some render events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    break;
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}
