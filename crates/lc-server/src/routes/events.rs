//! Server-Sent Events (SSE) handler.
//!
//! Subscribes to the [`lc_core::events::EventBus`], replays recent events for
//! late joiners, and sends keepalive heartbeats.

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use std::convert::Infallible;
use std::time::Duration;

use crate::context::AppContext;

/// Events replayed to a newly connected client.
const REPLAY: usize = 50;

/// GET /api/events -- SSE stream of channel events.
pub async fn events_handler(
    State(ctx): State<AppContext>,
) -> Sse<impl futures_core::Stream<Item = Result<Event, Infallible>>> {
    let recent = ctx.event_bus.recent_events(REPLAY);
    let mut rx = ctx.event_bus.subscribe();

    let stream = async_stream::stream! {
        // Oldest first.
        for event in recent.into_iter().rev() {
            if let Ok(data) = serde_json::to_string(&event) {
                yield Ok(Event::default().data(data));
            }
        }

        let mut heartbeat = tokio::time::interval(Duration::from_secs(15));

        loop {
            tokio::select! {
                result = rx.recv() => {
                    match result {
                        Ok(event) => {
                            if let Ok(data) = serde_json::to_string(&event) {
                                yield Ok(Event::default().data(data));
                            }
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            tracing::debug!("SSE client lagged by {n} events");
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                            break;
                        }
                    }
                }
                _ = heartbeat.tick() => {
                    yield Ok(Event::default()
                        .event("heartbeat")
                        .data(r#"{"type":"heartbeat"}"#));
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
