//! The broadcast clock.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use lc_core::events::{EventBus, EventPayload};

use crate::prefetch::PrefetchStream;
use crate::registry::ClientRegistry;

/// Pulls one segment per tick from the prefetch stream, fans it out to every
/// session, then waits for the segment's real duration before the next tick.
///
/// The wait is measured from the moment the segment was published, so ticks
/// are never closer together than the duration of the earlier segment. A slow
/// pull after the wait only delays the next tick further.
pub struct BroadcastScheduler {
    stream: PrefetchStream,
    registry: Arc<ClientRegistry>,
    events: Arc<EventBus>,
    cancel: CancellationToken,
}

impl BroadcastScheduler {
    pub fn new(
        stream: PrefetchStream,
        registry: Arc<ClientRegistry>,
        events: Arc<EventBus>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            stream,
            registry,
            events,
            cancel,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Run until the cancellation token fires.
    pub async fn run(self) {
        tracing::info!("Broadcast scheduler started");

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            let segment = match self.stream.next().await {
                Ok(segment) => segment,
                Err(e) => {
                    if !e.is_cancelled() {
                        tracing::error!("Prefetch stream failed: {e}");
                    }
                    break;
                }
            };

            let sessions = self.registry.broadcast(Arc::clone(&segment));
            tracing::info!(
                source = %segment.source_label(),
                index = segment.index,
                duration_secs = segment.duration.as_secs_f64(),
                sessions,
                "Broadcast segment"
            );
            self.events.broadcast(EventPayload::SegmentBroadcast {
                source: segment.source_label(),
                index: segment.index,
                duration_secs: segment.duration.as_secs_f64(),
                sessions,
            });

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(segment.duration) => {}
            }
        }

        tracing::info!("Broadcast scheduler stopped");
    }
}
