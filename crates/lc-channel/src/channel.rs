//! Wiring of the whole pipeline from configuration.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use lc_av::Transcoder;
use lc_core::config::Config;
use lc_core::events::EventBus;

use crate::prefetch::PrefetchStream;
use crate::registry::ClientRegistry;
use crate::scheduler::BroadcastScheduler;
use crate::segmenter::Segmenter;
use crate::selector::ContentSelector;
use crate::source_chain::SourceChain;

/// A configured broadcast channel.
///
/// The registry and prefetch handles are shared with the HTTP layer; the
/// scheduler is started separately with [`Channel::start`].
pub struct Channel {
    pub registry: Arc<ClientRegistry>,
    pub prefetch: PrefetchStream,
    events: Arc<EventBus>,
    cancel: CancellationToken,
}

impl Channel {
    pub fn new(
        config: &Config,
        transcoder: Arc<dyn Transcoder>,
        events: Arc<EventBus>,
        cancel: CancellationToken,
    ) -> Self {
        let selector = ContentSelector::from_config(&config.library);
        let segmenter = Segmenter::new(transcoder, &config.segmenter);
        let chain = SourceChain::new(selector, segmenter, config.library.retry_delay())
            .with_events(Arc::clone(&events));
        let prefetch = PrefetchStream::new(
            chain,
            config.prefetch.lookahead,
            Arc::clone(&events),
            cancel.clone(),
        );

        Self {
            registry: Arc::new(ClientRegistry::new()),
            prefetch,
            events,
            cancel,
        }
    }

    /// Prime the prefetch cache and spawn the scheduler.
    pub fn start(&self) -> JoinHandle<()> {
        self.prefetch.trigger_refill();
        BroadcastScheduler::new(
            self.prefetch.clone(),
            Arc::clone(&self.registry),
            Arc::clone(&self.events),
            self.cancel.clone(),
        )
        .spawn()
    }
}
