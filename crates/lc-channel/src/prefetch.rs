//! Lookahead cache in front of the source chain.
//!
//! [`PrefetchStream::next`] serves from the cache when it can and otherwise
//! pulls synchronously from the chain (an underrun). Every pop may start a
//! background refill, which keeps pulling whole batches until the cache holds
//! more than `lookahead` segments. At most one refill runs at a time.
//!
//! Cache pushes happen while the chain lock is held, so the cache always
//! reflects chain order even when a refill and an underrun race.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use lc_core::events::{EventBus, EventPayload};
use lc_core::{Error, Result, Segment};

use crate::source_chain::SourceChain;

struct CacheState {
    segments: VecDeque<Arc<Segment>>,
    refilling: bool,
}

struct Inner {
    state: Mutex<CacheState>,
    chain: tokio::sync::Mutex<SourceChain>,
    lookahead: usize,
    cancel: CancellationToken,
    events: Arc<EventBus>,
    refills: AtomicU64,
    underruns: AtomicU64,
}

/// Cloneable handle to the shared prefetch cache.
#[derive(Clone)]
pub struct PrefetchStream {
    inner: Arc<Inner>,
}

impl PrefetchStream {
    pub fn new(
        chain: SourceChain,
        lookahead: usize,
        events: Arc<EventBus>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(CacheState {
                    segments: VecDeque::new(),
                    refilling: false,
                }),
                chain: tokio::sync::Mutex::new(chain),
                lookahead,
                cancel,
                events,
                refills: AtomicU64::new(0),
                underruns: AtomicU64::new(0),
            }),
        }
    }

    /// Take the next segment of the stream.
    ///
    /// Only fails with [`Error::Cancelled`] once shutdown is requested.
    pub async fn next(&self) -> Result<Arc<Segment>> {
        let segment = match self.inner.pop_cached() {
            Some(segment) => segment,
            None => {
                self.inner.underruns.fetch_add(1, Ordering::Relaxed);
                tracing::warn!("Prefetch cache underrun; pulling from source chain");
                self.inner.events.broadcast(EventPayload::CacheUnderrun);

                tokio::select! {
                    biased;
                    _ = self.inner.cancel.cancelled() => return Err(Error::Cancelled),
                    segment = self.inner.pull_direct() => segment,
                }
            }
        };

        self.trigger_refill();
        Ok(segment)
    }

    /// Start a background refill if the cache is short and none is running.
    ///
    /// Returns whether a refill task was started.
    pub fn trigger_refill(&self) -> bool {
        if self.inner.cancel.is_cancelled() {
            return false;
        }

        {
            let mut state = self.inner.state.lock();
            if state.refilling {
                tracing::debug!(cached = state.segments.len(), "Refill already in progress");
                return false;
            }
            if state.segments.len() >= self.inner.lookahead {
                return false;
            }
            state.refilling = true;
        }

        self.inner.refills.fetch_add(1, Ordering::Relaxed);
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move { inner.refill().await });
        true
    }

    /// Segments currently cached.
    pub fn cached(&self) -> usize {
        self.inner.state.lock().segments.len()
    }

    pub fn is_refilling(&self) -> bool {
        self.inner.state.lock().refilling
    }

    pub fn lookahead(&self) -> usize {
        self.inner.lookahead
    }

    /// Refill tasks started so far.
    pub fn refills(&self) -> u64 {
        self.inner.refills.load(Ordering::Relaxed)
    }

    pub fn underruns(&self) -> u64 {
        self.inner.underruns.load(Ordering::Relaxed)
    }
}

impl Inner {
    fn pop_cached(&self) -> Option<Arc<Segment>> {
        self.state.lock().segments.pop_front()
    }

    /// Pull straight from the chain, returning the head of the batch and
    /// caching the rest.
    async fn pull_direct(&self) -> Arc<Segment> {
        let mut chain = self.chain.lock().await;
        // A refill may have landed while we waited for the chain.
        if let Some(segment) = self.pop_cached() {
            return segment;
        }
        loop {
            let mut batch = chain.next_batch().await.into_iter().map(Arc::new);
            if let Some(first) = batch.next() {
                self.state.lock().segments.extend(batch);
                return first;
            }
        }
    }

    /// Pull one batch into the cache. Returns the number of segments added.
    async fn pull_into_cache(&self) -> usize {
        let mut chain = self.chain.lock().await;
        let batch = chain.next_batch().await;
        let added = batch.len();
        self.state
            .lock()
            .segments
            .extend(batch.into_iter().map(Arc::new));
        added
    }

    async fn refill(self: Arc<Self>) {
        tracing::debug!(lookahead = self.lookahead, "Prefetch refill started");
        loop {
            let cached = self.state.lock().segments.len();
            if cached > self.lookahead {
                break;
            }

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                added = self.pull_into_cache() => {
                    tracing::debug!(added, "Prefetched batch");
                }
            }
        }

        let mut state = self.state.lock();
        state.refilling = false;
        tracing::debug!(cached = state.segments.len(), "Prefetch refill finished");
    }
}
