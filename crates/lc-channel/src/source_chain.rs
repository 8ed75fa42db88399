//! The endless segment sequence: select a source, segment it, repeat.
//!
//! Segments are handed out one conversion wave at a time, so delivery is not
//! all-or-nothing per source. When a later wave of a source fails, the waves
//! already returned stay in the stream and only the rest of that source is
//! dropped before a new one is selected.

use std::sync::Arc;
use std::time::Duration;

use lc_core::events::{EventBus, EventPayload};
use lc_core::Segment;

use crate::segmenter::{Fragmentation, Segmenter};
use crate::selector::ContentSelector;

/// Concatenation of the segments of successively selected sources.
///
/// A source whose probe or any conversion fails is abandoned and a new one is
/// selected; the failure never reaches the caller. Segments of one source are
/// contiguous and in index order.
pub struct SourceChain {
    selector: ContentSelector,
    segmenter: Segmenter,
    current: Option<Fragmentation>,
    retry_delay: Duration,
    events: Option<Arc<EventBus>>,
}

impl SourceChain {
    pub fn new(selector: ContentSelector, segmenter: Segmenter, retry_delay: Duration) -> Self {
        Self {
            selector,
            segmenter,
            current: None,
            retry_delay,
            events: None,
        }
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    /// The next non-empty batch of segments (one conversion wave).
    ///
    /// Never fails; stop it by dropping the future, which also kills any
    /// conversion still running.
    pub async fn next_batch(&mut self) -> Vec<Segment> {
        loop {
            let mut fragmentation = match self.current.take() {
                Some(f) if !f.is_exhausted() => f,
                _ => match self.start_next_source().await {
                    Some(f) => f,
                    None => continue,
                },
            };

            match fragmentation.next_wave().await {
                Ok(Some(segments)) if !segments.is_empty() => {
                    self.current = Some(fragmentation);
                    return segments;
                }
                Ok(_) => continue,
                Err(e) => {
                    let source = fragmentation.source().label();
                    self.abandon(source, e.to_string()).await;
                }
            }
        }
    }

    /// Select and plan a new source. `None` means it was abandoned.
    async fn start_next_source(&mut self) -> Option<Fragmentation> {
        let source = self.selector.select_source().await;
        let label = source.label();

        match self.segmenter.fragment(source).await {
            Ok(f) if f.is_exhausted() => {
                self.abandon(label, "source is too short to produce a segment".into())
                    .await;
                None
            }
            Ok(f) => {
                tracing::info!(
                    source = %label,
                    segments = f.remaining(),
                    "Segmenting source"
                );
                self.publish(EventPayload::SourceSelected { source: label });
                Some(f)
            }
            Err(e) => {
                self.abandon(label, e.to_string()).await;
                None
            }
        }
    }

    async fn abandon(&self, source: String, error: String) {
        tracing::warn!(source = %source, "Abandoning source: {error}");
        self.publish(EventPayload::SourceAbandoned { source, error });
        tokio::time::sleep(self.retry_delay).await;
    }

    fn publish(&self, payload: EventPayload) {
        if let Some(events) = &self.events {
            events.broadcast(payload);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{create_library, FakeTranscoder};
    use lc_av::Transcoder;
    use lc_core::config::SegmenterConfig;
    use std::path::Path;

    fn secs(s: f64) -> Duration {
        Duration::from_secs_f64(s)
    }

    fn chain(root: &Path, fake: &Arc<FakeTranscoder>, concurrency: usize) -> SourceChain {
        let cfg = SegmenterConfig {
            target_duration_secs: 5.0,
            min_duration_secs: 1.0,
            max_concurrency: Some(concurrency),
            output_dir: root.join("chunks"),
            ..Default::default()
        };
        let selector = ContentSelector::new(root.join("lib"), vec!["-live".into()], secs(0.01));
        let segmenter = Segmenter::new(Arc::clone(fake) as Arc<dyn Transcoder>, &cfg);
        SourceChain::new(selector, segmenter, secs(0.01))
    }

    #[tokio::test]
    async fn batches_follow_source_order() {
        let dir = tempfile::tempdir().unwrap();
        let files = create_library(&dir.path().join("lib"), &[("a-live", "one.mp4")]);
        let fake = Arc::new(FakeTranscoder::new());
        fake.add_source(&files[0], secs(12.0));

        let mut chain = chain(dir.path(), &fake, 2);
        let first = chain.next_batch().await;
        let second = chain.next_batch().await;
        // The only source is selected again once exhausted.
        let third = chain.next_batch().await;

        let idx = |b: &[Segment]| b.iter().map(|s| s.index).collect::<Vec<_>>();
        assert_eq!(idx(&first), vec![0, 1]);
        assert_eq!(idx(&second), vec![2]);
        assert_eq!(idx(&third), vec![0, 1]);
        assert_ne!(first[0].path, third[0].path);
    }

    #[tokio::test]
    async fn failing_source_is_abandoned_and_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let files = create_library(
            &dir.path().join("lib"),
            &[("a-live", "broken.mp4"), ("b-live", "good.mp4")],
        );
        let fake = Arc::new(FakeTranscoder::new());
        fake.add_source(&files[0], secs(20.0));
        fake.fail_source(&files[0]);
        fake.add_source(&files[1], secs(20.0));

        let events = Arc::new(EventBus::default());
        let mut rx = events.subscribe();
        let mut chain = chain(dir.path(), &fake, 2).with_events(events);

        for _ in 0..10 {
            let batch = chain.next_batch().await;
            assert!(!batch.is_empty());
            assert!(batch.iter().all(|s| s.source == files[1]));
        }

        // Every abandonment names the broken source.
        while let Ok(event) = rx.try_recv() {
            if let EventPayload::SourceAbandoned { source, .. } = event.payload {
                assert_eq!(source, "a-live/broken.mp4");
            }
        }
    }

    #[tokio::test]
    async fn short_source_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let files = create_library(
            &dir.path().join("lib"),
            &[("a-live", "blip.mp4"), ("b-live", "movie.mp4")],
        );
        let fake = Arc::new(FakeTranscoder::new());
        fake.add_source(&files[0], secs(0.5));
        fake.add_source(&files[1], secs(8.0));

        let mut chain = chain(dir.path(), &fake, 4);
        for _ in 0..5 {
            let batch = chain.next_batch().await;
            assert_eq!(batch.len(), 2);
            assert!(batch.iter().all(|s| s.source == files[1]));
        }
    }

    #[tokio::test]
    async fn failure_mid_source_keeps_earlier_waves() {
        let dir = tempfile::tempdir().unwrap();
        let files = create_library(&dir.path().join("lib"), &[("a-live", "flaky.mp4")]);
        let fake = Arc::new(FakeTranscoder::new());
        fake.add_source(&files[0], secs(30.0));
        fake.fail_segment(&files[0], 2);

        let mut chain = chain(dir.path(), &fake, 2);
        let first = chain.next_batch().await;
        assert_eq!(first.iter().map(|s| s.index).collect::<Vec<_>>(), vec![0, 1]);

        // Wave 2..3 fails, the source is restarted from a new selection.
        let next = chain.next_batch().await;
        assert_eq!(next.iter().map(|s| s.index).collect::<Vec<_>>(), vec![0, 1]);
    }
}
