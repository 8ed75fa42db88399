//! Channel status for dashboards and monitoring.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::context::AppContext;

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub uptime_secs: u64,
    /// Registered sessions (never evicted).
    pub sessions: usize,
    /// Segments broadcast since startup.
    pub broadcasts: u64,
    pub prefetch: Option<PrefetchStatus>,
    pub latest: Option<LatestSegment>,
}

#[derive(Debug, Serialize)]
pub struct PrefetchStatus {
    pub cached: usize,
    pub lookahead: usize,
    pub refilling: bool,
    pub refills: u64,
    pub underruns: u64,
}

/// The segment currently on air.
#[derive(Debug, Serialize)]
pub struct LatestSegment {
    pub source: String,
    pub index: usize,
    pub duration_secs: f64,
    pub content_type: &'static str,
}

/// GET /api/status
pub async fn status(State(ctx): State<AppContext>) -> Json<StatusResponse> {
    let prefetch = ctx.prefetch.as_ref().map(|p| PrefetchStatus {
        cached: p.cached(),
        lookahead: p.lookahead(),
        refilling: p.is_refilling(),
        refills: p.refills(),
        underruns: p.underruns(),
    });
    let latest = ctx.registry.latest().map(|s| LatestSegment {
        source: s.source_label(),
        index: s.index,
        duration_secs: s.duration.as_secs_f64(),
        content_type: s.content_type(),
    });

    Json(StatusResponse {
        uptime_secs: ctx.started_at.elapsed().as_secs(),
        sessions: ctx.registry.len(),
        broadcasts: ctx.registry.broadcasts(),
        prefetch,
        latest,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use lc_av::ToolRegistry;
    use lc_channel::ClientRegistry;
    use lc_core::config::Config;
    use lc_core::events::EventBus;
    use lc_core::Segment;
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn reports_sessions_and_latest_segment() {
        let ctx = AppContext::new(
            Arc::new(Config::default()),
            Arc::new(ClientRegistry::new()),
            Arc::new(EventBus::default()),
            Arc::new(ToolRegistry::default()),
        );
        ctx.registry.register();
        ctx.registry.broadcast(Arc::new(Segment {
            source: PathBuf::from("/lib/news-live/evening.mp4"),
            index: 4,
            path: PathBuf::from("/chunks/g/4.webm"),
            duration: Duration::from_millis(2500),
        }));

        let Json(report) = status(State(ctx)).await;
        assert_eq!(report.sessions, 1);
        assert_eq!(report.broadcasts, 1);
        assert!(report.prefetch.is_none());
        let latest = report.latest.unwrap();
        assert_eq!(latest.source, "news-live/evening.mp4");
        assert_eq!(latest.index, 4);
        assert_eq!(latest.duration_secs, 2.5);
        assert_eq!(latest.content_type, "video/webm");
    }
}
