//! Shared test harness for integration tests.
//!
//! [`TestHarness`] builds an [`AppContext`] around a fresh registry and event
//! bus. [`TestHarness::with_server`] serves it on a random port for
//! HTTP-level tests; [`TestHarness::with_channel`] additionally runs the full
//! broadcast pipeline over a temporary library with a fake transcoder.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use lc_av::ToolRegistry;
use lc_channel::testing::{create_library, FakeTranscoder};
use lc_channel::{Channel, ClientRegistry};
use lc_core::config::Config;
use lc_core::events::EventBus;
use lc_server::context::AppContext;
use lc_server::router::build_router;

pub struct TestHarness {
    pub ctx: AppContext,
    pub addr: SocketAddr,
    pub cancel: CancellationToken,
    pub fake: Option<Arc<FakeTranscoder>>,
    pub library: Vec<PathBuf>,
    scheduler: Option<JoinHandle<()>>,
    _dir: tempfile::TempDir,
}

impl TestHarness {
    /// Serve the HTTP surface without a pipeline behind it.
    pub async fn with_server() -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let config = Arc::new(Config::default());
        let ctx = AppContext::new(
            config,
            Arc::new(ClientRegistry::new()),
            Arc::new(EventBus::default()),
            Arc::new(ToolRegistry::default()),
        );
        let addr = serve(ctx.clone()).await;

        Self {
            ctx,
            addr,
            cancel: CancellationToken::new(),
            fake: None,
            library: Vec::new(),
            scheduler: None,
            _dir: dir,
        }
    }

    /// Serve a running channel over a one-file library.
    ///
    /// The source is `source_secs` long and cut into `target_secs` segments;
    /// the fake transcoder writes real segment files.
    pub async fn with_channel(source_secs: f64, target_secs: f64) -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let library = create_library(&dir.path().join("library"), &[("demo-live", "clip.mp4")]);

        let fake = Arc::new(FakeTranscoder::new().writing_files());
        fake.add_source(&library[0], Duration::from_secs_f64(source_secs));

        let mut config = Config::default();
        config.library.root = dir.path().join("library");
        config.library.allowed_tags = vec!["-live".into()];
        config.library.retry_delay_ms = 10;
        config.segmenter.output_dir = dir.path().join("chunks");
        config.segmenter.target_duration_secs = target_secs;
        config.segmenter.min_duration_secs = 0.0;
        config.segmenter.max_concurrency = Some(2);
        config.prefetch.lookahead = 2;
        let config = Arc::new(config);

        let cancel = CancellationToken::new();
        let events = Arc::new(EventBus::default());
        let channel = Channel::new(
            &config,
            Arc::clone(&fake) as Arc<dyn lc_av::Transcoder>,
            Arc::clone(&events),
            cancel.clone(),
        );
        let ctx = AppContext::new(
            config,
            Arc::clone(&channel.registry),
            events,
            Arc::new(ToolRegistry::default()),
        )
        .with_prefetch(channel.prefetch.clone());

        let scheduler = channel.start();
        let addr = serve(ctx.clone()).await;

        Self {
            ctx,
            addr,
            cancel,
            fake: Some(fake),
            library,
            scheduler: Some(scheduler),
            _dir: dir,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Register over HTTP and return the session id.
    pub async fn register(&self, client: &reqwest::Client) -> String {
        let resp = client
            .post(self.url("/register"))
            .send()
            .await
            .expect("register request failed");
        assert_eq!(resp.status(), 202);
        resp.text().await.expect("register body")
    }

    /// Stop the pipeline and wait for the scheduler to exit.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.scheduler.take() {
            handle.await.expect("scheduler panicked");
        }
    }
}

async fn serve(ctx: AppContext) -> SocketAddr {
    let app = build_router(ctx, None);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind random port");
    let addr = listener.local_addr().expect("failed to get local addr");

    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });

    addr
}
