//! lc-server: HTTP delivery surface and process lifecycle.
//!
//! This crate ties the other lc-* crates into a running server. It provides:
//!
//! - The client delivery protocol (`POST /register`, `POST /next`)
//! - Status, SSE event and tool routes for monitoring
//! - Pipeline startup on a shared cancellation token
//! - Graceful shutdown via signal handling

pub mod context;
pub mod error;
pub mod middleware;
pub mod router;
pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use lc_av::{FfmpegTranscoder, ToolRegistry, Transcoder};
use lc_channel::Channel;
use lc_core::config::Config;
use lc_core::events::EventBus;

use crate::context::AppContext;

/// Start the loopcast server.
///
/// Discovers the external tools, builds the broadcast pipeline, spawns the
/// scheduler and serves HTTP until a shutdown signal is received.
pub async fn start(config: Config) -> lc_core::Result<()> {
    for warning in config.validate() {
        tracing::warn!("Config warning: {warning}");
    }

    // Discover external tools.
    let tools = Arc::new(ToolRegistry::discover(&config.tools));
    for info in tools.check_all() {
        if info.available {
            tracing::info!(
                "Tool found: {} ({})",
                info.name,
                info.version.as_deref().unwrap_or("unknown version")
            );
        } else {
            tracing::warn!("Tool not found: {}", info.name);
        }
    }
    let transcoder: Arc<dyn Transcoder> =
        Arc::new(FfmpegTranscoder::from_registry(&tools, &config.segmenter)?);

    tokio::fs::create_dir_all(&config.segmenter.output_dir).await?;
    tracing::info!(
        library = %config.library.root.display(),
        output = %config.segmenter.output_dir.display(),
        tags = ?config.library.allowed_tags,
        "Broadcast pipeline configured"
    );

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| lc_core::Error::Internal(format!("Invalid server address: {e}")))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| lc_core::Error::Internal(format!("Failed to bind to {addr}: {e}")))?;

    let cancel = CancellationToken::new();
    let event_bus = Arc::new(EventBus::default());
    let config = Arc::new(config);
    let channel = Channel::new(&config, transcoder, Arc::clone(&event_bus), cancel.clone());

    let ctx = AppContext::new(
        Arc::clone(&config),
        Arc::clone(&channel.registry),
        event_bus,
        tools,
    )
    .with_prefetch(channel.prefetch.clone());

    let scheduler_handle = channel.start();

    let app = router::build_router(ctx, config.server.static_dir.clone());
    tracing::info!("Starting server on {addr}");

    let shutdown_cancel = cancel.clone();
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown_signal(shutdown_cancel).await })
        .await;

    // Stop the scheduler and any refill or conversion still in flight.
    cancel.cancel();
    let _ = scheduler_handle.await;

    served.map_err(|e| lc_core::Error::Internal(format!("Server error: {e}")))?;
    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Wait for a shutdown signal (SIGINT or SIGTERM) or cancellation.
pub async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
        _ = cancel.cancelled() => {}
    }

    tracing::info!("Shutdown signal received");
}
