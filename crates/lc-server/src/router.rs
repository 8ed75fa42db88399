//! Axum router construction.
//!
//! The delivery protocol lives at the root (`/register`, `/next`) where the
//! browser client expects it; monitoring routes are nested under `/api`.

use std::path::PathBuf;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::context::AppContext;
use crate::middleware::request_id::request_id_middleware;
use crate::routes;

pub fn build_router(ctx: AppContext, static_dir: Option<PathBuf>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        .route("/status", get(routes::status::status))
        .route("/events", get(routes::events::events_handler))
        .route("/admin/tools", get(routes::admin::tools));

    let mut app = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/register", post(routes::delivery::register))
        .route("/next", post(routes::delivery::next_segment))
        .nest("/api", api)
        .layer(middleware::from_fn(request_id_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx);

    // Static file serving for the browser player.
    if let Some(dir) = static_dir {
        if dir.exists() {
            tracing::info!("Serving static files from {:?}", dir);
            let index_path = dir.join("index.html");
            app = app.fallback_service(
                tower_http::services::ServeDir::new(&dir)
                    .append_index_html_on_directories(true)
                    .not_found_service(tower_http::services::ServeFile::new(index_path)),
            );
        } else {
            tracing::warn!("Static directory {:?} does not exist; not serving it", dir);
        }
    }

    app
}
