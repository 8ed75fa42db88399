//! Admin route handlers.

use axum::extract::State;
use axum::Json;

use crate::context::AppContext;

/// GET /api/admin/tools -- availability and version of ffmpeg and ffprobe.
pub async fn tools(State(ctx): State<AppContext>) -> Json<Vec<lc_av::ToolInfo>> {
    let tools = ctx.tools.clone();
    // Version detection runs the tools; keep it off the async workers.
    let infos = tokio::task::spawn_blocking(move || tools.check_all())
        .await
        .unwrap_or_default();
    Json(infos)
}
