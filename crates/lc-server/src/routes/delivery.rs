//! Client delivery protocol.
//!
//! A client registers once and then polls `next` with its session id as the
//! request body. Each `200` payload is the next segment of the broadcast in
//! order; `204` means nothing new has been broadcast since the last poll.

use axum::extract::State;
use axum::Extension;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;

use lc_core::events::EventPayload;
use lc_core::{Error, SessionId};

use crate::context::AppContext;
use crate::error::AppError;
use crate::middleware::request_id::RequestId;

/// POST /register -- create a session and return its id.
pub async fn register(State(ctx): State<AppContext>) -> (StatusCode, String) {
    let id = ctx.registry.register();
    tracing::info!(session_id = %id, sessions = ctx.registry.len(), "Session registered");
    ctx.event_bus
        .broadcast(EventPayload::SessionRegistered { session_id: id });
    (StatusCode::ACCEPTED, id.to_string())
}

/// POST /next -- pop the oldest pending segment of a session.
pub async fn next_segment(
    State(ctx): State<AppContext>,
    request_id: Option<Extension<RequestId>>,
    body: Bytes,
) -> Result<Response, AppError> {
    deliver(&ctx, &body).await.map_err(|e| match request_id {
        Some(Extension(RequestId(id))) => AppError::new(e).with_request_id(id),
        None => AppError::new(e),
    })
}

async fn deliver(ctx: &AppContext, body: &[u8]) -> lc_core::Result<Response> {
    let raw = std::str::from_utf8(body)
        .map_err(|_| Error::Forbidden("session id is not valid UTF-8".into()))?
        .trim();
    let id: SessionId = raw
        .parse()
        .map_err(|_| Error::Forbidden(format!("unknown session {raw:?}")))?;
    let queue = ctx
        .registry
        .lookup(&id)
        .map_err(|_| Error::Forbidden(format!("unknown session {id}")))?;

    let Some(segment) = queue.pop() else {
        return Ok(StatusCode::NO_CONTENT.into_response());
    };

    let data = match tokio::fs::read(&segment.path).await {
        Ok(data) => data,
        Err(e) => {
            tracing::warn!(
                session_id = %id,
                path = %segment.path.display(),
                "Failed to read segment: {e}"
            );
            queue.restore(segment);
            return Err(e.into());
        }
    };
    tracing::debug!(
        session_id = %id,
        source = %segment.source_label(),
        index = segment.index,
        bytes = data.len(),
        "Delivered segment"
    );

    Ok((
        [(header::CONTENT_TYPE, segment.content_type())],
        Bytes::from(data),
    )
        .into_response())
}
