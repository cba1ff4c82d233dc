//! Packet-exchange path: `POST /` with an `osu-token` header. Splits the
//! body into framed packets, dispatches each through the shared
//! [`crate::handlers::Registry`] while holding the session's `processing`
//! lock, then drains and returns the outbound queue.

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use uuid::Uuid;

use crate::handlers::{Context, Registry};
use crate::state::context::ServerContext;

#[tracing::instrument(skip(ctx, token, body), fields(session = %token))]
pub async fn handle(ctx: &Arc<ServerContext>, token: &str, body: &Bytes) -> Response {
    let Ok(token) = Uuid::parse_str(token) else {
        return StatusCode::UNAUTHORIZED.into_response();
    };
    let Some(session) = ctx.sessions.get(token) else {
        return (StatusCode::OK, bancho_proto::packets::literal::LOGIN_FAILED).into_response();
    };

    session.touch(chrono::Utc::now().timestamp());

    let frames = match bancho_proto::split_frames(body) {
        Ok(frames) => frames,
        Err(err) => {
            tracing::debug!(%err, user_id = session.user_id, "malformed packet-exchange body");
            return (StatusCode::OK, session.drain()).into_response();
        }
    };

    let _guard = session.processing.lock().await;
    let registry: &Registry = registry();
    let handler_ctx = Context { ctx, session: &session };
    for frame in frames {
        crate::metrics::PACKETS_HANDLED.with_label_values(&[&frame.id.to_string()]).inc();
        if let Err(err) = registry.dispatch(&handler_ctx, frame.id, &frame.payload).await {
            tracing::debug!(%err, packet_id = frame.id, user_id = session.user_id, "handler error");
            for packet in err.reply_packets() {
                session.enqueue(&packet);
            }
        }
    }
    drop(_guard);

    (StatusCode::OK, session.drain()).into_response()
}

fn registry() -> &'static Registry {
    use std::sync::OnceLock;
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(Registry::new)
}
