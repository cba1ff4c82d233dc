//! HTTP front: the only transport this core exposes. A single axum router
//! carries both the bancho packet path (login and packet-exchange,
//! disambiguated by the `osu-token` header) and the small JSON admin/status
//! surface, the way the reference implementation's `make_app()` routes a
//! single Tornado application across both concerns.

mod api;
mod exchange;
mod login;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::state::context::ServerContext;

pub fn router(ctx: Arc<ServerContext>) -> Router {
    Router::new()
        .route("/", post(root_handler))
        .route("/api/v1/isOnline", get(api::is_online))
        .route("/api/v1/onlineUsers", get(api::online_users))
        .route("/api/v1/serverStatus", get(api::server_status))
        .route("/api/v1/ciTrigger", get(api::ci_trigger))
        .route("/api/v1/fokabotMessage", get(api::fokabot_message))
        .route("/api/v1/verifiedStatus", get(api::verified_status))
        .route("/api/v2/clients/:user_id", get(api::client_snapshot))
        .route("/infos", get(api::infos))
        .with_state(ctx)
}

/// `POST /` is login when the `osu-token` header is absent, and a packet
/// exchange otherwise — the same single-endpoint dispatch the osu! client
/// itself expects from a bancho front.
async fn root_handler(
    axum::extract::State(ctx): axum::extract::State<Arc<ServerContext>>,
    headers: axum::http::HeaderMap,
    connect_info: Option<axum::extract::ConnectInfo<std::net::SocketAddr>>,
    body: bytes::Bytes,
) -> axum::response::Response {
    let ip = connect_info.map(|c| c.0.ip().to_string()).unwrap_or_else(|| "0.0.0.0".to_string());
    match headers.get("osu-token").and_then(|v| v.to_str().ok()) {
        Some(token) => exchange::handle(&ctx, token, &body).await,
        None => login::handle(&ctx, &body, &ip).await,
    }
}
