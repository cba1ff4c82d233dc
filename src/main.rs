//! bancho — realtime chat, presence, spectator and multiplayer-lobby
//! server for an osu!-style game service.

mod chat;
mod config;
mod error;
mod handlers;
mod http;
mod metrics;
mod privileges;
mod pubsub;
mod security;
mod state;
mod store;

use std::path::Path;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::config::Config;
use crate::state::context::ServerContext;
use crate::store::{NoopGeoLookup, NoopPpOracle, SqliteUserStore};

fn resolve_config_path() -> String {
    std::env::args().nth(1).unwrap_or_else(|| "config.toml".to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).with_target(true).json().init();

    let config_path = resolve_config_path();
    let config: Config = config::load(Path::new(&config_path)).await?;

    info!(addr = %config.listen.addr, "starting bancho");

    let store = Arc::new(SqliteUserStore::connect(&config.store.path, config.store.pool_size).await?);
    let geo = Arc::new(NoopGeoLookup);
    let pp_oracle = Arc::new(NoopPpOracle);

    let ctx = ServerContext::new(config, store, geo, pp_oracle);
    ctx.load_channels().await?;
    info!("channels loaded");

    register_bot(&ctx).await;

    metrics::init();
    let metrics_addr: std::net::SocketAddr = "0.0.0.0:9090".parse().unwrap();
    tokio::spawn(async move {
        if let Err(err) = metrics::serve(metrics_addr).await {
            error!(%err, "metrics server stopped");
        }
    });
    info!(addr = %metrics_addr, "metrics server started");

    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);
    state::periodic::spawn_all(ctx.clone(), &shutdown_tx);

    spawn_pubsub(ctx.clone());
    spawn_egress(ctx.clone());

    {
        let ctx = ctx.clone();
        tokio::spawn(async move {
            let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt()).expect("install SIGINT handler");
            let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()).expect("install SIGTERM handler");
            tokio::select! {
                _ = sigint.recv() => info!("received SIGINT, shutting down"),
                _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
            }
            pubsub::set_restarting(&ctx, true);
        });
    }

    let addr: std::net::SocketAddr = ctx.config.listen.addr.parse()?;
    let app = http::router(ctx);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "http front listening");
    axum::serve(listener, app.into_make_service_with_connect_info::<std::net::SocketAddr>()).await?;

    Ok(())
}

/// Registers the bot's reserved session once at startup, the way
/// [`chat::bot`] assumes it is always findable by
/// [`state::session::BOT_USER_ID`].
async fn register_bot(ctx: &Arc<ServerContext>) {
    let now = chrono::Utc::now().timestamp();
    let bot = Arc::new(state::session::Session::new(
        uuid::Uuid::new_v4(),
        state::session::BOT_USER_ID,
        ctx.config.bancho.bot_name.clone(),
        "127.0.0.1".to_string(),
        false,
        0,
        now,
    ));
    bot.set_privileges(privileges::NORMAL | privileges::PUBLIC | privileges::ADMIN);
    ctx.sessions.insert(bot);
    info!(name = %ctx.config.bancho.bot_name, "bot session registered");
}

/// Subscribes to the pub/sub bus with a reconnect loop: bus hiccups are
/// transparent to the rest of the core per §5's cancellation/timeouts note.
fn spawn_pubsub(ctx: Arc<ServerContext>) {
    tokio::spawn(async move {
        loop {
            let url = ctx.config.redis.url.clone();
            let prefix = ctx.config.redis.key_prefix.clone();
            if let Err(err) = pubsub::run(ctx.clone(), &url, &prefix).await {
                warn!(%err, "pub/sub subscriber disconnected, reconnecting in 5s");
            }
            tokio::time::sleep(std::time::Duration::from_secs(5)).await;
        }
    });
}

/// Publishes the online-user count and this build's version periodically,
/// matching the egress side of §6's pub/sub topic table.
fn spawn_egress(ctx: Arc<ServerContext>) {
    tokio::spawn(async move {
        let version = env!("CARGO_PKG_VERSION");
        if let Err(err) = pubsub::publish_version(&ctx.config.redis.url, &ctx.config.redis.key_prefix, version).await {
            warn!(%err, "failed to publish version at boot");
        }
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(30));
        loop {
            interval.tick().await;
            if let Err(err) = pubsub::publish_online_users(&ctx.config.redis.url, ctx.sessions.len()).await {
                warn!(%err, "failed to publish online user count");
            }
        }
    });
}
