//! Self-rescheduling background loops: timeout sweep, spam-rate reset,
//! empty-match cleanup. Each spawns its own task and stops on shutdown
//! broadcast, the same shape the teacher uses for its writeback/cleanup
//! tasks in `main.rs`.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{debug, info};

use super::context::ServerContext;

/// Sessions past this many seconds since their last ping are timed out.
const PING_TIMEOUT_SECS: i64 = 100;

pub fn spawn_all(ctx: Arc<ServerContext>, shutdown: &broadcast::Sender<()>) {
    spawn_timeout_sweep(ctx.clone(), shutdown.subscribe());
    spawn_spam_reset(ctx.clone(), shutdown.subscribe());
    spawn_match_cleanup(ctx, shutdown.subscribe());
}

fn spawn_timeout_sweep(ctx: Arc<ServerContext>, mut shutdown: broadcast::Receiver<()>) {
    let period = Duration::from_secs(ctx.config.bancho.timeout_sweep_secs);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    run_timeout_sweep(&ctx);
                }
                _ = shutdown.recv() => {
                    info!("timeout sweep task stopping");
                    break;
                }
            }
        }
    });
}

fn run_timeout_sweep(ctx: &ServerContext) {
    let now = chrono::Utc::now().timestamp();
    let cutoff = now - PING_TIMEOUT_SECS;
    for session in ctx.sessions.iter() {
        if session.is_bot() || session.irc || session.tournament {
            continue;
        }
        if session.last_seen() < cutoff {
            debug!(user_id = session.user_id, "session timed out");
            session.enqueue(&bancho_proto::packets::notification("timed out"));
            crate::handlers::presence::logout(ctx, &session);
            crate::metrics::CONNECTED_SESSIONS.set(ctx.sessions.len() as i64);
        }
    }
}

fn spawn_spam_reset(ctx: Arc<ServerContext>, mut shutdown: broadcast::Receiver<()>) {
    let period = Duration::from_secs(ctx.config.bancho.spam_reset_secs);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    for session in ctx.sessions.iter() {
                        session.core().spam_counter = 0;
                    }
                }
                _ = shutdown.recv() => {
                    info!("spam-rate reset task stopping");
                    break;
                }
            }
        }
    });
}

fn spawn_match_cleanup(ctx: Arc<ServerContext>, mut shutdown: broadcast::Receiver<()>) {
    let period = Duration::from_secs(ctx.config.bancho.match_cleanup_secs);
    let threshold = ctx.config.bancho.match_cleanup_threshold_secs;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let now = chrono::Utc::now().timestamp();
                    for id in ctx.matches.empty_matches_older_than(now, threshold) {
                        crate::chat::multiplayer::dispose(&ctx, id);
                        debug!(match_id = id, "disposed empty match");
                    }
                }
                _ = shutdown.recv() => {
                    info!("match cleanup task stopping");
                    break;
                }
            }
        }
    });
}
