//! Presence/action-state handlers: the client announcing what it's doing,
//! keep-alives, and batched presence/stats refresh requests.

use async_trait::async_trait;
use bancho_proto::packets::{self, PresenceFields, StatsFields};

use super::{Context, Handler, HandlerResult};
use crate::state::context::ServerContext;
use crate::state::session::Session;

pub(crate) fn stats_packet(session: &Session) -> Vec<u8> {
    let core = session.core();
    packets::user_stats(StatsFields {
        user_id: session.user_id as u32,
        action_id: core.action.id,
        action_text: &core.action.text,
        action_md5: &core.action.md5,
        action_mods: core.action.mods as i32,
        game_mode: core.action.game_mode,
        beatmap_id: core.action.beatmap_id,
        ranked_score: core.stats.ranked_score,
        accuracy: core.stats.accuracy,
        playcount: core.stats.playcount,
        total_score: core.stats.total_score,
        game_rank: core.stats.game_rank,
        pp: core.stats.pp,
    })
}

pub(crate) fn presence_packet(session: &Session) -> Vec<u8> {
    let core = session.core();
    packets::user_presence(PresenceFields {
        user_id: session.user_id,
        username: &session.username,
        timezone: (session.time_offset + 24).clamp(0, 255) as u8,
        country: core.country,
        rank_flags: session.privileges() as u8,
        longitude: core.longitude,
        latitude: core.latitude,
        game_rank: core.stats.game_rank,
    })
}

pub struct ChangeActionHandler;

#[async_trait]
impl Handler for ChangeActionHandler {
    async fn handle(&self, ctx: &Context<'_>, payload: &[u8]) -> HandlerResult {
        let change = packets::read_action_change(payload).map_err(|_| crate::error::BanchoError::InvalidArguments)?;
        {
            let mut core = ctx.session.core();
            core.action.id = change.action_id;
            core.action.text = change.action_text;
            core.action.md5 = change.action_md5;
            core.action.mods = change.action_mods;
            core.action.game_mode = change.game_mode;
            core.action.beatmap_id = change.beatmap_id;
        }
        let packet = stats_packet(ctx.session);
        ctx.ctx.streams.broadcast("main", &packet, &[], &ctx.ctx.sessions);
        Ok(())
    }
}

pub struct RequestStatusUpdateHandler;

#[async_trait]
impl Handler for RequestStatusUpdateHandler {
    async fn handle(&self, ctx: &Context<'_>, _payload: &[u8]) -> HandlerResult {
        ctx.session.enqueue(&stats_packet(ctx.session));
        Ok(())
    }
}

pub struct PingHandler;

#[async_trait]
impl Handler for PingHandler {
    async fn handle(&self, ctx: &Context<'_>, _payload: &[u8]) -> HandlerResult {
        ctx.session.touch(chrono::Utc::now().timestamp());
        Ok(())
    }
}

/// Runs the full logout path: stop spectating, leave the current match,
/// part every joined channel, remove the session from the registry, and
/// broadcast `USER_LOGOUT` to `main`. Shared by the client-initiated
/// logout handler, the timeout sweep, and duplicate-login eviction —
/// anywhere a session goes away without the client driving it itself.
pub(crate) fn logout(ctx: &ServerContext, session: &std::sync::Arc<Session>) {
    crate::chat::multiplayer::leave(ctx, session).ok();
    crate::chat::spectator::stop(ctx, session).ok();
    for channel in session.core().joined_channels.clone() {
        let _ = crate::chat::part_channel(ctx, session, &channel, false, true);
    }
    ctx.sessions.remove(session.token);
    ctx.streams.broadcast("main", &packets::logout_notify(session.user_id), &[], &ctx.sessions);
    tracing::info!(user = %session.username, "logged out");
}

pub struct LogoutHandler;

#[async_trait]
impl Handler for LogoutHandler {
    async fn handle(&self, ctx: &Context<'_>, _payload: &[u8]) -> HandlerResult {
        logout(ctx.ctx, ctx.session);
        Ok(())
    }
}

pub struct ReceiveUpdatesHandler;

#[async_trait]
impl Handler for ReceiveUpdatesHandler {
    async fn handle(&self, ctx: &Context<'_>, payload: &[u8]) -> HandlerResult {
        // 0 = all, 1 = none, 2 = friends only; this core doesn't filter
        // main-stream broadcasts per-recipient, so it only toggles
        // membership in `main` itself.
        let mode = packets::read_user_id(payload).unwrap_or(0);
        if mode == 1 {
            ctx.ctx.streams.leave("main", ctx.session.token);
        } else {
            ctx.ctx.streams.join("main", ctx.session.token);
        }
        Ok(())
    }
}

pub struct SetAwayMessageHandler;

#[async_trait]
impl Handler for SetAwayMessageHandler {
    async fn handle(&self, ctx: &Context<'_>, payload: &[u8]) -> HandlerResult {
        let message = packets::read_away_message(payload).map_err(|_| crate::error::BanchoError::InvalidArguments)?;
        let mut core = ctx.session.core();
        core.away_message = if message.is_empty() { None } else { Some(message) };
        core.away_notified.clear();
        Ok(())
    }
}

pub struct UserStatsRequestHandler;

#[async_trait]
impl Handler for UserStatsRequestHandler {
    async fn handle(&self, ctx: &Context<'_>, payload: &[u8]) -> HandlerResult {
        let ids = packets::read_int_list(payload).map_err(|_| crate::error::BanchoError::InvalidArguments)?;
        for id in ids {
            if let Some(target) = ctx.ctx.sessions.by_user_id(id) {
                ctx.session.enqueue(&stats_packet(&target));
            }
        }
        Ok(())
    }
}

pub struct UserPresenceRequestHandler;

#[async_trait]
impl Handler for UserPresenceRequestHandler {
    async fn handle(&self, ctx: &Context<'_>, payload: &[u8]) -> HandlerResult {
        let ids = packets::read_int_list(payload).map_err(|_| crate::error::BanchoError::InvalidArguments)?;
        for id in ids {
            if let Some(target) = ctx.ctx.sessions.by_user_id(id) {
                ctx.session.enqueue(&presence_packet(&target));
            }
        }
        Ok(())
    }
}

pub struct UserPresenceRequestAllHandler;

#[async_trait]
impl Handler for UserPresenceRequestAllHandler {
    async fn handle(&self, ctx: &Context<'_>, _payload: &[u8]) -> HandlerResult {
        for target in ctx.ctx.sessions.iter() {
            if !target.is_restricted() {
                ctx.session.enqueue(&presence_packet(&target));
            }
        }
        Ok(())
    }
}
