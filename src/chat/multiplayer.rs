//! Multiplayer lobby and match operations, grounded on spec.md §4.7: the
//! match state machine lives in [`crate::state::match_state`]; this module
//! wires that state machine into the stream/channel/session registries the
//! same way [`super::spectator`] wires the spectator links in.

use std::sync::Arc;

use bancho_proto::packets::{self, ClientMatchData, ClientMatchSettings};

use crate::error::BanchoError;
use crate::state::context::ServerContext;
use crate::state::match_state::{ScoringType, TeamType};
use crate::state::session::Session;

const LOBBY_STREAM: &str = "lobby";

fn scoring_from_wire(v: u8) -> ScoringType {
    match v {
        1 => ScoringType::Accuracy,
        2 => ScoringType::Combo,
        3 => ScoringType::ScoreV2,
        _ => ScoringType::Score,
    }
}

fn team_type_from_wire(v: u8) -> TeamType {
    match v {
        1 => TeamType::TagCoop,
        2 => TeamType::TeamVs,
        3 => TeamType::TagTeamVs,
        _ => TeamType::HeadToHead,
    }
}

/// Broadcasts the current match data (password censored) to `lobby` and
/// the match's own stream. `updated` picks `update-match` vs `new-match`.
fn broadcast_update(ctx: &ServerContext, match_id: u32, updated: bool) {
    let Ok(payload) = ctx.matches.with_match(match_id, |m| m.serialize(true)) else { return };
    let packet = packets::match_update(&payload, updated);
    ctx.streams.broadcast(LOBBY_STREAM, &packet, &[], &ctx.sessions);
    ctx.streams.broadcast(&format!("multi/{match_id}"), &packet, &[], &ctx.sessions);
}

/// A client browsing multiplayer joins `lobby`: subscribes, then receives
/// a `new-match` snapshot of every currently open match.
pub fn join_lobby(ctx: &ServerContext, session: &Arc<Session>) {
    ctx.streams.join(LOBBY_STREAM, session.token);
    session.core().joined_streams.insert(LOBBY_STREAM.to_string());
    for id in ctx.matches.all_ids() {
        if let Ok(payload) = ctx.matches.with_match(id, |m| m.serialize(true)) {
            session.enqueue(&packets::match_update(&payload, false));
        }
    }
}

pub fn part_lobby(ctx: &ServerContext, session: &Arc<Session>) {
    ctx.streams.leave(LOBBY_STREAM, session.token);
    session.core().joined_streams.remove(LOBBY_STREAM);
}

/// Creates a match, seats the creator as host in slot 0, and broadcasts
/// the new match to `lobby`.
pub fn create(ctx: &ServerContext, session: &Arc<Session>, data: ClientMatchData, now: i64) -> Result<u32, BanchoError> {
    let id = ctx.matches.create(data.name, data.password.clone(), data.beatmap_id, data.beatmap_name, data.beatmap_md5, data.game_mode, session.user_id, session.tournament, now);
    ctx.streams.add(&format!("multi/{id}"));
    ctx.streams.add(&format!("multi/{id}/playing"));
    ctx.channels.add_temp_channel(&ctx.streams, &format!("#multi_{id}"));
    join(ctx, session, id, &data.password)?;
    tracing::info!(user = %session.username, match_id = id, "created match");
    Ok(id)
}

/// Seats `session` in the lowest free slot. On success, joins the match's
/// channel and stream and sends `match-join-success`; on failure sends
/// `match-join-fail`.
pub fn join(ctx: &ServerContext, session: &Arc<Session>, match_id: u32, password: &str) -> Result<(), BanchoError> {
    let result = ctx.matches.with_match(match_id, |m| m.join(session.user_id, session.token, password));
    match result {
        Ok(Ok(_slot)) => {
            let channel = ctx.matches.with_match(match_id, |m| m.channel_name())?;
            let stream = format!("multi/{match_id}");
            crate::chat::join_channel(ctx, session, &channel, true)?;
            ctx.streams.add(&stream);
            ctx.streams.join(&stream, session.token);
            session.core().joined_streams.insert(stream);
            session.core().match_id = Some(match_id);
            let payload = ctx.matches.with_match(match_id, |m| m.serialize(true))?;
            session.enqueue(&packets::match_join_success(&payload));
            broadcast_update(ctx, match_id, true);
            Ok(())
        }
        Ok(Err(err)) => {
            session.enqueue(packets::literal::MATCH_JOIN_FAIL);
            Err(err)
        }
        Err(err) => {
            session.enqueue(packets::literal::MATCH_JOIN_FAIL);
            Err(err)
        }
    }
}

/// Removes `session` from whatever match it's in. Transfers host and
/// disposes the match as the state machine and spec.md §4.7 dictate.
pub fn leave(ctx: &ServerContext, session: &Arc<Session>) -> Result<(), BanchoError> {
    let Some(match_id) = session.core().match_id.take() else {
        return Ok(());
    };
    let Some(new_host) = ctx.matches.with_match(match_id, |m| m.leave(session.user_id))? else {
        return finish_leave(ctx, session, match_id);
    };
    if let Some(host_session) = ctx.sessions.by_user_id(new_host) {
        host_session.enqueue(packets::literal::MATCH_NEW_HOST);
    }
    finish_leave(ctx, session, match_id)
}

fn finish_leave(ctx: &ServerContext, session: &Arc<Session>, match_id: u32) -> Result<(), BanchoError> {
    let stream = format!("multi/{match_id}");
    ctx.streams.leave(&stream, session.token);
    ctx.streams.leave(&format!("multi/{match_id}/playing"), session.token);
    session.core().joined_streams.remove(&stream);
    let channel = ctx.matches.with_match(match_id, |m| m.channel_name())?;
    let _ = crate::chat::part_channel(ctx, session, &channel, false, true);

    let empty = ctx.matches.with_match(match_id, |m| m.is_empty())?;
    if empty {
        dispose(ctx, match_id);
    } else {
        broadcast_update(ctx, match_id, true);
    }
    Ok(())
}

/// Tears down a match: removes its channel (kicking subscribers),
/// broadcasts `match-disposed`, disposes and removes both of its streams.
pub fn dispose(ctx: &ServerContext, match_id: u32) {
    let Some(channel) = ctx.matches.with_match(match_id, |m| m.channel_name()).ok() else { return };
    ctx.channels.remove(&ctx.streams, &ctx.sessions, &channel);
    let packet = packets::match_dispose(match_id);
    ctx.streams.broadcast(LOBBY_STREAM, &packet, &[], &ctx.sessions);
    let stream = format!("multi/{match_id}");
    let playing_stream = format!("multi/{match_id}/playing");
    ctx.streams.broadcast(&stream, &packet, &[], &ctx.sessions);
    ctx.streams.dispose(&stream, &ctx.sessions);
    ctx.streams.remove(&stream, &ctx.sessions);
    ctx.streams.dispose(&playing_stream, &ctx.sessions);
    ctx.streams.remove(&playing_stream, &ctx.sessions);
    ctx.matches.remove(match_id);
    tracing::info!(match_id, "disposed match");
}

fn require_host(ctx: &ServerContext, session: &Arc<Session>, match_id: u32) -> Result<(), BanchoError> {
    let is_host = ctx.matches.with_match(match_id, |m| m.host_user_id == Some(session.user_id))?;
    if is_host { Ok(()) } else { Err(BanchoError::InvalidArguments) }
}

pub fn slot_move(ctx: &ServerContext, session: &Arc<Session>, to: usize) -> Result<(), BanchoError> {
    let match_id = session.core().match_id.ok_or(BanchoError::InvalidArguments)?;
    ctx.matches.with_match(match_id, |m| {
        let from = m.slots.iter().position(|s| s.user_id == Some(session.user_id)).ok_or(BanchoError::InvalidUser)?;
        m.slot_move(from, to)
    })??;
    broadcast_update(ctx, match_id, true);
    Ok(())
}

pub fn toggle_lock(ctx: &ServerContext, session: &Arc<Session>, slot: usize) -> Result<(), BanchoError> {
    let match_id = session.core().match_id.ok_or(BanchoError::InvalidArguments)?;
    require_host(ctx, session, match_id)?;
    ctx.matches.with_match(match_id, |m| m.toggle_lock(slot))?;
    broadcast_update(ctx, match_id, true);
    Ok(())
}

pub fn toggle_ready(ctx: &ServerContext, session: &Arc<Session>) -> Result<(), BanchoError> {
    let match_id = session.core().match_id.ok_or(BanchoError::InvalidArguments)?;
    ctx.matches.with_match(match_id, |m| m.toggle_ready(session.user_id))??;
    broadcast_update(ctx, match_id, true);
    Ok(())
}

pub fn mark_no_map(ctx: &ServerContext, session: &Arc<Session>) -> Result<(), BanchoError> {
    let match_id = session.core().match_id.ok_or(BanchoError::InvalidArguments)?;
    ctx.matches.with_match(match_id, |m| m.mark_no_map(session.user_id))?;
    broadcast_update(ctx, match_id, true);
    Ok(())
}

/// The client reports it now possesses the beatmap, reversing a prior
/// `no-map` status back to `not-ready`.
pub fn has_beatmap(ctx: &ServerContext, session: &Arc<Session>) -> Result<(), BanchoError> {
    let match_id = session.core().match_id.ok_or(BanchoError::InvalidArguments)?;
    ctx.matches.with_match(match_id, |m| {
        if let Some(slot) = m.slots.iter_mut().find(|s| s.user_id == Some(session.user_id)) {
            if slot.status() == crate::state::match_state::SlotStatus::NoMap {
                slot.set_status(crate::state::match_state::SlotStatus::NotReady);
            }
        }
    })?;
    broadcast_update(ctx, match_id, true);
    Ok(())
}

pub fn change_settings(ctx: &ServerContext, session: &Arc<Session>, s: ClientMatchSettings) -> Result<(), BanchoError> {
    let match_id = session.core().match_id.ok_or(BanchoError::InvalidArguments)?;
    require_host(ctx, session, match_id)?;
    ctx.matches.with_match(match_id, |m| {
        m.name = s.name;
        m.password = s.password;
        m.change_beatmap(s.beatmap_id, s.beatmap_name, s.beatmap_md5, s.game_mode);
        m.set_team_type(team_type_from_wire(s.team_type));
        m.scoring_type = scoring_from_wire(s.scoring_type);
        m.set_mod_mode(s.freemod);
    })?;
    broadcast_update(ctx, match_id, true);
    Ok(())
}

pub fn change_mods(ctx: &ServerContext, session: &Arc<Session>, mods: u32) -> Result<(), BanchoError> {
    let match_id = session.core().match_id.ok_or(BanchoError::InvalidArguments)?;
    ctx.matches.with_match(match_id, |m| {
        if m.mod_mode == crate::state::match_state::ModMode::Freemod {
            if let Some(slot) = m.slots.iter_mut().find(|s| s.user_id == Some(session.user_id)) {
                slot.mods = mods;
            }
        } else if m.host_user_id == Some(session.user_id) {
            m.global_mods = mods;
        }
    })?;
    broadcast_update(ctx, match_id, true);
    Ok(())
}

pub fn change_password(ctx: &ServerContext, session: &Arc<Session>, password: String) -> Result<(), BanchoError> {
    let match_id = session.core().match_id.ok_or(BanchoError::InvalidArguments)?;
    require_host(ctx, session, match_id)?;
    ctx.matches.with_match(match_id, |m| m.password = password.clone())?;
    ctx.streams.broadcast(&format!("multi/{match_id}"), &packets::match_change_password(&password), &[], &ctx.sessions);
    broadcast_update(ctx, match_id, true);
    Ok(())
}

pub fn transfer_host(ctx: &ServerContext, session: &Arc<Session>, slot: usize) -> Result<(), BanchoError> {
    let match_id = session.core().match_id.ok_or(BanchoError::InvalidArguments)?;
    require_host(ctx, session, match_id)?;
    let new_host = ctx.matches.with_match(match_id, |m| {
        let user_id = m.slots.get(slot).and_then(|s| s.user_id).ok_or(BanchoError::InvalidArguments)?;
        m.host_user_id = Some(user_id);
        Ok::<_, BanchoError>(user_id)
    })??;
    if let Some(host_session) = ctx.sessions.by_user_id(new_host) {
        host_session.enqueue(packets::literal::MATCH_NEW_HOST);
    }
    broadcast_update(ctx, match_id, true);
    Ok(())
}

pub fn invite(ctx: &ServerContext, session: &Arc<Session>, target_user_id: i32) -> Result<(), BanchoError> {
    let match_id = session.core().match_id.ok_or(BanchoError::InvalidArguments)?;
    let target = ctx.sessions.by_user_id(target_user_id).ok_or(BanchoError::UserNotFound)?;
    let (name, password) = ctx.matches.with_match(match_id, |m| (m.name.clone(), m.password.clone()))?;
    let url = if password.is_empty() { format!("[osump://{match_id}/ {name}]") } else { format!("[osump://{match_id}/{password} {name}]") };
    let text = format!("Come join my multiplayer match: {url}");
    target.enqueue(&packets::message_notify(&session.username, &target.username, &text, session.user_id));
    Ok(())
}

/// Starts the match (host only). Subscribes started players to the
/// playing stream and broadcasts `match-start`.
pub fn start(ctx: &ServerContext, session: &Arc<Session>, force: bool) -> Result<(), BanchoError> {
    let match_id = session.core().match_id.ok_or(BanchoError::InvalidArguments)?;
    require_host(ctx, session, match_id)?;
    let started = ctx.matches.with_match(match_id, |m| m.start(force))??;
    let playing_stream = format!("multi/{match_id}/playing");
    for user_id in started {
        if let Some(s) = ctx.sessions.by_user_id(user_id) {
            ctx.streams.join(&playing_stream, s.token);
        }
    }
    let payload = ctx.matches.with_match(match_id, |m| m.serialize(false))?;
    ctx.streams.broadcast(&format!("multi/{match_id}"), &packets::match_start(&payload), &[], &ctx.sessions);
    broadcast_update(ctx, match_id, true);
    Ok(())
}

/// Rebroadcasts a frames packet (with the slot id spliced in) to the
/// playing stream.
pub fn frames(ctx: &ServerContext, session: &Arc<Session>, raw: &[u8]) -> Result<(), BanchoError> {
    let match_id = session.core().match_id.ok_or(BanchoError::InvalidArguments)?;
    let slot_id = ctx.matches.with_match(match_id, |m| m.slots.iter().position(|s| s.user_id == Some(session.user_id)))?.ok_or(BanchoError::InvalidUser)?;
    let packet = packets::match_score_update(slot_id as u8, raw);
    ctx.streams.broadcast(&format!("multi/{match_id}/playing"), &packet, &[], &ctx.sessions);
    Ok(())
}

fn after_gameplay_flag(ctx: &ServerContext, match_id: u32) -> Result<(), BanchoError> {
    let (all_loaded, all_skipped, all_finished) = ctx.matches.with_match(match_id, |m| (m.all_loaded(), m.all_skipped(), m.all_finished()))?;
    let stream = format!("multi/{match_id}/playing");
    if all_loaded {
        ctx.streams.broadcast(&stream, packets::literal::MATCH_ALL_PLAYERS_LOADED, &[], &ctx.sessions);
    }
    if all_skipped {
        ctx.streams.broadcast(&stream, packets::literal::MATCH_ALL_SKIPPED, &[], &ctx.sessions);
    }
    if all_finished {
        ctx.matches.with_match(match_id, |m| m.end_game())?;
        ctx.streams.broadcast(&stream, packets::literal::MATCH_COMPLETE, &[], &ctx.sessions);
        ctx.streams.dispose(&stream, &ctx.sessions);
        broadcast_update(ctx, match_id, true);
    }
    Ok(())
}

pub fn mark_loaded(ctx: &ServerContext, session: &Arc<Session>) -> Result<(), BanchoError> {
    let match_id = session.core().match_id.ok_or(BanchoError::InvalidArguments)?;
    ctx.matches.with_match(match_id, |m| m.mark_loaded(session.user_id))?;
    after_gameplay_flag(ctx, match_id)
}

pub fn skip(ctx: &ServerContext, session: &Arc<Session>) -> Result<(), BanchoError> {
    let match_id = session.core().match_id.ok_or(BanchoError::InvalidArguments)?;
    ctx.matches.with_match(match_id, |m| m.mark_skipped(session.user_id))?;
    ctx.streams.broadcast(&format!("multi/{match_id}/playing"), &packets::match_player_skipped(session.user_id), &[], &ctx.sessions);
    after_gameplay_flag(ctx, match_id)
}

pub fn failed(ctx: &ServerContext, session: &Arc<Session>) -> Result<(), BanchoError> {
    let match_id = session.core().match_id.ok_or(BanchoError::InvalidArguments)?;
    let slot_id = ctx.matches.with_match(match_id, |m| {
        m.mark_failed(session.user_id);
        m.slots.iter().position(|s| s.user_id == Some(session.user_id))
    })?;
    if let Some(slot_id) = slot_id {
        ctx.streams.broadcast(&format!("multi/{match_id}/playing"), &packets::match_player_fail(slot_id as u32), &[], &ctx.sessions);
    }
    Ok(())
}

pub fn complete(ctx: &ServerContext, session: &Arc<Session>) -> Result<(), BanchoError> {
    let match_id = session.core().match_id.ok_or(BanchoError::InvalidArguments)?;
    ctx.matches.with_match(match_id, |m| m.mark_completed(session.user_id))?;
    after_gameplay_flag(ctx, match_id)
}

pub fn tournament_match_info(ctx: &ServerContext, session: &Arc<Session>, match_id: u32) -> Result<(), BanchoError> {
    let payload = ctx.matches.with_match(match_id, |m| m.serialize(true))?;
    session.enqueue(&packets::match_update(&payload, true));
    Ok(())
}

pub fn tournament_join_channel(ctx: &ServerContext, session: &Arc<Session>, match_id: u32) -> Result<(), BanchoError> {
    let channel = ctx.matches.with_match(match_id, |m| m.channel_name())?;
    crate::chat::join_channel(ctx, session, &channel, true)
}

pub fn tournament_leave_channel(ctx: &ServerContext, session: &Arc<Session>, match_id: u32) -> Result<(), BanchoError> {
    let channel = ctx.matches.with_match(match_id, |m| m.channel_name())?;
    let _ = crate::chat::part_channel(ctx, session, &channel, false, true);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::store::{NoopGeoLookup, NoopPpOracle, SqliteUserStore};
    use uuid::Uuid;

    fn make_session(user_id: i32, username: &str) -> Arc<Session> {
        Arc::new(Session::new(Uuid::new_v4(), user_id, username.to_string(), "127.0.0.1".into(), false, 0, 0))
    }

    async fn make_ctx() -> Arc<ServerContext> {
        let store = Arc::new(SqliteUserStore::connect(":memory:", 1).await.unwrap());
        ServerContext::new(Config::default(), store, Arc::new(NoopGeoLookup), Arc::new(NoopPpOracle))
    }

    fn match_data() -> ClientMatchData {
        ClientMatchData { name: "Room".into(), password: String::new(), beatmap_name: "Map".into(), beatmap_id: 1, beatmap_md5: "abc".into(), game_mode: 0 }
    }

    #[tokio::test]
    async fn create_then_join_seats_both_players() {
        let ctx = make_ctx().await;
        let host = make_session(1, "host");
        let guest = make_session(2, "guest");
        ctx.sessions.insert(host.clone());
        ctx.sessions.insert(guest.clone());

        let id = create(&ctx, &host, match_data(), 0).unwrap();
        join(&ctx, &guest, id, "").unwrap();

        let occupied = ctx.matches.with_match(id, |m| m.occupied_slots().count()).unwrap();
        assert_eq!(occupied, 2);
        assert_eq!(guest.core().match_id, Some(id));
    }

    #[tokio::test]
    async fn last_player_leaving_disposes_match() {
        let ctx = make_ctx().await;
        let host = make_session(1, "host");
        ctx.sessions.insert(host.clone());
        let id = create(&ctx, &host, match_data(), 0).unwrap();

        leave(&ctx, &host).unwrap();

        assert!(!ctx.matches.exists(id));
        assert!(!ctx.channels.exists(&format!("#multi_{id}")));
    }
}
