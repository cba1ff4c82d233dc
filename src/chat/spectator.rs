//! Spectator subsystem: start/stop spectating, frame relay and the
//! "can't spectate" bounce, grounded on the reference implementation's
//! `startSpectating`/`stopSpectating` token methods and its
//! `spectateFramesEvent`/`cantSpectateEvent` handlers.

use std::sync::Arc;

use bancho_proto::packets;

use crate::error::BanchoError;
use crate::state::context::ServerContext;
use crate::state::session::Session;

fn stream_name(host_user_id: i32) -> String {
    format!("spect/{host_user_id}")
}

fn channel_name(host_user_id: i32) -> String {
    format!("#spect_{host_user_id}")
}

/// Begins spectating `host`. Stops any prior spectating session first, so
/// switching hosts is just `start(new_host)`.
pub fn start(ctx: &ServerContext, session: &Arc<Session>, host: &Arc<Session>) -> Result<(), BanchoError> {
    if session.spectator().spectator_of.is_some() {
        stop(ctx, session)?;
    }

    let stream = stream_name(host.user_id);
    let channel = channel_name(host.user_id);

    ctx.streams.add(&stream);
    ctx.streams.join(&stream, session.token);
    ctx.streams.join(&stream, host.token);

    let first_spectator = ctx.channels.add_temp_channel(&ctx.streams, &channel);
    let prior_spectator_ids: Vec<i32> = {
        let mut host_links = host.spectator();
        host_links.spectators.push(session.token);
        host_links
            .spectators
            .iter()
            .filter(|t| **t != session.token)
            .filter_map(|t| ctx.sessions.get(*t))
            .map(|s| s.user_id)
            .collect()
    };
    {
        let mut links = session.spectator();
        links.spectator_of = Some(host.token);
        links.spectating_user_id = Some(host.user_id);
    }

    crate::chat::join_channel(ctx, session, &channel, true)?;
    if first_spectator {
        crate::chat::join_channel(ctx, host, &channel, true)?;
    }

    host.enqueue(&packets::spectator_add(session.user_id));
    ctx.streams.broadcast(&stream, &packets::fellow_spectator_joined(session.user_id), &[session.token], &ctx.sessions);
    for prior_id in prior_spectator_ids {
        session.enqueue(&packets::fellow_spectator_joined(prior_id));
    }

    tracing::info!(spectator = %session.username, host = %host.username, "started spectating");
    Ok(())
}

/// Reverses [`start`]. A no-op if `session` isn't currently spectating.
pub fn stop(ctx: &ServerContext, session: &Arc<Session>) -> Result<(), BanchoError> {
    let Some(host_token) = session.spectator().spectator_of else {
        return Ok(());
    };
    let Some(host) = ctx.sessions.get(host_token) else {
        session.spectator().spectator_of = None;
        session.spectator().spectating_user_id = None;
        return Ok(());
    };

    let stream = stream_name(host.user_id);
    let channel = channel_name(host.user_id);

    {
        let mut links = session.spectator();
        links.spectator_of = None;
        links.spectating_user_id = None;
    }
    let host_now_empty = {
        let mut host_links = host.spectator();
        host_links.spectators.retain(|t| *t != session.token);
        host_links.spectators.is_empty()
    };

    ctx.streams.leave(&stream, session.token);
    let _ = crate::chat::part_channel(ctx, session, &channel, false, true);

    ctx.streams.broadcast(&stream, &packets::fellow_spectator_left(session.user_id), &[], &ctx.sessions);
    host.enqueue(&packets::spectator_remove(session.user_id));

    if host_now_empty {
        let _ = crate::chat::part_channel(ctx, &host, &channel, false, true);
        ctx.streams.leave(&stream, host.token);
    }

    tracing::info!(spectator = %session.username, host = %host.username, "stopped spectating");
    Ok(())
}

/// Rebroadcasts a spectator-frames payload (header already stripped by
/// the caller) to every subscriber of the sending host's stream.
pub fn broadcast_frames(ctx: &ServerContext, session: &Arc<Session>, payload: &[u8]) {
    let stream = stream_name(session.user_id);
    ctx.streams.broadcast(&stream, &packets::spectator_frames(payload), &[], &ctx.sessions);
}

/// A spectator reports it can't retrieve the beatmap being played; forward
/// unchanged to the host so it can offer a replacement download.
pub fn cant_spectate(ctx: &ServerContext, session: &Arc<Session>) -> Result<(), BanchoError> {
    let Some(host_user_id) = session.spectator().spectating_user_id else {
        return Err(BanchoError::TokenNotFound);
    };
    let Some(host) = ctx.sessions.by_user_id(host_user_id) else {
        return Err(BanchoError::TokenNotFound);
    };
    host.enqueue(&packets::spectator_cant_spectate(session.user_id));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::state::context::ServerContext;
    use crate::state::session::Session;
    use crate::store::{NoopGeoLookup, NoopPpOracle, SqliteUserStore};
    use uuid::Uuid;

    fn make_session(user_id: i32, username: &str) -> Arc<Session> {
        Arc::new(Session::new(Uuid::new_v4(), user_id, username.to_string(), "127.0.0.1".into(), false, 0, 0))
    }

    async fn make_ctx() -> Arc<ServerContext> {
        let store = Arc::new(SqliteUserStore::connect(":memory:", 1).await.unwrap());
        ServerContext::new(Config::default(), store, Arc::new(NoopGeoLookup), Arc::new(NoopPpOracle))
    }

    #[tokio::test]
    async fn start_links_both_sides_and_creates_channel() {
        let ctx = make_ctx().await;
        let host = make_session(1, "host");
        let spec = make_session(2, "spec");
        ctx.sessions.insert(host.clone());
        ctx.sessions.insert(spec.clone());

        start(&ctx, &spec, &host).unwrap();

        assert_eq!(spec.spectator().spectating_user_id, Some(1));
        assert!(host.spectator().spectators.contains(&spec.token));
        assert!(ctx.channels.exists("#spect_1"));
    }

    #[tokio::test]
    async fn stop_clears_links_and_disposes_empty_channel() {
        let ctx = make_ctx().await;
        let host = make_session(1, "host");
        let spec = make_session(2, "spec");
        ctx.sessions.insert(host.clone());
        ctx.sessions.insert(spec.clone());

        start(&ctx, &spec, &host).unwrap();
        stop(&ctx, &spec).unwrap();

        assert!(spec.spectator().spectator_of.is_none());
        assert!(host.spectator().spectators.is_empty());
        assert!(!ctx.channels.exists("#spect_1"));
    }
}
