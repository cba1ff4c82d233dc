//! Chat router: channel join/part and message send, grounded directly on
//! the reference implementation's `chatHelper` module.

pub mod bot;
pub mod multiplayer;
pub mod spectator;

use std::sync::Arc;

use bancho_proto::packets;

use crate::error::BanchoError;
use crate::state::context::ServerContext;
use crate::state::session::Session;

const MESSAGE_HARD_LIMIT: usize = 2048;
const MESSAGE_TRUNCATE_AT: usize = 2045;

/// Maps a client-facing virtual channel name (`#spectator`, `#multiplayer`)
/// to its internal per-room name (`#spect_<id>`, `#multi_<id>`), and the
/// reverse for the name shown back to the client. Channels that are
/// already internal names map to the client-facing name on the reverse
/// leg; anything else passes through unchanged both ways.
fn resolve_channel(session: &Session, name: &str) -> (String, String) {
    if name == "#spectator" {
        let target = session.spectator().spectating_user_id.unwrap_or(session.user_id);
        (format!("#spect_{target}"), "#spectator".to_string())
    } else if name == "#multiplayer" {
        let match_id = session.core().match_id.unwrap_or(0);
        (format!("#multi_{match_id}"), "#multiplayer".to_string())
    } else if name.starts_with("#spect_") {
        (name.to_string(), "#spectator".to_string())
    } else if name.starts_with("#multi_") {
        (name.to_string(), "#multiplayer".to_string())
    } else {
        (name.to_string(), name.to_string())
    }
}

/// Joins `channel` (which may be a virtual name). Refuses channels marked
/// special (`#spect_*`/`#multi_*`) for non-IRC, non-forced game clients.
pub fn join_channel(ctx: &ServerContext, session: &Arc<Session>, channel: &str, force: bool) -> Result<(), BanchoError> {
    let (internal, _client_name) = resolve_channel(session, channel);
    let is_special = internal.starts_with("#spect_") || internal.starts_with("#multi_");
    let Some(chan) = ctx.channels.get(&internal) else {
        return Err(BanchoError::ChannelUnknown(internal));
    };
    if is_special && !session.irc && !force {
        return Err(BanchoError::ChannelUnknown(internal));
    }
    {
        let mut core = session.core();
        if core.joined_channels.iter().any(|c| c == &internal) {
            return Err(BanchoError::UserAlreadyInChannel(internal));
        }
        core.joined_channels.push(internal.clone());
        core.joined_streams.insert(chan.stream_name());
    }
    ctx.streams.join(&chan.stream_name(), session.token);
    tracing::info!(user = %session.username, channel = %internal, "joined channel");
    Ok(())
}

/// Parts `channel`. A no-op (not an error) if `channel` doesn't start with
/// `#` — that's the client closing a PM tab, which carries no server-side
/// state. Disposes the channel if it was temporary and is now empty.
pub fn part_channel(ctx: &ServerContext, session: &Arc<Session>, channel: &str, kick: bool, force: bool) -> Result<(), BanchoError> {
    if !channel.starts_with('#') {
        return Ok(());
    }
    let (internal, client_name) = resolve_channel(session, channel);
    let is_special = internal.starts_with("#spect_") || internal.starts_with("#multi_");
    let Some(chan) = ctx.channels.get(&internal) else {
        return Err(BanchoError::ChannelUnknown(internal));
    };
    if is_special && !session.irc && !force {
        return Err(BanchoError::ChannelUnknown(internal));
    }
    {
        let mut core = session.core();
        if !core.joined_channels.iter().any(|c| c == &internal) {
            return Err(BanchoError::UserNotInChannel(internal));
        }
        core.joined_channels.retain(|c| c != &internal);
        core.joined_streams.remove(&chan.stream_name());
    }
    ctx.streams.leave(&chan.stream_name(), session.token);

    if chan.temp && ctx.streams.subscriber_count(&chan.stream_name()) == 0 {
        ctx.channels.remove(&ctx.streams, &ctx.sessions, &internal);
    }

    if kick {
        session.enqueue(&packets::channel_kicked(&client_name));
    }
    tracing::info!(user = %session.username, channel = %internal, "parted channel");
    Ok(())
}

/// Sends a chat message to a channel or a named user, mirroring
/// `chatHelper.sendMessage`'s full permission/moderation/spam/bot pipeline.
pub async fn send_message(ctx: &ServerContext, sender: &Arc<Session>, to: &str, message: &str) -> Result<(), BanchoError> {
    if sender.is_restricted() {
        return Err(BanchoError::UserRestricted);
    }
    let now = chrono::Utc::now().timestamp();
    if sender.is_silenced(now) {
        return Err(BanchoError::UserSilenced(sender.silence_seconds_left(now)));
    }

    let mut to = to.to_string();
    if message.starts_with("!report") {
        to = ctx.config.bancho.bot_name.clone();
    }

    let (internal, client_name) = resolve_channel(sender, &to);
    to = internal;

    if message.trim().is_empty() {
        return Err(BanchoError::InvalidArguments);
    }
    let message = if message.len() > MESSAGE_HARD_LIMIT {
        let cut = message.char_indices().nth(MESSAGE_TRUNCATE_AT).map_or(message.len(), |(idx, _)| idx);
        format!("{}...", &message[..cut])
    } else {
        message.to_string()
    };

    let packet = packets::message_notify(&sender.username, &client_name, &message, sender.user_id);
    let is_channel = to.starts_with('#');

    if is_channel {
        send_to_channel(ctx, sender, &to, &client_name, &message, &packet).await?;
    } else {
        send_to_user(ctx, sender, &to, &message, &packet).await?;
    }

    if !sender.is_admin() && !sender.is_bot() {
        let counter = {
            let mut core = sender.core();
            core.spam_counter += 1;
            core.spam_counter
        };
        if counter > 10 {
            let silence_end = now + 1800;
            sender.core().silence_end = silence_end;
            sender.enqueue(&packets::silenced_notify(sender.user_id as u32));
            sender.enqueue(&packets::silence_end_notify(1800));
            let _ = ctx.store.set_silence_end(sender.user_id, silence_end).await;
            tracing::info!(user = %sender.username, reason = "Spamming (auto spam protection)", "auto-silenced for spam");
        }
    }

    if is_channel || to.eq_ignore_ascii_case(&ctx.config.bancho.bot_name) {
        if let Some(reply) = bot::dispatch(ctx, sender, &to, &message).await {
            Box::pin(send_message(ctx, &ctx.sessions.by_user_id(crate::state::session::BOT_USER_ID).unwrap_or_else(|| sender.clone()), if is_channel { &to } else { &sender.username }, &reply)).await?;
        }
    }

    Ok(())
}

async fn send_to_channel(ctx: &ServerContext, sender: &Arc<Session>, to: &str, client_name: &str, message: &str, packet: &[u8]) -> Result<(), BanchoError> {
    let chan = ctx.channels.get(to).ok_or_else(|| BanchoError::ChannelUnknown(to.to_string()))?;
    if chan.moderated && !sender.is_admin() {
        return Err(BanchoError::ChannelModerated(to.to_string()));
    }
    if !sender.core().joined_channels.iter().any(|c| c == to) {
        return Err(BanchoError::ChannelNoPermissions(to.to_string()));
    }
    if !chan.public_write && !sender.is_admin() {
        return Err(BanchoError::ChannelNoPermissions(to.to_string()));
    }
    let now = chrono::Utc::now();
    sender.core().push_message(&sender.username, client_name, message, now);
    ctx.streams.broadcast(&chan.stream_name(), packet, &[sender.token], &ctx.sessions);
    if client_name != "#multiplayer" && client_name != "#spectator" {
        let _ = ctx.store.log_channel_message(now.timestamp(), sender.user_id, to, message).await;
    }
    Ok(())
}

async fn send_to_user(ctx: &ServerContext, sender: &Arc<Session>, to: &str, message: &str, packet: &[u8]) -> Result<(), BanchoError> {
    let Some(recipient) = ctx.sessions.by_name(to, false) else {
        if let Ok(Some(user)) = ctx.store.fetch_by_username_safe(&crate::state::session::safe_username(to)).await {
            let _ = ctx.store.log_private_message(chrono::Utc::now().timestamp(), sender.user_id, user.id, message).await;
        }
        return Err(BanchoError::UserNotFound);
    };
    if recipient.is_restricted() && !sender.username.eq_ignore_ascii_case(&ctx.config.bancho.bot_name) {
        return Err(BanchoError::UserRestricted);
    }

    let already_notified = { recipient.core().away_notified.contains(&sender.user_id) };
    let away_message = recipient.core().away_message.clone();
    if let (Some(away), false) = (away_message, already_notified) {
        recipient.core().away_notified.insert(sender.user_id);
        Box::pin(send_message(ctx, &recipient, &sender.username, &format!("\x01ACTION is away: {away}\x01"))).await?;
    }

    recipient.enqueue(packet);
    let _ = ctx.store.log_private_message(chrono::Utc::now().timestamp(), sender.user_id, recipient.user_id, message).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_maps_spectator_alias() {
        let session = Session::new(uuid::Uuid::new_v4(), 5, "alice".into(), "127.0.0.1".into(), false, 0, 0);
        session.spectator().spectating_user_id = Some(42);
        let (internal, client) = resolve_channel(&session, "#spectator");
        assert_eq!(internal, "#spect_42");
        assert_eq!(client, "#spectator");
    }

    #[test]
    fn resolve_passes_through_normal_channels() {
        let session = Session::new(uuid::Uuid::new_v4(), 5, "alice".into(), "127.0.0.1".into(), false, 0, 0);
        let (internal, client) = resolve_channel(&session, "#osu");
        assert_eq!(internal, "#osu");
        assert_eq!(client, "#osu");
    }
}
