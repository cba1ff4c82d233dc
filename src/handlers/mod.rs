//! Packet handlers: decode a client packet's payload, call into the
//! appropriate `chat`/`state` operation, and translate the result back
//! into enqueued bytes on the session. Grounded on the reference
//! implementation's IRC handler registry, re-keyed from command names to
//! bancho packet ids.

mod chat;
mod friend;
mod multiplayer;
pub(crate) mod presence;
mod spectator;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bancho_proto::packets::client;

use crate::error::BanchoError;
use crate::state::context::ServerContext;
use crate::state::session::Session;

/// Borrowed handler context: the server's shared state plus the session
/// the inbound packet belongs to.
pub struct Context<'a> {
    pub ctx: &'a ServerContext,
    pub session: &'a Arc<Session>,
}

pub type HandlerResult = Result<(), BanchoError>;

#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, ctx: &Context<'_>, payload: &[u8]) -> HandlerResult;
}

/// Maps packet ids to handlers. Built once at startup and shared behind
/// an `Arc` by the HTTP front.
pub struct Registry {
    handlers: HashMap<u16, Box<dyn Handler>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        let mut handlers: HashMap<u16, Box<dyn Handler>> = HashMap::new();

        // Presence / action state
        handlers.insert(client::CHANGE_ACTION, Box::new(presence::ChangeActionHandler));
        handlers.insert(client::PING, Box::new(presence::PingHandler));
        handlers.insert(client::LOGOUT, Box::new(presence::LogoutHandler));
        handlers.insert(client::RECEIVE_UPDATES, Box::new(presence::ReceiveUpdatesHandler));
        handlers.insert(client::SET_AWAY_MESSAGE, Box::new(presence::SetAwayMessageHandler));
        handlers.insert(client::USER_STATS_REQUEST, Box::new(presence::UserStatsRequestHandler));
        handlers.insert(client::USER_PRESENCE_REQUEST, Box::new(presence::UserPresenceRequestHandler));
        handlers.insert(client::USER_PRESENCE_REQUEST_ALL, Box::new(presence::UserPresenceRequestAllHandler));
        handlers.insert(client::REQUEST_STATUS_UPDATE, Box::new(presence::RequestStatusUpdateHandler));

        // Chat
        handlers.insert(client::SEND_PUBLIC_MESSAGE, Box::new(chat::SendPublicMessageHandler));
        handlers.insert(client::SEND_PRIVATE_MESSAGE, Box::new(chat::SendPrivateMessageHandler));
        handlers.insert(client::CHANNEL_JOIN, Box::new(chat::ChannelJoinHandler));
        handlers.insert(client::CHANNEL_PART, Box::new(chat::ChannelPartHandler));

        // Spectator
        handlers.insert(client::START_SPECTATING, Box::new(spectator::StartSpectatingHandler));
        handlers.insert(client::STOP_SPECTATING, Box::new(spectator::StopSpectatingHandler));
        handlers.insert(client::SPECTATE_FRAMES, Box::new(spectator::SpectateFramesHandler));
        handlers.insert(client::CANT_SPECTATE, Box::new(spectator::CantSpectateHandler));

        // Multiplayer
        handlers.insert(client::JOIN_LOBBY, Box::new(multiplayer::JoinLobbyHandler));
        handlers.insert(client::PART_LOBBY, Box::new(multiplayer::PartLobbyHandler));
        handlers.insert(client::CREATE_MATCH, Box::new(multiplayer::CreateMatchHandler));
        handlers.insert(client::JOIN_MATCH, Box::new(multiplayer::JoinMatchHandler));
        handlers.insert(client::PART_MATCH, Box::new(multiplayer::PartMatchHandler));
        handlers.insert(client::MATCH_CHANGE_SLOT, Box::new(multiplayer::ChangeSlotHandler));
        handlers.insert(client::MATCH_READY, Box::new(multiplayer::ReadyHandler));
        handlers.insert(client::MATCH_LOCK, Box::new(multiplayer::LockHandler));
        handlers.insert(client::MATCH_CHANGE_SETTINGS, Box::new(multiplayer::ChangeSettingsHandler));
        handlers.insert(client::MATCH_START, Box::new(multiplayer::StartHandler));
        handlers.insert(client::MATCH_FRAMES, Box::new(multiplayer::FramesHandler));
        handlers.insert(client::MATCH_COMPLETE, Box::new(multiplayer::CompleteHandler));
        handlers.insert(client::MATCH_CHANGE_MODS, Box::new(multiplayer::ChangeModsHandler));
        handlers.insert(client::MATCH_LOAD_COMPLETE, Box::new(multiplayer::LoadCompleteHandler));
        handlers.insert(client::MATCH_NO_BEATMAP, Box::new(multiplayer::NoBeatmapHandler));
        handlers.insert(client::MATCH_NOT_READY, Box::new(multiplayer::NotReadyHandler));
        handlers.insert(client::MATCH_FAILED, Box::new(multiplayer::FailedHandler));
        handlers.insert(client::MATCH_HAS_BEATMAP, Box::new(multiplayer::HasBeatmapHandler));
        handlers.insert(client::MATCH_SKIP_REQUEST, Box::new(multiplayer::SkipHandler));
        handlers.insert(client::MATCH_TRANSFER_HOST, Box::new(multiplayer::TransferHostHandler));
        handlers.insert(client::MATCH_INVITE, Box::new(multiplayer::InviteHandler));
        handlers.insert(client::MATCH_CHANGE_PASSWORD, Box::new(multiplayer::ChangePasswordHandler));
        handlers.insert(client::TOURNAMENT_MATCH_INFO_REQUEST, Box::new(multiplayer::TournamentMatchInfoHandler));
        handlers.insert(client::TOURNAMENT_JOIN_MATCH_CHANNEL, Box::new(multiplayer::TournamentJoinChannelHandler));
        handlers.insert(client::TOURNAMENT_LEAVE_MATCH_CHANNEL, Box::new(multiplayer::TournamentLeaveChannelHandler));

        // Friends
        handlers.insert(client::FRIEND_ADD, Box::new(friend::FriendAddHandler));
        handlers.insert(client::FRIEND_REMOVE, Box::new(friend::FriendRemoveHandler));

        Self { handlers }
    }

    /// Dispatches one decoded packet. Unknown packet ids are logged and
    /// ignored, matching the reference implementation's tolerant framing.
    pub async fn dispatch(&self, ctx: &Context<'_>, packet_id: u16, payload: &[u8]) -> HandlerResult {
        match self.handlers.get(&packet_id) {
            Some(handler) => handler.handle(ctx, payload).await,
            None => {
                tracing::debug!(packet_id, "no handler registered for packet");
                Ok(())
            }
        }
    }
}
