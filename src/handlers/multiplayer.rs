//! Multiplayer lobby and match packet handlers: thin decoders over
//! [`crate::chat::multiplayer`].

use async_trait::async_trait;
use bancho_proto::packets;

use super::{Context, Handler, HandlerResult};
use crate::chat::multiplayer as mp;
use crate::error::BanchoError;

pub struct JoinLobbyHandler;
#[async_trait]
impl Handler for JoinLobbyHandler {
    async fn handle(&self, ctx: &Context<'_>, _payload: &[u8]) -> HandlerResult {
        mp::join_lobby(ctx.ctx, ctx.session);
        Ok(())
    }
}

pub struct PartLobbyHandler;
#[async_trait]
impl Handler for PartLobbyHandler {
    async fn handle(&self, ctx: &Context<'_>, _payload: &[u8]) -> HandlerResult {
        mp::part_lobby(ctx.ctx, ctx.session);
        Ok(())
    }
}

pub struct CreateMatchHandler;
#[async_trait]
impl Handler for CreateMatchHandler {
    async fn handle(&self, ctx: &Context<'_>, payload: &[u8]) -> HandlerResult {
        let data = packets::read_match_create(payload).map_err(|_| BanchoError::InvalidArguments)?;
        mp::create(ctx.ctx, ctx.session, data, chrono::Utc::now().timestamp()).map(|_| ())
    }
}

pub struct JoinMatchHandler;
#[async_trait]
impl Handler for JoinMatchHandler {
    async fn handle(&self, ctx: &Context<'_>, payload: &[u8]) -> HandlerResult {
        let (match_id, password) = packets::read_join_match(payload).map_err(|_| BanchoError::InvalidArguments)?;
        mp::join(ctx.ctx, ctx.session, match_id, &password)
    }
}

pub struct PartMatchHandler;
#[async_trait]
impl Handler for PartMatchHandler {
    async fn handle(&self, ctx: &Context<'_>, _payload: &[u8]) -> HandlerResult {
        mp::leave(ctx.ctx, ctx.session)
    }
}

pub struct ChangeSlotHandler;
#[async_trait]
impl Handler for ChangeSlotHandler {
    async fn handle(&self, ctx: &Context<'_>, payload: &[u8]) -> HandlerResult {
        let to = packets::read_slot_index(payload).map_err(|_| BanchoError::InvalidArguments)?;
        mp::slot_move(ctx.ctx, ctx.session, to.max(0) as usize)
    }
}

pub struct ReadyHandler;
#[async_trait]
impl Handler for ReadyHandler {
    async fn handle(&self, ctx: &Context<'_>, _payload: &[u8]) -> HandlerResult {
        mp::toggle_ready(ctx.ctx, ctx.session)
    }
}

pub struct NotReadyHandler;
#[async_trait]
impl Handler for NotReadyHandler {
    async fn handle(&self, ctx: &Context<'_>, _payload: &[u8]) -> HandlerResult {
        mp::toggle_ready(ctx.ctx, ctx.session)
    }
}

pub struct LockHandler;
#[async_trait]
impl Handler for LockHandler {
    async fn handle(&self, ctx: &Context<'_>, payload: &[u8]) -> HandlerResult {
        let slot = packets::read_slot_index(payload).map_err(|_| BanchoError::InvalidArguments)?;
        mp::toggle_lock(ctx.ctx, ctx.session, slot.max(0) as usize)
    }
}

pub struct ChangeSettingsHandler;
#[async_trait]
impl Handler for ChangeSettingsHandler {
    async fn handle(&self, ctx: &Context<'_>, payload: &[u8]) -> HandlerResult {
        let settings = packets::read_match_settings(payload).map_err(|_| BanchoError::InvalidArguments)?;
        mp::change_settings(ctx.ctx, ctx.session, settings)
    }
}

pub struct StartHandler;
#[async_trait]
impl Handler for StartHandler {
    async fn handle(&self, ctx: &Context<'_>, _payload: &[u8]) -> HandlerResult {
        mp::start(ctx.ctx, ctx.session, false)
    }
}

pub struct FramesHandler;
#[async_trait]
impl Handler for FramesHandler {
    async fn handle(&self, ctx: &Context<'_>, payload: &[u8]) -> HandlerResult {
        mp::frames(ctx.ctx, ctx.session, payload)
    }
}

pub struct CompleteHandler;
#[async_trait]
impl Handler for CompleteHandler {
    async fn handle(&self, ctx: &Context<'_>, _payload: &[u8]) -> HandlerResult {
        mp::complete(ctx.ctx, ctx.session)
    }
}

pub struct ChangeModsHandler;
#[async_trait]
impl Handler for ChangeModsHandler {
    async fn handle(&self, ctx: &Context<'_>, payload: &[u8]) -> HandlerResult {
        let mods = packets::read_mods(payload).map_err(|_| BanchoError::InvalidArguments)?;
        mp::change_mods(ctx.ctx, ctx.session, mods)
    }
}

pub struct LoadCompleteHandler;
#[async_trait]
impl Handler for LoadCompleteHandler {
    async fn handle(&self, ctx: &Context<'_>, _payload: &[u8]) -> HandlerResult {
        mp::mark_loaded(ctx.ctx, ctx.session)
    }
}

pub struct NoBeatmapHandler;
#[async_trait]
impl Handler for NoBeatmapHandler {
    async fn handle(&self, ctx: &Context<'_>, _payload: &[u8]) -> HandlerResult {
        mp::mark_no_map(ctx.ctx, ctx.session)
    }
}

pub struct HasBeatmapHandler;
#[async_trait]
impl Handler for HasBeatmapHandler {
    async fn handle(&self, ctx: &Context<'_>, _payload: &[u8]) -> HandlerResult {
        mp::has_beatmap(ctx.ctx, ctx.session)
    }
}

pub struct FailedHandler;
#[async_trait]
impl Handler for FailedHandler {
    async fn handle(&self, ctx: &Context<'_>, _payload: &[u8]) -> HandlerResult {
        mp::failed(ctx.ctx, ctx.session)
    }
}

pub struct SkipHandler;
#[async_trait]
impl Handler for SkipHandler {
    async fn handle(&self, ctx: &Context<'_>, _payload: &[u8]) -> HandlerResult {
        mp::skip(ctx.ctx, ctx.session)
    }
}

pub struct TransferHostHandler;
#[async_trait]
impl Handler for TransferHostHandler {
    async fn handle(&self, ctx: &Context<'_>, payload: &[u8]) -> HandlerResult {
        let slot = packets::read_slot_index(payload).map_err(|_| BanchoError::InvalidArguments)?;
        mp::transfer_host(ctx.ctx, ctx.session, slot.max(0) as usize)
    }
}

pub struct InviteHandler;
#[async_trait]
impl Handler for InviteHandler {
    async fn handle(&self, ctx: &Context<'_>, payload: &[u8]) -> HandlerResult {
        let target = packets::read_user_id(payload).map_err(|_| BanchoError::InvalidArguments)?;
        mp::invite(ctx.ctx, ctx.session, target)
    }
}

pub struct ChangePasswordHandler;
#[async_trait]
impl Handler for ChangePasswordHandler {
    async fn handle(&self, ctx: &Context<'_>, payload: &[u8]) -> HandlerResult {
        let password = packets::read_password(payload).map_err(|_| BanchoError::InvalidArguments)?;
        mp::change_password(ctx.ctx, ctx.session, password)
    }
}

pub struct TournamentMatchInfoHandler;
#[async_trait]
impl Handler for TournamentMatchInfoHandler {
    async fn handle(&self, ctx: &Context<'_>, payload: &[u8]) -> HandlerResult {
        let match_id = packets::read_user_id(payload).map_err(|_| BanchoError::InvalidArguments)?;
        mp::tournament_match_info(ctx.ctx, ctx.session, match_id.max(0) as u32)
    }
}

pub struct TournamentJoinChannelHandler;
#[async_trait]
impl Handler for TournamentJoinChannelHandler {
    async fn handle(&self, ctx: &Context<'_>, payload: &[u8]) -> HandlerResult {
        let match_id = packets::read_user_id(payload).map_err(|_| BanchoError::InvalidArguments)?;
        mp::tournament_join_channel(ctx.ctx, ctx.session, match_id.max(0) as u32)
    }
}

pub struct TournamentLeaveChannelHandler;
#[async_trait]
impl Handler for TournamentLeaveChannelHandler {
    async fn handle(&self, ctx: &Context<'_>, payload: &[u8]) -> HandlerResult {
        let match_id = packets::read_user_id(payload).map_err(|_| BanchoError::InvalidArguments)?;
        mp::tournament_leave_channel(ctx.ctx, ctx.session, match_id.max(0) as u32)
    }
}
