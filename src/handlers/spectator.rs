//! Spectator packet handlers: thin decoders over [`crate::chat::spectator`].

use async_trait::async_trait;
use bancho_proto::packets;

use super::{Context, Handler, HandlerResult};
use crate::error::BanchoError;

pub struct StartSpectatingHandler;

#[async_trait]
impl Handler for StartSpectatingHandler {
    async fn handle(&self, ctx: &Context<'_>, payload: &[u8]) -> HandlerResult {
        let host_id = packets::read_user_id(payload).map_err(|_| BanchoError::InvalidArguments)?;
        let host = ctx.ctx.sessions.by_user_id(host_id).ok_or(BanchoError::UserNotFound)?;
        crate::chat::spectator::start(ctx.ctx, ctx.session, &host)
    }
}

pub struct StopSpectatingHandler;

#[async_trait]
impl Handler for StopSpectatingHandler {
    async fn handle(&self, ctx: &Context<'_>, _payload: &[u8]) -> HandlerResult {
        crate::chat::spectator::stop(ctx.ctx, ctx.session)
    }
}

pub struct SpectateFramesHandler;

#[async_trait]
impl Handler for SpectateFramesHandler {
    async fn handle(&self, ctx: &Context<'_>, payload: &[u8]) -> HandlerResult {
        crate::chat::spectator::broadcast_frames(ctx.ctx, ctx.session, payload);
        Ok(())
    }
}

pub struct CantSpectateHandler;

#[async_trait]
impl Handler for CantSpectateHandler {
    async fn handle(&self, ctx: &Context<'_>, _payload: &[u8]) -> HandlerResult {
        crate::chat::spectator::cant_spectate(ctx.ctx, ctx.session)
    }
}
