//! Channel join/part and message-send handlers.

use async_trait::async_trait;
use bancho_proto::packets;

use super::{Context, Handler, HandlerResult};
use crate::error::BanchoError;

pub struct SendPublicMessageHandler;

#[async_trait]
impl Handler for SendPublicMessageHandler {
    async fn handle(&self, ctx: &Context<'_>, payload: &[u8]) -> HandlerResult {
        let msg = packets::read_public_message(payload).map_err(|_| BanchoError::InvalidArguments)?;
        crate::chat::send_message(ctx.ctx, ctx.session, &msg.to, &msg.message).await
    }
}

pub struct SendPrivateMessageHandler;

#[async_trait]
impl Handler for SendPrivateMessageHandler {
    async fn handle(&self, ctx: &Context<'_>, payload: &[u8]) -> HandlerResult {
        let msg = packets::read_private_message(payload).map_err(|_| BanchoError::InvalidArguments)?;
        crate::chat::send_message(ctx.ctx, ctx.session, &msg.to, &msg.message).await
    }
}

pub struct ChannelJoinHandler;

#[async_trait]
impl Handler for ChannelJoinHandler {
    async fn handle(&self, ctx: &Context<'_>, payload: &[u8]) -> HandlerResult {
        let name = packets::read_channel_name(payload).map_err(|_| BanchoError::InvalidArguments)?;
        crate::chat::join_channel(ctx.ctx, ctx.session, &name, false)?;
        ctx.session.enqueue(&packets::channel_join_success(&name));
        Ok(())
    }
}

pub struct ChannelPartHandler;

#[async_trait]
impl Handler for ChannelPartHandler {
    async fn handle(&self, ctx: &Context<'_>, payload: &[u8]) -> HandlerResult {
        let name = packets::read_channel_name(payload).map_err(|_| BanchoError::InvalidArguments)?;
        crate::chat::part_channel(ctx.ctx, ctx.session, &name, false, false)
    }
}
