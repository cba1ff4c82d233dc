//! Friend list add/remove. Relationships themselves belong to the external
//! user database (out of scope for this core); these handlers only keep
//! the session-local cache seeded at login in sync and echo it back.

use async_trait::async_trait;
use bancho_proto::packets;

use super::{Context, Handler, HandlerResult};
use crate::error::BanchoError;

pub struct FriendAddHandler;

#[async_trait]
impl Handler for FriendAddHandler {
    async fn handle(&self, ctx: &Context<'_>, payload: &[u8]) -> HandlerResult {
        let target = packets::read_user_id(payload).map_err(|_| BanchoError::InvalidArguments)?;
        let friends = {
            let mut core = ctx.session.core();
            if !core.friends.contains(&target) {
                core.friends.push(target);
            }
            core.friends.clone()
        };
        ctx.session.enqueue(&packets::friend_list(&friends));
        Ok(())
    }
}

pub struct FriendRemoveHandler;

#[async_trait]
impl Handler for FriendRemoveHandler {
    async fn handle(&self, ctx: &Context<'_>, payload: &[u8]) -> HandlerResult {
        let target = packets::read_user_id(payload).map_err(|_| BanchoError::InvalidArguments)?;
        let friends = {
            let mut core = ctx.session.core();
            core.friends.retain(|id| *id != target);
            core.friends.clone()
        };
        ctx.session.enqueue(&packets::friend_list(&friends));
        Ok(())
    }
}
