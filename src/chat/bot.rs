//! The bot: a reserved session (user id 999) that answers `!`-prefixed
//! commands in channels and PMs. Commands are privilege- and syntax-gated
//! the same way the reference implementation's `fokabotCommands` table
//! works, simplified to the commands this core can serve without the
//! external PP-calculation oracle or beatmap-mirror services.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::privileges;
use crate::state::context::ServerContext;
use crate::state::session::Session;

type HandlerFuture<'a> = Pin<Box<dyn Future<Output = BotReply> + Send + 'a>>;
type Handler = for<'a> fn(&'a ServerContext, &'a Arc<Session>, &'a str, &'a [&'a str]) -> HandlerFuture<'a>;

struct Command {
    trigger: &'static str,
    syntax: &'static str,
    required_privileges: i64,
    handler: Handler,
}

enum BotReply {
    None,
    Text(String),
}

const COMMANDS: &[Command] = &[
    Command { trigger: "help", syntax: "", required_privileges: 0, handler: |ctx, sender, target, argv| Box::pin(cmd_help(ctx, sender, target, argv)) },
    Command { trigger: "roll", syntax: "[max]", required_privileges: 0, handler: |ctx, sender, target, argv| Box::pin(cmd_roll(ctx, sender, target, argv)) },
    Command { trigger: "report", syntax: "<username> <reason...>", required_privileges: 0, handler: |ctx, sender, target, argv| Box::pin(cmd_report(ctx, sender, target, argv)) },
    Command { trigger: "kick", syntax: "<username>", required_privileges: privileges::MODERATOR, handler: |ctx, sender, target, argv| Box::pin(cmd_kick(ctx, sender, target, argv)) },
    Command { trigger: "silence", syntax: "<username> <seconds> <reason...>", required_privileges: privileges::MODERATOR, handler: |ctx, sender, target, argv| Box::pin(cmd_silence(ctx, sender, target, argv)) },
];

fn placeholder_count(syntax: &str) -> usize {
    syntax.split_whitespace().filter(|s| !s.is_empty()).count()
}

/// Scans the command table for the first trigger matching `message`; runs
/// its privilege and syntax gates, then its handler. Returns `None` if
/// nothing matched or the handler produced no reply.
pub async fn dispatch(ctx: &ServerContext, sender: &Arc<Session>, target: &str, message: &str) -> Option<String> {
    let body = message.strip_prefix('!')?;
    let mut parts = body.split_whitespace();
    let trigger = parts.next()?;
    let argv: Vec<&str> = parts.collect();

    let command = COMMANDS.iter().find(|c| c.trigger.eq_ignore_ascii_case(trigger))?;

    if !privileges::has(sender.privileges(), command.required_privileges) && command.required_privileges != 0 {
        return Some(format!("You do not have permission to use !{}.", command.trigger));
    }
    if argv.len() < placeholder_count(command.syntax) {
        return Some(format!("Usage: !{} {}", command.trigger, command.syntax));
    }

    match (command.handler)(ctx, sender, target, &argv).await {
        BotReply::None => None,
        BotReply::Text(text) => Some(text),
    }
}

async fn cmd_help(_ctx: &ServerContext, _sender: &Arc<Session>, _target: &str, _argv: &[&str]) -> BotReply {
    let triggers = COMMANDS.iter().map(|c| format!("!{}", c.trigger)).collect::<Vec<_>>().join(", ");
    BotReply::Text(format!("Available commands: {triggers}"))
}

async fn cmd_roll(_ctx: &ServerContext, _sender: &Arc<Session>, _target: &str, argv: &[&str]) -> BotReply {
    let max: u32 = argv.first().and_then(|s| s.parse().ok()).unwrap_or(100).max(1);
    let seed = std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).map(|d| d.subsec_nanos()).unwrap_or(1);
    let roll = 1 + (seed % max);
    BotReply::Text(format!("rolls {roll} point(s)"))
}

async fn cmd_report(ctx: &ServerContext, sender: &Arc<Session>, _target: &str, argv: &[&str]) -> BotReply {
    let Some(username) = argv.first() else {
        return BotReply::Text("Usage: !report <username> <reason...>".to_string());
    };
    let reason = argv[1..].join(" ");
    let Some(target_user) = ctx.sessions.by_name(username, false) else {
        return BotReply::Text(format!("{username} is not online."));
    };
    let _ = ctx.store.file_report(chrono::Utc::now().timestamp(), sender.user_id, target_user.user_id, &reason, "").await;
    BotReply::Text(format!("Report filed against {username}. Thank you."))
}

async fn cmd_kick(ctx: &ServerContext, _sender: &Arc<Session>, _target: &str, argv: &[&str]) -> BotReply {
    let username = argv[0];
    let Some(target_session) = ctx.sessions.by_name(username, false) else {
        return BotReply::Text(format!("{username} is not online."));
    };
    ctx.sessions.remove(target_session.token);
    BotReply::Text(format!("{username} has been kicked."))
}

async fn cmd_silence(ctx: &ServerContext, sender: &Arc<Session>, _target: &str, argv: &[&str]) -> BotReply {
    let username = argv[0];
    let Ok(seconds) = argv[1].parse::<i64>() else {
        return BotReply::Text("Seconds must be a number.".to_string());
    };
    let reason = argv[2..].join(" ");
    let Some(target_session) = ctx.sessions.by_name(username, false) else {
        return BotReply::Text(format!("{username} is not online."));
    };
    let silence_end = chrono::Utc::now().timestamp() + seconds;
    target_session.core().silence_end = silence_end;
    target_session.enqueue(&bancho_proto::packets::silence_end_notify(seconds.max(0) as u32));
    tracing::info!(by = %sender.username, user = %username, seconds, reason, "silence applied via bot command");
    BotReply::Text(format!("{username} has been silenced for {seconds}s."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_count_counts_tokens() {
        assert_eq!(placeholder_count("<username> <seconds> <reason...>"), 3);
        assert_eq!(placeholder_count(""), 0);
    }
}
