//! Unified error handling for bancho.
//!
//! `BanchoError` is the single tagged result type every chat-router,
//! spectator, match and login operation returns through. It never carries
//! programmer bugs — unrecoverable startup failures still use `anyhow` at
//! the process boundary in `main.rs`.

use bancho_proto::packets;
use thiserror::Error;

/// Errors raised by the core registries and chat/match/login operations.
#[derive(Debug, Error)]
pub enum BanchoError {
    #[error("invalid arguments")]
    InvalidArguments,

    #[error("unknown channel: {0}")]
    ChannelUnknown(String),

    #[error("no permission on channel: {0}")]
    ChannelNoPermissions(String),

    #[error("channel is moderated: {0}")]
    ChannelModerated(String),

    #[error("user not in channel: {0}")]
    UserNotInChannel(String),

    #[error("user already in channel: {0}")]
    UserAlreadyInChannel(String),

    #[error("user not found")]
    UserNotFound,

    #[error("user is restricted")]
    UserRestricted,

    #[error("user is silenced, {0}s remaining")]
    UserSilenced(u32),

    #[error("login failed")]
    LoginFailed,

    #[error("login banned")]
    LoginBanned,

    #[error("login locked")]
    LoginLocked,

    #[error("login rejected: known cheat client")]
    LoginCheatClient,

    #[error("client must update")]
    ForceUpdate,

    #[error("bancho is in maintenance mode")]
    BanchoMaintenance,

    #[error("bancho is restarting")]
    BanchoRestarting,

    #[error("two-factor authentication required")]
    Need2Fa,

    #[error("token not found")]
    TokenNotFound,

    #[error("wrong channel for this operation: {0}")]
    WrongChannel(String),

    #[error("match not found: {0}")]
    MatchNotFound(u32),

    #[error("missing report info")]
    MissingReportInfo,

    #[error("invalid user")]
    InvalidUser,

    #[error("{0} periodic-loop iteration(s) raised an error")]
    PeriodicLoopAggregate(Vec<BanchoError>),
}

impl BanchoError {
    /// Stable code for metrics labeling, mirroring the IRC-style return
    /// codes named in the error design (never surfaced on the wire itself).
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidArguments => "invalid_arguments",
            Self::ChannelUnknown(_) => "channel_unknown",
            Self::ChannelNoPermissions(_) => "channel_no_permissions",
            Self::ChannelModerated(_) => "channel_moderated",
            Self::UserNotInChannel(_) => "user_not_in_channel",
            Self::UserAlreadyInChannel(_) => "user_already_in_channel",
            Self::UserNotFound => "user_not_found",
            Self::UserRestricted => "user_restricted",
            Self::UserSilenced(_) => "user_silenced",
            Self::LoginFailed => "login_failed",
            Self::LoginBanned => "login_banned",
            Self::LoginLocked => "login_locked",
            Self::LoginCheatClient => "login_cheat_client",
            Self::ForceUpdate => "force_update",
            Self::BanchoMaintenance => "bancho_maintenance",
            Self::BanchoRestarting => "bancho_restarting",
            Self::Need2Fa => "need_2fa",
            Self::TokenNotFound => "token_not_found",
            Self::WrongChannel(_) => "wrong_channel",
            Self::MatchNotFound(_) => "match_not_found",
            Self::MissingReportInfo => "missing_report_info",
            Self::InvalidUser => "invalid_user",
            Self::PeriodicLoopAggregate(_) => "periodic_loop_aggregate",
        }
    }

    /// The IRC-style numeric code from the error design. Internal only —
    /// used for logging parity with the original implementation, never
    /// sent to the game client.
    pub fn legacy_code(&self) -> Option<u16> {
        match self {
            Self::ChannelUnknown(_) | Self::ChannelNoPermissions(_) => Some(403),
            Self::ChannelModerated(_) => Some(404),
            Self::UserNotInChannel(_) => Some(442),
            Self::UserAlreadyInChannel(_) => Some(403),
            Self::UserRestricted | Self::UserSilenced(_) => Some(404),
            Self::UserNotFound => Some(401),
            Self::InvalidArguments => Some(400),
            _ => None,
        }
    }

    /// Converts this error into the packet(s), if any, that should be
    /// enqueued on the originating session, mirroring
    /// `HandlerError::to_irc_reply` in spirit: thin handlers, one place
    /// that knows how an error becomes client-visible bytes.
    pub fn reply_packets(&self) -> Vec<Vec<u8>> {
        match self {
            Self::UserSilenced(seconds) => vec![packets::silence_end_notify(*seconds)],
            Self::LoginFailed => vec![packets::literal::LOGIN_FAILED.to_vec()],
            Self::LoginBanned => vec![packets::literal::LOGIN_BANNED.to_vec()],
            Self::LoginLocked => vec![packets::literal::LOGIN_LOCKED.to_vec()],
            Self::LoginCheatClient => vec![packets::literal::LOGIN_CHEATS.to_vec()],
            Self::ForceUpdate => vec![packets::literal::FORCE_UPDATE.to_vec()],
            Self::Need2Fa => vec![packets::literal::VERIFICATION_REQUIRED.to_vec()],
            _ => vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silenced_reply_carries_remaining_seconds() {
        let err = BanchoError::UserSilenced(42);
        let packets = err.reply_packets();
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0], bancho_proto::packets::silence_end_notify(42));
    }

    #[test]
    fn legacy_codes_match_the_documented_table() {
        assert_eq!(BanchoError::ChannelUnknown("#x".into()).legacy_code(), Some(403));
        assert_eq!(BanchoError::UserNotInChannel("#x".into()).legacy_code(), Some(442));
    }
}
