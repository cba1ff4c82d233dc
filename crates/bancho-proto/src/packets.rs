//! Packet id constants and typed payload builders/readers for the subset
//! of the wire protocol this server implements: login, chat, channels,
//! spectator, multiplayer and presence/stats. Several high-frequency
//! packets are precomputed as literal byte constants to avoid formatter
//! overhead on hot paths and to pin down their exact bytes.

use crate::{frame, CodecError, Reader, Writer};

/// Packet ids sent by the client.
pub mod client {
    pub const CHANGE_ACTION: u16 = 0;
    pub const SEND_PUBLIC_MESSAGE: u16 = 1;
    pub const LOGOUT: u16 = 2;
    pub const REQUEST_STATUS_UPDATE: u16 = 3;
    pub const PING: u16 = 4;
    pub const START_SPECTATING: u16 = 16;
    pub const STOP_SPECTATING: u16 = 17;
    pub const SPECTATE_FRAMES: u16 = 18;
    pub const CANT_SPECTATE: u16 = 21;
    pub const SEND_PRIVATE_MESSAGE: u16 = 25;
    pub const PART_LOBBY: u16 = 29;
    pub const JOIN_LOBBY: u16 = 30;
    pub const CREATE_MATCH: u16 = 31;
    pub const JOIN_MATCH: u16 = 32;
    pub const PART_MATCH: u16 = 33;
    pub const MATCH_CHANGE_SLOT: u16 = 38;
    pub const MATCH_READY: u16 = 39;
    pub const MATCH_LOCK: u16 = 40;
    pub const MATCH_CHANGE_SETTINGS: u16 = 41;
    pub const MATCH_START: u16 = 44;
    pub const MATCH_FRAMES: u16 = 47;
    pub const MATCH_COMPLETE: u16 = 49;
    pub const MATCH_CHANGE_MODS: u16 = 51;
    pub const MATCH_LOAD_COMPLETE: u16 = 52;
    pub const MATCH_NO_BEATMAP: u16 = 54;
    pub const MATCH_NOT_READY: u16 = 55;
    pub const MATCH_FAILED: u16 = 56;
    pub const MATCH_HAS_BEATMAP: u16 = 59;
    pub const MATCH_SKIP_REQUEST: u16 = 60;
    pub const CHANNEL_JOIN: u16 = 63;
    pub const MATCH_TRANSFER_HOST: u16 = 70;
    pub const FRIEND_ADD: u16 = 73;
    pub const FRIEND_REMOVE: u16 = 74;
    pub const CHANNEL_PART: u16 = 78;
    pub const RECEIVE_UPDATES: u16 = 79;
    pub const SET_AWAY_MESSAGE: u16 = 82;
    pub const USER_STATS_REQUEST: u16 = 85;
    pub const MATCH_INVITE: u16 = 87;
    pub const MATCH_CHANGE_PASSWORD: u16 = 90;
    pub const TOURNAMENT_MATCH_INFO_REQUEST: u16 = 93;
    pub const USER_PRESENCE_REQUEST: u16 = 97;
    pub const USER_PRESENCE_REQUEST_ALL: u16 = 98;
    pub const TOURNAMENT_JOIN_MATCH_CHANNEL: u16 = 108;
    pub const TOURNAMENT_LEAVE_MATCH_CHANNEL: u16 = 109;
}

/// Packet ids sent by the server.
pub mod server {
    pub const USER_ID: u16 = 5;
    pub const SEND_MESSAGE: u16 = 7;
    pub const USER_STATS: u16 = 11;
    pub const USER_LOGOUT: u16 = 12;
    pub const SPECTATOR_JOINED: u16 = 13;
    pub const SPECTATOR_LEFT: u16 = 14;
    pub const SPECTATE_FRAMES: u16 = 15;
    pub const VERSION_UPDATE: u16 = 19;
    pub const SPECTATOR_CANT_SPECTATE: u16 = 22;
    pub const NOTIFICATION: u16 = 24;
    pub const UPDATE_MATCH: u16 = 26;
    pub const NEW_MATCH: u16 = 27;
    pub const DISPOSE_MATCH: u16 = 28;
    pub const MATCH_JOIN_SUCCESS: u16 = 36;
    pub const MATCH_JOIN_FAIL: u16 = 37;
    pub const FELLOW_SPECTATOR_JOINED: u16 = 42;
    pub const FELLOW_SPECTATOR_LEFT: u16 = 43;
    pub const MATCH_START: u16 = 46;
    pub const MATCH_SCORE_UPDATE: u16 = 48;
    pub const MATCH_TRANSFER_HOST: u16 = 50;
    pub const MATCH_ALL_PLAYERS_LOADED: u16 = 53;
    pub const MATCH_PLAYER_FAILED: u16 = 57;
    pub const MATCH_COMPLETE: u16 = 58;
    pub const MATCH_SKIP: u16 = 61;
    pub const CHANNEL_JOIN_SUCCESS: u16 = 64;
    pub const CHANNEL_INFO: u16 = 65;
    pub const CHANNEL_KICK: u16 = 66;
    pub const PRIVILEGES: u16 = 71;
    pub const FRIENDS_LIST: u16 = 72;
    pub const PROTOCOL_VERSION: u16 = 75;
    pub const MAIN_MENU_ICON: u16 = 76;
    pub const MATCH_PLAYER_SKIPPED: u16 = 81;
    pub const USER_PRESENCE: u16 = 83;
    pub const RESTART: u16 = 86;
    pub const CHANNEL_INFO_END: u16 = 89;
    pub const MATCH_CHANGE_PASSWORD: u16 = 91;
    pub const SILENCE_END: u16 = 92;
    pub const USER_SILENCED: u16 = 94;
    pub const SWITCH_SERVER: u16 = 103;
    pub const MATCH_ABORT: u16 = 106;
}

/// Precomputed literal bytes for packets whose payload never varies.
pub mod literal {
    pub const LOGIN_FAILED: &[u8] = b"\x05\x00\x00\x04\x00\x00\x00\xff\xff\xff\xff";
    pub const FORCE_UPDATE: &[u8] = b"\x05\x00\x00\x04\x00\x00\x00\xfe\xff\xff\xff";
    pub const LOGIN_ERROR: &[u8] = b"\x05\x00\x00\x04\x00\x00\x00\xfb\xff\xff\xff";
    pub const VERIFICATION_REQUIRED: &[u8] = b"\x05\x00\x00\x04\x00\x00\x00\xf8\xff\xff\xff";
    pub const LOGIN_BANNED: &[u8] = b"\x05\x00\x00\x04\x00\x00\x00\xff\xff\xff\xff\x18\x00\x00@\x00\x00\x00\x0b>You are banned! Please contact us on Discord (link at ussr.pl)";
    pub const LOGIN_LOCKED: &[u8] = b"\x05\x00\x00\x04\x00\x00\x00\xff\xff\xff\xff\x18\x00\x00A\x00\x00\x00\x0b?Well... Your account is locked but all your data is still safe.";
    pub const LOGIN_CHEATS: &[u8] = b"\x18\x00\x00L\x00\x00\x00\x0bJWe don't like cheaters here at RealistikOsu! Consider yourself restricted.\x05\x00\x00\x04\x00\x00\x00\xff\xff\xff\xff";
    pub const PROTOCOL_VERSION: &[u8] = b"K\x00\x00\x04\x00\x00\x00\x13\x00\x00\x00";
    pub const CHANNEL_INFO_END: &[u8] = b"Y\x00\x00\x04\x00\x00\x00\x00\x00\x00\x00";
    pub const MATCH_JOIN_FAIL: &[u8] = b"%\x00\x00\x00\x00\x00\x00";
    pub const MATCH_ALL_PLAYERS_LOADED: &[u8] = b"5\x00\x00\x00\x00\x00\x00";
    pub const MATCH_ALL_SKIPPED: &[u8] = b"=\x00\x00\x00\x00\x00\x00";
    pub const MATCH_COMPLETE: &[u8] = b":\x00\x00\x00\x00\x00\x00";
    pub const MATCH_NEW_HOST: &[u8] = b"2\x00\x00\x00\x00\x00\x00";
    pub const MATCH_ABORT: &[u8] = b"j\x00\x00\x00\x00\x00\x00";
}

/// Decoded `userActionChange` payload (client action-state updates).
#[derive(Debug, Clone, PartialEq)]
pub struct ActionChange {
    pub action_id: u8,
    pub action_text: String,
    pub action_md5: String,
    pub action_mods: u32,
    pub game_mode: u8,
    pub beatmap_id: i32,
}

pub fn read_action_change(payload: &[u8]) -> Result<ActionChange, CodecError> {
    let mut r = Reader::new(payload);
    Ok(ActionChange {
        action_id: r.byte()?,
        action_text: r.string()?,
        action_md5: r.string()?,
        action_mods: r.u32()?,
        game_mode: r.byte()?,
        beatmap_id: r.i32()?,
    })
}

/// Decoded `sendPublicMessage`/`sendPrivateMessage` payload.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub message: String,
    pub to: String,
}

pub fn read_public_message(payload: &[u8]) -> Result<ChatMessage, CodecError> {
    let mut r = Reader::new(payload);
    let _sender = r.string()?; // client echoes its own name; server derives fro from the session
    let message = r.string()?;
    let to = r.string()?;
    Ok(ChatMessage { message, to })
}

pub fn read_private_message(payload: &[u8]) -> Result<ChatMessage, CodecError> {
    let mut r = Reader::new(payload);
    let _sender = r.string()?;
    let message = r.string()?;
    let to = r.string()?;
    let _unused = r.u32()?;
    Ok(ChatMessage { message, to })
}

pub fn read_channel_name(payload: &[u8]) -> Result<String, CodecError> {
    Reader::new(payload).string()
}

pub fn read_user_id(payload: &[u8]) -> Result<i32, CodecError> {
    Reader::new(payload).i32()
}

pub fn read_away_message(payload: &[u8]) -> Result<String, CodecError> {
    let mut r = Reader::new(payload);
    let _unused = r.string()?;
    r.string()
}

pub fn read_int_list(payload: &[u8]) -> Result<Vec<i32>, CodecError> {
    Reader::new(payload).int_list()
}

/// A single `i32` payload shared by slot-index and transfer-host packets.
pub fn read_slot_index(payload: &[u8]) -> Result<i32, CodecError> {
    Reader::new(payload).i32()
}

/// A single `u32` payload (`matchChangeMods`).
pub fn read_mods(payload: &[u8]) -> Result<u32, CodecError> {
    Reader::new(payload).u32()
}

/// A single string payload (`matchChangePassword`).
pub fn read_password(payload: &[u8]) -> Result<String, CodecError> {
    Reader::new(payload).string()
}

/// Fields the client supplies when creating a match. Slot status/team
/// arrays and the host id are part of the wire layout but carry no
/// information at creation time (every slot is free), so they're skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientMatchData {
    pub name: String,
    pub password: String,
    pub beatmap_name: String,
    pub beatmap_id: i32,
    pub beatmap_md5: String,
    pub game_mode: u8,
}

pub fn read_match_create(payload: &[u8]) -> Result<ClientMatchData, CodecError> {
    let mut r = Reader::new(payload);
    let _id = r.u16()?;
    let _in_progress = r.byte()?;
    let _match_type = r.byte()?;
    let _mods = r.u32()?;
    let name = r.string()?;
    let password = r.string()?;
    let beatmap_name = r.string()?;
    let beatmap_id = r.i32()?;
    let beatmap_md5 = r.string()?;
    for _ in 0..16 {
        r.byte()?;
    }
    for _ in 0..16 {
        r.byte()?;
    }
    let _host_id = r.i32()?;
    let game_mode = r.byte()?;
    Ok(ClientMatchData { name, password, beatmap_name, beatmap_id, beatmap_md5, game_mode })
}

/// Decoded `joinMatch` payload.
pub fn read_join_match(payload: &[u8]) -> Result<(u32, String), CodecError> {
    let mut r = Reader::new(payload);
    let match_id = r.i32()?;
    let password = r.string()?;
    Ok((match_id.max(0) as u32, password))
}

/// Fields the client supplies when changing match settings. Same wire
/// shape as [`ClientMatchData`] plus the scoring/team-type/freemod flags
/// that follow the slot arrays.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientMatchSettings {
    pub name: String,
    pub password: String,
    pub beatmap_name: String,
    pub beatmap_id: i32,
    pub beatmap_md5: String,
    pub game_mode: u8,
    pub scoring_type: u8,
    pub team_type: u8,
    pub freemod: bool,
}

pub fn read_match_settings(payload: &[u8]) -> Result<ClientMatchSettings, CodecError> {
    let mut r = Reader::new(payload);
    let _id = r.u16()?;
    let _in_progress = r.byte()?;
    let _match_type = r.byte()?;
    let _mods = r.u32()?;
    let name = r.string()?;
    let password = r.string()?;
    let beatmap_name = r.string()?;
    let beatmap_id = r.i32()?;
    let beatmap_md5 = r.string()?;
    for _ in 0..16 {
        r.byte()?;
    }
    for _ in 0..16 {
        r.byte()?;
    }
    let _host_id = r.i32()?;
    let game_mode = r.byte()?;
    let scoring_type = r.byte()?;
    let team_type = r.byte()?;
    let freemod = r.byte()? != 0;
    Ok(ClientMatchSettings { name, password, beatmap_name, beatmap_id, beatmap_md5, game_mode, scoring_type, team_type, freemod })
}

/// Decoded `match_frames` payload.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchFrame {
    pub time: i32,
    pub id: u8,
    pub count300: u16,
    pub count100: u16,
    pub count50: u16,
    pub count_geki: u16,
    pub count_katu: u16,
    pub count_miss: u16,
    pub total_score: i32,
    pub max_combo: u16,
    pub current_combo: u16,
    pub perfect: u8,
    pub current_hp: u8,
    pub tag_byte: u8,
    pub using_score_v2: u8,
    pub raw: Vec<u8>,
}

pub fn read_match_frame(payload: &[u8]) -> Result<MatchFrame, CodecError> {
    let mut r = Reader::new(payload);
    Ok(MatchFrame {
        time: r.i32()?,
        id: r.byte()?,
        count300: r.u16()?,
        count100: r.u16()?,
        count50: r.u16()?,
        count_geki: r.u16()?,
        count_katu: r.u16()?,
        count_miss: r.u16()?,
        total_score: r.i32()?,
        max_combo: r.u16()?,
        current_combo: r.u16()?,
        perfect: r.byte()?,
        current_hp: r.byte()?,
        tag_byte: r.byte()?,
        using_score_v2: r.byte()?,
        raw: payload.to_vec(),
    })
}

// ---- Server packet builders ----

pub fn login_reply(user_id: i32) -> Vec<u8> {
    let mut w = Writer::new();
    w.i32(user_id);
    frame(server::USER_ID, w.as_bytes())
}

pub fn silence_end_notify(seconds: u32) -> Vec<u8> {
    let mut w = Writer::new();
    w.u32(seconds);
    frame(server::SILENCE_END, w.as_bytes())
}

pub fn menu_icon(icon: &str) -> Vec<u8> {
    let mut w = Writer::new();
    w.string(icon);
    frame(server::MAIN_MENU_ICON, w.as_bytes())
}

pub fn bancho_priv(privileges: u32) -> Vec<u8> {
    let mut w = Writer::new();
    w.u32(privileges);
    frame(server::PRIVILEGES, w.as_bytes())
}

pub fn friend_list(friends: &[i32]) -> Vec<u8> {
    let mut w = Writer::new();
    w.int_list(friends);
    frame(server::FRIENDS_LIST, w.as_bytes())
}

pub fn logout_notify(user_id: i32) -> Vec<u8> {
    let mut w = Writer::new();
    w.i32(user_id);
    w.byte(0);
    frame(server::USER_LOGOUT, w.as_bytes())
}

/// Full field layout for `user_presence` (see §3 Session for source fields).
pub struct PresenceFields<'a> {
    pub user_id: i32,
    pub username: &'a str,
    pub timezone: u8,
    pub country: u8,
    pub rank_flags: u8,
    pub longitude: f32,
    pub latitude: f32,
    pub game_rank: u32,
}

pub fn user_presence(f: PresenceFields<'_>) -> Vec<u8> {
    let mut w = Writer::new();
    w.i32(f.user_id);
    w.string(f.username);
    w.byte(f.timezone);
    w.byte(f.country);
    w.byte(f.rank_flags);
    w.f32(f.longitude);
    w.f32(f.latitude);
    w.u32(f.game_rank);
    frame(server::USER_PRESENCE, w.as_bytes())
}

pub struct StatsFields<'a> {
    pub user_id: u32,
    pub action_id: u8,
    pub action_text: &'a str,
    pub action_md5: &'a str,
    pub action_mods: i32,
    pub game_mode: u8,
    pub beatmap_id: i32,
    pub ranked_score: u64,
    pub accuracy: f32,
    pub playcount: u32,
    pub total_score: u64,
    pub game_rank: u32,
    pub pp: u16,
}

pub fn user_stats(f: StatsFields<'_>) -> Vec<u8> {
    let mut w = Writer::new();
    w.u32(f.user_id);
    w.byte(f.action_id);
    w.string(f.action_text);
    w.string(f.action_md5);
    w.i32(f.action_mods);
    w.byte(f.game_mode);
    w.i32(f.beatmap_id);
    w.u64(f.ranked_score);
    w.f32(f.accuracy);
    w.u32(f.playcount);
    w.u64(f.total_score);
    w.u32(f.game_rank);
    w.u16(f.pp);
    frame(server::USER_STATS, w.as_bytes())
}

pub fn message_notify(from: &str, to: &str, message: &str, from_id: i32) -> Vec<u8> {
    let mut w = Writer::new();
    w.string(from);
    w.string(message);
    w.string(to);
    w.i32(from_id);
    frame(server::SEND_MESSAGE, w.as_bytes())
}

pub fn channel_join_success(channel: &str) -> Vec<u8> {
    let mut w = Writer::new();
    w.string(channel);
    frame(server::CHANNEL_JOIN_SUCCESS, w.as_bytes())
}

pub fn channel_info(name: &str, description: &str, member_count: u16) -> Vec<u8> {
    let mut w = Writer::new();
    w.string(name);
    w.string(description);
    w.u16(member_count);
    frame(server::CHANNEL_INFO, w.as_bytes())
}

pub fn channel_kicked(channel: &str) -> Vec<u8> {
    let mut w = Writer::new();
    w.string(channel);
    frame(server::CHANNEL_KICK, w.as_bytes())
}

pub fn silenced_notify(user_id: u32) -> Vec<u8> {
    let mut w = Writer::new();
    w.u32(user_id);
    frame(server::USER_SILENCED, w.as_bytes())
}

pub fn spectator_add(user_id: i32) -> Vec<u8> {
    let mut w = Writer::new();
    w.i32(user_id);
    frame(server::SPECTATOR_JOINED, w.as_bytes())
}

pub fn spectator_remove(user_id: i32) -> Vec<u8> {
    let mut w = Writer::new();
    w.i32(user_id);
    frame(server::SPECTATOR_LEFT, w.as_bytes())
}

pub fn spectator_frames(data: &[u8]) -> Vec<u8> {
    frame(server::SPECTATE_FRAMES, data)
}

pub fn spectator_cant_spectate(user_id: i32) -> Vec<u8> {
    let mut w = Writer::new();
    w.i32(user_id);
    frame(server::SPECTATOR_CANT_SPECTATE, w.as_bytes())
}

pub fn fellow_spectator_joined(user_id: i32) -> Vec<u8> {
    let mut w = Writer::new();
    w.i32(user_id);
    frame(server::FELLOW_SPECTATOR_JOINED, w.as_bytes())
}

pub fn fellow_spectator_left(user_id: i32) -> Vec<u8> {
    let mut w = Writer::new();
    w.i32(user_id);
    frame(server::FELLOW_SPECTATOR_LEFT, w.as_bytes())
}

pub fn match_update(payload: &[u8], updated: bool) -> Vec<u8> {
    frame(if updated { server::UPDATE_MATCH } else { server::NEW_MATCH }, payload)
}

pub fn match_start(payload: &[u8]) -> Vec<u8> {
    frame(server::MATCH_START, payload)
}

pub fn match_join_success(payload: &[u8]) -> Vec<u8> {
    frame(server::MATCH_JOIN_SUCCESS, payload)
}

pub fn match_dispose(match_id: u32) -> Vec<u8> {
    let mut w = Writer::new();
    w.u32(match_id);
    frame(server::DISPOSE_MATCH, w.as_bytes())
}

pub fn match_change_password(password: &str) -> Vec<u8> {
    let mut w = Writer::new();
    w.string(password);
    frame(server::MATCH_CHANGE_PASSWORD, w.as_bytes())
}

pub fn match_player_skipped(user_id: i32) -> Vec<u8> {
    let mut w = Writer::new();
    w.i32(user_id);
    frame(server::MATCH_PLAYER_SKIPPED, w.as_bytes())
}

pub fn match_score_update(slot_id: u8, data: &[u8]) -> Vec<u8> {
    // Mirrors the source's byte-surgery: splice the slot id into the raw
    // frame bytes between the timestamp and the rest of the score fields.
    let mut w = Writer::new();
    if data.len() >= 11 {
        w.raw(&data[7..11]);
    }
    w.byte(slot_id);
    if data.len() > 12 {
        w.raw(&data[12..]);
    }
    frame(server::MATCH_SCORE_UPDATE, w.as_bytes())
}

pub fn match_player_fail(slot_id: u32) -> Vec<u8> {
    let mut w = Writer::new();
    w.u32(slot_id);
    frame(server::MATCH_PLAYER_FAILED, w.as_bytes())
}

pub fn notification(message: &str) -> Vec<u8> {
    let mut w = Writer::new();
    w.string(message);
    frame(server::NOTIFICATION, w.as_bytes())
}

pub fn server_restart(ms_until_reconnect: u32) -> Vec<u8> {
    let mut w = Writer::new();
    w.u32(ms_until_reconnect);
    frame(server::RESTART, w.as_bytes())
}

pub fn server_switch(address: &str) -> Vec<u8> {
    let mut w = Writer::new();
    w.string(address);
    frame(server::SWITCH_SERVER, w.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_reply_matches_documented_layout() {
        let bytes = login_reply(-1);
        assert_eq!(bytes, literal::LOGIN_FAILED);
    }

    #[test]
    fn protocol_version_is_the_precomputed_literal() {
        assert_eq!(
            frame(server::PROTOCOL_VERSION, &{
                let mut w = Writer::new();
                w.u32(19);
                w.into_bytes()
            }),
            literal::PROTOCOL_VERSION
        );
    }

    #[test]
    fn decodes_change_action() {
        let mut w = Writer::new();
        w.byte(1).string("playing").string("abcd1234").u32(16).byte(0).i32(42);
        let decoded = read_action_change(w.as_bytes()).unwrap();
        assert_eq!(decoded.action_id, 1);
        assert_eq!(decoded.action_text, "playing");
        assert_eq!(decoded.beatmap_id, 42);
    }

    #[test]
    fn decodes_public_message() {
        let mut w = Writer::new();
        w.string("alice").string("hi").string("#osu");
        let msg = read_public_message(w.as_bytes()).unwrap();
        assert_eq!(msg.message, "hi");
        assert_eq!(msg.to, "#osu");
    }

    #[test]
    fn match_score_update_splices_slot_id() {
        let data: Vec<u8> = (0..20u8).collect();
        let packet = match_score_update(3, &data);
        // header (7) + 4 spliced + 1 slot id + remaining tail bytes (20 - 12 = 8)
        assert_eq!(packet.len(), 7 + 4 + 1 + 8);
        assert_eq!(packet[7..11], data[7..11]);
        assert_eq!(packet[11], 3);
    }
}
