//! Session (token) registry.
//!
//! A session is one live client connection, keyed by an opaque UUID. Field
//! groups are guarded by three separate locks so unrelated operations
//! never contend with each other: the outbound byte queue, the spectator
//! links, and everything else ("core"). A fourth, per-session `processing`
//! lock is held by the HTTP front for the whole duration of one
//! packet-exchange request, serializing handlers against each other for
//! that session without blocking other sessions.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use dashmap::DashMap;
use parking_lot::Mutex;
use uuid::Uuid;

/// Reserved bot user id; the bot's session never buffers outbound bytes.
pub const BOT_USER_ID: i32 = 999;

#[derive(Debug, Clone, Default)]
pub struct ActionState {
    pub id: u8,
    pub text: String,
    pub md5: String,
    pub mods: u32,
    pub game_mode: u8,
    pub beatmap_id: i32,
}

#[derive(Debug, Clone, Default)]
pub struct CachedStats {
    pub ranked_score: u64,
    pub accuracy: f32,
    pub playcount: u32,
    pub total_score: u64,
    pub game_rank: u32,
    pub pp: u16,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Tillerino {
    pub beatmap_id: i32,
    pub mods: u32,
    pub acc: f32,
}

const MESSAGE_BUFFER_CAPACITY: usize = 10;
const MESSAGE_MAX_CHARS: usize = 50;

/// Everything mutable about a session except its outbound queue and its
/// spectator links, which get their own locks.
#[derive(Debug, Default)]
pub struct SessionCore {
    pub joined_streams: HashSet<String>,
    pub joined_channels: Vec<String>,
    pub match_id: Option<u32>,
    pub action: ActionState,
    pub stats: CachedStats,
    pub relax: bool,
    pub autopilot: bool,
    pub silence_end: i64,
    pub latitude: f32,
    pub longitude: f32,
    pub country: u8,
    pub away_message: Option<String>,
    pub away_notified: HashSet<i32>,
    pub tillerino: Tillerino,
    pub message_buffer: VecDeque<String>,
    pub spam_counter: u32,
    pub last_seen: i64,
    /// Friend relationships are owned by the external user database; this
    /// is only a session-local cache seeded at login and echoed back on
    /// add/remove so the client's friend list stays in sync this session.
    pub friends: Vec<i32>,
}

impl SessionCore {
    /// Appends `"HH:MM - user@channel: message"`, truncated to
    /// [`MESSAGE_MAX_CHARS`], dropping the oldest entry past
    /// [`MESSAGE_BUFFER_CAPACITY`].
    pub fn push_message(&mut self, username: &str, channel: &str, message: &str, now: chrono::DateTime<chrono::Utc>) {
        let mut entry = format!("{} - {}@{}: {}", now.format("%H:%M"), username, channel, message);
        entry.truncate(MESSAGE_MAX_CHARS);
        if self.message_buffer.len() >= MESSAGE_BUFFER_CAPACITY {
            self.message_buffer.pop_front();
        }
        self.message_buffer.push_back(entry);
    }

    pub fn buffer_string(&self) -> String {
        self.message_buffer.iter().cloned().collect::<Vec<_>>().join("\n")
    }
}

#[derive(Debug, Default)]
pub struct SpectatorLinks {
    pub spectator_of: Option<Uuid>,
    pub spectating_user_id: Option<i32>,
    pub spectators: Vec<Uuid>,
}

pub struct Session {
    pub token: Uuid,
    pub user_id: i32,
    pub username: String,
    pub safe_username: String,
    pub privileges: std::sync::atomic::AtomicI64,
    pub ip: String,
    pub time_offset: i32,
    pub irc: bool,
    pub tournament: bool,
    pub login_time: i64,
    last_seen: AtomicI64,
    queue: Mutex<Vec<u8>>,
    spectator: Mutex<SpectatorLinks>,
    core: Mutex<SessionCore>,
    /// Serializes packet handlers against each other for this session.
    pub processing: tokio::sync::Mutex<()>,
}

pub fn safe_username(username: &str) -> String {
    username.trim_end().replace(' ', "_").to_lowercase()
}

impl Session {
    pub fn new(token: Uuid, user_id: i32, username: String, ip: String, tournament: bool, time_offset: i32, now: i64) -> Self {
        let safe_username = safe_username(&username);
        Self {
            token,
            user_id,
            username,
            safe_username,
            privileges: std::sync::atomic::AtomicI64::new(0),
            ip,
            time_offset,
            irc: false,
            tournament,
            login_time: now,
            last_seen: AtomicI64::new(now),
            queue: Mutex::new(Vec::new()),
            spectator: Mutex::new(SpectatorLinks::default()),
            core: Mutex::new(SessionCore::default()),
            processing: tokio::sync::Mutex::new(()),
        }
    }

    pub fn is_bot(&self) -> bool {
        self.user_id == BOT_USER_ID
    }

    /// No-op for the bot: its session never buffers outbound bytes.
    pub fn enqueue(&self, bytes: &[u8]) {
        if self.is_bot() || bytes.is_empty() {
            return;
        }
        self.queue.lock().extend_from_slice(bytes);
    }

    /// Atomically drains the outbound queue. Calling this on an empty
    /// queue returns an empty vec and leaves the queue empty; calling it
    /// twice without an intervening enqueue returns bytes once, then none.
    pub fn drain(&self) -> Vec<u8> {
        std::mem::take(&mut *self.queue.lock())
    }

    pub fn touch(&self, now: i64) {
        self.last_seen.store(now, Ordering::Relaxed);
    }

    pub fn last_seen(&self) -> i64 {
        self.last_seen.load(Ordering::Relaxed)
    }

    pub fn core(&self) -> parking_lot::MutexGuard<'_, SessionCore> {
        self.core.lock()
    }

    pub fn spectator(&self) -> parking_lot::MutexGuard<'_, SpectatorLinks> {
        self.spectator.lock()
    }

    pub fn privileges(&self) -> i64 {
        self.privileges.load(Ordering::Relaxed)
    }

    pub fn set_privileges(&self, privileges: i64) {
        self.privileges.store(privileges, Ordering::Relaxed);
    }

    pub fn is_restricted(&self) -> bool {
        crate::privileges::is_restricted(self.privileges())
    }

    pub fn is_admin(&self) -> bool {
        crate::privileges::is_admin(self.privileges())
    }

    pub fn is_silenced(&self, now: i64) -> bool {
        self.core().silence_end > now
    }

    pub fn silence_seconds_left(&self, now: i64) -> u32 {
        (self.core().silence_end - now).max(0) as u32
    }
}

/// Auxiliary indices kept alongside the primary id→session map so lookups
/// by user id or name are O(1) rather than the linear scans the reference
/// implementation performs — see SPEC_FULL.md's re-architecture notes.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<Uuid, Arc<Session>>,
    by_user_id: DashMap<i32, Vec<Uuid>>,
    by_safe_name: DashMap<String, Vec<Uuid>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, session: Arc<Session>) {
        self.by_user_id.entry(session.user_id).or_default().push(session.token);
        self.by_safe_name.entry(session.safe_username.clone()).or_default().push(session.token);
        self.sessions.insert(session.token, session);
    }

    pub fn get(&self, token: Uuid) -> Option<Arc<Session>> {
        self.sessions.get(&token).map(|e| e.clone())
    }

    /// First session in insertion order for this user id, matching the
    /// documented "deterministic first match" behavior (property S5).
    pub fn by_user_id(&self, user_id: i32) -> Option<Arc<Session>> {
        let tokens = self.by_user_id.get(&user_id)?;
        let first = *tokens.first()?;
        self.get(first)
    }

    pub fn all_by_user_id(&self, user_id: i32) -> Vec<Arc<Session>> {
        self.by_user_id
            .get(&user_id)
            .map(|tokens| tokens.iter().filter_map(|t| self.get(*t)).collect())
            .unwrap_or_default()
    }

    pub fn by_name(&self, name: &str, safe: bool) -> Option<Arc<Session>> {
        let key = if safe { name.to_string() } else { safe_username(name) };
        let tokens = self.by_safe_name.get(&key)?;
        let first = *tokens.first()?;
        self.get(first)
    }

    pub fn remove(&self, token: Uuid) -> Option<Arc<Session>> {
        let (_, session) = self.sessions.remove(&token)?;
        if let Some(mut tokens) = self.by_user_id.get_mut(&session.user_id) {
            tokens.retain(|t| *t != token);
        }
        if let Some(mut tokens) = self.by_safe_name.get_mut(&session.safe_username) {
            tokens.retain(|t| *t != token);
        }
        Some(session)
    }

    pub fn enqueue(&self, token: Uuid, bytes: &[u8]) {
        if let Some(session) = self.get(token) {
            session.enqueue(bytes);
        }
    }

    /// Stream's "leave" hook: remove `name` from a session's joined-streams
    /// bookkeeping (the stream registry itself has already dropped the
    /// subscriber entry by the time this runs).
    pub fn leave_stream_hook(&self, token: Uuid, name: &str) {
        if let Some(session) = self.get(token) {
            session.core().joined_streams.remove(name);
        }
    }

    pub fn iter(&self) -> Vec<Arc<Session>> {
        self.sessions.iter().map(|e| e.value().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Broadcasts to the listed user ids, or (if `negate`) to every
    /// *other* connected user.
    pub fn multiple_enqueue(&self, bytes: &[u8], user_ids: &[i32], negate: bool) {
        for session in self.iter() {
            let listed = user_ids.contains(&session.user_id);
            if listed != negate {
                session.enqueue(bytes);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make(user_id: i32, username: &str) -> Arc<Session> {
        Arc::new(Session::new(Uuid::new_v4(), user_id, username.to_string(), "127.0.0.1".into(), false, 0, 0))
    }

    #[test]
    fn drain_is_idempotent_on_empty_queue() {
        let s = make(1, "alice");
        assert_eq!(s.drain(), Vec::<u8>::new());
        s.enqueue(b"abc");
        assert_eq!(s.drain(), b"abc".to_vec());
        assert_eq!(s.drain(), Vec::<u8>::new());
    }

    #[test]
    fn bot_session_never_buffers() {
        let s = make(BOT_USER_ID, "BanchoBot");
        s.enqueue(b"hello");
        assert_eq!(s.drain(), Vec::<u8>::new());
    }

    #[test]
    fn by_user_id_is_deterministic_first_match() {
        let registry = SessionRegistry::new();
        let a = make(5, "u");
        let b = make(5, "u");
        let a_token = a.token;
        registry.insert(a);
        registry.insert(b);
        assert_eq!(registry.by_user_id(5).unwrap().token, a_token);
    }

    #[test]
    fn session_uniqueness_is_injective() {
        let registry = SessionRegistry::new();
        let a = make(1, "a");
        let token = a.token;
        registry.insert(a);
        assert!(registry.get(token).is_some());
        registry.remove(token);
        assert!(registry.get(token).is_none());
        assert!(registry.by_user_id(1).is_none());
    }
}
