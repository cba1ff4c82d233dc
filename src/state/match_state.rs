//! Match registry and state machine: multiplayer lobby rooms.

use std::sync::atomic::{AtomicU32, Ordering};

use bancho_proto::Writer;
use dashmap::DashMap;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::error::BanchoError;

pub const SLOT_COUNT: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotStatus {
    Free,
    Locked,
    NotReady,
    Ready,
    NoMap,
    Playing,
    Complete,
    Quit,
}

impl SlotStatus {
    pub fn has_user(self) -> bool {
        matches!(self, Self::NotReady | Self::Ready | Self::NoMap | Self::Playing | Self::Complete)
    }

    /// Bitmask matching the reference client's slot-status byte, used by
    /// match data serialization to decide which slots carry a user id.
    pub fn bits(self) -> u8 {
        match self {
            Self::Free => 1,
            Self::Locked => 2,
            Self::NotReady => 4,
            Self::Ready => 8,
            Self::NoMap => 16,
            Self::Playing => 32,
            Self::Complete => 64,
            Self::Quit => 128,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Team {
    Neutral,
    Blue,
    Red,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoringType {
    Score,
    Accuracy,
    Combo,
    ScoreV2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeamType {
    HeadToHead,
    TagCoop,
    TeamVs,
    TagTeamVs,
}

impl TeamType {
    /// These team modes force normal (match-wide) mod mode.
    pub fn forces_normal_mods(self) -> bool {
        matches!(self, Self::TagCoop | Self::TagTeamVs)
    }

    fn wire(self) -> u8 {
        match self {
            Self::HeadToHead => 0,
            Self::TagCoop => 1,
            Self::TeamVs => 2,
            Self::TagTeamVs => 3,
        }
    }
}

impl ScoringType {
    fn wire(self) -> u8 {
        match self {
            Self::Score => 0,
            Self::Accuracy => 1,
            Self::Combo => 2,
            Self::ScoreV2 => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModMode {
    Normal,
    Freemod,
}

#[derive(Debug, Clone, Default)]
pub struct Slot {
    pub status_free: bool,
    pub status: SlotStatusStorage,
    pub team: TeamStorage,
    pub user_token: Option<Uuid>,
    pub user_id: Option<i32>,
    pub mods: u32,
    pub loaded: bool,
    pub skipped: bool,
    pub completed: bool,
    pub failed: bool,
}

// Thin newtypes so `Slot` can derive `Default` while the enums above stay
// free of an arbitrary "first variant is default" meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotStatusStorage(pub SlotStatus);
impl Default for SlotStatusStorage {
    fn default() -> Self {
        Self(SlotStatus::Free)
    }
}
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TeamStorage(pub Team);
impl Default for TeamStorage {
    fn default() -> Self {
        Self(Team::Neutral)
    }
}

impl Slot {
    pub fn status(&self) -> SlotStatus {
        self.status.0
    }

    pub fn set_status(&mut self, status: SlotStatus) {
        self.status = SlotStatusStorage(status);
    }

    pub fn team(&self) -> Team {
        self.team.0
    }

    pub fn reset_gameplay_flags(&mut self) {
        self.loaded = false;
        self.skipped = false;
        self.completed = false;
        self.failed = false;
    }

    pub fn clear(&mut self) {
        self.set_status(SlotStatus::Free);
        self.team = TeamStorage::default();
        self.user_token = None;
        self.user_id = None;
        self.mods = 0;
        self.reset_gameplay_flags();
    }
}

pub struct Match {
    pub id: u32,
    pub name: String,
    /// MD5 form; empty means open.
    pub password: String,
    pub beatmap_id: i32,
    pub beatmap_name: String,
    pub beatmap_md5: String,
    pub game_mode: u8,
    pub host_user_id: Option<i32>,
    pub is_tourney: bool,
    pub is_locked: bool,
    pub is_starting: bool,
    pub scoring_type: ScoringType,
    pub team_type: TeamType,
    pub mod_mode: ModMode,
    pub global_mods: u32,
    pub creation_time: i64,
    pub slots: [Slot; SLOT_COUNT],
}

impl Match {
    pub fn new(id: u32, name: String, password: String, beatmap_id: i32, beatmap_name: String, beatmap_md5: String, game_mode: u8, host_user_id: i32, is_tourney: bool, now: i64) -> Self {
        Self {
            id,
            name,
            password,
            beatmap_id,
            beatmap_name,
            beatmap_md5,
            game_mode,
            host_user_id: Some(host_user_id),
            is_tourney,
            is_locked: false,
            is_starting: false,
            scoring_type: ScoringType::Score,
            team_type: TeamType::HeadToHead,
            mod_mode: ModMode::Normal,
            global_mods: 0,
            creation_time: now,
            slots: std::array::from_fn(|_| Slot::default()),
        }
    }

    pub fn stream_name(&self) -> String {
        format!("multi/{}", self.id)
    }

    pub fn playing_stream_name(&self) -> String {
        format!("multi/{}/playing", self.id)
    }

    pub fn channel_name(&self) -> String {
        format!("#multi_{}", self.id)
    }

    pub fn is_empty(&self) -> bool {
        !self.slots.iter().any(|s| s.user_id.is_some())
    }

    /// Serializes the full match-data payload shared by `new-match`,
    /// `update-match`, `match-start` and `match-join-success`. When
    /// `censor_password` is set, the password field carries `"yes"`/`"no"`
    /// rather than the real value.
    pub fn serialize(&self, censor_password: bool) -> Vec<u8> {
        let mut w = Writer::new();
        w.u16(self.id as u16);
        w.byte(self.is_starting as u8);
        w.byte(0); // match type: always "normal" here (powerplay mode is out of scope)
        w.u32(self.global_mods);
        w.string(&self.name);
        if censor_password {
            w.string(if self.password.is_empty() { "no" } else { "yes" });
        } else {
            w.string(&self.password);
        }
        w.string(&self.beatmap_name);
        w.i32(self.beatmap_id);
        w.string(&self.beatmap_md5);
        for slot in &self.slots {
            w.byte(slot.status().bits());
        }
        for slot in &self.slots {
            w.byte(match slot.team() {
                Team::Neutral => 0,
                Team::Blue => 1,
                Team::Red => 2,
            });
        }
        for slot in &self.slots {
            if let Some(user_id) = slot.user_id {
                w.i32(user_id);
            }
        }
        w.i32(self.host_user_id.unwrap_or(-1));
        w.byte(self.game_mode);
        w.byte(self.scoring_type.wire());
        w.byte(self.team_type.wire());
        let freemod = self.mod_mode == ModMode::Freemod;
        w.byte(freemod as u8);
        if freemod {
            for slot in &self.slots {
                w.u32(slot.mods);
            }
        }
        w.i32(0); // seed: mania random-mod seeding is out of scope
        w.into_bytes()
    }

    pub fn occupied_slots(&self) -> impl Iterator<Item = &Slot> {
        self.slots.iter().filter(|s| s.user_id.is_some())
    }

    pub fn all_ready(&self) -> bool {
        self.occupied_slots().all(|s| s.status() == SlotStatus::Ready)
    }

    /// Join: verifies password, picks the lowest free slot index, sets
    /// `not-ready`, clears per-slot flags. Returns the slot index used.
    pub fn join(&mut self, user_id: i32, token: Uuid, password: &str) -> Result<usize, BanchoError> {
        if !self.password.is_empty() && self.password != password {
            return Err(BanchoError::InvalidArguments);
        }
        let index = self
            .slots
            .iter()
            .position(|s| s.status() == SlotStatus::Free)
            .ok_or(BanchoError::InvalidArguments)?;
        let slot = &mut self.slots[index];
        slot.user_id = Some(user_id);
        slot.user_token = Some(token);
        slot.set_status(SlotStatus::NotReady);
        slot.reset_gameplay_flags();
        slot.mods = 0;
        Ok(index)
    }

    /// Leave: frees the slot. If the host left and players remain,
    /// transfers host to the lowest-index occupied slot. Returns
    /// `Some(new_host_user_id)` when a host transfer happened.
    pub fn leave(&mut self, user_id: i32) -> Option<i32> {
        let was_host = self.host_user_id == Some(user_id);
        if let Some(slot) = self.slots.iter_mut().find(|s| s.user_id == Some(user_id)) {
            slot.clear();
        }
        if was_host {
            if let Some(new_host) = self.occupied_slots().next().and_then(|s| s.user_id) {
                self.host_user_id = Some(new_host);
                return Some(new_host);
            }
            self.host_user_id = None;
        }
        None
    }

    pub fn slot_move(&mut self, from: usize, to: usize) -> Result<(), BanchoError> {
        if to >= SLOT_COUNT || self.slots[to].status() != SlotStatus::Free {
            return Err(BanchoError::InvalidArguments);
        }
        self.slots.swap(from, to);
        Ok(())
    }

    /// Toggles free/locked; forcibly clears an occupied slot first.
    pub fn toggle_lock(&mut self, index: usize) {
        let slot = &mut self.slots[index];
        if slot.user_id.is_some() {
            slot.clear();
        }
        let next = if slot.status() == SlotStatus::Locked { SlotStatus::Free } else { SlotStatus::Locked };
        slot.set_status(next);
    }

    /// Flips ready/not-ready only; invalid from `no-map`.
    pub fn toggle_ready(&mut self, user_id: i32) -> Result<(), BanchoError> {
        let slot = self.slots.iter_mut().find(|s| s.user_id == Some(user_id)).ok_or(BanchoError::InvalidUser)?;
        slot.set_status(match slot.status() {
            SlotStatus::Ready => SlotStatus::NotReady,
            SlotStatus::NotReady => SlotStatus::Ready,
            _ => return Err(BanchoError::InvalidArguments),
        });
        Ok(())
    }

    /// Sets beatmap fields and resets every occupied slot to `not-ready`.
    /// Slots flagged `missing_map` go to `no-map` instead (the client
    /// reports map possession with a subsequent status packet).
    pub fn change_beatmap(&mut self, beatmap_id: i32, beatmap_name: String, beatmap_md5: String, game_mode: u8) {
        self.beatmap_id = beatmap_id;
        self.beatmap_name = beatmap_name;
        self.beatmap_md5 = beatmap_md5;
        self.game_mode = game_mode;
        for slot in self.slots.iter_mut().filter(|s| s.user_id.is_some()) {
            slot.set_status(SlotStatus::NotReady);
        }
    }

    pub fn mark_no_map(&mut self, user_id: i32) {
        if let Some(slot) = self.slots.iter_mut().find(|s| s.user_id == Some(user_id)) {
            slot.set_status(SlotStatus::NoMap);
        }
    }

    /// Switches between freemod/normal mod mode, resetting per-slot mods;
    /// refuses to switch to freemod under a team type that forces normal.
    pub fn set_mod_mode(&mut self, freemod: bool) {
        if freemod && self.team_type.forces_normal_mods() {
            self.mod_mode = ModMode::Normal;
        } else {
            self.mod_mode = if freemod { ModMode::Freemod } else { ModMode::Normal };
        }
        for slot in &mut self.slots {
            slot.mods = 0;
        }
        self.global_mods = 0;
    }

    pub fn set_team_type(&mut self, team_type: TeamType) {
        self.team_type = team_type;
        if team_type.forces_normal_mods() {
            self.set_mod_mode(false);
        }
    }

    /// Starts the match. Refuses unless every occupied slot is ready,
    /// unless `force` is set (which flips not-ready slots to ready first).
    /// Marks ready slots `playing` and returns their user ids.
    pub fn start(&mut self, force: bool) -> Result<Vec<i32>, BanchoError> {
        if force {
            for slot in self.slots.iter_mut().filter(|s| s.status() == SlotStatus::NotReady) {
                slot.set_status(SlotStatus::Ready);
            }
        } else if !self.all_ready() {
            return Err(BanchoError::InvalidArguments);
        }
        let mut started = Vec::new();
        for slot in self.slots.iter_mut().filter(|s| s.status() == SlotStatus::Ready) {
            slot.set_status(SlotStatus::Playing);
            if let Some(uid) = slot.user_id {
                started.push(uid);
            }
        }
        Ok(started)
    }

    pub fn mark_loaded(&mut self, user_id: i32) {
        self.set_flag(user_id, |s| s.loaded = true);
    }

    pub fn mark_skipped(&mut self, user_id: i32) {
        self.set_flag(user_id, |s| s.skipped = true);
    }

    pub fn mark_failed(&mut self, user_id: i32) {
        self.set_flag(user_id, |s| s.failed = true);
    }

    pub fn mark_completed(&mut self, user_id: i32) {
        self.set_flag(user_id, |s| s.completed = true);
    }

    fn set_flag(&mut self, user_id: i32, f: impl FnOnce(&mut Slot)) {
        if let Some(slot) = self.slots.iter_mut().find(|s| s.user_id == Some(user_id)) {
            f(slot);
        }
    }

    fn playing_slots(&self) -> impl Iterator<Item = &Slot> {
        self.slots.iter().filter(|s| s.status() == SlotStatus::Playing)
    }

    pub fn all_loaded(&self) -> bool {
        let mut any = false;
        for s in self.playing_slots() {
            any = true;
            if !s.loaded {
                return false;
            }
        }
        any
    }

    pub fn all_skipped(&self) -> bool {
        let mut any = false;
        for s in self.playing_slots() {
            any = true;
            if !s.skipped {
                return false;
            }
        }
        any
    }

    /// True once every playing slot is `complete` or `quit`; callers end
    /// the match and demote `playing` slots back to `not-ready`.
    pub fn all_finished(&self) -> bool {
        let mut any = false;
        for s in &self.slots {
            if s.status() == SlotStatus::Playing {
                any = true;
                if !(s.completed) {
                    return false;
                }
            }
        }
        any
    }

    /// Ends the game: demotes `playing` slots back to `not-ready` and
    /// clears gameplay flags. Used by both complete and abort.
    pub fn end_game(&mut self) {
        for slot in self.slots.iter_mut().filter(|s| s.status() == SlotStatus::Playing) {
            slot.set_status(SlotStatus::NotReady);
            slot.reset_gameplay_flags();
        }
    }
}

pub struct MatchRegistry {
    matches: DashMap<u32, Mutex<Match>>,
    next_id: AtomicU32,
}

impl Default for MatchRegistry {
    fn default() -> Self {
        Self { matches: DashMap::new(), next_id: AtomicU32::new(1) }
    }
}

impl MatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, name: String, password: String, beatmap_id: i32, beatmap_name: String, beatmap_md5: String, game_mode: u8, host_user_id: i32, is_tourney: bool, now: i64) -> u32 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.matches.insert(id, Mutex::new(Match::new(id, name, password, beatmap_id, beatmap_name, beatmap_md5, game_mode, host_user_id, is_tourney, now)));
        id
    }

    pub fn with_match<R>(&self, id: u32, f: impl FnOnce(&mut Match) -> R) -> Result<R, BanchoError> {
        let entry = self.matches.get(&id).ok_or(BanchoError::MatchNotFound(id))?;
        Ok(f(&mut entry.lock()))
    }

    pub fn exists(&self, id: u32) -> bool {
        self.matches.contains_key(&id)
    }

    pub fn remove(&self, id: u32) -> bool {
        self.matches.remove(&id).is_some()
    }

    /// Ids of every match with no occupied slot whose age exceeds
    /// `threshold_secs`.
    pub fn empty_matches_older_than(&self, now: i64, threshold_secs: i64) -> Vec<u32> {
        self.matches
            .iter()
            .filter_map(|entry| {
                let m = entry.value().lock();
                (m.is_empty() && now - m.creation_time >= threshold_secs).then_some(*entry.key())
            })
            .collect()
    }

    pub fn all_ids(&self) -> Vec<u32> {
        self.matches.iter().map(|e| *e.key()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> Match {
        Match::new(1, "Room".into(), String::new(), 0, String::new(), String::new(), 0, 10, false, 0)
    }

    #[test]
    fn join_picks_lowest_free_slot() {
        let mut m = fresh();
        let t1 = Uuid::new_v4();
        let idx = m.join(10, t1, "").unwrap();
        assert_eq!(idx, 0);
        assert_eq!(m.slots[0].status(), SlotStatus::NotReady);
    }

    #[test]
    fn join_rejects_wrong_password() {
        let mut m = fresh();
        m.password = "abc".into();
        assert!(m.join(10, Uuid::new_v4(), "wrong").is_err());
    }

    #[test]
    fn leave_transfers_host_to_lowest_index() {
        let mut m = fresh();
        let host_token = Uuid::new_v4();
        m.join(10, host_token, "").unwrap();
        m.join(20, Uuid::new_v4(), "").unwrap();
        let transferred = m.leave(10);
        assert_eq!(transferred, Some(20));
        assert_eq!(m.host_user_id, Some(20));
    }

    #[test]
    fn start_refuses_unless_all_ready_without_force() {
        let mut m = fresh();
        m.join(10, Uuid::new_v4(), "").unwrap();
        m.join(20, Uuid::new_v4(), "").unwrap();
        m.slots[0].set_status(SlotStatus::Ready);
        assert!(m.start(false).is_err());
        let started = m.start(true).unwrap();
        assert_eq!(started.len(), 2);
        assert!(m.slots[0..2].iter().all(|s| s.status() == SlotStatus::Playing));
    }

    #[test]
    fn slot_count_invariant_always_sixteen() {
        let m = fresh();
        assert_eq!(m.slots.len(), SLOT_COUNT);
    }

    #[test]
    fn serialize_censors_password_as_yes_no() {
        let mut m = fresh();
        m.password = "secret".into();
        let censored = m.serialize(true);
        let open = {
            let mut m2 = fresh();
            m2.password.clear();
            m2.serialize(true)
        };
        assert_ne!(censored, open);
        assert!(!m.serialize(false).is_empty());
    }

    #[test]
    fn cleanup_finds_only_old_empty_matches() {
        let registry = MatchRegistry::new();
        let id = registry.create("R".into(), String::new(), 0, String::new(), String::new(), 0, 1, false, 0);
        registry.with_match(id, |m| m.join(1, Uuid::new_v4(), "")).unwrap().unwrap();
        registry.with_match(id, |m| m.leave(1)).unwrap();
        assert_eq!(registry.empty_matches_older_than(119, 120), Vec::<u32>::new());
        assert_eq!(registry.empty_matches_older_than(121, 120), vec![id]);
    }
}
