//! Pluggable boundaries for the two collaborators SPEC_FULL.md names as
//! external but which the login/match code still needs an interface to:
//! the PP-calculation oracle and a geo-IP lookup. Both are Non-goals to
//! *implement*; these traits exist so the core compiles and runs sensibly
//! against inert defaults until a real implementation is wired in.

use async_trait::async_trait;

#[derive(Debug, Clone, Copy, Default)]
pub struct GeoResult {
    pub country: u8,
    pub latitude: f32,
    pub longitude: f32,
}

#[async_trait]
pub trait GeoLookup: Send + Sync {
    async fn lookup(&self, ip: &str) -> GeoResult;
}

/// Always reports the "unknown" country code with null coordinates.
pub struct NoopGeoLookup;

#[async_trait]
impl GeoLookup for NoopGeoLookup {
    async fn lookup(&self, _ip: &str) -> GeoResult {
        GeoResult::default()
    }
}

#[async_trait]
pub trait PpOracle: Send + Sync {
    /// Returns a cached pp value for a user in a given game mode, or `None`
    /// if the oracle has nothing cached. The core never computes pp itself.
    async fn cached_pp(&self, user_id: i32, game_mode: u8) -> Option<u16>;
}

pub struct NoopPpOracle;

#[async_trait]
impl PpOracle for NoopPpOracle {
    async fn cached_pp(&self, _user_id: i32, _game_mode: u8) -> Option<u16> {
        None
    }
}
