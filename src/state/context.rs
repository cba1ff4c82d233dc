//! Central server context: the single dependency-injection container every
//! handler, the chat router, the bot and the periodic loops are given a
//! reference to, replacing the scattered global singletons the original
//! implementation relied on.
//!
//! # Lock ordering
//!
//! Registries are independent top-level locks; a single operation never
//! needs to hold two of `sessions`, `streams`, `channels`, `matches` at
//! once except transiently while one passes the other as a parameter (see
//! [`super::channel::ChannelRegistry::remove`]). Where two *sessions*
//! interact directly (deleting a pre-existing session of the same user,
//! spectator host/guest pairs), always lock the lower user id first to
//! make two-session operations consistently ordered across callers.

use std::sync::Arc;

use crate::config::Config;
use crate::security::{LoginRateLimiter, PasswordCache};
use crate::store::{GeoLookup, PpOracle, UserStore};

use super::channel::ChannelRegistry;
use super::match_state::MatchRegistry;
use super::session::SessionRegistry;
use super::stream::StreamRegistry;

pub struct ServerContext {
    pub config: Config,
    pub sessions: SessionRegistry,
    pub streams: StreamRegistry,
    pub channels: ChannelRegistry,
    pub matches: MatchRegistry,
    pub store: Arc<dyn UserStore>,
    pub geo: Arc<dyn GeoLookup>,
    pub pp_oracle: Arc<dyn PpOracle>,
    pub password_cache: Arc<PasswordCache>,
    pub login_rate_limiter: LoginRateLimiter,
    /// Flipped by the `peppy:reload_settings` pub/sub topic and read by
    /// [`ServerContext::is_maintenance`]; checked on every login attempt.
    pub restarting: std::sync::atomic::AtomicBool,
}

impl ServerContext {
    pub fn new(config: Config, store: Arc<dyn UserStore>, geo: Arc<dyn GeoLookup>, pp_oracle: Arc<dyn PpOracle>) -> Arc<Self> {
        let streams = StreamRegistry::new();
        // `main` carries presence/stats broadcasts to every connected user;
        // `lobby` carries match-list updates to clients browsing multiplayer.
        streams.add("main");
        streams.add("lobby");
        let login_rate_limiter = LoginRateLimiter::new(&config.security);
        Arc::new(Self {
            config,
            sessions: SessionRegistry::new(),
            streams,
            channels: ChannelRegistry::new(),
            matches: MatchRegistry::new(),
            store,
            geo,
            pp_oracle,
            password_cache: Arc::new(PasswordCache::new()),
            login_rate_limiter,
            restarting: std::sync::atomic::AtomicBool::new(false),
        })
    }

    /// Loads channels from the store and binds each to a freshly created
    /// stream. Called once at boot.
    pub async fn load_channels(&self) -> Result<(), crate::store::StoreError> {
        for record in self.store.load_channels().await? {
            self.channels.add(&self.streams, &record.name, &record.description, record.public_read, record.public_write, false, false);
        }
        Ok(())
    }

    pub async fn is_maintenance(&self) -> bool {
        if self.config.bancho.maintenance {
            return true;
        }
        matches!(self.store.get_setting("maintenance").await, Ok(Some(v)) if v == "1")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{NoopGeoLookup, NoopPpOracle, SqliteUserStore};

    #[tokio::test]
    async fn load_channels_binds_streams() {
        let store = Arc::new(SqliteUserStore::connect(":memory:", 1).await.unwrap());
        store.set_setting("_probe", "1").await.unwrap();
        let ctx = ServerContext::new(Config::default(), store, Arc::new(NoopGeoLookup), Arc::new(NoopPpOracle));
        ctx.load_channels().await.unwrap();
        assert!(!ctx.channels.exists("#nonexistent"));
    }
}
