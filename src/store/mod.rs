//! Persistent store: the small set of tables the core reads and writes
//! directly (user record, silence, privileges, password, country, channel
//! list, chat logs, ban/match logs). The user/score/beatmap database proper
//! is external; this module only touches what SPEC_FULL.md's persistent
//! store section names.

mod models;
mod pluggable;
mod sqlite;

pub use models::{ChannelRecord, UserRecord};
pub use pluggable::{GeoLookup, GeoResult, NoopGeoLookup, NoopPpOracle, PpOracle};
pub use sqlite::SqliteUserStore;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("user not found")]
    UserNotFound,
}

/// The persistence boundary the login pipeline, chat router, and bot
/// command table talk to. Mockable for tests; backed by SQLite in
/// production via [`SqliteUserStore`].
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn fetch_by_username_safe(&self, username_safe: &str) -> Result<Option<UserRecord>, StoreError>;
    async fn fetch_by_id(&self, user_id: i32) -> Result<Option<UserRecord>, StoreError>;

    async fn update_password_md5(&self, user_id: i32, password_md5: &str) -> Result<(), StoreError>;
    async fn set_privileges(&self, user_id: i32, privileges: i64) -> Result<(), StoreError>;
    async fn set_silence_end(&self, user_id: i32, silence_end: i64) -> Result<(), StoreError>;
    async fn set_frozen(&self, user_id: i32, frozen: bool, freezedate: i64) -> Result<(), StoreError>;
    async fn set_country(&self, user_id: i32, country: &str) -> Result<(), StoreError>;
    async fn set_osuver(&self, user_id: i32, osuver: &str) -> Result<(), StoreError>;

    async fn load_channels(&self) -> Result<Vec<ChannelRecord>, StoreError>;

    async fn get_setting(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn set_setting(&self, key: &str, value: &str) -> Result<(), StoreError>;

    async fn log_private_message(&self, time: i64, from_id: i32, to_id: i32, message: &str) -> Result<(), StoreError>;
    async fn log_channel_message(&self, time: i64, from_id: i32, channel: &str, message: &str) -> Result<(), StoreError>;
    async fn log_ban(&self, time: i64, from_id: i32, to_id: i32, summary: &str, detail: &str) -> Result<(), StoreError>;
    async fn file_report(&self, time: i64, from_id: i32, to_id: i32, reason: &str, chatlog: &str) -> Result<(), StoreError>;
}
