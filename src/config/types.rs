//! Configuration type definitions: the full `Config` struct tree.

use serde::{Deserialize, Serialize};

use super::defaults::*;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub listen: ListenConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub bancho: BanchoConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
    #[serde(default)]
    pub security: SecurityConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: ListenConfig::default(),
            store: StoreConfig::default(),
            redis: RedisConfig::default(),
            bancho: BanchoConfig::default(),
            webhook: WebhookConfig::default(),
            security: SecurityConfig::default(),
        }
    }
}

/// HTTP front listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenConfig {
    #[serde(default = "default_listen_addr")]
    pub addr: String,
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            addr: default_listen_addr(),
            worker_threads: default_worker_threads(),
        }
    }
}

/// User-store (persistent DB) connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: String,
    #[serde(default = "default_store_pool_size")]
    pub pool_size: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            pool_size: default_store_pool_size(),
        }
    }
}

/// Pub/sub bus connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    #[serde(default = "default_redis_url")]
    pub url: String,
    #[serde(default = "default_redis_key_prefix")]
    pub key_prefix: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            key_prefix: default_redis_key_prefix(),
        }
    }
}

/// Core bancho runtime behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BanchoConfig {
    /// Reserved - see SPEC_FULL.md's Non-goal note on transport
    /// compression; accepted for forward compatibility with the legacy
    /// config format but not acted on by this core.
    #[serde(default = "default_compression_level")]
    pub compression_level: u8,
    #[serde(default = "default_bot_name")]
    pub bot_name: String,
    #[serde(default = "default_bot_user_id")]
    pub bot_user_id: i32,
    #[serde(default = "default_welcome_channels")]
    pub welcome_channels: Vec<String>,
    #[serde(default = "default_admin_channel")]
    pub admin_channel: String,
    #[serde(default)]
    pub maintenance: bool,
    #[serde(default)]
    pub menu_icon: Option<String>,
    #[serde(default = "default_minimum_client_year")]
    pub minimum_client_year: u16,
    #[serde(default)]
    pub rejected_client_builds: Vec<String>,
    #[serde(default = "default_timeout_sweep_secs")]
    pub timeout_sweep_secs: u64,
    #[serde(default = "default_spam_reset_secs")]
    pub spam_reset_secs: u64,
    #[serde(default = "default_match_cleanup_secs")]
    pub match_cleanup_secs: u64,
    #[serde(default = "default_match_cleanup_threshold_secs")]
    pub match_cleanup_threshold_secs: i64,
}

impl Default for BanchoConfig {
    fn default() -> Self {
        Self {
            compression_level: default_compression_level(),
            bot_name: default_bot_name(),
            bot_user_id: default_bot_user_id(),
            welcome_channels: default_welcome_channels(),
            admin_channel: default_admin_channel(),
            maintenance: false,
            menu_icon: None,
            minimum_client_year: default_minimum_client_year(),
            rejected_client_builds: Vec::new(),
            timeout_sweep_secs: default_timeout_sweep_secs(),
            spam_reset_secs: default_spam_reset_secs(),
            match_cleanup_secs: default_match_cleanup_secs(),
            match_cleanup_threshold_secs: default_match_cleanup_threshold_secs(),
        }
    }
}

/// Rank-announcement webhook. The core never POSTs to it directly (that is
/// an out-of-scope admin/webhook feature); it is validated and exposed for
/// a pluggable sink to consume.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    pub rank_announcement_url: Option<String>,
}

/// Security-adjacent knobs that stay inside the core (login rate limiting,
/// the CI-trigger key used by the HTTP admin surface).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    #[serde(default)]
    pub ci_trigger_key: Option<String>,
    #[serde(default = "default_login_rate_per_minute")]
    pub login_rate_per_minute: u32,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            ci_trigger_key: None,
            login_rate_per_minute: default_login_rate_per_minute(),
        }
    }
}

fn default_login_rate_per_minute() -> u32 {
    30
}
