//! Default value functions for configuration, separated for clarity and reuse.

pub fn default_true() -> bool {
    true
}

pub fn default_listen_addr() -> String {
    "0.0.0.0:5001".to_string()
}

pub fn default_worker_threads() -> usize {
    4
}

pub fn default_store_path() -> String {
    "bancho.db".to_string()
}

pub fn default_store_pool_size() -> u32 {
    5
}

pub fn default_redis_url() -> String {
    "redis://127.0.0.1:6379/0".to_string()
}

pub fn default_redis_key_prefix() -> String {
    "peppy".to_string()
}

pub fn default_compression_level() -> u8 {
    0
}

pub fn default_bot_name() -> String {
    "BanchoBot".to_string()
}

pub fn default_bot_user_id() -> i32 {
    999
}

pub fn default_welcome_channels() -> Vec<String> {
    vec!["#osu".to_string(), "#announce".to_string()]
}

pub fn default_admin_channel() -> String {
    "#admin".to_string()
}

pub fn default_minimum_client_year() -> u16 {
    2022
}

pub fn default_timeout_sweep_secs() -> u64 {
    100
}

pub fn default_spam_reset_secs() -> u64 {
    10
}

pub fn default_match_cleanup_secs() -> u64 {
    30
}

pub fn default_match_cleanup_threshold_secs() -> i64 {
    120
}
