//! Configuration validation: run once at boot, after defaults are merged.

use super::Config;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("listen.addr does not parse as a socket address: {0}")]
    InvalidListenAddr(String),
    #[error("listen.worker_threads must be at least 1")]
    ZeroWorkerThreads,
    #[error("store.pool_size must be at least 1")]
    ZeroPoolSize,
    #[error("redis.url must start with redis:// or rediss://")]
    InvalidRedisUrl,
    #[error("bancho.admin_channel must start with '#'")]
    AdminChannelMissingHash,
    #[error("bancho.welcome_channels entries must all start with '#', got '{0}'")]
    WelcomeChannelMissingHash(String),
    #[error("bancho.bot_user_id must be positive")]
    NonPositiveBotUserId,
    #[error("webhook.rank_announcement_url must be http(s) if set")]
    InvalidWebhookUrl,
}

/// Validate a merged configuration, collecting every violation rather than
/// stopping at the first one, so an operator sees the whole review list at
/// once (matching the "process refuses to continue until the file is
/// reviewed" requirement).
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listen.addr.parse::<std::net::SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidListenAddr(config.listen.addr.clone()));
    }
    if config.listen.worker_threads == 0 {
        errors.push(ValidationError::ZeroWorkerThreads);
    }
    if config.store.pool_size == 0 {
        errors.push(ValidationError::ZeroPoolSize);
    }
    if !(config.redis.url.starts_with("redis://") || config.redis.url.starts_with("rediss://")) {
        errors.push(ValidationError::InvalidRedisUrl);
    }
    if !config.bancho.admin_channel.starts_with('#') {
        errors.push(ValidationError::AdminChannelMissingHash);
    }
    for channel in &config.bancho.welcome_channels {
        if !channel.starts_with('#') {
            errors.push(ValidationError::WelcomeChannelMissingHash(channel.clone()));
        }
    }
    if config.bancho.bot_user_id <= 0 {
        errors.push(ValidationError::NonPositiveBotUserId);
    }
    if let Some(url) = &config.webhook.rank_announcement_url {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            errors.push(ValidationError::InvalidWebhookUrl);
        }
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn rejects_channel_names_missing_hash() {
        let mut config = Config::default();
        config.bancho.welcome_channels = vec!["osu".to_string()];
        let errors = validate(&config).unwrap_err();
        assert!(matches!(errors[0], ValidationError::WelcomeChannelMissingHash(_)));
    }
}
