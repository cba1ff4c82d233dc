//! Configuration loading and management.
//!
//! Split into submodules:
//! - [`types`]: the `Config` struct tree.
//! - [`defaults`]: `#[serde(default = "fn")]` targets.
//! - [`validation`]: cross-field checks run once at boot.

mod defaults;
mod types;
mod validation;

pub use types::{BanchoConfig, Config, ListenConfig, RedisConfig, SecurityConfig, StoreConfig, WebhookConfig};
pub use validation::{validate, ValidationError};

use std::path::Path;

/// Load configuration from `path`, materializing missing keys with
/// defaults, then validate the merged result. Missing keys are not an
/// error by themselves — an invalid merged configuration is.
pub async fn load(path: &Path) -> anyhow::Result<Config> {
    let config = if path.exists() {
        let raw = tokio::fs::read_to_string(path).await?;
        toml::from_str(&raw)?
    } else {
        tracing::warn!(path = %path.display(), "config file not found, writing defaults");
        let config = Config::default();
        let rendered = toml::to_string_pretty(&config)?;
        tokio::fs::write(path, rendered).await?;
        config
    };

    if let Err(errors) = validate(&config) {
        for error in &errors {
            tracing::error!(error = %error, "configuration review required");
        }
        anyhow::bail!("{} configuration error(s); fix {} and restart", errors.len(), path.display());
    }

    Ok(config)
}
