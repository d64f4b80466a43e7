//! Configuration loading
//!
//! Handles loading configuration from embedded defaults, files, and environment.

use super::config::AppConfig;
use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat, Map};
use std::path::Path;

/// Embedded default configuration (compiled into binary)
pub const DEFAULT_CONFIG: &str = include_str!("../../config/default.toml");

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "WEBSHELL";

/// Load configuration from `config/` and the process environment
pub fn load_config() -> Result<AppConfig> {
    load_config_from(Path::new("config"), None)
}

/// Load configuration from `dir`. `env` replaces the process environment when set.
pub fn load_config_from(dir: &Path, env: Option<Map<String, String>>) -> Result<AppConfig> {
    let profile = std::env::var("WEBSHELL_ENV").unwrap_or_else(|_| "development".to_string());
    let layer = |name: &str| File::with_name(&dir.join(name).to_string_lossy()).required(false);

    let config = Config::builder()
        // 1. Embedded defaults (always available)
        .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
        // 2. External overrides (optional)
        .add_source(layer("default"))
        .add_source(layer(&profile))
        .add_source(layer("local"))
        // 3. Environment variables (highest priority)
        // prefix_separator("_") keeps WEBSHELL_EXEC__TIMEOUT_SECS working with config-rs 0.14
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .source(env),
        )
        .build()
        .context("Failed to build configuration")?;

    config
        .try_deserialize()
        .context("Failed to deserialize configuration")
}
