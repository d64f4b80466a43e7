//! Configuration validation

use super::config::AppConfig;
use anyhow::{bail, Result};
use tracing::warn;

/// Reject settings the executor cannot work with and warn about risky ones
pub fn validate_config(config: &AppConfig) -> Result<()> {
    if config.exec.timeout_secs == 0 {
        bail!("exec.timeout_secs must be greater than zero");
    }
    if config.exec.chunk_size == 0 {
        bail!("exec.chunk_size must be greater than zero");
    }
    if config.session.queue_depth == 0 {
        bail!("session.queue_depth must be greater than zero");
    }
    if config.session.max_send_failures == 0 {
        bail!("session.max_send_failures must be greater than zero");
    }

    let is_production = std::env::var("WEBSHELL_ENV")
        .map(|v| v.to_lowercase() == "production")
        .unwrap_or(false);
    if is_production && config.server.host == "0.0.0.0" {
        warn!(
            "SECURITY WARNING: Remote shell is binding to all interfaces (0.0.0.0) in production. \
             Anyone who can reach the port can run commands."
        );
    }

    Ok(())
}
