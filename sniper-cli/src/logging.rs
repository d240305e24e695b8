//! Structured logging setup for the CLI.
//!
//! Logs go to stderr so reports on stdout stay pipeable. `RUST_LOG` wins over
//! `--log-level` when set.

use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

/// Install the global subscriber. Call once, before any command runs.
pub fn init(level: &str, json: bool) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level.to_ascii_lowercase())?,
    }
    // HTTP client internals are noisy at debug.
    .add_directive("hyper=warn".parse()?)
    .add_directive("reqwest=warn".parse()?);

    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_env_filter(filter);

    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| anyhow!("install log subscriber: {e}"))?;

    tracing::debug!(log_level = %level, json, "logging initialized");
    Ok(())
}
