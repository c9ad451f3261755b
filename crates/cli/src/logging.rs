//! Tracing subscriber setup.

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

/// Environment variable consulted when no `--log-level` is given.
pub const LOG_ENV: &str = "SHOPFLOOR_LOG";

/// Install the global subscriber. Logs go to stderr so stdout stays JSON.
///
/// Precedence: explicit level, then `SHOPFLOOR_LOG`, then `info`.
pub fn init(level: Option<&str>) -> Result<()> {
    let filter = match level {
        Some(level) => EnvFilter::try_new(level).with_context(|| format!("invalid log level '{}'", level))?,
        None => EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info")),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}
