//! Tracing setup for the leasehold CLI
//!
//! Usage:
//!   leasehold --debug serve             # Debug logging to stderr
//!   leasehold --log-json serve          # One JSON object per event
//!   RUST_LOG=leasehold_server=debug leasehold serve
//!
//! Logs go to stderr so command output on stdout stays machine-readable.

use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

/// Tracing configuration options
#[derive(Debug, Clone, Default)]
pub struct TracingConfig {
    /// Default to debug level unless RUST_LOG is set
    pub debug: bool,
    /// Emit JSON instead of the compact console format
    pub json: bool,
}

pub fn init(config: &TracingConfig) -> Result<()> {
    let default_level = if config.debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.debug)
        .with_writer(std::io::stderr);

    if config.json {
        builder.json().try_init()
    } else {
        builder.compact().try_init()
    }
    .map_err(|err| anyhow!(err))
}
