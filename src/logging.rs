//! Tracing subscriber setup for the `aclrag` binary.
//!
//! Logs go to stderr so command output on stdout stays pipeable. The
//! `ACLRAG_LOG` environment variable takes precedence over the configured
//! level; audit decisions are on the `acl_rag::audit` target, so
//! `ACLRAG_LOG=acl_rag::audit=info,warn` shows only those.

use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "ACLRAG_LOG";

pub fn build_filter(default_level: &str) -> Result<EnvFilter> {
    match EnvFilter::try_from_env(LOG_ENV) {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(default_level)
            .map_err(|e| anyhow!("Invalid log level '{}': {}", default_level, e)),
    }
}

pub fn init_logging(default_level: &str, json: bool) -> Result<()> {
    let filter = build_filter(default_level)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    let result = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|e| anyhow!("Failed to install tracing subscriber: {}", e))
}
