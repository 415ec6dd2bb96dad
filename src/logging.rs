// src/logging.rs

//! Logging setup using `tracing` + `tracing-subscriber`.
//!
//! The filter comes from, in order:
//! 1. the `--log-level` CLI flag;
//! 2. `LAUNCHKIT_LOG`, which accepts full `EnvFilter` directives such as
//!    `info,launchkit::registry=debug`;
//! 3. `info`.
//!
//! Everything goes to stderr; stdout is reserved for command output
//! (`launchkit list --json`, `launchkit output`).

use anyhow::Result;
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::LogLevel;

/// Environment variable holding the filter directives.
pub const LOG_ENV_VAR: &str = "LAUNCHKIT_LOG";

/// Install the global subscriber for the `launchkit` binary.
///
/// Call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let filter = match cli_level {
        Some(level) => EnvFilter::new(directive_for(level)),
        None => filter_from_env("info"),
    };

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow::anyhow!("failed to initialise logging: {err}"))
}

/// Subscriber for the `launchkit-mid` intermediary.
///
/// Its stderr is inherited from the launcher, so it stays quiet unless
/// `LAUNCHKIT_LOG` asks for more.
pub fn init_intermediary_logging() -> Result<()> {
    fmt()
        .with_env_filter(filter_from_env("warn"))
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow::anyhow!("failed to initialise logging: {err}"))
}

fn filter_from_env(default: &str) -> EnvFilter {
    match std::env::var(LOG_ENV_VAR) {
        Ok(value) if !value.trim().is_empty() => parse_directives(&value)
            .unwrap_or_else(|| EnvFilter::new(default)),
        _ => EnvFilter::new(default),
    }
}

fn parse_directives(value: &str) -> Option<EnvFilter> {
    let value = value.trim().to_lowercase();
    // `warning` is an alias of `warn`.
    let value = if value == "warning" { "warn".to_string() } else { value };
    EnvFilter::try_new(value).ok()
}

fn directive_for(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    }
}
