//! Tracing setup for the `strata` binary.
//!
//! # Environment Variables
//!
//! - `STRATA_LOG=<directives>` - `EnvFilter` directives, e.g. `strata_migrate=debug`
//! - `STRATA_DEBUG=1|true|yes` - Debug logging for all strata crates
//! - `STRATA_LOG_FORMAT=json|pretty|compact` - Output format (default: compact)
//!
//! Logs go to stderr so they never interleave with command output on stdout.

use std::env;
use std::sync::Once;

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

static INIT: Once = Once::new();

/// Crates whose events are shown.
const TARGETS: &[&str] = &["strata", "strata_cli", "strata_migrate", "strata_postgres"];

/// Check if debug logging is enabled via `STRATA_DEBUG`.
pub fn is_debug_enabled() -> bool {
    env::var("STRATA_DEBUG")
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false)
}

/// Level used when `STRATA_LOG` is not set.
pub fn default_level() -> &'static str {
    if is_debug_enabled() { "debug" } else { "warn" }
}

/// Output format from `STRATA_LOG_FORMAT`.
pub fn log_format() -> &'static str {
    env::var("STRATA_LOG_FORMAT")
        .map(|f| match f.to_lowercase().as_str() {
            "json" => "json",
            "pretty" => "pretty",
            _ => "compact",
        })
        .unwrap_or("compact")
}

/// Filter directives for `level` across the strata crates.
pub fn directives(level: &str) -> String {
    TARGETS
        .iter()
        .map(|target| format!("{}={}", target, level))
        .collect::<Vec<_>>()
        .join(",")
}

fn filter() -> EnvFilter {
    env::var("STRATA_LOG")
        .ok()
        .and_then(|spec| EnvFilter::try_new(spec).ok())
        .unwrap_or_else(|| EnvFilter::new(directives(default_level())))
}

/// Install the global subscriber. Subsequent calls are no-ops.
pub fn init() {
    INIT.call_once(|| {
        let registry = tracing_subscriber::registry().with(filter());
        let result = match log_format() {
            "json" => registry
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .try_init(),
            "pretty" => registry
                .with(fmt::layer().pretty().with_writer(std::io::stderr))
                .try_init(),
            _ => registry
                .with(fmt::layer().compact().with_target(false).with_writer(std::io::stderr))
                .try_init(),
        };

        if result.is_ok() {
            tracing::debug!(format = log_format(), "Logging initialized");
        }
    });
}
