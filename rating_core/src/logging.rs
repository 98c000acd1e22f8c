//! Tracing setup for the `rate` binary and tests.
//!
//! Rated values are written to stdout, so log lines always go to stderr.

use crate::{Error, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Targets that follow the configured level; everything else logs warnings only
const TARGETS: [&str; 2] = ["rating_core", "rate"];

/// Build the filter for a `[logging] level` such as `info` or `debug`
///
/// A level containing `=` or `,` is taken as a full filter directive.
pub fn level_filter(level: &str) -> Result<EnvFilter> {
    let directive = if level.contains('=') || level.contains(',') {
        level.to_string()
    } else {
        let scoped: Vec<String> = TARGETS.iter().map(|t| format!("{}={}", t, level)).collect();
        format!("warn,{}", scoped.join(","))
    };
    EnvFilter::try_new(&directive)
        .map_err(|e| Error::Config(format!("Invalid [logging] level '{}': {}", level, e)))
}

/// Install the stderr subscriber; `RUST_LOG` takes precedence over `level`
pub fn init(level: &str) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => level_filter(level)?,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .try_init()
        .map_err(|e| Error::Config(format!("Logging already initialized: {}", e)))
}

#[cfg(test)]
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(EnvFilter::new("rating_core=debug"))
        .try_init();
}
