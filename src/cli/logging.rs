//! cli::logging
//!
//! Tracing subscriber initialization.
//!
//! Logs go to stderr. User-facing output goes through
//! [`crate::ui::output::Console`] instead.
//!
//! # Priority (highest to lowest)
//!
//! 1. `TRELLIS_LOG` env var (per-target directives, e.g. `trellis=debug,warn`)
//! 2. `RUST_LOG` env var
//! 3. CLI flags (`--debug` → debug, `--quiet` → error)
//! 4. Default level: `warn`

use std::io::IsTerminal;

use tracing::Level;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Project-specific filter variable.
pub const LOG_ENV: &str = "TRELLIS_LOG";

/// Default level for the given flags.
pub fn default_level(debug: bool, quiet: bool) -> Level {
    if debug {
        Level::DEBUG
    } else if quiet {
        Level::ERROR
    } else {
        Level::WARN
    }
}

/// Install the global subscriber. Later calls do nothing.
pub fn init(debug: bool, quiet: bool) {
    let filter = build_env_filter(debug, quiet);
    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(true)
        .without_time()
        .compact();

    let _ = tracing_subscriber::registry().with(filter).with(layer).try_init();
}

fn build_env_filter(debug: bool, quiet: bool) -> EnvFilter {
    if let Ok(directives) = std::env::var(LOG_ENV) {
        if let Ok(filter) = EnvFilter::try_new(&directives) {
            return filter;
        }
    }
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    EnvFilter::new(default_level(debug, quiet).as_str().to_ascii_lowercase())
}
