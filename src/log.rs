//! Structured logging via `tracing`.
//!
//! Log levels:
//! - ERROR: invariant violations detected after a mutation
//! - WARN: liveness diagnostics and rejected scenario steps
//! - INFO: committed mutations (task created, status changed, sessions)
//! - DEBUG: operation entry and precondition traces
//! - TRACE: snapshot and verification internals
//!
//! `RUST_LOG` takes precedence. Otherwise debug mode can be enabled with the
//! `--debug` flag or `TASKFLOW_DEBUG=1`.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEBUG_ENV: &str = "TASKFLOW_DEBUG";

/// Initialize logging at the default level.
pub fn init() {
    init_with_debug(false);
}

/// Initialize logging with explicit debug mode setting.
///
/// Safe to call more than once; only the first call installs a subscriber.
pub fn init_with_debug(debug: bool) {
    let debug_enabled = debug || env_debug();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(debug_enabled)));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

/// Check if debug mode is requested through the environment.
pub fn env_debug() -> bool {
    std::env::var(DEBUG_ENV)
        .map(|v| is_truthy(&v))
        .unwrap_or(false)
}

/// Filter directive used when `RUST_LOG` is not set.
pub fn default_directive(debug: bool) -> &'static str {
    if debug {
        "taskflow=debug"
    } else {
        "taskflow=info"
    }
}

fn is_truthy(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}
