#![forbid(unsafe_code)]

//! Command-line replay of recorded browser keyboard/IME captures.

pub mod cli;
pub mod error;
pub mod output;

pub use cli::{run, run_from_env};
pub use error::{ReplayError, Result};

/// Environment variable holding the log filter directive.
pub const LOG_ENV: &str = "KEYBRIDGE_LOG";

/// Install the stderr log subscriber. Defaults to `warn` when `KEYBRIDGE_LOG`
/// is unset or unparsable.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    // A second install (e.g. from tests) is harmless.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init();
}
