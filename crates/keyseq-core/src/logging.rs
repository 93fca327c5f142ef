#![forbid(unsafe_code)]

//! Logging facade.
//!
//! With the `tracing` feature the crate logs through [`tracing`]; the macros
//! are re-exported here so dependents can log without naming the crate.
//! With `tracing-json` a JSON subscriber filtered by `KEYSEQ_LOG` can be
//! installed with [`init_json_logging`].
//!
//! Without either feature nothing is logged and nothing is exported.

#[cfg(feature = "tracing")]
pub use tracing::{
    debug, debug_span, error, error_span, info, info_span, trace, trace_span, warn, warn_span,
};

/// Environment variable holding the log filter directives.
pub const LOG_ENV: &str = "KEYSEQ_LOG";

/// Install a JSON subscriber on stderr, filtered by `KEYSEQ_LOG`.
///
/// Defaults to `warn` when the variable is unset or invalid. Returns `false`
/// if a global subscriber was already installed.
#[cfg(feature = "tracing-json")]
pub fn init_json_logging() -> bool {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
}
