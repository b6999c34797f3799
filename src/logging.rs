//! Tracing subscriber setup for the `lidx` binary.
//!
//! Logs go to stderr. The level comes from the `-v` count (warn, info,
//! debug, trace); `RUST_LOG` takes precedence when set.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

pub fn level_for_verbosity(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// Install the global subscriber. Safe to call once per process.
pub fn init(verbose: u8) {
    let env_filter = EnvFilter::builder()
        .with_default_directive(level_for_verbosity(verbose).into())
        .from_env_lossy();

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(verbose >= 2)
        .with_writer(std::io::stderr)
        .try_init();
}
