//! Tracing subscriber setup for hosts embedding the importer.

use tracing_subscriber::EnvFilter;

/// Build the filter for a verbosity level.
///
/// `RUST_LOG` wins when set. Otherwise:
/// - 0: warn
/// - 1: info
/// - 2: debug (rusqlite stays at info)
/// - 3+: trace
#[must_use]
pub fn env_filter(verbose: u8) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug,rusqlite=info",
            _ => "trace",
        };
        EnvFilter::new(level)
    })
}

/// Install a stderr subscriber. Does nothing in quiet mode.
///
/// Panics if a global subscriber is already installed; use [`try_init_tracing`]
/// when that can happen.
pub fn init_tracing(verbose: u8, quiet: bool) {
    if quiet {
        return;
    }

    tracing_subscriber::fmt()
        .with_env_filter(env_filter(verbose))
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

/// Like [`init_tracing`], but returns `false` instead of panicking when a
/// subscriber is already installed.
pub fn try_init_tracing(verbose: u8, quiet: bool) -> bool {
    if quiet {
        return false;
    }

    tracing_subscriber::fmt()
        .with_env_filter(env_filter(verbose))
        .with_writer(std::io::stderr)
        .without_time()
        .try_init()
        .is_ok()
}
