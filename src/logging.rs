//! Ambient logging setup, shared by all three binaries.
//!
//! Mirrors the teacher's `env_logger::Builder::from_env(...).init()` idiom
//! (seen identically in `main.rs`, `bin/octo-runner.rs` and
//! `bin/pi-bridge.rs`): library code only calls into `log`, and exactly one
//! binary-local call to [`init`] configures the global logger.

use log::LevelFilter;

/// Verbosity requested on the command line, translated to a `log::LevelFilter`.
///
/// `quiet` wins over `verbose` count if both are somehow set.
pub fn level_for(quiet: bool, verbose: u8) -> LevelFilter {
    if quiet {
        return LevelFilter::Error;
    }
    match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Initializes the global logger. Safe to call once per process; a second
/// call is a programmer error and will panic via `env_logger`'s own guard.
pub fn init(default_level: LevelFilter) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(
        default_level.to_string().to_lowercase(),
    ))
    .format_timestamp_millis()
    .init();
}
