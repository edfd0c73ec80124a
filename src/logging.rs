//! Tracing subscriber setup

use tracing_subscriber::EnvFilter;

/// Environment variable holding an `EnvFilter` directive, e.g. `rampart=debug`
pub const LOG_ENV: &str = "RAMPART_LOG";

/// Pick the filter directive: `RAMPART_LOG`, then `--verbose`, then the
/// configured level.
pub fn filter_directive(env: Option<String>, verbose: bool, configured: &str) -> String {
    match env {
        Some(directive) if !directive.trim().is_empty() => directive,
        _ if verbose => "debug".to_string(),
        _ => configured.to_string(),
    }
}

/// Install the global subscriber. Logs go to stderr so they never interleave
/// with prompts on stdout. Calling this twice is harmless.
pub fn init(verbose: bool, configured: &str) {
    let directive = filter_directive(std::env::var(LOG_ENV).ok(), verbose, configured);
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .try_init();
}
