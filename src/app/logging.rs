use tracing_subscriber::EnvFilter;

/// Filter used when the configured directive cannot be parsed
const FALLBACK_FILTER: &str = "warn";

/// Build the filter for `directive`, falling back to warnings only
pub fn env_filter(directive: &str) -> EnvFilter {
    EnvFilter::try_new(directive).unwrap_or_else(|error| {
        eprintln!("WARNING: ignoring log filter {directive:?}: {error}");
        EnvFilter::new(FALLBACK_FILTER)
    })
}

/// Send diagnostics to stderr; stdout carries record payloads only
pub fn init_logging(directive: &str) {
    // Fails only if a subscriber is already installed, e.g. in tests
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(directive))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
