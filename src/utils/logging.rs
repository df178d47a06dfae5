// src/utils/logging.rs
use tracing_subscriber::{fmt, EnvFilter};

// Request traces from the HTTP layer are useful when serving.
const DEFAULT_DIRECTIVES: &str = "info,tower_http=debug";

/// Installs the global tracing subscriber. Filters come from `RUST_LOG`.
///
/// Logs go to stderr: the CLI commands print their JSON results on stdout.
pub fn setup_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    tracing::debug!("Logging setup complete.");
}
