//! Logging setup. stdout carries the JSON result, so logs go to stderr.

use tracing_subscriber::EnvFilter;

/// `RUST_LOG` wins; otherwise `directive` (the configured log level).
pub fn init(directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(directive))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
