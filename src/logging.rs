use tracing_subscriber::EnvFilter;

/// Initialize tracing output to stderr. Level is controlled via the
/// `PATHWISE_LOG` environment variable (e.g. `PATHWISE_LOG=debug`),
/// defaulting to `info`.
pub fn init() {
    let filter =
        EnvFilter::try_from_env("PATHWISE_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
