//! Subscriber setup for the binary. Library code only emits events.

use tracing_subscriber::EnvFilter;

/// Installs a stderr fmt subscriber at `level`. `RUST_LOG` wins when set.
/// A second call is a no-op.
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
