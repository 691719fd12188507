use crate::config::LOG_ENV;
use tracing_subscriber::EnvFilter;

/// install the global fmt subscriber for the binaries
/// `SQLSTREAM_LOG` wins over the configured filter; a second call is a no-op
pub fn init(default_filter: &str) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
