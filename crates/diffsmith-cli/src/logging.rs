//! Tracing subscriber setup

use diffsmith_core::LoggingConfig;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber on stderr
///
/// `RUST_LOG` wins over `config.filter`; an unparsable filter falls back to `info`.
pub fn init(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    let _ = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}
