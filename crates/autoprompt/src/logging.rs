//! Global `tracing` subscriber setup.
//!
//! Library code only emits events; binaries call [`init`] once at startup.
//! `RUST_LOG` takes precedence over [`LoggingConfig::level`]. Lines go to
//! stderr so they never mix with a child's output on stdout.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::{LogFormat, LoggingConfig};
use crate::error::LoggingError;

/// Build the filter: `RUST_LOG` if set and valid, else the configured level.
pub fn filter(config: &LoggingConfig) -> Result<EnvFilter, LoggingError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => Ok(EnvFilter::try_new(&config.level)?),
    }
}

/// Install the global subscriber.
///
/// Fails with [`LoggingError::AlreadyInitialized`] if one is already set.
pub fn init(config: &LoggingConfig) -> Result<(), LoggingError> {
    let filter = filter(config)?;
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(config.with_target)
        .with_level(true);

    let registry = tracing_subscriber::registry().with(filter);
    let result = match config.format {
        LogFormat::Text => registry.with(fmt_layer).try_init(),
        LogFormat::Json => registry.with(fmt_layer.json()).try_init(),
    };
    result.map_err(|_| LoggingError::AlreadyInitialized)
}
