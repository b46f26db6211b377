//! tracing subscriber setup for the binaries

use tracing_subscriber::EnvFilter;

use posestream_core::{PoseError, PoseResult};

use crate::config::LoggingConfig;

/// Build the filter: `RUST_LOG` wins, otherwise the configured level
pub fn env_filter(config: &LoggingConfig) -> PoseResult<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.level)
            .map_err(|e| PoseError::Config(format!("logging.level {:?}: {}", config.level, e))),
    }
}

/// Install the global subscriber
///
/// Calling this twice is harmless; the second call is ignored.
pub fn init_logging(config: &LoggingConfig) -> PoseResult<()> {
    let filter = env_filter(config)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let installed = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if installed.is_err() {
        tracing::debug!("Global subscriber already set");
    }
    Ok(())
}
