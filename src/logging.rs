//! Subscriber set-up for the `tracing` events the engine emits.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::error::{GraphmasterError, Result};

/// Installs the global fmt subscriber writing to stderr. `RUST_LOG` wins over
/// `level` when it is set and valid.
pub fn init(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| GraphmasterError::Config(format!("invalid log level '{level}': {e}")))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| GraphmasterError::Config(format!("failed to set subscriber: {e}")))
}

/// Validates a configured level before it is handed to [`init`].
pub fn parse_level(level: &str) -> Result<LevelFilter> {
    if level.is_empty() {
        return Err(GraphmasterError::Config("log level must not be empty".into()));
    }
    level
        .parse::<LevelFilter>()
        .map_err(|_| GraphmasterError::Config(format!("unrecognised log level: '{level}'")))
}
