//! Error types for the simulation core.

use thiserror::Error;

use crate::config::ConfigError;

/// Fatal conditions surfaced by the core and the driver.
#[derive(Debug, Error)]
pub enum SimError {
    /// Configuration was rejected before the run started
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(#[from] ConfigError),
    /// Writing telemetry or the event log failed
    #[error("output error: {0}")]
    Io(#[from] std::io::Error),
    /// Telemetry could not be serialized
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type SimResult<T> = Result<T, SimError>;
