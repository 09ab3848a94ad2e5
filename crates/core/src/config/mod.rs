//! Configuration loading and validation.

mod loader;
mod types;
mod validate;

use thiserror::Error;

pub use loader::{load_config, load_config_from_str};
pub use types::{
    CallbackConfig, Config, DatabaseBackend, DatabaseConfig, SanitizedConfig, ServerConfig,
    UpstreamConfig, WorkerConfig,
};
pub use validate::validate_config;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file does not exist.
    #[error("config file not found: {0}")]
    FileNotFound(String),

    /// Config could not be parsed.
    #[error("failed to parse config: {0}")]
    ParseError(String),

    /// Config parsed but contains invalid values.
    #[error("invalid config: {0}")]
    Invalid(String),
}
