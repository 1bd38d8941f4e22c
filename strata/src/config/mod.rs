//! Configuration system for Strata.
//!
//! Configuration is loaded from defaults, files and environment variables,
//! validated, and then passed explicitly to the components that need it.
//! Nothing here is process-global.

mod builder;
mod loader;
mod models;
#[cfg(test)]
mod tests;
mod validation;

pub use builder::ConfigBuilder;
pub use loader::{ConfigFormat, ConfigLoader};
pub use models::*;
pub use validation::validate_config;

/// Project configuration file stems, tried in order with every supported extension
pub const PROJECT_CONFIG_STEMS: &[&str] = &["strata", ".strata/config"];

/// Environment variable naming an explicit configuration file
pub const CONFIG_PATH_ENV: &str = "STRATA_CONFIG";

/// Environment variable prefix for Strata configuration
pub const ENV_PREFIX: &str = "STRATA_";

/// Configuration error type
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Error occurred during file loading
    #[error("Failed to load configuration file: {0}")]
    FileLoadError(String),

    /// Error occurred during validation
    #[error("Configuration validation error: {0}")]
    ValidationError(String),

    /// Error occurred during parsing
    #[error("Configuration parsing error: {0}")]
    ParseError(String),
}

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;
