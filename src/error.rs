//! Domain-specific error types for hdl-forge

use thiserror::Error;

/// Main error type for hdl-forge
#[derive(Error, Debug)]
pub enum HdlForgeError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("I/O error: {message}")]
    Io { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },
}

impl From<toml::de::Error> for HdlForgeError {
    fn from(err: toml::de::Error) -> Self {
        HdlForgeError::Config {
            message: format!("Invalid config file: {}", err),
        }
    }
}

/// Result type alias for hdl-forge operations
pub type Result<T> = std::result::Result<T, HdlForgeError>;
