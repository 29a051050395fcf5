//! Error types for PlayKit auth.

use thiserror::Error;

use crate::auth::{AuthError, AuthErrorCode};

/// Top-level error for configuration loading and host entry points.
#[derive(Error, Debug)]
pub enum PlayKitError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Authentication(AuthError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Settings file error: {0}")]
    Settings(#[from] toml::de::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PlayKitError {
    /// The flow error code, when this wraps a terminal flow failure.
    pub fn error_code(&self) -> Option<AuthErrorCode> {
        match self {
            Self::Authentication(error) => error.code(),
            _ => None,
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, PlayKitError>;
