use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use thiserror::Error;

use crate::error::PlayKitError;

/// Machine-readable code attached to every terminal flow failure.
///
/// Rendered as the `SCREAMING_SNAKE_CASE` strings hosts already match on
/// (`"ACCESS_DENIED"`, `"EXPIRED"`, ...).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthErrorCode {
    /// Transport failure on the device-code or player-token request.
    NetworkError,
    /// Non-200 reply to the device-code request.
    HttpError,
    /// A 200 body that is not the JSON we expect.
    ParseError,
    /// Device-code reply without `device_code` or `verification_uri`.
    InvalidResponse,
    /// Token reply with an empty `access_token`.
    InvalidToken,
    Expired,
    AccessDenied,
    /// Unrecognized or unparseable poll reply.
    TokenError,
    /// Non-200 reply to the player-token exchange.
    ExchangeError,
}

/// A terminal failure as delivered to the host: code plus display message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowFailure {
    pub code: AuthErrorCode,
    pub message: String,
}

impl FlowFailure {
    pub fn new(code: AuthErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FlowFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// Errors surfaced by the auth API itself (as opposed to flow events).
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Device authorization failed ({code}): {message}")]
    Flow {
        code: AuthErrorCode,
        message: String,
    },
    #[error("Device authorization was cancelled")]
    Cancelled,
    #[error("A device authorization flow is already in progress")]
    AlreadyActive,
    #[error("Device authorization flow has shut down")]
    FlowClosed,
    #[error("Network error: {0}")]
    Network(String),
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl AuthError {
    /// The taxonomy code, for errors that carry one.
    pub fn code(&self) -> Option<AuthErrorCode> {
        match self {
            Self::Flow { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<FlowFailure> for AuthError {
    fn from(failure: FlowFailure) -> Self {
        Self::Flow {
            code: failure.code,
            message: failure.message,
        }
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(error: reqwest::Error) -> Self {
        Self::Network(error.to_string())
    }
}

impl From<std::io::Error> for AuthError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

impl From<toml::de::Error> for AuthError {
    fn from(error: toml::de::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

impl From<AuthError> for PlayKitError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::Configuration(message) => PlayKitError::Configuration(message),
            other => PlayKitError::Authentication(other),
        }
    }
}
