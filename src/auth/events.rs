//! Events broadcast by a [`DeviceAuthFlow`](super::DeviceAuthFlow).

use super::error::{AuthErrorCode, FlowFailure};
use super::result::DeviceAuthResult;
use super::status::FlowStatus;

/// Host-facing notifications, in the order they happen.
///
/// `AuthUrlReady` always precedes the first poll. Each invocation ends with
/// exactly one `Success` or `Error`, except a cancellation, which only
/// reports the status change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    AuthUrlReady {
        verification_uri: String,
        user_code: String,
    },
    StatusChanged {
        old: FlowStatus,
        new: FlowStatus,
    },
    Success(DeviceAuthResult),
    Error {
        code: AuthErrorCode,
        message: String,
    },
}

impl AuthEvent {
    pub(crate) fn error(failure: FlowFailure) -> Self {
        Self::Error {
            code: failure.code,
            message: failure.message,
        }
    }
}
