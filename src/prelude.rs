//! Convenience re-exports for common use.

pub use crate::auth::{
    AuthError, AuthErrorCode, AuthEvent, DeviceAuthFlow, DeviceAuthResult, FlowSnapshot,
    FlowStatus, StartOutcome,
};
pub use crate::config::PlayKitConfig;
pub use crate::error::{PlayKitError, Result};
