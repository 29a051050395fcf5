use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Lifecycle of a device authorization flow.
///
/// `Idle` is the initial state. `Success`, `Expired`, `Cancelled` and `Error`
/// end one invocation; any of them may be followed by a fresh start.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FlowStatus {
    #[default]
    Idle,
    /// Device code requested, waiting for the server.
    Pending,
    /// Waiting for the user to authorize in the browser.
    Polling,
    Success,
    Expired,
    Cancelled,
    Error,
}

impl FlowStatus {
    /// `Pending` or `Polling`.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Pending | Self::Polling)
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Success | Self::Expired | Self::Cancelled | Self::Error
        )
    }
}

/// Point-in-time view of a flow, safe to hand to UI code.
///
/// Never carries the device code, the verifier or any token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlowSnapshot {
    pub status: FlowStatus,
    pub verification_uri: Option<String>,
    pub user_code: Option<String>,
    pub poll_interval: Option<Duration>,
    pub expires_at: Option<DateTime<Utc>>,
}
