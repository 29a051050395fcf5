//! Device-code session state and the wire payloads of the three endpoints.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::error::{AuthErrorCode, FlowFailure};
use super::result::DeviceAuthResult;

pub const DEVICE_CODE_PATH: &str = "/api/auth/device/code";
pub const DEVICE_TOKEN_PATH: &str = "/api/auth/device/token";
pub const EXCHANGE_JWT_PATH: &str = "/api/external/exchange-jwt";

pub const DEVICE_CODE_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:device_code";

/// Used when the server omits `interval` or sends 0.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
/// Used when the server omits `expires_in` or sends 0.
pub const DEFAULT_EXPIRES_IN_SECS: u64 = 300;

/// Largest `interval` accepted from the server; also caps `slow_down` growth.
pub const MAX_POLL_INTERVAL_SECS: u64 = 3_600;
/// Largest `expires_in` accepted from the server.
pub const MAX_EXPIRES_IN_SECS: u64 = 86_400;

/// Server-issued session for one device authorization.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use chrono::Utc;
/// use playkit_auth::auth::DeviceCodeSession;
///
/// let session = DeviceCodeSession {
///     device_code: "dc1".to_string(),
///     user_code: "ABCD-1234".to_string(),
///     verification_uri: "https://x/verify".to_string(),
///     poll_interval: Duration::from_secs(5),
///     expires_in: Duration::from_secs(300),
///     issued_at: Utc::now(),
/// };
/// assert_eq!(session.launch_url(), "https://x/verify?user_code=ABCD-1234");
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct DeviceCodeSession {
    /// Presented only to the token endpoint.
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    /// Minimum spacing between polls; grows on `slow_down`.
    pub poll_interval: Duration,
    pub expires_in: Duration,
    pub issued_at: DateTime<Utc>,
}

impl DeviceCodeSession {
    /// Validate a 200 device-code reply.
    pub(crate) fn from_response(
        response: DeviceCodeResponse,
        issued_at: DateTime<Utc>,
    ) -> Result<Self, FlowFailure> {
        let device_code = response.device_code.unwrap_or_default();
        let verification_uri = response.verification_uri.unwrap_or_default();
        if device_code.is_empty() || verification_uri.is_empty() {
            return Err(FlowFailure::new(
                AuthErrorCode::InvalidResponse,
                "Missing required fields in device code response",
            ));
        }
        let interval = match response.interval {
            Some(secs) if secs > 0 => secs,
            _ => DEFAULT_POLL_INTERVAL_SECS,
        };
        let expires_in = match response.expires_in {
            Some(secs) if secs > 0 => secs,
            _ => DEFAULT_EXPIRES_IN_SECS,
        };
        if interval > MAX_POLL_INTERVAL_SECS || expires_in > MAX_EXPIRES_IN_SECS {
            return Err(FlowFailure::new(
                AuthErrorCode::InvalidResponse,
                format!(
                    "Device code timing out of range (interval {interval}s, expires_in {expires_in}s)"
                ),
            ));
        }
        Ok(Self {
            device_code,
            user_code: response.user_code.unwrap_or_default(),
            verification_uri,
            poll_interval: Duration::from_secs(interval),
            expires_in: Duration::from_secs(expires_in),
            issued_at,
        })
    }

    /// Absolute deadline; saturates at the latest representable instant.
    pub fn expires_at(&self) -> DateTime<Utc> {
        chrono::Duration::from_std(self.expires_in)
            .ok()
            .and_then(|lifetime| self.issued_at.checked_add_signed(lifetime))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// The URL to open for the user, with `user_code` prefilled when known.
    pub fn launch_url(&self) -> String {
        if self.user_code.is_empty() {
            return self.verification_uri.clone();
        }
        let separator = if self.verification_uri.contains('?') {
            '&'
        } else {
            '?'
        };
        format!(
            "{}{separator}user_code={}",
            self.verification_uri,
            urlencoded(&self.user_code)
        )
    }
}

impl fmt::Debug for DeviceCodeSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceCodeSession")
            .field("device_code", &"<redacted>")
            .field("user_code", &self.user_code)
            .field("verification_uri", &self.verification_uri)
            .field("poll_interval", &self.poll_interval)
            .field("expires_in", &self.expires_in)
            .field("issued_at", &self.issued_at)
            .finish()
    }
}

/// Classified reply to one token poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCodePoll {
    Authorized {
        access_token: String,
        refresh_token: Option<String>,
    },
    Pending,
    SlowDown,
    Expired,
    AccessDenied,
    Failed(FlowFailure),
}

impl DeviceCodePoll {
    /// Map an HTTP status and raw body from the token endpoint.
    pub fn classify(status: u16, body: &str) -> Self {
        let Ok(payload) = serde_json::from_str::<DeviceTokenResponse>(body) else {
            return Self::Failed(FlowFailure::new(
                AuthErrorCode::TokenError,
                fallback_message(body, "Failed to parse token response"),
            ));
        };

        if status == 200 {
            let access_token = payload.access_token.unwrap_or_default();
            if access_token.is_empty() {
                return Self::Failed(FlowFailure::new(
                    AuthErrorCode::InvalidToken,
                    "Received empty access token",
                ));
            }
            return Self::Authorized {
                access_token,
                refresh_token: payload.refresh_token.filter(|t| !t.is_empty()),
            };
        }

        if status == 400 {
            match payload.error.as_deref() {
                Some("authorization_pending") => return Self::Pending,
                Some("slow_down") => return Self::SlowDown,
                Some("expired_token") => return Self::Expired,
                Some("access_denied") => return Self::AccessDenied,
                _ => {}
            }
        }

        let message = payload
            .error_description
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| fallback_message(body, "Unexpected token response"));
        Self::Failed(FlowFailure::new(AuthErrorCode::TokenError, message))
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct DeviceCodeResponse {
    #[serde(default)]
    device_code: Option<String>,
    #[serde(default)]
    user_code: Option<String>,
    #[serde(default)]
    verification_uri: Option<String>,
    #[serde(default)]
    interval: Option<u64>,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct DeviceTokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlayerTokenResponse {
    #[serde(rename = "userId", default)]
    user_id: String,
    #[serde(rename = "playerToken", default)]
    player_token: String,
    #[serde(rename = "expiresIn", default)]
    expires_in: i64,
}

/// Turn a player-token exchange reply into the final result.
pub(crate) fn parse_player_token(
    status: u16,
    body: &str,
    access_token: String,
    refresh_token: Option<String>,
    obtained_at: DateTime<Utc>,
) -> Result<DeviceAuthResult, FlowFailure> {
    if status != 200 {
        return Err(FlowFailure::new(
            AuthErrorCode::ExchangeError,
            format!("HTTP {status}: {body}"),
        ));
    }
    let payload: PlayerTokenResponse = serde_json::from_str(body).map_err(|_| {
        FlowFailure::new(
            AuthErrorCode::ParseError,
            "Failed to parse player token response",
        )
    })?;
    Ok(DeviceAuthResult {
        access_token,
        refresh_token,
        user_id: payload.user_id,
        player_token: payload.player_token,
        expires_in: payload.expires_in,
        obtained_at,
    })
}

fn fallback_message(body: &str, default: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        default.to_string()
    } else {
        trimmed.to_string()
    }
}

fn urlencoded(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char);
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn response(json: &str) -> DeviceCodeResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn session_from_complete_response() {
        let session = DeviceCodeSession::from_response(
            response(
                r#"{"device_code":"dc1","user_code":"ABCD-1234","verification_uri":"https://x/verify","interval":5,"expires_in":300}"#,
            ),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(session.device_code, "dc1");
        assert_eq!(session.user_code, "ABCD-1234");
        assert_eq!(session.poll_interval, Duration::from_secs(5));
        assert_eq!(session.expires_in, Duration::from_secs(300));
        assert_eq!(
            session.expires_at(),
            session.issued_at + chrono::Duration::seconds(300)
        );
    }

    #[test]
    fn missing_device_code_or_uri_is_invalid_response() {
        for json in [
            r#"{"user_code":"A","verification_uri":"https://x"}"#,
            r#"{"device_code":"","verification_uri":"https://x"}"#,
            r#"{"device_code":"dc1","user_code":"A"}"#,
        ] {
            let failure = DeviceCodeSession::from_response(response(json), Utc::now()).unwrap_err();
            assert_eq!(failure.code, AuthErrorCode::InvalidResponse, "{json}");
        }
    }

    #[test]
    fn zero_or_missing_timing_falls_back_to_defaults() {
        let session = DeviceCodeSession::from_response(
            response(r#"{"device_code":"dc1","verification_uri":"https://x","interval":0}"#),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(session.poll_interval, Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS));
        assert_eq!(session.expires_in, Duration::from_secs(DEFAULT_EXPIRES_IN_SECS));
    }

    #[test]
    fn oversized_timing_is_invalid_response() {
        for json in [
            r#"{"device_code":"dc1","verification_uri":"https://x","expires_in":1000000000000000}"#,
            r#"{"device_code":"dc1","verification_uri":"https://x","interval":18446744073709551615}"#,
            r#"{"device_code":"dc1","verification_uri":"https://x","interval":3601}"#,
        ] {
            let failure = DeviceCodeSession::from_response(response(json), Utc::now()).unwrap_err();
            assert_eq!(failure.code, AuthErrorCode::InvalidResponse, "{json}");
        }

        let session = DeviceCodeSession::from_response(
            response(r#"{"device_code":"dc1","verification_uri":"https://x","interval":3600,"expires_in":86400}"#),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(session.poll_interval, Duration::from_secs(MAX_POLL_INTERVAL_SECS));
    }

    #[test]
    fn expires_at_saturates_instead_of_overflowing() {
        let session = DeviceCodeSession {
            device_code: "dc1".to_string(),
            user_code: String::new(),
            verification_uri: "https://x".to_string(),
            poll_interval: Duration::from_secs(5),
            expires_in: Duration::from_secs(u64::MAX),
            issued_at: Utc::now(),
        };
        assert_eq!(session.expires_at(), DateTime::<Utc>::MAX_UTC);
    }

    #[test]
    fn launch_url_encodes_and_respects_existing_query() {
        let mut session = DeviceCodeSession::from_response(
            response(r#"{"device_code":"dc1","user_code":"AB CD","verification_uri":"https://x/verify?lang=en"}"#),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(session.launch_url(), "https://x/verify?lang=en&user_code=AB%20CD");

        session.user_code.clear();
        assert_eq!(session.launch_url(), "https://x/verify?lang=en");
    }

    #[test]
    fn debug_hides_device_code() {
        let session = DeviceCodeSession::from_response(
            response(r#"{"device_code":"secret-dc","verification_uri":"https://x"}"#),
            Utc::now(),
        )
        .unwrap();
        assert!(!format!("{session:?}").contains("secret-dc"));
    }

    #[test]
    fn classify_rfc8628_errors() {
        assert_eq!(
            DeviceCodePoll::classify(400, r#"{"error":"authorization_pending"}"#),
            DeviceCodePoll::Pending
        );
        assert_eq!(
            DeviceCodePoll::classify(400, r#"{"error":"slow_down"}"#),
            DeviceCodePoll::SlowDown
        );
        assert_eq!(
            DeviceCodePoll::classify(400, r#"{"error":"expired_token"}"#),
            DeviceCodePoll::Expired
        );
        assert_eq!(
            DeviceCodePoll::classify(400, r#"{"error":"access_denied"}"#),
            DeviceCodePoll::AccessDenied
        );
    }

    #[test]
    fn classify_success_with_and_without_refresh_token() {
        assert_eq!(
            DeviceCodePoll::classify(200, r#"{"access_token":"at1","refresh_token":"rt1"}"#),
            DeviceCodePoll::Authorized {
                access_token: "at1".to_string(),
                refresh_token: Some("rt1".to_string()),
            }
        );
        assert_eq!(
            DeviceCodePoll::classify(200, r#"{"access_token":"at1"}"#),
            DeviceCodePoll::Authorized {
                access_token: "at1".to_string(),
                refresh_token: None,
            }
        );
    }

    #[test]
    fn classify_empty_access_token_as_invalid_token() {
        let DeviceCodePoll::Failed(failure) =
            DeviceCodePoll::classify(200, r#"{"access_token":""}"#)
        else {
            panic!("expected failure");
        };
        assert_eq!(failure.code, AuthErrorCode::InvalidToken);
    }

    #[test]
    fn classify_other_replies_as_token_error() {
        let DeviceCodePoll::Failed(failure) = DeviceCodePoll::classify(
            400,
            r#"{"error":"invalid_grant","error_description":"bad verifier"}"#,
        ) else {
            panic!("expected failure");
        };
        assert_eq!(failure.code, AuthErrorCode::TokenError);
        assert_eq!(failure.message, "bad verifier");

        let DeviceCodePoll::Failed(failure) = DeviceCodePoll::classify(500, r#"{"oops":true}"#)
        else {
            panic!("expected failure");
        };
        assert_eq!(failure.message, r#"{"oops":true}"#);

        let DeviceCodePoll::Failed(failure) = DeviceCodePoll::classify(502, "<html>bad gateway</html>")
        else {
            panic!("expected failure");
        };
        assert_eq!(failure.code, AuthErrorCode::TokenError);
        assert_eq!(failure.message, "<html>bad gateway</html>");
    }

    #[test]
    fn player_token_reply_builds_result() {
        let now = Utc::now();
        let result = parse_player_token(
            200,
            r#"{"userId":"u1","playerToken":"pt1","expiresIn":3600}"#,
            "at1".to_string(),
            None,
            now,
        )
        .unwrap();
        assert_eq!(result.user_id, "u1");
        assert_eq!(result.player_token, "pt1");
        assert_eq!(result.expires_in, 3600);
        assert_eq!(result.access_token, "at1");
        assert_eq!(result.obtained_at, now);
    }

    #[test]
    fn player_token_failures_are_coded() {
        let failure =
            parse_player_token(401, "nope", "at1".to_string(), None, Utc::now()).unwrap_err();
        assert_eq!(failure.code, AuthErrorCode::ExchangeError);
        assert_eq!(failure.message, "HTTP 401: nope");

        let failure =
            parse_player_token(200, "not json", "at1".to_string(), None, Utc::now()).unwrap_err();
        assert_eq!(failure.code, AuthErrorCode::ParseError);
    }
}
