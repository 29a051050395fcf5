use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// How long before its nominal expiry a player token is treated as stale.
pub const DEFAULT_EARLY_EXPIRY_HOURS: i64 = 6;

/// Outcome of a successful device authorization.
///
/// Serializes with the camelCase field names hosts receive in the success
/// event (`accessToken`, `playerToken`, ...).
///
/// # Example
/// ```
/// use chrono::{Duration, Utc};
/// use playkit_auth::auth::DeviceAuthResult;
///
/// let result = DeviceAuthResult {
///     access_token: "at".to_string(),
///     refresh_token: None,
///     user_id: "u1".to_string(),
///     player_token: "pt".to_string(),
///     expires_in: 86_400,
///     obtained_at: Utc::now(),
/// };
/// assert!(result.player_token_valid_at(Utc::now(), Duration::hours(6)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceAuthResult {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub user_id: String,
    pub player_token: String,
    /// Player-token lifetime in seconds, as reported by the exchange.
    pub expires_in: i64,
    pub obtained_at: DateTime<Utc>,
}

impl DeviceAuthResult {
    pub fn player_token_expires_at(&self) -> DateTime<Utc> {
        self.obtained_at + Duration::seconds(self.expires_in)
    }

    /// Whether the player token is still usable at `now`, keeping `early`
    /// in reserve. A token without a positive lifetime is never valid.
    pub fn player_token_valid_at(&self, now: DateTime<Utc>, early: Duration) -> bool {
        if self.expires_in <= 0 || self.player_token.is_empty() {
            return false;
        }
        now < self.player_token_expires_at() - early
    }

    /// [`Self::player_token_valid_at`] against the current time.
    pub fn is_player_token_valid(&self, hours_early: i64) -> bool {
        self.player_token_valid_at(Utc::now(), Duration::hours(hours_early))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result_with_lifetime(expires_in: i64) -> DeviceAuthResult {
        DeviceAuthResult {
            access_token: "at1".to_string(),
            refresh_token: Some("rt1".to_string()),
            user_id: "u1".to_string(),
            player_token: "pt1".to_string(),
            expires_in,
            obtained_at: DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        }
    }

    #[test]
    fn expiry_is_relative_to_receipt() {
        let result = result_with_lifetime(3600);
        assert_eq!(
            result.player_token_expires_at(),
            result.obtained_at + Duration::hours(1)
        );
    }

    #[test]
    fn token_goes_stale_inside_the_early_window() {
        let result = result_with_lifetime(24 * 3600);
        let early = Duration::hours(DEFAULT_EARLY_EXPIRY_HOURS);
        assert!(result.player_token_valid_at(result.obtained_at + Duration::hours(17), early));
        assert!(!result.player_token_valid_at(result.obtained_at + Duration::hours(18), early));
    }

    #[test]
    fn missing_lifetime_or_token_is_invalid() {
        let result = result_with_lifetime(0);
        assert!(!result.player_token_valid_at(result.obtained_at, Duration::zero()));

        let mut result = result_with_lifetime(3600);
        result.player_token.clear();
        assert!(!result.player_token_valid_at(result.obtained_at, Duration::zero()));
    }

    #[test]
    fn serializes_with_host_field_names() {
        let value = serde_json::to_value(result_with_lifetime(3600)).unwrap();
        assert_eq!(value["accessToken"], "at1");
        assert_eq!(value["refreshToken"], "rt1");
        assert_eq!(value["userId"], "u1");
        assert_eq!(value["playerToken"], "pt1");
        assert_eq!(value["expiresIn"], 3600);
    }
}
