use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Deserializer};
use strum::EnumString;

use super::token::{deserialize_opt_seconds, TokenResponse};

/// Poll interval assumed when the provider does not send one.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// Extra delay a `slow_down` response adds to the poll interval.
pub const SLOW_DOWN_PENALTY_SECS: u64 = 5;

/// Grant type sent when polling the token endpoint with a device code.
pub const DEVICE_CODE_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:device_code";

/// Device-authorization response for one flow invocation.
///
/// # Example
/// ```
/// use grant::auth::DeviceAuthorization;
///
/// let auth: DeviceAuthorization = serde_json::from_str(r#"{
///     "device_code": "3584d83530557fdd1f46af8289938c8ef79f9dc5",
///     "user_code": "WDJB-MJHT",
///     "verification_uri": "https://github.com/login/device",
///     "expires_in": 900
/// }"#)?;
/// assert_eq!(auth.interval, 5);
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeviceAuthorization {
    pub device_code: String,
    pub user_code: String,
    #[serde(alias = "verification_url")]
    pub verification_uri: String,
    #[serde(default)]
    pub verification_uri_complete: Option<String>,
    #[serde(
        default = "default_interval",
        deserialize_with = "deserialize_interval"
    )]
    pub interval: u64,
    #[serde(deserialize_with = "deserialize_expires_in")]
    pub expires_in: u64,
}

impl DeviceAuthorization {
    /// Verification URI with the user code pre-filled, if the provider sent one.
    pub fn complete_uri(&self) -> Option<&str> {
        self.verification_uri_complete
            .as_deref()
            .filter(|uri| !uri.trim().is_empty())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.interval)
    }

    /// Delay after a `slow_down` response. The base interval is not changed.
    pub fn slow_down_interval(&self) -> Duration {
        Duration::from_secs(self.interval + SLOW_DOWN_PENALTY_SECS)
    }

    pub fn lifetime(&self) -> Duration {
        Duration::from_secs(self.expires_in)
    }
}

fn default_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

fn deserialize_interval<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(deserialize_opt_seconds(deserializer)?
        .filter(|secs| *secs > 0)
        .map(|secs| secs as u64)
        .unwrap_or(DEFAULT_POLL_INTERVAL_SECS))
}

fn deserialize_expires_in<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    deserialize_opt_seconds(deserializer)?
        .map(|secs| secs.max(0) as u64)
        .ok_or_else(|| serde::de::Error::custom("expires_in is null"))
}

/// Error codes a token endpoint returns while a device code is outstanding.
#[derive(Debug, Clone, PartialEq, Eq, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum DeviceFlowErrorCode {
    AuthorizationPending,
    SlowDown,
    AccessDenied,
    ExpiredToken,
    #[strum(default)]
    Other(String),
}

impl DeviceFlowErrorCode {
    pub fn parse(code: &str) -> Self {
        code.parse()
            .unwrap_or_else(|_| Self::Other(code.to_string()))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::AuthorizationPending => "authorization_pending",
            Self::SlowDown => "slow_down",
            Self::AccessDenied => "access_denied",
            Self::ExpiredToken => "expired_token",
            Self::Other(code) => code,
        }
    }
}

impl fmt::Display for DeviceFlowErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classified result of a single token-endpoint poll.
#[derive(Debug, Clone)]
pub enum PollOutcome {
    Success(TokenResponse),
    Pending,
    SlowDown,
    Denied,
    Expired,
    Unexpected(String),
}

impl PollOutcome {
    /// Classify a token-endpoint response.
    ///
    /// A non-empty access token wins over any error field. Returns `None`
    /// when the response carries neither.
    pub fn classify(response: TokenResponse) -> Option<Self> {
        if response.access_token().is_some() {
            return Some(Self::Success(response));
        }
        let code = response.error.as_deref().filter(|code| !code.is_empty())?;
        Some(match DeviceFlowErrorCode::parse(code) {
            DeviceFlowErrorCode::AuthorizationPending => Self::Pending,
            DeviceFlowErrorCode::SlowDown => Self::SlowDown,
            DeviceFlowErrorCode::AccessDenied => Self::Denied,
            DeviceFlowErrorCode::ExpiredToken => Self::Expired,
            DeviceFlowErrorCode::Other(code) => Self::Unexpected(code),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn classify(value: serde_json::Value) -> Option<PollOutcome> {
        PollOutcome::classify(serde_json::from_value(value).unwrap())
    }

    #[test]
    fn interval_defaults_when_missing_or_zero() {
        let missing: DeviceAuthorization = serde_json::from_value(json!({
            "device_code": "d", "user_code": "u",
            "verification_uri": "https://example.com/device", "expires_in": 600
        }))
        .unwrap();
        assert_eq!(missing.interval, DEFAULT_POLL_INTERVAL_SECS);

        let zero: DeviceAuthorization = serde_json::from_value(json!({
            "device_code": "d", "user_code": "u",
            "verification_uri": "https://example.com/device",
            "expires_in": 600, "interval": 0
        }))
        .unwrap();
        assert_eq!(zero.interval, DEFAULT_POLL_INTERVAL_SECS);
    }

    #[test]
    fn verification_url_alias_and_complete_uri() {
        let auth: DeviceAuthorization = serde_json::from_value(json!({
            "device_code": "d", "user_code": "ABCD-EFGH",
            "verification_url": "https://www.google.com/device",
            "verification_uri_complete": "",
            "expires_in": "1800", "interval": 7
        }))
        .unwrap();
        assert_eq!(auth.verification_uri, "https://www.google.com/device");
        assert_eq!(auth.complete_uri(), None);
        assert_eq!(auth.expires_in, 1800);
        assert_eq!(auth.slow_down_interval(), Duration::from_secs(12));
    }

    #[test]
    fn missing_device_code_is_rejected() {
        let parsed = serde_json::from_value::<DeviceAuthorization>(json!({
            "user_code": "u", "verification_uri": "https://x", "expires_in": 5
        }));
        assert!(parsed.is_err());
    }

    #[test]
    fn error_codes_parse_into_closed_set() {
        assert_eq!(
            DeviceFlowErrorCode::parse("authorization_pending"),
            DeviceFlowErrorCode::AuthorizationPending
        );
        assert_eq!(
            DeviceFlowErrorCode::parse("expired_token"),
            DeviceFlowErrorCode::ExpiredToken
        );
        assert_eq!(
            DeviceFlowErrorCode::parse("invalid_client"),
            DeviceFlowErrorCode::Other("invalid_client".to_string())
        );
        assert_eq!(DeviceFlowErrorCode::SlowDown.to_string(), "slow_down");
    }

    #[test]
    fn classification_covers_every_signal() {
        assert!(matches!(
            classify(json!({ "access_token": "tok", "error": "slow_down" })),
            Some(PollOutcome::Success(_))
        ));
        assert!(matches!(
            classify(json!({ "error": "authorization_pending" })),
            Some(PollOutcome::Pending)
        ));
        assert!(matches!(
            classify(json!({ "error": "slow_down" })),
            Some(PollOutcome::SlowDown)
        ));
        assert!(matches!(
            classify(json!({ "error": "access_denied" })),
            Some(PollOutcome::Denied)
        ));
        assert!(matches!(
            classify(json!({ "error": "expired_token" })),
            Some(PollOutcome::Expired)
        ));
        assert!(matches!(
            classify(json!({ "error": "incorrect_client_credentials" })),
            Some(PollOutcome::Unexpected(code)) if code == "incorrect_client_credentials"
        ));
        assert!(classify(json!({ "access_token": "" })).is_none());
    }
}
