use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::error::AuthError;

/// Token record persisted in a token store.
///
/// `expires_at` is only ever computed from a token response's `expires_in`
/// and is truncated to whole seconds so it survives a save/load cycle
/// unchanged. A record without an expiry never expires on the client side.
///
/// # Example
/// ```
/// use grant::auth::TokenRecord;
///
/// let record = TokenRecord {
///     access_token: "gho_abc".to_string(),
///     token_type: "bearer".to_string(),
///     refresh_token: None,
///     expires_at: None,
///     id_token: None,
///     scope: Some("read:user".to_string()),
/// };
/// assert!(record.is_valid());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub access_token: String,
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl TokenRecord {
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(true, |expires_at| now < expires_at)
    }

    /// Refresh token, if one was issued and is non-empty.
    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token
            .as_deref()
            .filter(|token| !token.trim().is_empty())
    }
}

/// Raw token-endpoint response, shared by device-code polling and refresh.
///
/// Success and error payloads come back in the same shape, so every field
/// is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default, deserialize_with = "deserialize_opt_seconds")]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

impl TokenResponse {
    /// The access token, when the provider issued a non-empty one.
    pub fn access_token(&self) -> Option<&str> {
        self.access_token
            .as_deref()
            .filter(|token| !token.is_empty())
    }

    /// Build a record from this response, received at `issued_at`.
    ///
    /// Fails with [`AuthError::InvalidResponse`] when no access token was
    /// issued or `expires_in` does not fit a timestamp.
    pub fn into_record(self, issued_at: DateTime<Utc>) -> Result<TokenRecord, AuthError> {
        let access_token = self
            .access_token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                AuthError::InvalidResponse("Token response had no access token".to_string())
            })?;
        let expires_at = match self.expires_in {
            Some(secs) => Some(expiry_after(issued_at, secs).ok_or_else(|| {
                AuthError::InvalidResponse(format!("expires_in out of range: {secs}"))
            })?),
            None => None,
        };
        Ok(TokenRecord {
            access_token,
            token_type: self
                .token_type
                .filter(|kind| !kind.is_empty())
                .unwrap_or_else(|| "bearer".to_string()),
            refresh_token: self.refresh_token.filter(|token| !token.is_empty()),
            expires_at,
            id_token: self.id_token,
            scope: self.scope,
        })
    }
}

fn expiry_after(issued_at: DateTime<Utc>, secs: i64) -> Option<DateTime<Utc>> {
    let lifetime = Duration::try_seconds(secs)?;
    issued_at
        .checked_add_signed(lifetime)
        .map(|expires_at| expires_at.trunc_subsecs(0))
}

/// Accepts a number of seconds encoded either as a JSON number or a string.
pub(crate) fn deserialize_opt_seconds<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Seconds {
        Number(i64),
        Text(String),
    }

    match Option::<Seconds>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Seconds::Number(value)) => Ok(Some(value)),
        Some(Seconds::Text(text)) => text
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|e| serde::de::Error::custom(format!("invalid seconds value: {e}"))),
    }
}
