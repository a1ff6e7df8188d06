use chrono::Utc;

use super::error::AuthError;
use super::http::post_params;
use super::provider::RequestEncoding;
use super::token::{TokenRecord, TokenResponse};

/// Exchanges a refresh token at a token endpoint.
///
/// # Example
/// ```no_run
/// use grant::auth::{RequestEncoding, TokenRefresher};
///
/// # async fn run(prior: grant::auth::TokenRecord) -> Result<(), grant::auth::AuthError> {
/// let client = reqwest::Client::new();
/// let refresher = TokenRefresher {
///     client: &client,
///     token_endpoint: "https://sso.example.com/oauth2/token",
///     encoding: RequestEncoding::Form,
///     client_id: "cli",
///     scope: Some("openid email"),
/// };
/// let renewed = refresher.refresh(&prior).await?;
/// # let _ = renewed;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct TokenRefresher<'a> {
    pub client: &'a reqwest::Client,
    pub token_endpoint: &'a str,
    pub encoding: RequestEncoding,
    pub client_id: &'a str,
    pub scope: Option<&'a str>,
}

impl TokenRefresher<'_> {
    /// Exchange `prior`'s refresh token for a new record.
    ///
    /// When the provider does not rotate the refresh token, the prior one is
    /// carried over into the new record.
    pub async fn refresh(&self, prior: &TokenRecord) -> Result<TokenRecord, AuthError> {
        let refresh_token = prior
            .refresh_token()
            .ok_or_else(|| AuthError::Refresh("No refresh token available".to_string()))?;

        let mut params = vec![
            ("grant_type", "refresh_token"),
            ("client_id", self.client_id),
            ("refresh_token", refresh_token),
        ];
        if let Some(scope) = self.scope {
            params.push(("scope", scope));
        }

        let resp = post_params(self.client, self.token_endpoint, self.encoding, &params)
            .send()
            .await
            .map_err(|e| AuthError::Refresh(e.to_string()))?;
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| AuthError::Refresh(e.to_string()))?;
        let issued_at = Utc::now();

        let payload: TokenResponse = match serde_json::from_str(&body) {
            Ok(payload) => payload,
            Err(_) if !status.is_success() => {
                return Err(AuthError::Refresh(format!(
                    "Refresh request failed with status {status}"
                )))
            }
            Err(e) => return Err(AuthError::Refresh(format!("Invalid refresh response: {e}"))),
        };

        if payload.access_token().is_none() {
            let reason = match (&payload.error, &payload.error_description) {
                (Some(code), Some(description)) => format!("{code}: {description}"),
                (Some(code), None) => code.clone(),
                _ if !status.is_success() => format!("status {status}"),
                _ => "empty access token".to_string(),
            };
            return Err(AuthError::Refresh(reason));
        }

        let mut record = payload
            .into_record(issued_at)
            .map_err(|e| AuthError::Refresh(e.to_string()))?;
        if record.refresh_token.is_none() {
            record.refresh_token = Some(refresh_token.to_string());
        }
        Ok(record)
    }
}
