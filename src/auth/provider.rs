//! Provider endpoint resolution.
//!
//! GitHub is a fixed provider whose endpoints are constants. Any other
//! provider is reached through OIDC discovery of its issuer.

use reqwest::Url;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::error::AuthError;

pub const GITHUB_ISSUER: &str = "https://github.com";
pub const GITHUB_AUTHORIZATION_ENDPOINT: &str = "https://github.com/login/oauth/authorize";
pub const GITHUB_DEVICE_AUTHORIZATION_ENDPOINT: &str = "https://github.com/login/device/code";
pub const GITHUB_TOKEN_ENDPOINT: &str = "https://github.com/login/oauth/access_token";
pub const GITHUB_SCOPE: &str = "read:user user:email";
pub const OIDC_SCOPE: &str = "openid email";
pub const WELL_KNOWN_PATH: &str = ".well-known/openid-configuration";

/// Which device flow to run.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum FlowKind {
    /// GitHub's device flow with fixed endpoints.
    #[default]
    Github,
    /// Any OIDC issuer exposing a discovery document.
    Oidc,
}

impl FlowKind {
    pub fn default_scope(self) -> &'static str {
        match self {
            Self::Github => GITHUB_SCOPE,
            Self::Oidc => OIDC_SCOPE,
        }
    }
}

/// Body encoding a provider expects on its device and token endpoints.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum RequestEncoding {
    /// `application/x-www-form-urlencoded`, as RFC 8628 and GitHub require.
    #[default]
    Form,
    /// `application/json`.
    Json,
}

/// Endpoint URLs of an authorization server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderMetadata {
    pub issuer: String,
    #[serde(default)]
    pub authorization_endpoint: Option<String>,
    pub token_endpoint: String,
    #[serde(default)]
    pub device_authorization_endpoint: Option<String>,
}

impl ProviderMetadata {
    pub fn github() -> Self {
        Self {
            issuer: GITHUB_ISSUER.to_string(),
            authorization_endpoint: Some(GITHUB_AUTHORIZATION_ENDPOINT.to_string()),
            token_endpoint: GITHUB_TOKEN_ENDPOINT.to_string(),
            device_authorization_endpoint: Some(GITHUB_DEVICE_AUTHORIZATION_ENDPOINT.to_string()),
        }
    }

    pub fn device_authorization_endpoint(&self) -> Result<&str, AuthError> {
        self.device_authorization_endpoint
            .as_deref()
            .filter(|url| !url.is_empty())
            .ok_or_else(|| {
                AuthError::Discovery(format!(
                    "{} does not advertise a device_authorization_endpoint",
                    self.issuer
                ))
            })
    }
}

/// Replacement endpoints applied on top of the resolved metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndpointOverrides {
    pub device_authorization_endpoint: Option<String>,
    pub token_endpoint: Option<String>,
}

impl EndpointOverrides {
    pub fn apply(&self, mut metadata: ProviderMetadata) -> ProviderMetadata {
        if let Some(url) = &self.device_authorization_endpoint {
            metadata.device_authorization_endpoint = Some(url.clone());
        }
        if let Some(url) = &self.token_endpoint {
            metadata.token_endpoint = url.clone();
        }
        metadata
    }
}

/// Fetch `<issuer>/.well-known/openid-configuration`.
pub async fn discover(client: &reqwest::Client, issuer: &str) -> Result<ProviderMetadata, AuthError> {
    let url = well_known_url(issuer)?;
    tracing::debug!(%url, "Fetching provider metadata");
    let resp = client
        .get(url)
        .header("Accept", "application/json")
        .send()
        .await
        .map_err(|e| AuthError::Discovery(e.to_string()))?;
    if !resp.status().is_success() {
        return Err(AuthError::Discovery(format!(
            "Metadata request failed with status {}",
            resp.status()
        )));
    }
    let metadata: ProviderMetadata = resp
        .json()
        .await
        .map_err(|e| AuthError::Discovery(format!("Invalid metadata document: {e}")))?;
    metadata.device_authorization_endpoint()?;
    if metadata.issuer.trim_end_matches('/') != issuer.trim_end_matches('/') {
        tracing::warn!(
            expected = issuer,
            advertised = %metadata.issuer,
            "Issuer in metadata document does not match configured issuer"
        );
    }
    Ok(metadata)
}

/// Resolve endpoints for a flow kind.
///
/// GitHub never touches the network; OIDC requires an issuer.
pub async fn resolve(
    client: &reqwest::Client,
    kind: FlowKind,
    issuer: Option<&str>,
    overrides: &EndpointOverrides,
) -> Result<ProviderMetadata, AuthError> {
    let metadata = match kind {
        FlowKind::Github => ProviderMetadata::github(),
        FlowKind::Oidc => {
            let issuer = issuer.ok_or_else(|| {
                AuthError::Discovery("An issuer URL is required for the oidc flow".to_string())
            })?;
            discover(client, issuer).await?
        }
    };
    Ok(overrides.apply(metadata))
}

/// Token-store provider label for a flow: `github`, or the issuer host
/// (with any explicit port) and path.
pub fn store_label(kind: FlowKind, issuer: Option<&str>) -> String {
    match (kind, issuer) {
        (FlowKind::Github, _) | (FlowKind::Oidc, None) => kind.to_string(),
        (FlowKind::Oidc, Some(issuer)) => Url::parse(issuer)
            .ok()
            .and_then(|url| {
                let host = match url.port() {
                    Some(port) => format!("{}:{port}", url.host_str()?),
                    None => url.host_str()?.to_string(),
                };
                let path = url.path().trim_matches('/');
                Some(if path.is_empty() {
                    host
                } else {
                    format!("{host}-{path}")
                })
            })
            .unwrap_or_else(|| issuer.to_string()),
    }
}

fn well_known_url(issuer: &str) -> Result<Url, AuthError> {
    let base = format!("{}/", issuer.trim_end_matches('/'));
    Url::parse(&base)
        .and_then(|url| url.join(WELL_KNOWN_PATH))
        .map_err(|e| AuthError::Discovery(format!("Invalid issuer URL {issuer}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flow_kind_parses_case_insensitively() {
        assert_eq!("github".parse::<FlowKind>().unwrap(), FlowKind::Github);
        assert_eq!("OIDC".parse::<FlowKind>().unwrap(), FlowKind::Oidc);
        assert!("saml".parse::<FlowKind>().is_err());
        assert_eq!(FlowKind::Oidc.to_string(), "oidc");
    }

    #[test]
    fn well_known_url_keeps_issuer_path() {
        let url = well_known_url("https://login.example.com/realms/dev/").unwrap();
        assert_eq!(
            url.as_str(),
            "https://login.example.com/realms/dev/.well-known/openid-configuration"
        );
        assert!(well_known_url("not a url").is_err());
    }

    #[test]
    fn overrides_replace_endpoints() {
        let overrides = EndpointOverrides {
            device_authorization_endpoint: Some("http://127.0.0.1/device".into()),
            token_endpoint: None,
        };
        let metadata = overrides.apply(ProviderMetadata::github());
        assert_eq!(
            metadata.device_authorization_endpoint.as_deref(),
            Some("http://127.0.0.1/device")
        );
        assert_eq!(metadata.token_endpoint, GITHUB_TOKEN_ENDPOINT);
    }

    #[test]
    fn store_labels() {
        assert_eq!(store_label(FlowKind::Github, None), "github");
        assert_eq!(
            store_label(FlowKind::Oidc, Some("https://accounts.google.com")),
            "accounts.google.com"
        );
        assert_eq!(
            store_label(FlowKind::Oidc, Some("https://sso.example.com/realms/dev")),
            "sso.example.com-realms/dev"
        );
    }

    #[test]
    fn store_labels_keep_explicit_ports_apart() {
        let a = store_label(FlowKind::Oidc, Some("https://sso.example.com:8443/realms/dev"));
        let b = store_label(FlowKind::Oidc, Some("https://sso.example.com:9443/realms/dev"));
        assert_eq!(a, "sso.example.com:8443-realms/dev");
        assert_ne!(a, b);
        assert_eq!(
            store_label(FlowKind::Oidc, Some("https://sso.example.com:443")),
            "sso.example.com"
        );
    }
}
