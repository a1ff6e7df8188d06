//! Configuration (layered: CLI flags > environment > defaults).
//!
//! Every setting the engine needs travels in one explicit [`GrantConfig`]
//! value; nothing is read from process-wide state after construction.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::provider::{EndpointOverrides, FlowKind, RequestEncoding};
use crate::auth::store::{FileTokenStore, TokenStore, TokenStoreConfig};
use crate::error::GrantError;
use crate::util::retry::RetryPolicy;

pub const ENV_CLIENT_ID: &str = "GRANT_CLIENT_ID";
pub const ENV_ISSUER: &str = "GRANT_ISSUER";
pub const ENV_FLOW: &str = "GRANT_FLOW";
pub const ENV_SCOPE: &str = "GRANT_SCOPE";
pub const ENV_TOKEN_DIR: &str = "GRANT_TOKEN_DIR";

/// Default bound on every HTTP request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Settings for one device-flow invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct GrantConfig {
    pub client_id: String,
    pub flow: FlowKind,
    /// Issuer base URL; required for [`FlowKind::Oidc`].
    pub issuer: Option<String>,
    /// Overrides the flow's default scope.
    pub scope: Option<String>,
    pub encoding: RequestEncoding,
    pub endpoints: EndpointOverrides,
    /// Token directory; `None` uses the user config directory.
    pub token_dir: Option<PathBuf>,
    pub request_timeout: Duration,
    /// Retry policy for transport failures while polling.
    pub poll_retry: RetryPolicy,
    /// Stop polling once the device code's `expires_in` has elapsed locally,
    /// instead of waiting for the provider's `expired_token`.
    pub client_deadline: bool,
}

impl Default for GrantConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            flow: FlowKind::default(),
            issuer: None,
            scope: None,
            encoding: RequestEncoding::default(),
            endpoints: EndpointOverrides::default(),
            token_dir: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            poll_retry: RetryPolicy::default(),
            client_deadline: false,
        }
    }
}

impl GrantConfig {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            ..Self::default()
        }
    }

    /// OIDC configuration for `issuer`.
    pub fn oidc(client_id: impl Into<String>, issuer: impl Into<String>) -> Self {
        Self {
            flow: FlowKind::Oidc,
            issuer: Some(issuer.into()),
            ..Self::new(client_id)
        }
    }

    /// Load from `GRANT_*` environment variables (and `.env` if present).
    pub fn from_env() -> Result<Self, GrantError> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary variable lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, GrantError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let mut config = Self::default();
        if let Some(client_id) = get(ENV_CLIENT_ID) {
            config.client_id = client_id;
        }
        if let Some(flow) = get(ENV_FLOW) {
            config.flow = flow.parse().map_err(|_| {
                GrantError::Configuration(format!(
                    "{ENV_FLOW} must be `github` or `oidc`, got `{flow}`"
                ))
            })?;
        }
        config.issuer = get(ENV_ISSUER);
        config.scope = get(ENV_SCOPE);
        config.token_dir = get(ENV_TOKEN_DIR).map(PathBuf::from);
        Ok(config)
    }

    pub fn with_flow(mut self, flow: FlowKind) -> Self {
        self.flow = flow;
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn with_encoding(mut self, encoding: RequestEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_device_authorization_endpoint(mut self, url: impl Into<String>) -> Self {
        self.endpoints.device_authorization_endpoint = Some(url.into());
        self
    }

    pub fn with_token_endpoint(mut self, url: impl Into<String>) -> Self {
        self.endpoints.token_endpoint = Some(url.into());
        self
    }

    pub fn with_token_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.token_dir = Some(dir.into());
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_poll_retry(mut self, policy: RetryPolicy) -> Self {
        self.poll_retry = policy;
        self
    }

    pub fn with_client_deadline(mut self, enabled: bool) -> Self {
        self.client_deadline = enabled;
        self
    }

    /// Scope requested from the provider.
    pub fn effective_scope(&self) -> &str {
        self.scope
            .as_deref()
            .unwrap_or_else(|| self.flow.default_scope())
    }

    pub fn validate(&self) -> Result<(), GrantError> {
        if self.client_id.trim().is_empty() {
            return Err(GrantError::Configuration(format!(
                "A client id is required (--client-id or {ENV_CLIENT_ID})"
            )));
        }
        if self.flow == FlowKind::Oidc && self.issuer.is_none() {
            return Err(GrantError::Configuration(format!(
                "The oidc flow requires an issuer URL (--issuer or {ENV_ISSUER})"
            )));
        }
        if self.request_timeout.is_zero() {
            return Err(GrantError::Configuration(
                "Request timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// File-backed token store rooted at the configured directory.
    pub fn token_store(&self) -> Arc<dyn TokenStore> {
        let dir = self
            .token_dir
            .clone()
            .unwrap_or_else(TokenStoreConfig::default_dir);
        Arc::new(FileTokenStore::new(TokenStoreConfig::new(dir)))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_to_github_flow_and_scope() {
        let config = GrantConfig::new("Iv1.abc");
        assert_eq!(config.flow, FlowKind::Github);
        assert_eq!(config.effective_scope(), "read:user user:email");
        assert_eq!(config.request_timeout, DEFAULT_REQUEST_TIMEOUT);
        assert!(!config.client_deadline);
        config.validate().unwrap();
    }

    #[test]
    fn oidc_scope_and_override() {
        let config = GrantConfig::oidc("cli", "https://sso.example.com");
        assert_eq!(config.effective_scope(), "openid email");
        let config = config.with_scope("openid profile offline_access");
        assert_eq!(config.effective_scope(), "openid profile offline_access");
    }

    #[test]
    fn reads_environment_lookup() {
        let config = GrantConfig::from_lookup(lookup(&[
            (ENV_CLIENT_ID, "cli"),
            (ENV_FLOW, "OIDC"),
            (ENV_ISSUER, "https://sso.example.com"),
            (ENV_SCOPE, ""),
            (ENV_TOKEN_DIR, "/tmp/grant-tokens"),
        ]))
        .unwrap();
        assert_eq!(config.client_id, "cli");
        assert_eq!(config.flow, FlowKind::Oidc);
        assert_eq!(config.issuer.as_deref(), Some("https://sso.example.com"));
        assert_eq!(config.scope, None);
        assert_eq!(config.token_dir, Some(PathBuf::from("/tmp/grant-tokens")));
    }

    #[test]
    fn invalid_flow_in_environment_is_a_configuration_error() {
        let err = GrantConfig::from_lookup(lookup(&[(ENV_FLOW, "saml")])).unwrap_err();
        assert!(matches!(err, GrantError::Configuration(message) if message.contains("saml")));
    }

    #[test]
    fn validation_requires_client_id_and_issuer() {
        assert!(matches!(
            GrantConfig::default().validate(),
            Err(GrantError::Configuration(_))
        ));
        let missing_issuer = GrantConfig::new("cli").with_flow(FlowKind::Oidc);
        assert!(matches!(
            missing_issuer.validate(),
            Err(GrantError::Configuration(message)) if message.contains("issuer")
        ));
    }
}
