//! Device authorization flow engine.
//!
//! `obtain_token` walks the flow's states in order:
//!
//! 1. load the cached record; a valid one is returned without network I/O;
//! 2. an expired record with a refresh token is refreshed; if that fails the
//!    record is discarded;
//! 3. otherwise a device code is requested, presented, and the token
//!    endpoint is polled until the provider issues a token or ends the flow.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;

use super::device_code::{DeviceAuthorization, PollOutcome, DEVICE_CODE_GRANT_TYPE};
use super::error::AuthError;
use super::http::{build_client, post_params};
use super::presenter::{CodePresenter, LogPresenter, WaitReason};
use super::provider::{self, ProviderMetadata};
use super::refresh::TokenRefresher;
use super::store::TokenStore;
use super::token::{TokenRecord, TokenResponse};
use crate::config::GrantConfig;
use crate::util::sleep::{sleep_or_cancel, Sleeper, TokioSleeper};

/// Runs the device authorization grant for one configured client.
///
/// # Example
/// ```no_run
/// use grant::auth::DeviceFlowEngine;
/// use grant::config::GrantConfig;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn run() -> Result<(), grant::auth::AuthError> {
/// let config = GrantConfig::new("Iv1.0123456789abcdef");
/// let store = config.token_store();
/// let engine = DeviceFlowEngine::new(config, store)?;
/// let token = engine.obtain_token(&CancellationToken::new()).await?;
/// println!("token type: {}", token.token_type);
/// # Ok(())
/// # }
/// ```
pub struct DeviceFlowEngine {
    config: GrantConfig,
    client: reqwest::Client,
    store: Arc<dyn TokenStore>,
    presenter: Arc<dyn CodePresenter>,
    sleeper: Arc<dyn Sleeper>,
    metadata: OnceCell<ProviderMetadata>,
    store_provider: String,
}

impl DeviceFlowEngine {
    pub fn new(config: GrantConfig, store: Arc<dyn TokenStore>) -> Result<Self, AuthError> {
        let client = build_client(config.request_timeout)
            .map_err(|e| AuthError::DeviceAuth(format!("Failed to build HTTP client: {e}")))?;
        let store_provider = provider::store_label(config.flow, config.issuer.as_deref());
        Ok(Self {
            config,
            client,
            store,
            presenter: Arc::new(LogPresenter),
            sleeper: Arc::new(TokioSleeper),
            metadata: OnceCell::new(),
            store_provider,
        })
    }

    pub fn with_presenter(mut self, presenter: Arc<dyn CodePresenter>) -> Self {
        self.presenter = presenter;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn config(&self) -> &GrantConfig {
        &self.config
    }

    /// Token-store key `(provider, profile)` used by this engine.
    pub fn store_key(&self) -> (&str, &str) {
        (self.store_provider.as_str(), self.config.client_id.as_str())
    }

    /// Return a usable token, from cache, by refresh, or by a new device flow.
    pub async fn obtain_token(&self, cancel: &CancellationToken) -> Result<TokenRecord, AuthError> {
        if let Some(cached) = self.cached_token() {
            if cached.is_valid() {
                tracing::info!(provider = %self.store_provider, "Using cached token");
                return Ok(cached);
            }
            if cached.refresh_token().is_some() {
                let refreshed = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(AuthError::Cancelled),
                    refreshed = self.refresh(&cached) => refreshed,
                };
                match refreshed {
                    Ok(record) => return Ok(record),
                    Err(err) => {
                        tracing::warn!(error = %err, "Token refresh failed; starting a new device flow");
                        self.discard_cached();
                    }
                }
            } else {
                tracing::info!("Cached token expired and cannot be refreshed");
            }
        }
        self.run_device_flow(cancel).await
    }

    /// Load the cached record. Store failures count as a cache miss.
    pub fn cached_token(&self) -> Option<TokenRecord> {
        let (provider, profile) = self.store_key();
        match self.store.load(provider, profile) {
            Ok(record) => record,
            Err(err) => {
                tracing::warn!(error = %err, "Token store unreadable; treating as cache miss");
                None
            }
        }
    }

    /// Remove the cached record for this client.
    pub fn logout(&self) -> Result<(), AuthError> {
        let (provider, profile) = self.store_key();
        self.store.clear(provider, profile)
    }

    /// Endpoints for the configured flow, resolved once per engine.
    pub async fn provider_metadata(&self) -> Result<&ProviderMetadata, AuthError> {
        self.metadata
            .get_or_try_init(|| {
                provider::resolve(
                    &self.client,
                    self.config.flow,
                    self.config.issuer.as_deref(),
                    &self.config.endpoints,
                )
            })
            .await
    }

    /// Exchange `prior`'s refresh token and persist the result.
    pub async fn refresh(&self, prior: &TokenRecord) -> Result<TokenRecord, AuthError> {
        let metadata = self
            .provider_metadata()
            .await
            .map_err(|e| AuthError::Refresh(e.to_string()))?;
        let refresher = TokenRefresher {
            client: &self.client,
            token_endpoint: &metadata.token_endpoint,
            encoding: self.config.encoding,
            client_id: &self.config.client_id,
            scope: Some(self.config.effective_scope()),
        };
        let record = refresher.refresh(prior).await?;
        tracing::info!("Refreshed access token");
        self.persist(&record);
        Ok(record)
    }

    /// Request a device code, present it, and poll until the flow ends.
    pub async fn run_device_flow(
        &self,
        cancel: &CancellationToken,
    ) -> Result<TokenRecord, AuthError> {
        let authorization = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AuthError::Cancelled),
            authorization = self.request_device_code() => authorization?,
        };
        self.presenter.present_code(&authorization);
        self.poll_for_token(&authorization, cancel).await
    }

    pub async fn request_device_code(&self) -> Result<DeviceAuthorization, AuthError> {
        let metadata = self.provider_metadata().await?;
        let endpoint = metadata
            .device_authorization_endpoint()
            .map_err(|e| AuthError::DeviceAuth(e.to_string()))?;
        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("scope", self.config.effective_scope()),
        ];
        tracing::debug!(endpoint, "Requesting device code");
        let resp = post_params(&self.client, endpoint, self.config.encoding, &params)
            .send()
            .await
            .map_err(|e| AuthError::DeviceAuth(e.to_string()))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(AuthError::DeviceAuth(format!(
                "Device code request failed with status {status}: {}",
                describe_error_body(&body)
            )));
        }
        let authorization: DeviceAuthorization = resp
            .json()
            .await
            .map_err(|e| AuthError::DeviceAuth(format!("Invalid device code response: {e}")))?;
        tracing::info!(
            interval = authorization.interval,
            expires_in = authorization.expires_in,
            "Device code issued"
        );
        Ok(authorization)
    }

    /// Poll the token endpoint once and classify the answer.
    ///
    /// Transport failures and bodiless 5xx/429 answers come back as
    /// [`AuthError::PollTransport`] so the caller can retry them.
    pub async fn poll_once(
        &self,
        authorization: &DeviceAuthorization,
    ) -> Result<PollOutcome, AuthError> {
        let metadata = self.provider_metadata().await?;
        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("device_code", authorization.device_code.as_str()),
            ("grant_type", DEVICE_CODE_GRANT_TYPE),
        ];
        let resp = post_params(
            &self.client,
            &metadata.token_endpoint,
            self.config.encoding,
            &params,
        )
        .send()
        .await
        .map_err(|e| AuthError::PollTransport(e.to_string()))?;
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| AuthError::PollTransport(e.to_string()))?;

        let outcome = serde_json::from_str::<TokenResponse>(&body)
            .ok()
            .and_then(PollOutcome::classify);
        match outcome {
            Some(outcome) => Ok(outcome),
            None if status.is_server_error() || status.as_u16() == 429 => Err(
                AuthError::PollTransport(format!("Token endpoint returned status {status}")),
            ),
            None => Err(AuthError::InvalidResponse(format!(
                "Token endpoint returned status {status} without a token or error"
            ))),
        }
    }

    /// Poll until the provider issues a token or ends the flow.
    ///
    /// The first poll goes out immediately. `authorization_pending` waits the
    /// provider interval, `slow_down` waits the interval plus five seconds.
    pub async fn poll_for_token(
        &self,
        authorization: &DeviceAuthorization,
        cancel: &CancellationToken,
    ) -> Result<TokenRecord, AuthError> {
        // A lifetime past the clock's range means no local deadline.
        let deadline = if self.config.client_deadline {
            Instant::now().checked_add(authorization.lifetime())
        } else {
            None
        };
        let mut attempt: u32 = 0;

        loop {
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                tracing::info!("Device code lifetime elapsed before authorization");
                return Err(AuthError::DeviceCodeExpired);
            }
            attempt += 1;
            tracing::debug!(attempt, "Polling token endpoint");

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(AuthError::Cancelled),
                outcome = self.config.poll_retry.execute(
                    self.sleeper.as_ref(),
                    cancel,
                    || self.poll_once(authorization),
                ) => outcome?,
            };

            let (reason, delay) = match outcome {
                PollOutcome::Success(response) => {
                    let record = response.into_record(Utc::now())?;
                    tracing::info!(attempt, "Authorization granted");
                    self.persist(&record);
                    self.presenter.authorized();
                    return Ok(record);
                }
                PollOutcome::Pending => (WaitReason::Pending, authorization.poll_interval()),
                PollOutcome::SlowDown => (WaitReason::SlowDown, authorization.slow_down_interval()),
                PollOutcome::Denied => return Err(AuthError::AuthorizationDenied),
                PollOutcome::Expired => return Err(AuthError::DeviceCodeExpired),
                PollOutcome::Unexpected(code) => {
                    return Err(AuthError::UnexpectedDeviceFlowError(code))
                }
            };

            self.presenter.waiting(reason, delay);
            sleep_or_cancel(self.sleeper.as_ref(), delay, cancel).await?;
        }
    }

    fn persist(&self, record: &TokenRecord) {
        let (provider, profile) = self.store_key();
        if let Err(err) = self.store.save(provider, profile, record) {
            tracing::warn!(error = %err, "Failed to save token; continuing with in-memory token");
        }
    }

    fn discard_cached(&self) {
        if let Err(err) = self.logout() {
            tracing::warn!(error = %err, "Failed to discard cached token");
        }
    }
}

impl std::fmt::Debug for DeviceFlowEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceFlowEngine")
            .field("config", &self.config)
            .field("store_provider", &self.store_provider)
            .field("metadata", &self.metadata.get())
            .finish_non_exhaustive()
    }
}

/// Provider error code and description from an error body, if present.
fn describe_error_body(body: &str) -> String {
    serde_json::from_str::<TokenResponse>(body)
        .ok()
        .and_then(|payload| {
            let code = payload.error?;
            Some(match payload.error_description {
                Some(description) => format!("{code} ({description})"),
                None => code,
            })
        })
        .unwrap_or_else(|| "no error details".to_string())
}
