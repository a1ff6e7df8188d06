#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, SubsecRound, Utc};
use grant::auth::{
    AuthError, CodePresenter, DeviceAuthorization, DeviceFlowEngine, TokenRecord, TokenStore,
    WaitReason,
};
use grant::config::GrantConfig;
use grant::util::retry::RetryPolicy;
use grant::util::sleep::Sleeper;
use tokio_util::sync::CancellationToken;
use wiremock::MockServer;

pub const CLIENT_ID: &str = "Iv1.test-client";

#[derive(Default)]
pub struct InMemoryTokenStore {
    tokens: Mutex<HashMap<(String, String), TokenRecord>>,
    fail_saves: bool,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_saves() -> Self {
        Self {
            fail_saves: true,
            ..Self::default()
        }
    }

    pub fn seed(&self, provider: &str, profile: &str, token: TokenRecord) {
        self.tokens
            .lock()
            .expect("store lock poisoned")
            .insert((provider.to_string(), profile.to_string()), token);
    }

    pub fn get(&self, provider: &str, profile: &str) -> Option<TokenRecord> {
        self.tokens
            .lock()
            .expect("store lock poisoned")
            .get(&(provider.to_string(), profile.to_string()))
            .cloned()
    }
}

impl TokenStore for InMemoryTokenStore {
    fn load(&self, provider: &str, profile: &str) -> Result<Option<TokenRecord>, AuthError> {
        Ok(self.get(provider, profile))
    }

    fn save(&self, provider: &str, profile: &str, token: &TokenRecord) -> Result<(), AuthError> {
        if self.fail_saves {
            return Err(AuthError::Store("disk full".to_string()));
        }
        self.tokens
            .lock()
            .expect("store lock poisoned")
            .insert((provider.to_string(), profile.to_string()), token.clone());
        Ok(())
    }

    fn clear(&self, provider: &str, profile: &str) -> Result<(), AuthError> {
        self.tokens
            .lock()
            .expect("store lock poisoned")
            .remove(&(provider.to_string(), profile.to_string()));
        Ok(())
    }
}

/// Records requested delays and returns immediately.
#[derive(Default)]
pub struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().expect("sleeper lock poisoned").clone()
    }

    pub fn total(&self) -> Duration {
        self.delays().into_iter().sum()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays
            .lock()
            .expect("sleeper lock poisoned")
            .push(duration);
        tokio::task::yield_now().await;
    }
}

/// Cancels the flow on the first wait and never wakes up.
pub struct CancellingSleeper {
    pub cancel: CancellationToken,
}

#[async_trait]
impl Sleeper for CancellingSleeper {
    async fn sleep(&self, _duration: Duration) {
        self.cancel.cancel();
        std::future::pending::<()>().await;
    }
}

#[derive(Default)]
pub struct RecordingPresenter {
    pub presented: Mutex<Vec<DeviceAuthorization>>,
    pub waits: Mutex<Vec<(WaitReason, Duration)>>,
    pub authorized: Mutex<u32>,
}

impl CodePresenter for RecordingPresenter {
    fn present_code(&self, authorization: &DeviceAuthorization) {
        self.presented
            .lock()
            .expect("presenter lock poisoned")
            .push(authorization.clone());
    }

    fn waiting(&self, reason: WaitReason, delay: Duration) {
        self.waits
            .lock()
            .expect("presenter lock poisoned")
            .push((reason, delay));
    }

    fn authorized(&self) {
        *self.authorized.lock().expect("presenter lock poisoned") += 1;
    }
}

/// GitHub-flow config whose endpoints point at `server`.
pub fn github_config(server: &MockServer) -> GrantConfig {
    GrantConfig::new(CLIENT_ID)
        .with_device_authorization_endpoint(format!("{}/login/device/code", server.uri()))
        .with_token_endpoint(format!("{}/login/oauth/access_token", server.uri()))
        .with_poll_retry(RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(10),
            multiplier: 2.0,
        })
}

pub struct Harness {
    pub engine: DeviceFlowEngine,
    pub store: Arc<InMemoryTokenStore>,
    pub sleeper: Arc<RecordingSleeper>,
    pub presenter: Arc<RecordingPresenter>,
}

pub fn harness(config: GrantConfig) -> Harness {
    harness_with_store(config, Arc::new(InMemoryTokenStore::new()))
}

pub fn harness_with_store(config: GrantConfig, store: Arc<InMemoryTokenStore>) -> Harness {
    let sleeper = Arc::new(RecordingSleeper::new());
    let presenter = Arc::new(RecordingPresenter::default());
    let engine = DeviceFlowEngine::new(config, store.clone())
        .expect("engine")
        .with_sleeper(sleeper.clone())
        .with_presenter(presenter.clone());
    Harness {
        engine,
        store,
        sleeper,
        presenter,
    }
}

pub fn record(access_token: &str, expires_in_secs: Option<i64>, refresh: Option<&str>) -> TokenRecord {
    TokenRecord {
        access_token: access_token.to_string(),
        token_type: "bearer".to_string(),
        refresh_token: refresh.map(str::to_string),
        expires_at: expires_in_secs
            .map(|secs| (Utc::now() + ChronoDuration::seconds(secs)).trunc_subsecs(0)),
        id_token: None,
        scope: None,
    }
}
