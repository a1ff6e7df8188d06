//! grant: OAuth 2.0 device authorization grant client.
//!
//! Obtains an access token from GitHub or any OIDC issuer without a local
//! redirect listener. The user opens a verification URL and enters a short
//! code while [`auth::DeviceFlowEngine`] polls the token endpoint. Tokens are
//! cached on disk and refreshed, so repeated runs skip re-authorization.
//!
//! # Quick Start
//!
//! ```no_run
//! use grant::auth::DeviceFlowEngine;
//! use grant::config::GrantConfig;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), grant::error::GrantError> {
//! let config = GrantConfig::oidc("my-cli", "https://sso.example.com/realms/dev");
//! config.validate()?;
//! let store = config.token_store();
//! let engine = DeviceFlowEngine::new(config, store)?;
//! let token = engine.obtain_token(&CancellationToken::new()).await?;
//! println!("expires at {:?}", token.expires_at);
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod util;

#[cfg(feature = "cli")]
pub mod cli;
