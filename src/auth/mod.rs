//! OAuth 2.0 device authorization grant: provider resolution, polling,
//! refresh, and token storage.

pub mod device_code;
pub mod engine;
pub mod error;
pub mod http;
pub mod presenter;
pub mod provider;
pub mod refresh;
pub mod store;
pub mod token;

pub use device_code::{DeviceAuthorization, DeviceFlowErrorCode, PollOutcome};
pub use engine::DeviceFlowEngine;
pub use error::AuthError;
pub use presenter::{CodePresenter, LogPresenter, WaitReason};
pub use provider::{EndpointOverrides, FlowKind, ProviderMetadata, RequestEncoding};
pub use refresh::TokenRefresher;
pub use store::{FileTokenStore, TokenStore, TokenStoreConfig};
pub use token::{TokenRecord, TokenResponse};
