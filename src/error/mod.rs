//! Error types for grant.

use thiserror::Error;

use crate::auth::AuthError;

/// Top-level error for configuration, authorization, and the CLI helpers.
#[derive(Error, Debug)]
pub enum GrantError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Clone failed: {0}")]
    Clone(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl GrantError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Auth(AuthError::Cancelled) => 130,
            Self::Configuration(_) => 2,
            _ => 1,
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, GrantError>;
