use thiserror::Error;

/// Failures of the device-authorization flow and its collaborators.
///
/// Only [`AuthError::PollTransport`] is transient; the engine retries it with
/// back-off. Provider-signalled states (`AuthorizationDenied`,
/// `DeviceCodeExpired`, `UnexpectedDeviceFlowError`) end the flow.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Provider discovery failed: {0}")]
    Discovery(String),
    #[error("Device authorization request failed: {0}")]
    DeviceAuth(String),
    #[error("Token poll failed: {0}")]
    PollTransport(String),
    #[error("The authorization request was denied")]
    AuthorizationDenied,
    #[error("Device code has expired")]
    DeviceCodeExpired,
    #[error("Unexpected error in the device flow: {0}")]
    UnexpectedDeviceFlowError(String),
    #[error("Token refresh failed: {0}")]
    Refresh(String),
    #[error("Token store error: {0}")]
    Store(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Authorization cancelled")]
    Cancelled,
}

impl AuthError {
    /// Whether the failed operation may succeed if attempted again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::PollTransport(_))
    }

    /// Whether the provider itself ended the flow.
    pub fn is_provider_terminal(&self) -> bool {
        matches!(
            self,
            Self::AuthorizationDenied | Self::DeviceCodeExpired | Self::UnexpectedDeviceFlowError(_)
        )
    }
}

impl From<std::io::Error> for AuthError {
    fn from(error: std::io::Error) -> Self {
        Self::Store(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_poll_transport_is_retryable() {
        assert!(AuthError::PollTransport("reset".into()).is_retryable());
        assert!(!AuthError::AuthorizationDenied.is_retryable());
        assert!(!AuthError::DeviceAuth("boom".into()).is_retryable());
        assert!(!AuthError::Refresh("nope".into()).is_retryable());
    }

    #[test]
    fn unexpected_code_is_in_message() {
        let err = AuthError::UnexpectedDeviceFlowError("unsupported_grant_type".into());
        assert!(err.to_string().contains("unsupported_grant_type"));
        assert!(err.is_provider_terminal());
    }
}
