use std::time::Duration;

use super::device_code::DeviceAuthorization;

/// Why the poll loop is about to wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitReason {
    Pending,
    SlowDown,
}

/// Shows the user what to do while a device code is outstanding.
///
/// Implementations must not fail the flow; output errors are swallowed.
pub trait CodePresenter: Send + Sync {
    /// Called once, right after the device code is issued.
    fn present_code(&self, authorization: &DeviceAuthorization);

    /// Called before each wait between polls.
    fn waiting(&self, _reason: WaitReason, _delay: Duration) {}

    /// Called when the provider issued a token.
    fn authorized(&self) {}
}

/// Presenter that only emits `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogPresenter;

impl CodePresenter for LogPresenter {
    fn present_code(&self, authorization: &DeviceAuthorization) {
        match authorization.complete_uri() {
            Some(uri) => tracing::info!(
                verification_uri = uri,
                expires_in = authorization.expires_in,
                "Open the verification URI to authorize this device"
            ),
            None => tracing::info!(
                verification_uri = %authorization.verification_uri,
                user_code = %authorization.user_code,
                expires_in = authorization.expires_in,
                "Open the verification URI and enter the user code"
            ),
        }
    }

    fn waiting(&self, reason: WaitReason, delay: Duration) {
        tracing::debug!(?reason, delay_secs = delay.as_secs(), "Waiting before next poll");
    }
}
