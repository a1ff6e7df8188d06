//! CLI handlers for running the flow, status, and logout.

use std::io::Write;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::auth::{
    CodePresenter, DeviceAuthorization, DeviceFlowEngine, TokenRecord, WaitReason,
};
use crate::config::GrantConfig;
use crate::error::Result;

/// Writes device-flow prompts to stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalPresenter;

impl CodePresenter for TerminalPresenter {
    fn present_code(&self, authorization: &DeviceAuthorization) {
        let mut out = std::io::stdout().lock();
        let _ = writeln!(
            out,
            "\nOpen {} in a browser and enter the verification code {}",
            authorization.verification_uri, authorization.user_code
        );
        if let Some(uri) = authorization.complete_uri() {
            let _ = writeln!(out, "\nOr open {uri} directly in the browser");
        }
        let _ = writeln!(
            out,
            "\nThe code is valid for {} seconds",
            authorization.expires_in
        );
        let _ = out.flush();
    }

    fn waiting(&self, reason: WaitReason, delay: Duration) {
        let message = match reason {
            WaitReason::Pending => "Authorization is still pending",
            WaitReason::SlowDown => "Provider asked to slow down",
        };
        let _ = writeln!(
            std::io::stdout(),
            "{message}. Waiting {} seconds...",
            delay.as_secs()
        );
    }

    fn authorized(&self) {
        let _ = writeln!(std::io::stdout(), "\nToken received!");
    }
}

/// Build an engine for `config` that prompts on the terminal.
pub fn build_engine(config: GrantConfig) -> Result<DeviceFlowEngine> {
    config.validate()?;
    let store = config.token_store();
    Ok(DeviceFlowEngine::new(config, store)?.with_presenter(std::sync::Arc::new(TerminalPresenter)))
}

/// Cancellation token fired by Ctrl-C.
pub fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            trigger.cancel();
        }
    });
    cancel
}

/// Handle `grant` without a subcommand: run the flow and report.
pub async fn handle_token(engine: &DeviceFlowEngine, verbose: bool) -> Result<()> {
    let cancel = cancel_on_ctrl_c();
    let token = engine.obtain_token(&cancel).await?;
    if verbose {
        println!("Received token: {}", serde_json::to_string_pretty(&token)?);
    }
    println!("Authorization successful!");
    Ok(())
}

/// Handle `grant status`.
pub fn handle_status(engine: &DeviceFlowEngine) -> Result<()> {
    let (provider, profile) = engine.store_key();
    println!("Provider: {provider}");
    println!("Client:   {profile}");
    match engine.cached_token() {
        Some(token) => println!("Status:   {}", describe_token(&token)),
        None => println!("Status:   not logged in"),
    }
    Ok(())
}

/// Handle `grant logout`.
pub fn handle_logout(engine: &DeviceFlowEngine) -> Result<()> {
    engine.logout()?;
    println!("Removed cached token for {}", engine.store_key().0);
    Ok(())
}

fn describe_token(token: &TokenRecord) -> String {
    match token.expires_at {
        None => "logged in (no expiry)".to_string(),
        Some(expires_at) if expires_at > Utc::now() => {
            format!("logged in (expires {})", expires_at.format("%Y-%m-%d %H:%M:%S UTC"))
        }
        Some(_) if token.refresh_token().is_some() => {
            "token expired (will refresh on next use)".to_string()
        }
        Some(_) => "token expired".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GrantError;
    use chrono::Duration;

    fn token(expires_in: Option<i64>, refresh: Option<&str>) -> TokenRecord {
        TokenRecord {
            access_token: "a".into(),
            token_type: "bearer".into(),
            refresh_token: refresh.map(str::to_string),
            expires_at: expires_in.map(|secs| Utc::now() + Duration::seconds(secs)),
            id_token: None,
            scope: None,
        }
    }

    #[test]
    fn describes_token_states() {
        assert_eq!(describe_token(&token(None, None)), "logged in (no expiry)");
        assert!(describe_token(&token(Some(600), None)).starts_with("logged in (expires "));
        assert_eq!(
            describe_token(&token(Some(-600), Some("r"))),
            "token expired (will refresh on next use)"
        );
        assert_eq!(describe_token(&token(Some(-600), None)), "token expired");
    }

    #[test]
    fn build_engine_rejects_missing_client_id() {
        assert!(matches!(
            build_engine(GrantConfig::default()),
            Err(GrantError::Configuration(_))
        ));
    }
}
