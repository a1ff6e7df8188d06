//! `grant clone`: shallow clone with token-in-URL authentication.

use reqwest::Url;
use tempfile::TempDir;
use tokio::process::Command;

use super::auth::cancel_on_ctrl_c;
use crate::auth::DeviceFlowEngine;
use crate::error::{GrantError, Result};

/// Embed `token` as the user component of an HTTP(S) repository URL.
pub fn authenticated_url(repository_url: &str, token: &str) -> Result<Url> {
    let mut url = Url::parse(repository_url)
        .map_err(|e| GrantError::Clone(format!("Invalid repository URL {repository_url}: {e}")))?;
    if !matches!(url.scheme(), "https" | "http") {
        return Err(GrantError::Clone(format!(
            "Only http(s) repository URLs can carry a token, got {}",
            url.scheme()
        )));
    }
    url.set_username(token)
        .and_then(|()| url.set_password(None))
        .map_err(|()| GrantError::Clone(format!("Cannot add credentials to {repository_url}")))?;
    Ok(url)
}

/// Handle `grant clone <repository-url>`.
///
/// The temporary directory is removed when this returns.
pub async fn handle_clone(
    engine: &DeviceFlowEngine,
    repository_url: &str,
    verbose: bool,
) -> Result<()> {
    let cancel = cancel_on_ctrl_c();
    let token = engine.obtain_token(&cancel).await?;
    let url = authenticated_url(repository_url, &token.access_token)?;

    let dir = tempfile::Builder::new().prefix("grant-clone-").tempdir()?;
    tracing::debug!(repository = repository_url, dir = %dir.path().display(), "Cloning");

    let output = Command::new("git")
        .args(["clone", "--verbose", "--depth", "1"])
        .arg(url.as_str())
        .arg(dir.path())
        .env("GIT_TERMINAL_PROMPT", "0")
        .output()
        .await
        .map_err(|e| GrantError::Clone(format!("Failed to run git: {e}")))?;

    if !output.status.success() {
        if verbose {
            let stderr = String::from_utf8_lossy(&output.stderr);
            eprintln!("git output:\n{}", redact(&stderr, &token.access_token));
            eprintln!(
                "Command was: git clone --depth 1 {repository_url} {}",
                dir.path().display()
            );
        }
        return Err(GrantError::Clone(format!("git exited with {}", output.status)));
    }

    println!("Repository cloned successfully to: {}", dir.path().display());
    cleanup(dir);
    Ok(())
}

fn cleanup(dir: TempDir) {
    let path = dir.path().to_path_buf();
    if let Err(err) = dir.close() {
        tracing::warn!(path = %path.display(), error = %err, "Failed to remove clone directory");
    }
}

fn redact(text: &str, secret: &str) -> String {
    if secret.is_empty() {
        return text.to_string();
    }
    text.replace(secret, "***")
}
