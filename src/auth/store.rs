use std::fs;
use std::io::Write;
#[cfg(unix)]
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::AuthError;
use super::token::TokenRecord;

const TOKEN_FILE_VERSION: u32 = 1;

/// Storage abstraction for persisted token records.
///
/// Records are keyed by a provider label (`github`, or an OIDC issuer host)
/// and a profile (the client id).
pub trait TokenStore: Send + Sync {
    fn load(&self, provider: &str, profile: &str) -> Result<Option<TokenRecord>, AuthError>;
    fn save(&self, provider: &str, profile: &str, token: &TokenRecord) -> Result<(), AuthError>;
    fn clear(&self, provider: &str, profile: &str) -> Result<(), AuthError>;
}

/// Configuration for file-backed token storage.
#[derive(Debug, Clone)]
pub struct TokenStoreConfig {
    pub base_dir: PathBuf,
}

impl TokenStoreConfig {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn default_dir() -> PathBuf {
        default_token_dir()
    }
}

/// File-backed token store writing one JSON document per key.
///
/// A missing or malformed document loads as `None`. Saves go through a
/// temporary file and a rename, so an interrupted write leaves the previous
/// record in place.
///
/// # Example
/// ```no_run
/// use grant::auth::{FileTokenStore, TokenRecord, TokenStore};
///
/// let store = FileTokenStore::new_default();
/// let token = TokenRecord {
///     access_token: "gho_abc".to_string(),
///     token_type: "bearer".to_string(),
///     refresh_token: None,
///     expires_at: None,
///     id_token: None,
///     scope: None,
/// };
/// store.save("github", "Iv1.0123456789abcdef", &token)?;
/// # Ok::<(), grant::auth::AuthError>(())
/// ```
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    base_dir: PathBuf,
}

impl FileTokenStore {
    pub fn new(config: TokenStoreConfig) -> Self {
        Self {
            base_dir: config.base_dir,
        }
    }

    pub fn new_default() -> Self {
        Self {
            base_dir: default_token_dir(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn token_path(&self, provider: &str, profile: &str) -> PathBuf {
        let provider = normalize_label(provider);
        let profile = normalize_label(profile);
        let name = if profile == "default" {
            format!("{provider}.json")
        } else {
            format!("{provider}.{profile}.json")
        };
        self.base_dir.join(name)
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self, provider: &str, profile: &str) -> Result<Option<TokenRecord>, AuthError> {
        let path = self.token_path(provider, profile);
        let raw = match fs::read_to_string(&path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(AuthError::Store(format!("{}: {err}", path.display()))),
        };
        let file: TokenFile = match serde_json::from_str(&raw) {
            Ok(file) => file,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "Ignoring malformed token file");
                return Ok(None);
            }
        };
        if file.version != TOKEN_FILE_VERSION {
            tracing::warn!(
                path = %path.display(),
                version = file.version,
                "Ignoring token file with unsupported version"
            );
            return Ok(None);
        }
        Ok(Some(file.token))
    }

    fn save(&self, provider: &str, profile: &str, token: &TokenRecord) -> Result<(), AuthError> {
        let path = self.token_path(provider, profile);
        let file = TokenFile {
            version: TOKEN_FILE_VERSION,
            provider: provider.to_string(),
            profile: profile.to_string(),
            token: token.clone(),
            saved_at: Utc::now(),
        };
        let serialized =
            serde_json::to_vec_pretty(&file).map_err(|e| AuthError::Store(e.to_string()))?;
        atomic_write(&path, &serialized)
    }

    fn clear(&self, provider: &str, profile: &str) -> Result<(), AuthError> {
        let path = self.token_path(provider, profile);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(AuthError::Store(err.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TokenFile {
    version: u32,
    provider: String,
    profile: String,
    token: TokenRecord,
    saved_at: DateTime<Utc>,
}

fn default_token_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "grant")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".grant"))
}

fn atomic_write(path: &Path, data: &[u8]) -> Result<(), AuthError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let file_name = path
        .file_name()
        .ok_or_else(|| AuthError::Store(format!("Token path {} has no file name", path.display())))?;

    let nonce = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let temp_name = format!(
        ".{}.tmp-{}-{nonce}",
        file_name.to_string_lossy(),
        std::process::id()
    );
    let temp_path = path.with_file_name(temp_name);

    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    let write_result = (|| -> std::io::Result<()> {
        let mut temp_file = options.open(&temp_path)?;
        temp_file.write_all(data)?;
        temp_file.sync_all()?;
        Ok(())
    })();

    if let Err(err) = write_result {
        let _ = fs::remove_file(&temp_path);
        return Err(err.into());
    }

    if let Err(err) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(err.into());
    }

    #[cfg(unix)]
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;

    Ok(())
}

fn normalize_label(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return "default".to_string();
    }
    let mut out = String::with_capacity(trimmed.len());
    for ch in trimmed.chars() {
        let lower = ch.to_ascii_lowercase();
        if lower.is_ascii_alphanumeric() || lower == '-' || lower == '_' {
            out.push(lower);
        } else {
            out.push('-');
        }
    }
    if out.trim_matches('-').is_empty() {
        "default".to_string()
    } else {
        out
    }
}
