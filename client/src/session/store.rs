//! Local credential persistence
//!
//! Holds the auth token and the serialized user record under fixed keys,
//! read synchronously at startup and written/cleared on login/logout.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::Utc;
use jsonwebtoken::{decode, DecodingKey, Validation};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, Result};
use crate::models::User;

/// What is kept on the device between runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredCredentials {
    #[serde(rename = "authToken")]
    pub token: String,
    pub user: User,
}

impl StoredCredentials {
    /// A session is usable while the token is present and not past its `exp`.
    pub fn is_valid(&self) -> bool {
        token_is_valid(&self.token)
    }
}

/// Synchronous key/value persistence for the session.
pub trait CredentialStore: Send + Sync {
    fn load(&self) -> Option<StoredCredentials>;
    fn save(&self, credentials: &StoredCredentials) -> Result<()>;
    fn clear(&self) -> Result<()>;

    /// Credentials that are present and still valid.
    fn load_valid(&self) -> Option<StoredCredentials> {
        self.load().filter(StoredCredentials::is_valid)
    }

    fn token(&self) -> Option<String> {
        self.load().map(|c| c.token)
    }
}

#[derive(Debug, Deserialize)]
struct ExpiryClaims {
    exp: Option<i64>,
}

/// Token validity check.
///
/// Opaque tokens are valid while non-empty. JWTs are additionally checked
/// against their `exp` claim; the signature is not verified, that is the
/// backend's job.
pub fn token_is_valid(token: &str) -> bool {
    let token = token.trim();
    if token.is_empty() {
        return false;
    }
    if token.split('.').count() != 3 {
        return true;
    }

    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims = HashSet::new();

    match decode::<ExpiryClaims>(token, &DecodingKey::from_secret(&[]), &validation) {
        Ok(data) => match data.claims.exp {
            Some(exp) => exp > Utc::now().timestamp(),
            None => true,
        },
        Err(e) => {
            tracing::debug!(error = %e, "Cached token is not a readable JWT");
            false
        }
    }
}

/// JSON file store, by default `~/.digimart/session.json`.
#[derive(Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".digimart").join("session.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Option<StoredCredentials> {
        let raw = std::fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str(&raw) {
            Ok(credentials) => Some(credentials),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Ignoring unreadable session file");
                None
            }
        }
    }

    fn save(&self, credentials: &StoredCredentials) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)
                .map_err(|e| ClientError::Storage(format!("{}: {e}", dir.display())))?;
        }
        let json = serde_json::to_string_pretty(credentials)?;
        std::fs::write(&self.path, json)
            .map_err(|e| ClientError::Storage(format!("{}: {e}", self.path.display())))
    }

    fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ClientError::Storage(format!(
                "{}: {e}",
                self.path.display()
            ))),
        }
    }
}

/// In-memory store for tests and throwaway sessions.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    slot: Mutex<Option<StoredCredentials>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(credentials: StoredCredentials) -> Self {
        Self {
            slot: Mutex::new(Some(credentials)),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Option<StoredCredentials> {
        self.slot.lock().clone()
    }

    fn save(&self, credentials: &StoredCredentials) -> Result<()> {
        *self.slot.lock() = Some(credentials.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.slot.lock() = None;
        Ok(())
    }
}
