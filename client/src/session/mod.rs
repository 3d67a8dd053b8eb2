//! Session state: who is logged in, and whether the cached token still holds.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{AuthResponse, Credentials, NewAccount};

pub mod manager;
pub mod store;

pub use manager::{SessionManager, SessionState, DEFAULT_POLL_INTERVAL};
pub use store::{
    token_is_valid, CredentialStore, FileCredentialStore, MemoryCredentialStore,
    StoredCredentials,
};

/// The remote side of authentication.
///
/// Implemented by [`crate::api::ApiClient`]; tests substitute their own.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    async fn login(&self, credentials: &Credentials) -> Result<AuthResponse>;
    async fn register(&self, account: &NewAccount) -> Result<()>;
    async fn logout(&self) -> Result<()>;
    async fn fetch_balance(&self) -> Result<f64>;
}
