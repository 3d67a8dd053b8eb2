//! Authentication endpoints.

use async_trait::async_trait;
use serde_json::Value;

use super::ApiClient;
use crate::error::Result;
use crate::models::parse::{parse_record, value_as_f64};
use crate::models::{AuthResponse, Balance, Credentials, NewAccount};
use crate::session::AuthBackend;

#[async_trait]
impl AuthBackend for ApiClient {
    async fn login(&self, credentials: &Credentials) -> Result<AuthResponse> {
        let body = self.post_json("/auth/login", credentials).await?;
        parse_record(body)
    }

    async fn register(&self, account: &NewAccount) -> Result<()> {
        self.post_json("/auth/register", account).await?;
        Ok(())
    }

    async fn logout(&self) -> Result<()> {
        self.post_empty("/auth/logout").await?;
        Ok(())
    }

    async fn fetch_balance(&self) -> Result<f64> {
        self.balance().await
    }
}

impl ApiClient {
    /// Current wallet balance. Accepts `{"balance": n}` or a bare number.
    pub async fn balance(&self) -> Result<f64> {
        let body = self.get_json("/balance").await?;
        if let Some(n) = value_as_f64(&body) {
            return Ok(n);
        }
        match body {
            Value::Null => Ok(0.0),
            other => Ok(parse_record::<Balance>(other)?.balance),
        }
    }
}
