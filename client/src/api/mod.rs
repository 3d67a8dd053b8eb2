//! REST client for the DigiMart backend
//!
//! JSON over HTTPS with a bearer token read from the credential store on
//! every request. Response bodies are sniffed before parsing: an HTML error
//! page where JSON was expected becomes [`ClientError::UnexpectedResponse`],
//! which list fetches turn into an empty list.

use std::sync::Arc;

use reqwest::header::AUTHORIZATION;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{ClientError, Result};
use crate::models::parse::parse_list;
use crate::session::CredentialStore;

mod auth;
mod seller;
mod shop;
mod wallet;

/// Backend API client
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    store: Arc<dyn CredentialStore>,
}

impl ApiClient {
    /// Create a client for `base_url` (e.g. `https://api.digimart.example/api`).
    pub fn new(base_url: &str, store: Arc<dyn CredentialStore>) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/');
        if base_url.is_empty() {
            return Err(ClientError::Config("API base URL is empty".into()));
        }
        url::Url::parse(base_url)
            .map_err(|e| ClientError::Config(format!("Invalid API base URL '{base_url}': {e}")))?;

        let http = reqwest::Client::builder()
            .user_agent(concat!("digimart-client/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.to_string(),
            store,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Start a request, attaching the cached bearer token if there is one.
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method, self.url(path));
        match self.store.token() {
            Some(token) if !token.is_empty() => {
                builder.header(AUTHORIZATION, format!("Bearer {token}"))
            }
            _ => builder,
        }
    }

    async fn execute(&self, builder: RequestBuilder) -> Result<Value> {
        let resp = builder.send().await?;
        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            let err = error_from_response(status, &body);
            tracing::warn!(status = status.as_u16(), error = %err, "Backend request failed");
            return Err(err);
        }
        sniff_json(&body)
    }

    pub(crate) async fn get_json(&self, path: &str) -> Result<Value> {
        self.execute(self.request(Method::GET, path)).await
    }

    pub(crate) async fn get_json_with_query<Q: Serialize + ?Sized>(
        &self,
        path: &str,
        query: &Q,
    ) -> Result<Value> {
        self.execute(self.request(Method::GET, path).query(query))
            .await
    }

    pub(crate) async fn post_json<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Value> {
        self.execute(self.request(Method::POST, path).json(body))
            .await
    }

    pub(crate) async fn post_empty(&self, path: &str) -> Result<Value> {
        self.execute(self.request(Method::POST, path)).await
    }

    pub(crate) async fn post_multipart(
        &self,
        path: &str,
        form: reqwest::multipart::Form,
    ) -> Result<Value> {
        self.execute(self.request(Method::POST, path).multipart(form))
            .await
    }

    pub(crate) async fn delete(&self, path: &str) -> Result<Value> {
        self.execute(self.request(Method::DELETE, path)).await
    }

    /// Fetch a list; a non-JSON body yields an empty list instead of an error.
    pub(crate) async fn fetch_list<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>> {
        list_or_empty(path, self.get_json(path).await)
    }

    pub(crate) async fn fetch_list_with_query<T, Q>(&self, path: &str, query: &Q) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        list_or_empty(path, self.get_json_with_query(path, query).await)
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

fn list_or_empty<T: DeserializeOwned>(path: &str, body: Result<Value>) -> Result<Vec<T>> {
    match body.and_then(parse_list) {
        Err(ClientError::UnexpectedResponse(detail)) => {
            tracing::warn!(path, %detail, "Unexpected list response, showing empty result");
            Ok(Vec::new())
        }
        other => other,
    }
}

/// Parse a success body as JSON. Empty bodies are `null`.
pub(crate) fn sniff_json(body: &str) -> Result<Value> {
    let trimmed = body.trim_start();
    if trimmed.is_empty() {
        return Ok(Value::Null);
    }
    if trimmed.starts_with('<') {
        return Err(ClientError::UnexpectedResponse(
            "received an HTML page where JSON was expected".into(),
        ));
    }
    serde_json::from_str(trimmed).map_err(|e| ClientError::UnexpectedResponse(e.to_string()))
}

/// Map a failed response to an error, keeping the backend's message if it sent one.
pub(crate) fn error_from_response(status: StatusCode, body: &str) -> ClientError {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            ["message", "error"]
                .iter()
                .find_map(|key| v.get(*key).and_then(Value::as_str).map(str::to_string))
        })
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown").to_string());

    match status {
        StatusCode::UNAUTHORIZED => ClientError::Unauthorized,
        StatusCode::FORBIDDEN => ClientError::Forbidden(message),
        _ => ClientError::Api {
            status: status.as_u16(),
            message,
        },
    }
}
