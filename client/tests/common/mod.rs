//! In-process mock of the marketplace backend.

#![allow(dead_code)]

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::Router;
use parking_lot::Mutex;

use digimart_client::models::{Role, User};
use digimart_client::session::{MemoryCredentialStore, StoredCredentials};
use digimart_client::{AppState, ClientConfig};

/// A request as the backend saw it.
#[derive(Debug, Clone)]
pub struct Call {
    pub method: String,
    pub path: String,
    pub authorization: Option<String>,
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Recorder {
    calls: Arc<Mutex<Vec<Call>>>,
}

impl Recorder {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    /// `"METHOD /path"` for every request, in arrival order.
    pub fn lines(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .map(|c| format!("{} {}", c.method, c.path))
            .collect()
    }

    pub fn count(&self, method: &str, path: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.method == method && c.path == path)
            .count()
    }
}

async fn record(State(recorder): State<Recorder>, req: Request, next: Next) -> Response {
    let call = {
        let header = |name| {
            req.headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        Call {
            method: req.method().to_string(),
            path: req.uri().path().to_string(),
            authorization: header(AUTHORIZATION),
            content_type: header(CONTENT_TYPE),
        }
    };
    recorder.calls.lock().push(call);
    next.run(req).await
}

pub struct MockBackend {
    pub base_url: String,
    pub recorder: Recorder,
}

/// Serve `api` under `/api` on an ephemeral local port.
pub async fn spawn(api: Router) -> MockBackend {
    let recorder = Recorder::default();
    let app = Router::new()
        .nest("/api", api)
        .layer(middleware::from_fn_with_state(recorder.clone(), record));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockBackend {
        base_url: format!("http://{addr}/api"),
        recorder,
    }
}

pub fn user(role: Role) -> User {
    User {
        id: "u-1".into(),
        username: "ana".into(),
        email: Some("ana@example.com".into()),
        role,
    }
}

pub fn logged_in_store(role: Role) -> Arc<MemoryCredentialStore> {
    Arc::new(MemoryCredentialStore::with(StoredCredentials {
        token: "tok-123".into(),
        user: user(role),
    }))
}

/// Application state against the mock, with the session already restored.
pub fn app(backend: &MockBackend, store: Arc<MemoryCredentialStore>) -> AppState {
    let config = ClientConfig {
        api_url: backend.base_url.clone(),
        ..ClientConfig::default()
    };
    let state = AppState::with_store(config, store).unwrap();
    state.session.start();
    state
}
