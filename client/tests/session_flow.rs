//! Session lifecycle with the periodic token check under paused time.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};

use digimart_client::models::{AuthResponse, Credentials, NewAccount, Role, User};
use digimart_client::session::{
    AuthBackend, CredentialStore, FileCredentialStore, MemoryCredentialStore, SessionManager,
    StoredCredentials,
};
use digimart_client::{ClientError, EventBus, EventName, Result};

const POLL: Duration = Duration::from_secs(30);

struct StubBackend {
    balance: f64,
    balance_calls: AtomicUsize,
}

impl StubBackend {
    fn new(balance: f64) -> Arc<Self> {
        Arc::new(Self {
            balance,
            balance_calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl AuthBackend for StubBackend {
    async fn login(&self, credentials: &Credentials) -> Result<AuthResponse> {
        if credentials.password != "hunter22" {
            return Err(ClientError::Api {
                status: 400,
                message: "Invalid credentials".into(),
            });
        }
        Ok(AuthResponse {
            token: token_expiring_in(3600),
            user: user(),
        })
    }

    async fn register(&self, _account: &NewAccount) -> Result<()> {
        Ok(())
    }

    async fn logout(&self) -> Result<()> {
        Ok(())
    }

    async fn fetch_balance(&self) -> Result<f64> {
        self.balance_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.balance)
    }
}

fn user() -> User {
    User {
        id: "42".into(),
        username: "bo".into(),
        email: None,
        role: Role::User,
    }
}

fn token_expiring_in(secs: i64) -> String {
    let exp = chrono::Utc::now().timestamp() + secs;
    encode(
        &Header::default(),
        &json!({ "sub": "42", "exp": exp }),
        &EncodingKey::from_secret(b"test-secret"),
    )
    .unwrap()
}

fn cached(token: String) -> StoredCredentials {
    StoredCredentials { token, user: user() }
}

#[tokio::test(start_paused = true)]
async fn restored_session_stays_quiet_until_store_is_cleared() {
    let store = Arc::new(MemoryCredentialStore::with(cached(token_expiring_in(3600))));
    let manager = SessionManager::new(StubBackend::new(0.0), store.clone(), EventBus::new(), POLL);
    let mut rx = manager.watch();
    assert!(rx.borrow().is_loading);

    manager.start();
    assert!(rx.has_changed().unwrap());
    {
        let state = rx.borrow_and_update();
        assert!(!state.is_loading);
        assert!(state.is_authenticated);
        assert_eq!(state.user.as_ref().map(|u| u.id.as_str()), Some("42"));
    }
    assert!(manager.is_polling());

    // Several checks pass without anything changing.
    tokio::time::sleep(POLL * 3 + Duration::from_secs(5)).await;
    assert!(!rx.has_changed().unwrap());
    assert!(manager.is_authenticated());

    // Another process logs out.
    store.clear().unwrap();
    tokio::time::sleep(POLL).await;

    assert!(rx.has_changed().unwrap());
    let state = rx.borrow_and_update().clone();
    assert!(!state.is_loading);
    assert!(!state.is_authenticated);
    assert!(state.user.is_none());
    assert!(!manager.is_polling());
}

#[tokio::test(start_paused = true)]
async fn expired_token_is_not_restored() {
    let store = Arc::new(MemoryCredentialStore::with(cached(token_expiring_in(-60))));
    let manager = SessionManager::new(StubBackend::new(0.0), store, EventBus::new(), POLL);

    manager.start();
    let state = manager.state();
    assert!(!state.is_loading);
    assert!(!state.is_authenticated);
    assert!(!manager.is_polling());
}

#[tokio::test(start_paused = true)]
async fn session_ending_with_balance_announces_zero() {
    let store = Arc::new(MemoryCredentialStore::with(cached(token_expiring_in(3600))));
    let events = EventBus::new();
    let seen: Arc<parking_lot::Mutex<Vec<Value>>> = Arc::default();
    {
        let seen = seen.clone();
        events.subscribe(
            EventName::BalanceChanged,
            Arc::new(move |args: &[Value]| seen.lock().extend_from_slice(args)),
        );
    }
    let backend = StubBackend::new(25.0);
    let manager = SessionManager::new(backend.clone(), store.clone(), events, POLL);
    manager.start();

    assert_eq!(manager.refresh_balance().await.unwrap(), Some(25.0));
    assert_eq!(manager.state().balance, 25.0);

    store.clear().unwrap();
    tokio::time::sleep(POLL + Duration::from_secs(1)).await;

    assert_eq!(manager.state().balance, 0.0);
    assert_eq!(*seen.lock(), vec![json!(25.0), json!(0.0)]);
    assert_eq!(manager.refresh_balance().await.unwrap(), None);
    assert_eq!(backend.balance_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn file_store_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("session.json");

    let first = SessionManager::new(
        StubBackend::new(0.0),
        Arc::new(FileCredentialStore::new(&path)),
        EventBus::new(),
        POLL,
    );
    first.start();
    assert!(!first.is_authenticated());

    let err = first
        .login(&Credentials {
            email: "bo@example.com".into(),
            password: "wrong".into(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Api { status: 400, .. }));
    assert!(!path.exists());

    first
        .login(&Credentials {
            email: "bo@example.com".into(),
            password: "hunter22".into(),
        })
        .await
        .unwrap();
    assert!(path.exists());
    drop(first);

    let second = SessionManager::new(
        StubBackend::new(0.0),
        Arc::new(FileCredentialStore::new(&path)),
        EventBus::new(),
        POLL,
    );
    second.start();
    assert!(second.is_authenticated());
    assert_eq!(second.current_user(), Some(user()));

    second.logout().await;
    assert!(!path.exists());
    assert!(!second.is_authenticated());
}
