//! Session manager and background token check
//!
//! The manager is the only writer of [`SessionState`]; everything else reads
//! it through a `watch` receiver. Writes only notify readers when the state
//! actually changed.

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use validator::Validate;

use super::store::{CredentialStore, StoredCredentials};
use super::AuthBackend;
use crate::error::{ClientError, Result};
use crate::events::{EventBus, EventName};
use crate::models::{Credentials, NewAccount, User};

/// How often the cached token is re-checked while logged in.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// UI-visible session state
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub is_loading: bool,
    pub is_authenticated: bool,
    pub user: Option<User>,
    pub balance: f64,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            is_loading: true,
            is_authenticated: false,
            user: None,
            balance: 0.0,
        }
    }
}

struct Inner {
    backend: Arc<dyn AuthBackend>,
    store: Arc<dyn CredentialStore>,
    events: EventBus,
    poll_interval: Duration,
    state: watch::Sender<SessionState>,
    poller: Mutex<Option<JoinHandle<()>>>,
}

/// Owns the session and its background check.
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    pub fn new(
        backend: Arc<dyn AuthBackend>,
        store: Arc<dyn CredentialStore>,
        events: EventBus,
        poll_interval: Duration,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::default());
        Self {
            inner: Arc::new(Inner {
                backend,
                store,
                events,
                poll_interval,
                state,
                poller: Mutex::new(None),
            }),
        }
    }

    /// Read cached credentials and settle the initial state.
    ///
    /// Loading always ends here, whether or not a session was found. When
    /// authenticated, the periodic check is started.
    pub fn start(&self) {
        let cached = self.inner.store.load_valid();
        let authenticated = cached.is_some();
        self.inner.update(|s| {
            s.is_loading = false;
            s.is_authenticated = authenticated;
            s.user = cached.map(|c| c.user);
            if !authenticated {
                s.balance = 0.0;
            }
        });

        if authenticated {
            info!("Restored cached session");
            self.inner.spawn_poller();
        } else {
            debug!("No cached session");
        }
    }

    /// Re-check the cached token once. Returns whether a session is active.
    pub fn check_now(&self) -> bool {
        self.inner.check()
    }

    pub async fn login(&self, credentials: &Credentials) -> Result<User> {
        credentials.validate()?;
        let auth = self.inner.backend.login(credentials).await?;

        self.inner.store.save(&StoredCredentials {
            token: auth.token,
            user: auth.user.clone(),
        })?;
        let user = auth.user;
        self.inner.update(|s| {
            s.is_loading = false;
            s.is_authenticated = true;
            s.user = Some(user.clone());
        });
        self.inner.spawn_poller();

        info!(user = %user.username, role = ?user.role, "Logged in");
        Ok(user)
    }

    /// Register, then log in with the same credentials.
    pub async fn register(&self, account: &NewAccount) -> Result<User> {
        account.validate()?;
        self.inner.backend.register(account).await?;
        info!(user = %account.username, "Account registered");
        self.login(&account.credentials()).await
    }

    /// Log out. Local state is cleared even if the backend call fails.
    pub async fn logout(&self) {
        if let Err(e) = self.inner.backend.logout().await {
            warn!(error = %e, "Backend logout failed, clearing local session anyway");
        }
        self.inner.end_session();
        info!("Logged out");
    }

    /// Fetch the balance and announce it on the event bus.
    ///
    /// Returns `Ok(None)` without a request when nobody is logged in. A result
    /// that arrives after the session ended is discarded.
    pub async fn refresh_balance(&self) -> Result<Option<f64>> {
        if !self.is_authenticated() {
            return Ok(None);
        }

        let balance = match self.inner.backend.fetch_balance().await {
            Ok(balance) => balance,
            Err(ClientError::Unauthorized) => {
                warn!("Balance fetch rejected, session is no longer valid");
                self.inner.end_session();
                return Err(ClientError::Unauthorized);
            }
            Err(e) => return Err(e),
        };

        if !self.is_authenticated() {
            debug!("Session ended while fetching balance, discarding result");
            return Ok(None);
        }

        self.inner.update(|s| s.balance = balance);
        self.inner
            .events
            .publish(&EventName::BalanceChanged, &[json!(balance)]);
        Ok(Some(balance))
    }

    pub fn state(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    /// Receiver that is notified on every state change.
    pub fn watch(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.state.borrow().is_authenticated
    }

    pub fn current_user(&self) -> Option<User> {
        self.inner.state.borrow().user.clone()
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    /// Whether the periodic check is currently scheduled.
    pub fn is_polling(&self) -> bool {
        self.inner
            .poller
            .lock()
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }
}

impl Inner {
    /// Apply `f` and notify readers only if the state changed.
    fn update<F: FnOnce(&mut SessionState)>(&self, f: F) -> bool {
        self.state.send_if_modified(|state| {
            let before = state.clone();
            f(state);
            *state != before
        })
    }

    fn check(self: &Arc<Self>) -> bool {
        let cached = self.store.load_valid();
        let was_authenticated = self.state.borrow().is_authenticated;

        match cached {
            None if was_authenticated => {
                info!("Cached session token is no longer valid");
                self.end_session();
                false
            }
            None => false,
            Some(credentials) => {
                self.update(|s| {
                    s.is_loading = false;
                    s.is_authenticated = true;
                    s.user = Some(credentials.user);
                });
                if !was_authenticated {
                    info!("Session appeared in local store");
                    self.spawn_poller();
                }
                true
            }
        }
    }

    /// Clear the store, stop the check, and reset derived state.
    fn end_session(&self) {
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Failed to clear cached credentials");
        }
        self.stop_poller();

        let had_balance = self.state.borrow().balance != 0.0;
        self.update(|s| {
            s.is_loading = false;
            s.is_authenticated = false;
            s.user = None;
            s.balance = 0.0;
        });
        if had_balance {
            self.events
                .publish(&EventName::BalanceChanged, &[json!(0.0)]);
        }
    }

    fn spawn_poller(self: &Arc<Self>) {
        let mut slot = self.poller.lock();
        if slot.as_ref().is_some_and(|h| !h.is_finished()) {
            return;
        }

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!("No async runtime available, session will not be re-checked");
                return;
            }
        };

        let weak: Weak<Inner> = Arc::downgrade(self);
        let period = self.poll_interval;
        *slot = Some(runtime.spawn(async move {
            let mut timer = tokio::time::interval(period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            timer.tick().await; // Skip first immediate tick

            loop {
                timer.tick().await;
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                if !inner.check() {
                    debug!("Session check task stopping");
                    return;
                }
            }
        }));
    }

    fn stop_poller(&self) {
        if let Some(handle) = self.poller.lock().take() {
            handle.abort();
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(handle) = self.poller.get_mut().take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AuthResponse, Role};
    use crate::session::MemoryCredentialStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeBackend {
        fail_login: AtomicBool,
        fail_logout: AtomicBool,
        logins: AtomicUsize,
        registrations: AtomicUsize,
    }

    fn user() -> User {
        User {
            id: "7".into(),
            username: "kim".into(),
            email: Some("kim@example.com".into()),
            role: Role::User,
        }
    }

    #[async_trait]
    impl AuthBackend for FakeBackend {
        async fn login(&self, _credentials: &Credentials) -> Result<AuthResponse> {
            self.logins.fetch_add(1, Ordering::SeqCst);
            if self.fail_login.load(Ordering::SeqCst) {
                return Err(ClientError::Api {
                    status: 400,
                    message: "Invalid credentials".into(),
                });
            }
            Ok(AuthResponse {
                token: "opaque-token".into(),
                user: user(),
            })
        }

        async fn register(&self, _account: &NewAccount) -> Result<()> {
            self.registrations.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn logout(&self) -> Result<()> {
            if self.fail_logout.load(Ordering::SeqCst) {
                return Err(ClientError::UnexpectedResponse("<html>".into()));
            }
            Ok(())
        }

        async fn fetch_balance(&self) -> Result<f64> {
            Ok(125.5)
        }
    }

    fn manager(
        backend: Arc<FakeBackend>,
        store: Arc<MemoryCredentialStore>,
    ) -> SessionManager {
        SessionManager::new(backend, store, EventBus::new(), DEFAULT_POLL_INTERVAL)
    }

    fn credentials() -> Credentials {
        Credentials {
            email: "kim@example.com".into(),
            password: "hunter22".into(),
        }
    }

    #[test]
    fn start_without_cache_finishes_loading_unauthenticated() {
        let m = manager(Arc::default(), Arc::default());
        assert!(m.state().is_loading);

        m.start();

        let state = m.state();
        assert!(!state.is_loading);
        assert!(!state.is_authenticated);
        assert!(state.user.is_none());
        assert!(!m.is_polling());
    }

    #[tokio::test]
    async fn login_persists_and_authenticates() {
        let store = Arc::new(MemoryCredentialStore::new());
        let m = manager(Arc::default(), store.clone());
        m.start();

        let user = m.login(&credentials()).await.unwrap();

        assert_eq!(user.username, "kim");
        assert!(m.is_authenticated());
        assert!(m.is_polling());
        assert_eq!(store.token().as_deref(), Some("opaque-token"));
    }

    #[tokio::test]
    async fn login_failure_propagates_unchanged() {
        let backend = Arc::new(FakeBackend::default());
        backend.fail_login.store(true, Ordering::SeqCst);
        let m = manager(backend, Arc::default());
        m.start();

        let err = m.login(&credentials()).await.unwrap_err();

        assert!(matches!(err, ClientError::Api { status: 400, ref message } if message == "Invalid credentials"));
        assert!(!m.is_authenticated());
    }

    #[tokio::test]
    async fn invalid_form_never_reaches_backend() {
        let backend = Arc::new(FakeBackend::default());
        let m = manager(backend.clone(), Arc::default());

        let err = m
            .login(&Credentials {
                email: String::new(),
                password: "x".into(),
            })
            .await
            .unwrap_err();

        assert!(err.is_validation());
        assert_eq!(backend.logins.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn register_then_logs_in() {
        let backend = Arc::new(FakeBackend::default());
        let m = manager(backend.clone(), Arc::default());

        m.register(&NewAccount {
            username: "kim".into(),
            email: "kim@example.com".into(),
            password: "hunter22".into(),
        })
        .await
        .unwrap();

        assert_eq!(backend.registrations.load(Ordering::SeqCst), 1);
        assert_eq!(backend.logins.load(Ordering::SeqCst), 1);
        assert!(m.is_authenticated());
    }

    #[tokio::test]
    async fn logout_clears_even_when_backend_fails() {
        let backend = Arc::new(FakeBackend::default());
        backend.fail_logout.store(true, Ordering::SeqCst);
        let store = Arc::new(MemoryCredentialStore::new());
        let m = manager(backend, store.clone());
        m.login(&credentials()).await.unwrap();
        m.refresh_balance().await.unwrap();

        m.logout().await;

        let state = m.state();
        assert!(!state.is_authenticated);
        assert!(state.user.is_none());
        assert_eq!(state.balance, 0.0);
        assert!(store.load().is_none());
        assert!(!m.is_polling());
    }

    #[tokio::test]
    async fn refresh_balance_requires_session() {
        let m = manager(Arc::default(), Arc::default());
        m.start();
        assert_eq!(m.refresh_balance().await.unwrap(), None);
    }

    #[tokio::test]
    async fn refresh_balance_publishes_event() {
        let m = manager(Arc::default(), Arc::default());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        m.events().subscribe(
            EventName::BalanceChanged,
            Arc::new(move |args: &[serde_json::Value]| sink.lock().push(args[0].clone())),
        );
        m.login(&credentials()).await.unwrap();

        assert_eq!(m.refresh_balance().await.unwrap(), Some(125.5));

        assert_eq!(m.state().balance, 125.5);
        assert_eq!(*seen.lock(), vec![json!(125.5)]);
    }

    #[test]
    fn check_picks_up_externally_stored_session() {
        let store = Arc::new(MemoryCredentialStore::new());
        let m = manager(Arc::default(), store.clone());
        m.start();
        assert!(!m.check_now());

        store
            .save(&StoredCredentials {
                token: "tok".into(),
                user: user(),
            })
            .unwrap();

        assert!(m.check_now());
        assert_eq!(m.current_user(), Some(user()));
    }
}
