//! Application state shared across commands
//!
//! Built once at startup and passed by reference. The session manager is the
//! only writer of session state; services and commands only read it.

use std::sync::Arc;

use crate::api::ApiClient;
use crate::config::ClientConfig;
use crate::error::Result;
use crate::events::EventBus;
use crate::media::{MediaUploader, MediaUrlOptimizer};
use crate::services::{SellerService, ShopService, WalletService};
use crate::session::{CredentialStore, FileCredentialStore, SessionManager};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: ClientConfig,
    pub events: EventBus,
    pub api: Arc<ApiClient>,
    pub session: Arc<SessionManager>,
    pub media: MediaUrlOptimizer,
    pub wallet: Arc<WalletService>,
    pub shop: Arc<ShopService>,
    pub seller: Arc<SellerService>,
}

impl AppState {
    /// Wire everything from `config`, persisting the session to its configured file.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let store: Arc<dyn CredentialStore> =
            Arc::new(FileCredentialStore::new(config.session_file.clone()));
        Self::with_store(config, store)
    }

    pub fn with_store(config: ClientConfig, store: Arc<dyn CredentialStore>) -> Result<Self> {
        let events = EventBus::new();
        let api = Arc::new(ApiClient::new(&config.api_url, store.clone())?);
        let session = Arc::new(SessionManager::new(
            api.clone(),
            store,
            events.clone(),
            config.poll_interval,
        ));
        let uploader = config
            .upload_config()
            .map(|upload| Arc::new(MediaUploader::new(upload)));

        let wallet = Arc::new(WalletService::new(
            api.clone(),
            session.clone(),
            uploader,
            config.daily_limits,
        ));
        let shop = Arc::new(ShopService::new(
            api.clone(),
            session.clone(),
            events.clone(),
        ));
        let seller = Arc::new(SellerService::new(api.clone(), session.clone()));

        Ok(Self {
            media: MediaUrlOptimizer::new(config.cloud_name.clone()),
            config,
            events,
            api,
            session,
            wallet,
            shop,
            seller,
        })
    }
}
