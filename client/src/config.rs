//! Client configuration from environment variables.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{ClientError, Result};
use crate::media::UploadConfig;
use crate::quota::DailyLimitPolicy;
use crate::session::{FileCredentialStore, DEFAULT_POLL_INTERVAL};

pub const DEFAULT_API_URL: &str = "http://localhost:5000/api";

/// Runtime configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: String,
    pub cloud_name: String,
    /// Unsigned upload preset; uploads go through the backend when unset.
    pub upload_preset: Option<String>,
    pub upload_folder: String,
    pub session_file: PathBuf,
    pub poll_interval: Duration,
    pub daily_limits: DailyLimitPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            cloud_name: "digimart".to_string(),
            upload_preset: None,
            upload_folder: "receipts".to_string(),
            session_file: FileCredentialStore::default_path()
                .unwrap_or_else(|| PathBuf::from(".digimart-session.json")),
            poll_interval: DEFAULT_POLL_INTERVAL,
            daily_limits: DailyLimitPolicy::default(),
        }
    }
}

impl ClientConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`, falling back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let poll_secs: u64 = parse_var(&get, "DIGIMART_SESSION_POLL_SECS")?
            .unwrap_or(defaults.poll_interval.as_secs());
        if poll_secs == 0 {
            return Err(ClientError::Config(
                "DIGIMART_SESSION_POLL_SECS must be greater than zero".into(),
            ));
        }

        let max_amount: f64 = parse_var(&get, "DIGIMART_TOPUP_MAX_DAILY_AMOUNT")?
            .unwrap_or(defaults.daily_limits.max_amount);
        if !max_amount.is_finite() || max_amount <= 0.0 {
            return Err(ClientError::Config(
                "DIGIMART_TOPUP_MAX_DAILY_AMOUNT must be a positive number".into(),
            ));
        }
        let max_requests: u32 = parse_var(&get, "DIGIMART_TOPUP_MAX_DAILY_REQUESTS")?
            .unwrap_or(defaults.daily_limits.max_requests);

        Ok(Self {
            api_url: get("DIGIMART_API_URL").unwrap_or(defaults.api_url),
            cloud_name: get("CLOUDINARY_CLOUD_NAME").unwrap_or(defaults.cloud_name),
            upload_preset: get("CLOUDINARY_UPLOAD_PRESET"),
            upload_folder: get("CLOUDINARY_FOLDER").unwrap_or(defaults.upload_folder),
            session_file: get("DIGIMART_SESSION_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.session_file),
            poll_interval: Duration::from_secs(poll_secs),
            daily_limits: DailyLimitPolicy {
                max_amount,
                max_requests,
            },
        })
    }

    /// Upload settings, when an upload preset is configured.
    pub fn upload_config(&self) -> Option<UploadConfig> {
        self.upload_preset.as_ref().map(|preset| UploadConfig {
            cloud_name: self.cloud_name.clone(),
            upload_preset: preset.clone(),
            folder: self.upload_folder.clone(),
        })
    }
}

fn parse_var<T, G>(get: &G, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    get(key)
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|e| ClientError::Config(format!("{key}={raw}: {e}")))
        })
        .transpose()
}
