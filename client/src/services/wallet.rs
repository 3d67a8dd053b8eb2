//! Wallet service: balance, payment methods and top-up requests
//!
//! Wraps the balance endpoints with the client-side daily quota so that a
//! request which would obviously be refused never leaves the device.

use std::sync::Arc;

use parking_lot::Mutex;
use validator::Validate;

use crate::api::ApiClient;
use crate::error::Result;
use crate::media::{ImageFile, MediaUploader};
use crate::models::{PaymentMethod, TopUpForm, TopUpRequest, TopUpWithReceiptUrl, Transaction};
use crate::quota::{DailyLimitPolicy, DailyUsage};
use crate::resource::Resource;
use crate::session::SessionManager;

/// Everything the balance page shows
#[derive(Debug, Clone)]
pub struct WalletOverview {
    pub balance: Resource<f64>,
    pub payment_methods: Resource<Vec<PaymentMethod>>,
    pub requests: Resource<Vec<TopUpRequest>>,
    pub usage: DailyUsage,
}

/// Result of a successful top-up submission
#[derive(Debug, Clone)]
pub struct TopUpOutcome {
    pub request: TopUpRequest,
    pub usage: DailyUsage,
}

/// Wallet service
pub struct WalletService {
    api: Arc<ApiClient>,
    session: Arc<SessionManager>,
    uploader: Option<Arc<MediaUploader>>,
    policy: DailyLimitPolicy,
    usage: Mutex<Option<DailyUsage>>,
}

impl WalletService {
    /// Create a new wallet service
    ///
    /// Without an uploader, receipts are sent to the backend as multipart form data.
    pub fn new(
        api: Arc<ApiClient>,
        session: Arc<SessionManager>,
        uploader: Option<Arc<MediaUploader>>,
        policy: DailyLimitPolicy,
    ) -> Self {
        Self {
            api,
            session,
            uploader,
            policy,
            usage: Mutex::new(None),
        }
    }

    pub fn policy(&self) -> DailyLimitPolicy {
        self.policy
    }

    /// Last computed quota usage, if any.
    pub fn usage(&self) -> Option<DailyUsage> {
        *self.usage.lock()
    }

    /// Load the balance page
    ///
    /// Balance, payment methods and requests are fetched concurrently; each
    /// one fails independently.
    ///
    /// # Returns
    /// The overview with today's quota usage recomputed from the fetched requests
    pub async fn overview(&self) -> WalletOverview {
        let (balance, methods, requests) = tokio::join!(
            self.session.refresh_balance(),
            self.api.payment_methods(),
            self.api.top_up_requests(),
        );

        let balance = match balance {
            Ok(Some(balance)) => Resource::Ready(balance),
            Ok(None) => Resource::Failed("Please log in to see your balance.".to_string()),
            Err(e) => Resource::from_result(Err(e)),
        };
        let requests = Resource::from_result(requests);
        let usage = self.record_usage(requests.ready().map(Vec::as_slice));

        WalletOverview {
            balance,
            payment_methods: Resource::from_result(methods),
            requests,
            usage,
        }
    }

    /// Re-fetch today's requests and recompute usage. Fails open to zero usage.
    pub async fn refresh_usage(&self) -> DailyUsage {
        match self.api.top_up_requests().await {
            Ok(requests) => self.record_usage(Some(&requests)),
            Err(e) => {
                tracing::warn!(error = %e, "Could not load top-up requests, assuming no usage");
                self.record_usage(None)
            }
        }
    }

    pub async fn transactions(&self) -> Result<Vec<Transaction>> {
        self.api.transactions().await
    }

    /// Submit a top-up request
    ///
    /// # Arguments
    /// * `form` - Amount and payment method
    /// * `receipt` - Proof of the external payment
    ///
    /// # Errors
    /// Validation, quota and file errors are returned before any network write.
    /// The request list is re-fetched only after the submission completed.
    pub async fn submit_top_up(&self, form: TopUpForm, receipt: ImageFile) -> Result<TopUpOutcome> {
        form.validate()?;
        receipt.validate()?;

        let usage = match self.usage() {
            Some(usage) => usage,
            None => self.refresh_usage().await,
        };
        usage.check(form.amount)?;

        let request = match &self.uploader {
            Some(uploader) => {
                let uploaded = uploader.upload(receipt).await?;
                self.api
                    .submit_top_up_with_receipt_url(&TopUpWithReceiptUrl {
                        amount: form.amount,
                        payment_method_id: form.payment_method_id.clone(),
                        receipt_url: uploaded.secure_url,
                    })
                    .await?
            }
            None => {
                self.api
                    .submit_top_up(form.amount, &form.payment_method_id, receipt)
                    .await?
            }
        };
        tracing::info!(request = %request.id, amount = form.amount, "Top-up request submitted");

        let usage = self.refresh_usage().await;
        Ok(TopUpOutcome { request, usage })
    }

    fn record_usage(&self, requests: Option<&[TopUpRequest]>) -> DailyUsage {
        let usage = match requests {
            Some(requests) => DailyUsage::compute_today(self.policy, requests),
            None => DailyUsage::empty(self.policy),
        };
        *self.usage.lock() = Some(usage);
        usage
    }
}
