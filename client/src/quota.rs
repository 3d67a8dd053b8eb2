//! Client-side daily top-up quota
//!
//! Mirrors the backend's daily limits so the user gets immediate feedback.
//! The backend remains the real gate.

use chrono::{Local, NaiveDate};
use serde::Serialize;
use thiserror::Error;

use crate::models::{TopUpRequest, TopUpStatus};

/// Quota violation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QuotaError {
    #[error("Daily request limit reached ({max} pending requests)")]
    RequestLimitReached { max: u32 },
    #[error("Daily amount limit exceeded, remaining allowance today is {remaining:.2}")]
    AmountExceeded { remaining: f64 },
    #[error("Amount must be a positive number")]
    InvalidAmount,
}

/// Daily limits applied to top-up requests
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailyLimitPolicy {
    pub max_amount: f64,
    pub max_requests: u32,
}

impl Default for DailyLimitPolicy {
    fn default() -> Self {
        Self {
            max_amount: 1000.0,
            max_requests: 5,
        }
    }
}

/// How much of today's quota has been consumed
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyUsage {
    pub max_amount: f64,
    pub max_requests: u32,
    pub used_amount: f64,
    pub used_requests: u32,
}

impl DailyUsage {
    /// Usage with nothing consumed. Shown when the request list is empty or failed to load.
    pub fn empty(policy: DailyLimitPolicy) -> Self {
        Self {
            max_amount: policy.max_amount,
            max_requests: policy.max_requests,
            used_amount: 0.0,
            used_requests: 0,
        }
    }

    /// Compute usage for the current local day.
    pub fn compute_today(policy: DailyLimitPolicy, requests: &[TopUpRequest]) -> Self {
        Self::compute_on(policy, requests, Local::now().date_naive())
    }

    /// Compute usage for the local calendar day `today`.
    ///
    /// Amount counts PENDING and APPROVED requests; the request count only
    /// counts PENDING ones. REJECTED requests count toward neither.
    pub fn compute_on(policy: DailyLimitPolicy, requests: &[TopUpRequest], today: NaiveDate) -> Self {
        let mut usage = Self::empty(policy);

        for request in requests
            .iter()
            .filter(|r| r.created_at.with_timezone(&Local).date_naive() == today)
        {
            match request.status {
                TopUpStatus::Pending => {
                    usage.used_amount += request.amount;
                    usage.used_requests += 1;
                }
                TopUpStatus::Approved => usage.used_amount += request.amount,
                TopUpStatus::Rejected | TopUpStatus::Unknown => {}
            }
        }

        usage
    }

    /// Amount that can still be requested today. Never negative.
    pub fn remaining_amount(&self) -> f64 {
        (self.max_amount - self.used_amount).max(0.0)
    }

    pub fn remaining_requests(&self) -> u32 {
        self.max_requests.saturating_sub(self.used_requests)
    }

    /// Pre-flight check for a new request of `amount`.
    pub fn check(&self, amount: f64) -> Result<(), QuotaError> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(QuotaError::InvalidAmount);
        }
        if self.used_requests >= self.max_requests {
            return Err(QuotaError::RequestLimitReached {
                max: self.max_requests,
            });
        }
        if self.used_amount + amount > self.max_amount {
            return Err(QuotaError::AmountExceeded {
                remaining: self.remaining_amount(),
            });
        }
        Ok(())
    }
}
