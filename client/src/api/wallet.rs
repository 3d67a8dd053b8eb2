//! Balance, transactions and top-up endpoints.

use reqwest::multipart::{Form, Part};

use super::ApiClient;
use crate::error::Result;
use crate::media::ImageFile;
use crate::models::parse::parse_record;
use crate::models::{PaymentMethod, TopUpRequest, TopUpWithReceiptUrl, Transaction};

impl ApiClient {
    pub async fn transactions(&self) -> Result<Vec<Transaction>> {
        self.fetch_list("/balance/transactions").await
    }

    /// The user's recent top-up requests.
    pub async fn top_up_requests(&self) -> Result<Vec<TopUpRequest>> {
        self.fetch_list("/balance/requests").await
    }

    pub async fn payment_methods(&self) -> Result<Vec<PaymentMethod>> {
        self.fetch_list("/payment-methods").await
    }

    /// Submit a top-up request with the receipt attached as multipart form data.
    pub async fn submit_top_up(
        &self,
        amount: f64,
        payment_method_id: &str,
        receipt: ImageFile,
    ) -> Result<TopUpRequest> {
        let part = Part::bytes(receipt.bytes)
            .file_name(receipt.file_name)
            .mime_str(&receipt.content_type)?;
        let form = Form::new()
            .text("amount", amount.to_string())
            .text("paymentMethodId", payment_method_id.to_string())
            .part("receipt", part);

        let body = self.post_multipart("/balance/requests", form).await?;
        parse_record(body)
    }

    /// Submit a top-up request whose receipt is already on the media host.
    pub async fn submit_top_up_with_receipt_url(
        &self,
        request: &TopUpWithReceiptUrl,
    ) -> Result<TopUpRequest> {
        let body = self
            .post_json("/balance/requests/cloudinary", request)
            .await?;
        parse_record(body)
    }
}
