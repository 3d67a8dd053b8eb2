//! Seller dashboard service.

use std::sync::Arc;

use validator::Validate;

use crate::api::ApiClient;
use crate::error::{ClientError, Result};
use crate::models::{NewProduct, Order, Product, ProductSubmission, SellerDashboard};
use crate::session::SessionManager;
use crate::stock::{StockBlock, StockMode};

/// Seller service
pub struct SellerService {
    api: Arc<ApiClient>,
    session: Arc<SessionManager>,
}

impl SellerService {
    pub fn new(api: Arc<ApiClient>, session: Arc<SessionManager>) -> Self {
        Self { api, session }
    }

    pub async fn dashboard(&self) -> Result<SellerDashboard> {
        self.require_seller()?;
        self.api.seller_dashboard().await
    }

    pub async fn products(&self) -> Result<Vec<Product>> {
        self.require_seller()?;
        self.api.seller_products().await
    }

    pub async fn orders(&self) -> Result<Vec<Order>> {
        self.require_seller()?;
        self.api.seller_orders().await
    }

    /// Create a listing with its stock codes
    ///
    /// # Arguments
    /// * `product` - Listing details
    /// * `stock_text` - Pasted codes, one per line
    /// * `mode` - Single-use or shared-reusable with a usage cap
    ///
    /// # Errors
    /// Form and stock validation errors are returned without contacting the backend.
    pub async fn create_product(
        &self,
        product: NewProduct,
        stock_text: &str,
        mode: StockMode,
    ) -> Result<Product> {
        self.require_seller()?;
        product.validate()?;
        let block = StockBlock::parse(stock_text, mode)?;

        let submission = ProductSubmission {
            product,
            mode: block.mode(),
            sellable_units: block.sellable_units(),
            stock_codes: block.into_codes(),
        };
        let created = self.api.create_seller_product(&submission).await?;
        tracing::info!(
            product = %created.id,
            codes = submission.stock_codes.len(),
            units = submission.sellable_units,
            "Listing created"
        );
        Ok(created)
    }

    /// Mark an order delivered, then return the refreshed order list.
    pub async fn deliver_order(&self, order_id: &str) -> Result<Vec<Order>> {
        self.require_seller()?;
        let delivered = self.api.deliver_order(order_id).await?;
        tracing::info!(order = %delivered.id, "Order delivered");
        self.api.seller_orders().await
    }

    fn require_seller(&self) -> Result<()> {
        match self.session.current_user() {
            Some(user) if user.role.can_sell() => Ok(()),
            Some(_) => Err(ClientError::Forbidden("seller account required".into())),
            None => Err(ClientError::Unauthorized),
        }
    }
}
