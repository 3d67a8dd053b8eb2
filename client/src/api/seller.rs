//! Seller dashboard endpoints.

use super::ApiClient;
use crate::error::Result;
use crate::models::parse::parse_record;
use crate::models::{Order, Product, ProductSubmission, SellerDashboard};

impl ApiClient {
    pub async fn seller_dashboard(&self) -> Result<SellerDashboard> {
        let body = self.get_json("/seller/dashboard").await?;
        if body.is_null() {
            return Ok(SellerDashboard::default());
        }
        parse_record(body)
    }

    pub async fn seller_products(&self) -> Result<Vec<Product>> {
        self.fetch_list("/seller/products").await
    }

    pub async fn create_seller_product(&self, submission: &ProductSubmission) -> Result<Product> {
        let body = self.post_json("/seller/products", submission).await?;
        parse_record(body)
    }

    pub async fn seller_orders(&self) -> Result<Vec<Order>> {
        self.fetch_list("/seller/orders").await
    }

    pub async fn deliver_order(&self, order_id: &str) -> Result<Order> {
        let body = self
            .post_empty(&format!("/seller/orders/{order_id}/deliver"))
            .await?;
        parse_record(body)
    }
}
