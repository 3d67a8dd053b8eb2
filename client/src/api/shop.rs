//! Catalog, cart and order endpoints.

use super::ApiClient;
use crate::error::Result;
use crate::models::parse::{parse_list, parse_record};
use crate::models::{AddToCart, Cart, Order, Product, ProductQuery};

impl ApiClient {
    // ===== Catalog =====

    pub async fn products(&self, query: &ProductQuery) -> Result<Vec<Product>> {
        self.fetch_list_with_query("/products", query).await
    }

    pub async fn product(&self, id: &str) -> Result<Product> {
        let body = self.get_json(&format!("/products/{id}")).await?;
        parse_record(body)
    }

    // ===== Cart =====

    pub async fn cart(&self) -> Result<Cart> {
        let body = self.get_json("/cart").await?;
        if body.is_null() {
            return Ok(Cart::default());
        }
        if body.is_array() {
            return Ok(Cart {
                items: parse_list(body)?,
            });
        }
        parse_record(body)
    }

    pub async fn add_to_cart(&self, item: &AddToCart) -> Result<()> {
        self.post_json("/cart/items", item).await?;
        Ok(())
    }

    pub async fn remove_from_cart(&self, item_id: &str) -> Result<()> {
        self.delete(&format!("/cart/items/{item_id}")).await?;
        Ok(())
    }

    // ===== Orders =====

    pub async fn orders(&self) -> Result<Vec<Order>> {
        self.fetch_list("/orders").await
    }

    pub async fn order(&self, id: &str) -> Result<Order> {
        let body = self.get_json(&format!("/orders/{id}")).await?;
        parse_record(body)
    }

    /// Check out the current cart, paying from the wallet balance.
    pub async fn checkout(&self) -> Result<Order> {
        let body = self.post_empty("/orders").await?;
        parse_record(body)
    }
}
