//! Catalog, cart and checkout.

use std::sync::Arc;

use serde_json::json;

use crate::api::ApiClient;
use crate::error::{ClientError, Result};
use crate::events::{EventBus, EventName};
use crate::models::{AddToCart, Cart, Order, Product, ProductQuery};
use crate::session::SessionManager;

/// Shop service
pub struct ShopService {
    api: Arc<ApiClient>,
    session: Arc<SessionManager>,
    events: EventBus,
}

impl ShopService {
    pub fn new(api: Arc<ApiClient>, session: Arc<SessionManager>, events: EventBus) -> Self {
        Self {
            api,
            session,
            events,
        }
    }

    pub async fn browse(&self, query: &ProductQuery) -> Result<Vec<Product>> {
        self.api.products(query).await
    }

    pub async fn product(&self, id: &str) -> Result<Product> {
        self.api.product(id).await
    }

    pub async fn cart(&self) -> Result<Cart> {
        self.require_login()?;
        self.api.cart().await
    }

    /// Add a product and notify cart listeners.
    pub async fn add_to_cart(&self, product_id: &str, quantity: u64) -> Result<()> {
        self.require_login()?;
        if product_id.trim().is_empty() {
            return Err(ClientError::Validation("product id is required".into()));
        }
        if quantity == 0 {
            return Err(ClientError::Validation("quantity must be at least 1".into()));
        }

        self.api
            .add_to_cart(&AddToCart {
                product_id: product_id.to_string(),
                quantity,
            })
            .await?;

        self.events
            .publish(&EventName::ProductAddedToCart, &[json!(product_id), json!(quantity)]);
        self.events.publish(&EventName::CartChanged, &[]);
        Ok(())
    }

    pub async fn remove_from_cart(&self, item_id: &str) -> Result<()> {
        self.require_login()?;
        self.api.remove_from_cart(item_id).await?;
        self.events.publish(&EventName::CartChanged, &[]);
        Ok(())
    }

    /// Pay for the cart from the wallet.
    ///
    /// After the order is created the balance is re-fetched, which announces
    /// the new value on the event bus.
    pub async fn checkout(&self) -> Result<Order> {
        self.require_login()?;
        let cart = self.api.cart().await?;
        if cart.is_empty() {
            return Err(ClientError::Validation("cart is empty".into()));
        }
        let balance = self.session.state().balance;
        if balance > 0.0 && cart.total() > balance {
            return Err(ClientError::Validation(format!(
                "insufficient balance: cart total {:.2}, balance {:.2}",
                cart.total(),
                balance
            )));
        }

        let order = self.api.checkout().await?;
        tracing::info!(order = %order.id, total = order.total_amount, "Order created");

        self.events
            .publish(&EventName::OrderCreated, &[json!(order.id)]);
        self.events.publish(&EventName::CartChanged, &[]);
        if let Err(e) = self.session.refresh_balance().await {
            tracing::warn!(error = %e, "Balance refresh after checkout failed");
        }
        Ok(order)
    }

    pub async fn orders(&self) -> Result<Vec<Order>> {
        self.require_login()?;
        self.api.orders().await
    }

    pub async fn order(&self, id: &str) -> Result<Order> {
        self.require_login()?;
        self.api.order(id).await
    }

    fn require_login(&self) -> Result<()> {
        if self.session.is_authenticated() {
            Ok(())
        } else {
            Err(ClientError::Unauthorized)
        }
    }
}
