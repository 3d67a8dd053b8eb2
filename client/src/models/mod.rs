//! Data models for the DigiMart client
//!
//! The backend is authoritative for every record here; the client only holds
//! transient copies. Response records are parsed leniently (see [`parse`]),
//! request records serialize to the exact shape the backend expects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use validator::Validate;

use crate::stock::StockMode;

pub mod parse;

use parse::{lenient_f64, lenient_u64, string_or_number};

/// User roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    #[default]
    User,
    Seller,
    Admin,
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = string_or_number(deserializer)?;
        Ok(match raw.to_ascii_uppercase().as_str() {
            "SELLER" => Role::Seller,
            "ADMIN" => Role::Admin,
            _ => Role::User,
        })
    }
}

impl Role {
    pub fn can_sell(&self) -> bool {
        matches!(self, Role::Seller | Role::Admin)
    }
}

/// User model, as cached alongside the session token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(deserialize_with = "string_or_number", alias = "_id", alias = "userId")]
    pub id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Role,
}

/// Login credentials
#[derive(Debug, Clone, Serialize, Validate)]
pub struct Credentials {
    #[validate(length(min = 1, message = "is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "is required"))]
    pub password: String,
}

/// Registration form
#[derive(Debug, Clone, Serialize, Validate)]
pub struct NewAccount {
    #[validate(length(min = 3, max = 32, message = "must be 3-32 characters"))]
    pub username: String,
    #[validate(email(message = "must be a valid email"))]
    pub email: String,
    #[validate(length(min = 6, message = "must be at least 6 characters"))]
    pub password: String,
}

impl NewAccount {
    pub fn credentials(&self) -> Credentials {
        Credentials {
            email: self.email.clone(),
            password: self.password.clone(),
        }
    }
}

/// Successful login response
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    #[serde(alias = "accessToken")]
    pub token: String,
    pub user: User,
}

/// Balance response
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Balance {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub balance: f64,
}

/// Balance ledger entry
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    #[serde(deserialize_with = "string_or_number", alias = "_id")]
    pub id: String,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub amount: f64,
    #[serde(default)]
    pub description: String,
    #[serde(alias = "created_at")]
    pub created_at: DateTime<Utc>,
}

/// Top-up request status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TopUpStatus {
    Pending,
    Approved,
    Rejected,
    /// Any status this client does not know about. Never counts toward quotas.
    Unknown,
}

impl<'de> Deserialize<'de> for TopUpStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = string_or_number(deserializer)?;
        Ok(match raw.to_ascii_uppercase().as_str() {
            "PENDING" => TopUpStatus::Pending,
            "APPROVED" => TopUpStatus::Approved,
            "REJECTED" => TopUpStatus::Rejected,
            _ => TopUpStatus::Unknown,
        })
    }
}

/// Balance top-up request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopUpRequest {
    #[serde(deserialize_with = "string_or_number", alias = "_id")]
    pub id: String,
    #[serde(deserialize_with = "lenient_f64")]
    pub amount: f64,
    pub status: TopUpStatus,
    #[serde(alias = "created_at")]
    pub created_at: DateTime<Utc>,
}

/// Top-up submission form
#[derive(Debug, Clone, Validate)]
pub struct TopUpForm {
    #[validate(range(min = 0.01, message = "must be positive"))]
    pub amount: f64,
    #[validate(length(min = 1, message = "is required"))]
    pub payment_method_id: String,
}

/// Top-up submission with a receipt already on the media host
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopUpWithReceiptUrl {
    pub amount: f64,
    pub payment_method_id: String,
    pub receipt_url: String,
}

/// Payment method accepted for top-ups
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMethod {
    #[serde(deserialize_with = "string_or_number", alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub instructions: String,
    #[serde(default = "default_true", alias = "isActive")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

/// Catalog product
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(deserialize_with = "string_or_number", alias = "_id")]
    pub id: String,
    #[serde(default, alias = "name")]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub price: f64,
    #[serde(default)]
    pub category: String,
    #[serde(default, alias = "image")]
    pub image_url: Option<String>,
    #[serde(default, deserialize_with = "lenient_u64", alias = "stockCount")]
    pub stock: u64,
    #[serde(default, alias = "isPremium")]
    pub premium: bool,
    #[serde(default, deserialize_with = "string_or_number")]
    pub seller_id: String,
}

/// Catalog filter
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProductQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

/// Cart line
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    #[serde(deserialize_with = "string_or_number", alias = "_id")]
    pub id: String,
    #[serde(deserialize_with = "string_or_number")]
    pub product_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub price: f64,
    #[serde(default = "one", deserialize_with = "lenient_u64")]
    pub quantity: u64,
}

fn one() -> u64 {
    1
}

/// Shopping cart
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Cart {
    #[serde(default)]
    pub items: Vec<CartItem>,
}

impl Cart {
    pub fn total(&self) -> f64 {
        self.items
            .iter()
            .map(|item| item.price * item.quantity as f64)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Add-to-cart request
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCart {
    pub product_id: String,
    pub quantity: u64,
}

/// Order status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    Pending,
    Paid,
    Delivered,
    Completed,
    Cancelled,
    Refunded,
    Unknown,
}

impl<'de> Deserialize<'de> for OrderStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = string_or_number(deserializer)?;
        Ok(match raw.to_ascii_uppercase().as_str() {
            "PENDING" => OrderStatus::Pending,
            "PAID" => OrderStatus::Paid,
            "DELIVERED" => OrderStatus::Delivered,
            "COMPLETED" => OrderStatus::Completed,
            "CANCELLED" | "CANCELED" => OrderStatus::Cancelled,
            "REFUNDED" => OrderStatus::Refunded,
            _ => OrderStatus::Unknown,
        })
    }
}

/// Order model
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(deserialize_with = "string_or_number", alias = "_id")]
    pub id: String,
    #[serde(default = "unknown_status")]
    pub status: OrderStatus,
    #[serde(default, deserialize_with = "lenient_f64", alias = "total")]
    pub total_amount: f64,
    #[serde(default)]
    pub items: Vec<CartItem>,
    /// Delivered codes, once the order has been fulfilled.
    #[serde(default)]
    pub delivered_codes: Vec<String>,
    #[serde(default, alias = "created_at")]
    pub created_at: Option<DateTime<Utc>>,
}

fn unknown_status() -> OrderStatus {
    OrderStatus::Unknown
}

/// New seller listing
#[derive(Debug, Clone, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    #[validate(length(min = 3, max = 120, message = "must be 3-120 characters"))]
    pub title: String,
    #[validate(length(max = 5000, message = "is too long"))]
    pub description: String,
    #[validate(range(min = 0.01, message = "must be positive"))]
    pub price: f64,
    #[validate(length(min = 1, message = "is required"))]
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// Listing payload as submitted, after the stock block has been validated.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSubmission {
    #[serde(flatten)]
    pub product: NewProduct,
    #[serde(flatten)]
    pub mode: StockMode,
    pub stock_codes: Vec<String>,
    pub sellable_units: u64,
}

/// Seller dashboard summary
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SellerDashboard {
    #[serde(deserialize_with = "lenient_u64")]
    pub total_products: u64,
    #[serde(deserialize_with = "lenient_u64")]
    pub total_orders: u64,
    #[serde(deserialize_with = "lenient_u64")]
    pub pending_orders: u64,
    #[serde(deserialize_with = "lenient_f64")]
    pub total_revenue: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn role_is_case_insensitive_with_user_fallback() {
        let roles: Vec<Role> =
            serde_json::from_value(json!(["seller", "ADMIN", "User", "moderator"])).unwrap();
        assert_eq!(roles, vec![Role::Seller, Role::Admin, Role::User, Role::User]);
    }

    #[test]
    fn user_accepts_mongo_style_id() {
        let user: User =
            serde_json::from_value(json!({"_id": 12, "username": "kim", "role": "SELLER"}))
                .unwrap();
        assert_eq!(user.id, "12");
        assert!(user.role.can_sell());
        assert!(user.email.is_none());
    }

    #[test]
    fn top_up_request_parses_string_amount() {
        let req: TopUpRequest = serde_json::from_value(json!({
            "id": "r1",
            "amount": "250.00",
            "status": "pending",
            "createdAt": "2026-10-15T08:00:00Z"
        }))
        .unwrap();
        assert_eq!(req.amount, 250.0);
        assert_eq!(req.status, TopUpStatus::Pending);
    }

    #[test]
    fn unknown_order_status_is_tolerated() {
        let order: Order =
            serde_json::from_value(json!({"id": 1, "status": "ON_HOLD", "total": 9.5})).unwrap();
        assert_eq!(order.status, OrderStatus::Unknown);
        assert_eq!(order.total_amount, 9.5);
    }

    #[test]
    fn cart_total_sums_lines() {
        let cart: Cart = serde_json::from_value(json!({"items": [
            {"id": 1, "productId": 10, "price": 5, "quantity": 2},
            {"id": 2, "productId": 11, "price": "2.5"}
        ]}))
        .unwrap();
        assert_eq!(cart.total(), 12.5);
    }

    #[test]
    fn submission_flattens_stock_mode() {
        let submission = ProductSubmission {
            product: NewProduct {
                title: "Steam key".into(),
                description: String::new(),
                price: 4.99,
                category: "games".into(),
                image_url: None,
            },
            mode: StockMode::SharedReusable { usage_cap: 3 },
            stock_codes: vec!["A".into()],
            sellable_units: 3,
        };
        let json = serde_json::to_value(&submission).unwrap();
        assert_eq!(json["title"], "Steam key");
        assert_eq!(json["stockMode"], "SHARED_REUSABLE");
        assert_eq!(json["usageCap"], 3);
        assert_eq!(json["stockCodes"], json!(["A"]));
        assert_eq!(json["sellableUnits"], 3);
    }

    #[test]
    fn new_account_validation() {
        let account = NewAccount {
            username: "ab".into(),
            email: "not-an-email".into(),
            password: "secret1".into(),
        };
        let errors = account.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("username"));
        assert!(fields.contains_key("email"));
        assert!(!fields.contains_key("password"));
    }
}
