//! Digimart client library
//!
//! Session handling, wallet and shop services, seller inventory tools and
//! media URL helpers for the Digimart digital goods marketplace.

pub mod api;
pub mod app_state;
pub mod commands;
pub mod config;
pub mod error;
pub mod events;
pub mod media;
pub mod models;
pub mod quota;
pub mod resource;
pub mod services;
pub mod session;
pub mod stock;

pub use app_state::AppState;
pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use events::{EventBus, EventName};
