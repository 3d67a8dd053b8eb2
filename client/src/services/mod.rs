//! Page-level services built on the API client and the session.

pub mod seller;
pub mod shop;
pub mod wallet;

pub use seller::SellerService;
pub use shop::ShopService;
pub use wallet::{TopUpOutcome, WalletOverview, WalletService};
