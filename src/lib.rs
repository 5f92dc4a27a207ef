//! Acrilux E-commerce Backend
//!
//! Storefront and backoffice API for an acrylic display products retailer.
//!
//! ## Features
//! - Order creation and lookup with immutable price snapshots
//! - Table-rate shipping (postal-code zones × weight classes)
//! - Quantity-based price tiers derived from order-value discounts
//! - Multibanco / MB Way payment references via EuPago
//! - Idempotent webhook-driven payment confirmation
//! - Admin CRUD for shipping configuration and user roles

pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod events;
pub mod payments;
pub mod rate_limit;
pub mod routes;
pub mod state;

pub use config::Config;
pub use error::ApiError;
pub use state::AppState;
