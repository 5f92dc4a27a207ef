//! Backoffice endpoints, all behind the `AdminUser` guard

pub mod orders;
pub mod price_tiers;
pub mod shipping;
pub mod users;
