//! Orders and the payment lifecycle
//!
//! `payment_status` is a one-way machine: once `paid`, webhook re-deliveries
//! must not mutate the order again. The fulfillment `status` is admin-driven
//! and deliberately has no enforced transition graph.

use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::pricing::VAT_RATE;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "confirmed" => Some(Self::Confirmed),
            "processing" => Some(Self::Processing),
            "shipped" => Some(Self::Shipped),
            "delivered" => Some(Self::Delivered),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "paid" => Some(Self::Paid),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// `paid` is terminal; nothing moves an order out of it.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Paid)
    }
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub customer_id: Uuid,
    pub status: String,
    pub payment_status: String,
    pub subtotal_excl_vat_cents: i64,
    pub subtotal_incl_vat_cents: i64,
    pub shipping_excl_vat_cents: i64,
    pub shipping_incl_vat_cents: i64,
    pub total_excl_vat_cents: i64,
    pub total_incl_vat_cents: i64,
    pub shipping_address_id: Uuid,
    pub payment_method: Option<String>,
    pub eupago_entity: Option<String>,
    pub eupago_reference: Option<String>,
    pub eupago_transaction_id: Option<String>,
    pub payment_deadline: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Immutable price/product snapshot taken at order-creation time, so later
/// catalog edits never rewrite history.
#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_variant_id: Option<Uuid>,
    pub product_name: String,
    pub sku: String,
    pub size_format: Option<String>,
    pub quantity: i32,
    pub unit_price_excl_vat_cents: i64,
    pub unit_price_incl_vat_cents: i64,
    pub line_total_excl_vat_cents: i64,
    pub line_total_incl_vat_cents: i64,
}

/// Globally unique order number, also the payment-gateway correlation key.
/// Format: ACX-{millis}-{8 random uppercase alphanumerics}.
pub fn generate_order_number() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(|b| (b as char).to_ascii_uppercase())
        .collect();
    format!("ACX-{}-{}", Utc::now().timestamp_millis(), suffix)
}

/// VAT-exclusive cents for a VAT-inclusive amount, rounded to the cent.
pub fn cents_excluding_vat(cents_including_vat: i64) -> i64 {
    let incl = Decimal::new(cents_including_vat, 0);
    (incl / (Decimal::ONE + VAT_RATE))
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .unwrap_or(cents_including_vat)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Confirmed,
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
        ] {
            assert_eq!(OrderStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(OrderStatus::parse("refunded"), None);
    }

    #[test]
    fn test_payment_status_terminal() {
        assert!(PaymentStatus::Paid.is_terminal());
        assert!(!PaymentStatus::Pending.is_terminal());
        assert!(!PaymentStatus::Failed.is_terminal());
    }

    #[test]
    fn test_order_number_shape() {
        let a = generate_order_number();
        let b = generate_order_number();
        assert!(a.starts_with("ACX-"));
        assert_eq!(a.split('-').count(), 3);
        assert_eq!(a.split('-').nth(2).unwrap().len(), 8);
        assert_ne!(a, b);
    }

    #[test]
    fn test_cents_excluding_vat() {
        // 123.00€ incl. 23% VAT -> 100.00€
        assert_eq!(cents_excluding_vat(12_300), 10_000);
        assert_eq!(cents_excluding_vat(0), 0);
        // 10.00€ -> 8.13€
        assert_eq!(cents_excluding_vat(1_000), 813);
    }
}
