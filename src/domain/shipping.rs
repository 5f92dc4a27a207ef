//! Table-rate shipping
//!
//! Destination postal codes map to zones, aggregate cart weight maps to a
//! carrier class, and the (zone, class, weight bracket) triple selects a
//! rate row. Zones may carry a free-shipping threshold on the cart subtotal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct ShippingZone {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub postal_code_start: i32,
    pub postal_code_end: i32,
    pub free_shipping_threshold_cents: Option<i64>,
    pub is_active: bool,
    pub display_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct ShippingClass {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub max_weight_grams: i32,
    pub carrier_name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct ShippingRate {
    pub id: Uuid,
    pub zone_id: Uuid,
    pub class_id: Uuid,
    pub min_weight_grams: i32,
    pub max_weight_grams: i32,
    pub base_rate_cents: i64,
    pub extra_kg_rate_cents: i64,
    pub estimated_days_min: i32,
    pub estimated_days_max: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One cart line as submitted to the calculator.
#[derive(Clone, Debug, Deserialize)]
pub struct CartLine {
    pub variant_id: Uuid,
    pub quantity: i32,
}

/// Successful quote returned to the checkout.
#[derive(Clone, Debug, Serialize)]
pub struct ShippingQuote {
    pub zone_code: String,
    pub zone_name: String,
    pub shipping_class_code: String,
    pub shipping_class_name: String,
    pub carrier_name: String,
    pub total_weight_grams: i32,
    pub shipping_cost_cents: i64,
    pub free_shipping_threshold_cents: Option<i64>,
    pub is_free_shipping: bool,
    pub estimated_days_min: i32,
    pub estimated_days_max: i32,
}

/// Resolution failures, kept distinct so the storefront can tell "fix your
/// postal code" apart from "we cannot ship there".
#[derive(Debug, thiserror::Error)]
pub enum ShippingResolutionError {
    #[error("Código postal inválido. Use o formato português (XXXX-XXX ou XXXX).")]
    InvalidPostalCode,
    #[error("Não foi possível encontrar uma zona de envio para este código postal.")]
    NoZone,
    #[error("O peso da encomenda excede o limite das classes de envio disponíveis.")]
    NoClass,
    #[error("Envio indisponível para este destino.")]
    NoRate,
    #[error("Produto desconhecido no carrinho.")]
    UnknownVariant,
}

/// Extract the 4-digit numeric prefix from a Portuguese postal code.
///
/// Accepts "1234", "1234-567" and "1234567"; anything else is rejected.
pub fn postal_code_prefix(postal_code: &str) -> Option<i32> {
    let digits: String = postal_code.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() < 4 || digits.len() > 7 {
        return None;
    }
    let prefix: i32 = digits[..4].parse().ok()?;
    (1000..=9999).contains(&prefix).then_some(prefix)
}

/// First active zone containing the prefix, in `display_order` then id order.
/// Overlapping ranges are allowed; this ordering makes the winner
/// deterministic.
pub fn match_zone(zones: &[ShippingZone], prefix: i32) -> Option<&ShippingZone> {
    let mut candidates: Vec<&ShippingZone> = zones
        .iter()
        .filter(|z| z.is_active && z.postal_code_start <= prefix && prefix <= z.postal_code_end)
        .collect();
    candidates.sort_by_key(|z| (z.display_order, z.id));
    candidates.first().copied()
}

/// The active class with the smallest weight ceiling that still fits.
pub fn pick_class(classes: &[ShippingClass], total_weight_grams: i32) -> Option<&ShippingClass> {
    classes
        .iter()
        .filter(|c| c.is_active && c.max_weight_grams >= total_weight_grams)
        .min_by_key(|c| c.max_weight_grams)
}

/// Base rate covers up to `min_weight_grams`; every started kilogram beyond
/// that is charged at the extra-kg rate.
pub fn rate_cost_cents(rate: &ShippingRate, total_weight_grams: i32) -> i64 {
    let excess = (total_weight_grams - rate.min_weight_grams).max(0) as i64;
    let extra_kgs = (excess + 999) / 1000;
    rate.base_rate_cents + rate.extra_kg_rate_cents * extra_kgs
}

/// Apply the zone's free-shipping threshold to a computed cost.
pub fn apply_free_shipping(
    cost_cents: i64,
    subtotal_cents: i64,
    threshold_cents: Option<i64>,
) -> (i64, bool) {
    match threshold_cents {
        Some(threshold) if subtotal_cents >= threshold => (0, true),
        _ => (cost_cents, false),
    }
}

/// Progress towards free shipping, 0-100.
pub fn free_shipping_progress(subtotal_cents: i64, threshold_cents: Option<i64>) -> i64 {
    match threshold_cents {
        Some(threshold) if threshold > 0 => {
            if subtotal_cents >= threshold {
                100
            } else {
                subtotal_cents * 100 / threshold
            }
        }
        _ => 0,
    }
}

/// Cents still missing to reach free shipping.
pub fn amount_to_free_shipping(subtotal_cents: i64, threshold_cents: Option<i64>) -> i64 {
    match threshold_cents {
        Some(threshold) if threshold > 0 => (threshold - subtotal_cents).max(0),
        _ => 0,
    }
}

/// Format cents as a euro amount ("12.50€").
pub fn format_cents(cents: i64) -> String {
    format!("{}.{:02}€", cents / 100, (cents % 100).abs())
}

/// Format grams for display ("750 g", "1.5 kg").
pub fn format_weight(grams: i32) -> String {
    if grams >= 1000 {
        format!("{:.1} kg", grams as f64 / 1000.0)
    } else {
        format!("{grams} g")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zone(start: i32, end: i32, order: i32, threshold: Option<i64>) -> ShippingZone {
        ShippingZone {
            id: Uuid::new_v4(),
            code: format!("z{start}"),
            name: format!("Zone {start}"),
            postal_code_start: start,
            postal_code_end: end,
            free_shipping_threshold_cents: threshold,
            is_active: true,
            display_order: order,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn class(code: &str, max_weight: i32) -> ShippingClass {
        ShippingClass {
            id: Uuid::new_v4(),
            code: code.to_string(),
            name: code.to_uppercase(),
            max_weight_grams: max_weight,
            carrier_name: "CTT".to_string(),
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn rate(min_weight: i32, base: i64, extra_kg: i64) -> ShippingRate {
        ShippingRate {
            id: Uuid::new_v4(),
            zone_id: Uuid::new_v4(),
            class_id: Uuid::new_v4(),
            min_weight_grams: min_weight,
            max_weight_grams: min_weight + 10_000,
            base_rate_cents: base,
            extra_kg_rate_cents: extra_kg,
            estimated_days_min: 1,
            estimated_days_max: 3,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_postal_code_prefix() {
        assert_eq!(postal_code_prefix("1000-001"), Some(1000));
        assert_eq!(postal_code_prefix("4700"), Some(4700));
        assert_eq!(postal_code_prefix("4700123"), Some(4700));
        // first four digits are the prefix, the rest is the suffix
        assert_eq!(postal_code_prefix("10000"), Some(1000));
        assert_eq!(postal_code_prefix("999"), None);
        assert_eq!(postal_code_prefix("0999-123"), None);
        assert_eq!(postal_code_prefix("12345678"), None);
        assert_eq!(postal_code_prefix("abcd"), None);
    }

    #[test]
    fn test_match_zone_overlap_precedence() {
        let mut mainland = zone(1000, 9999, 10, None);
        mainland.code = "mainland".into();
        let mut lisbon = zone(1000, 2999, 0, None);
        lisbon.code = "lisbon".into();
        let zones = vec![mainland, lisbon];

        // Overlapping zones: lowest display_order wins.
        assert_eq!(match_zone(&zones, 1500).unwrap().code, "lisbon");
        assert_eq!(match_zone(&zones, 4700).unwrap().code, "mainland");
        assert!(match_zone(&zones, 999).is_none());
    }

    #[test]
    fn test_match_zone_skips_inactive() {
        let mut inactive = zone(1000, 1999, 0, None);
        inactive.is_active = false;
        let zones = vec![inactive];
        assert!(match_zone(&zones, 1500).is_none());
    }

    #[test]
    fn test_pick_class_smallest_fitting_ceiling() {
        let classes = vec![class("xl", 30_000), class("s", 2_000), class("m", 10_000)];
        assert_eq!(pick_class(&classes, 500).unwrap().code, "s");
        assert_eq!(pick_class(&classes, 2_000).unwrap().code, "s");
        assert_eq!(pick_class(&classes, 2_001).unwrap().code, "m");
        assert_eq!(pick_class(&classes, 30_001).map(|c| c.code.as_str()), None);
    }

    #[test]
    fn test_rate_cost_extra_kg_rounds_up() {
        let r = rate(2_000, 500, 150);
        assert_eq!(rate_cost_cents(&r, 1_500), 500); // below base coverage
        assert_eq!(rate_cost_cents(&r, 2_000), 500);
        assert_eq!(rate_cost_cents(&r, 2_001), 650); // 1g over -> one started kg
        assert_eq!(rate_cost_cents(&r, 3_000), 650);
        assert_eq!(rate_cost_cents(&r, 3_001), 800);
    }

    #[test]
    fn test_free_shipping_threshold() {
        // 160€ cart against a 150€ threshold
        let (cost, free) = apply_free_shipping(650, 16_000, Some(15_000));
        assert_eq!(cost, 0);
        assert!(free);

        let (cost, free) = apply_free_shipping(650, 14_999, Some(15_000));
        assert_eq!(cost, 650);
        assert!(!free);

        let (cost, free) = apply_free_shipping(650, 16_000, None);
        assert_eq!(cost, 650);
        assert!(!free);
    }

    #[test]
    fn test_free_shipping_progress_helpers() {
        assert_eq!(free_shipping_progress(7_500, Some(15_000)), 50);
        assert_eq!(free_shipping_progress(16_000, Some(15_000)), 100);
        assert_eq!(free_shipping_progress(16_000, None), 0);
        assert_eq!(amount_to_free_shipping(7_500, Some(15_000)), 7_500);
        assert_eq!(amount_to_free_shipping(16_000, Some(15_000)), 0);
    }

    #[test]
    fn test_formatting() {
        assert_eq!(format_cents(650), "6.50€");
        assert_eq!(format_cents(15_000), "150.00€");
        assert_eq!(format_weight(750), "750 g");
        assert_eq!(format_weight(1_500), "1.5 kg");
    }
}
