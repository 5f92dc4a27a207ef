//! Quantity-based price tiers
//!
//! Admins configure discount tiers by order value ("5% off from 400€"); this
//! module turns them into per-variant quantity breakpoints with discounted
//! unit prices. Breakpoints are rounded up to round numbers so customers see
//! "160 unidades", never "83 unidades", and unit prices snap to 0.50€ steps.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Portuguese standard VAT rate (23%).
pub const VAT_RATE: Decimal = Decimal::from_parts(23, 0, 0, false, 2);

/// Admin-supplied discount tier: orders worth at least `min_order_value`
/// euros get `discount_percent` off the unit price.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct DiscountTier {
    pub min_order_value: Decimal,
    pub discount_percent: Decimal,
}

/// A generated quantity breakpoint for one variant.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GeneratedTier {
    pub min_quantity: i32,
    pub max_quantity: Option<i32>,
    pub discount_percentage: Decimal,
    pub price_per_unit_cents: i64,
    pub display_text: String,
}

/// Stored price tier row.
#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct PriceTier {
    pub id: Uuid,
    pub product_variant_id: Uuid,
    pub min_quantity: i32,
    pub max_quantity: Option<i32>,
    pub discount_percentage: Decimal,
    pub price_per_unit_cents: i64,
    pub display_text: String,
}

#[derive(Debug, thiserror::Error)]
pub enum TierConfigError {
    #[error("Tier list is empty")]
    Empty,
    #[error("Tier minimum order values must be strictly increasing")]
    NotIncreasing,
    #[error("Discount percent must be in (0, 100]")]
    DiscountOutOfRange,
}

/// Validate an ascending tier configuration before applying it.
pub fn validate_tiers(tiers: &[DiscountTier]) -> Result<(), TierConfigError> {
    if tiers.is_empty() {
        return Err(TierConfigError::Empty);
    }
    let hundred = Decimal::from(100);
    for window in tiers.windows(2) {
        if window[1].min_order_value <= window[0].min_order_value {
            return Err(TierConfigError::NotIncreasing);
        }
    }
    for tier in tiers {
        if tier.discount_percent <= Decimal::ZERO || tier.discount_percent > hundred {
            return Err(TierConfigError::DiscountOutOfRange);
        }
    }
    Ok(())
}

/// Round a quantity up to a "nice" breakpoint. Idempotent.
pub fn round_to_nice(qty: i64) -> i64 {
    let round_up = |q: i64, step: i64| ((q + step - 1) / step) * step;
    match qty {
        q if q <= 10 => q,
        q if q <= 50 => round_up(q, 5),
        q if q <= 100 => round_up(q, 10),
        q if q <= 500 => round_up(q, 20),
        q if q <= 1000 => round_up(q, 50),
        q => round_up(q, 100),
    }
}

/// Round a euro price to the nearest 0.50€.
pub fn round_price_to_half(price: Decimal) -> Decimal {
    let doubled = (price * Decimal::TWO)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    doubled / Decimal::TWO
}

/// Price including VAT, rounded to the cent.
pub fn price_with_vat(price_excluding_vat: Decimal, vat_rate: Decimal) -> Decimal {
    (price_excluding_vat * (Decimal::ONE + vat_rate))
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Price excluding VAT, rounded to the cent.
pub fn price_without_vat(price_including_vat: Decimal, vat_rate: Decimal) -> Decimal {
    (price_including_vat / (Decimal::ONE + vat_rate))
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// SKU prefix from a product name: first letter of each word, max 5.
/// "Expositor De Mesa Grande" -> "EDMG"
pub fn generate_sku_prefix(name: &str) -> String {
    name.split_whitespace()
        .filter_map(|word| word.chars().next())
        .flat_map(|c| c.to_uppercase())
        .take(5)
        .collect()
}

/// Generate the ordered tier list for one variant.
///
/// `tiers` must be sorted ascending by `min_order_value` (see
/// [`validate_tiers`]). A tier whose rounded quantity does not exceed the
/// previously emitted one is collapsed into it. Each emitted tier's
/// `max_quantity` is the next emitted tier's `min_quantity - 1`; the last is
/// open-ended.
pub fn generate_tiers(base_price_including_vat: Decimal, tiers: &[DiscountTier]) -> Vec<GeneratedTier> {
    if base_price_including_vat <= Decimal::ZERO {
        return vec![];
    }

    let hundred = Decimal::from(100);
    let mut generated: Vec<GeneratedTier> = Vec::new();
    let mut prev_qty: i64 = 0;

    for tier in tiers {
        let raw_qty = (tier.min_order_value / base_price_including_vat).ceil();
        let Some(raw_qty) = decimal_to_i64(raw_qty) else {
            continue;
        };
        let min_qty = round_to_nice(raw_qty);
        if min_qty <= prev_qty || min_qty > i32::MAX as i64 {
            continue;
        }

        let raw_price = base_price_including_vat * (Decimal::ONE - tier.discount_percent / hundred);
        let price_per_unit = round_price_to_half(raw_price);
        let price_cents = decimal_to_i64(price_per_unit * hundred).unwrap_or(0);

        generated.push(GeneratedTier {
            min_quantity: min_qty as i32,
            max_quantity: None,
            discount_percentage: tier.discount_percent,
            price_per_unit_cents: price_cents,
            display_text: format!("{min_qty} unidades"),
        });
        prev_qty = min_qty;
    }

    // Close each range against the next emitted breakpoint.
    for i in 0..generated.len().saturating_sub(1) {
        let next_min = generated[i + 1].min_quantity;
        generated[i].max_quantity = Some(next_min - 1);
    }

    generated
}

fn decimal_to_i64(value: Decimal) -> Option<i64> {
    use rust_decimal::prelude::ToPrimitive;
    value.to_i64()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_round_to_nice_buckets() {
        assert_eq!(round_to_nice(7), 7);
        assert_eq!(round_to_nice(10), 10);
        assert_eq!(round_to_nice(11), 15);
        assert_eq!(round_to_nice(43), 45);
        assert_eq!(round_to_nice(83), 90);
        assert_eq!(round_to_nice(101), 120);
        assert_eq!(round_to_nice(501), 550);
        assert_eq!(round_to_nice(1001), 1100);
    }

    #[test]
    fn test_round_to_nice_idempotent() {
        for q in [1, 10, 15, 45, 80, 100, 160, 500, 550, 1000, 1100, 2300] {
            assert_eq!(round_to_nice(round_to_nice(q)), round_to_nice(q), "qty {q}");
        }
    }

    #[test]
    fn test_round_price_to_half() {
        assert_eq!(round_price_to_half(dec("2.4875")), dec("2.5"));
        assert_eq!(round_price_to_half(dec("2.24")), dec("2.0"));
        assert_eq!(round_price_to_half(dec("2.25")), dec("2.5"));
        assert_eq!(round_price_to_half(dec("7.76")), dec("8.0"));
        // Result is always a multiple of 0.50
        for s in ["0.01", "1.26", "3.74", "9.99", "12.30"] {
            let rounded = round_price_to_half(dec(s));
            assert_eq!((rounded * Decimal::TWO) % Decimal::ONE, Decimal::ZERO, "price {s}");
        }
    }

    #[test]
    fn test_vat_round_trip() {
        for s in ["1.00", "2.50", "19.99", "123.45"] {
            let price = dec(s);
            let round_trip = price_with_vat(price_without_vat(price, VAT_RATE), VAT_RATE);
            assert!((round_trip - price).abs() <= dec("0.01"), "price {s} -> {round_trip}");
        }
    }

    #[test]
    fn test_generate_sku_prefix() {
        assert_eq!(generate_sku_prefix("Expositor De Mesa Grande"), "EDMG");
        assert_eq!(generate_sku_prefix("One Two Three Four Five Six Seven"), "OTTFF");
        assert_eq!(generate_sku_prefix(""), "");
        assert_eq!(generate_sku_prefix("  único  "), "Ú");
    }

    #[test]
    fn test_generate_tiers_for_cheap_variant() {
        // 2.50€ variant with tiers at 200/400/800/1000€
        let tiers = vec![
            DiscountTier { min_order_value: dec("200"), discount_percent: dec("0.5") },
            DiscountTier { min_order_value: dec("400"), discount_percent: dec("1") },
            DiscountTier { min_order_value: dec("800"), discount_percent: dec("1.5") },
            DiscountTier { min_order_value: dec("1000"), discount_percent: dec("3") },
        ];
        let generated = generate_tiers(dec("2.50"), &tiers);
        let quantities: Vec<i32> = generated.iter().map(|t| t.min_quantity).collect();
        assert_eq!(quantities, vec![80, 160, 320, 400]);
        assert_eq!(generated[0].max_quantity, Some(159));
        assert_eq!(generated[1].max_quantity, Some(319));
        assert_eq!(generated[2].max_quantity, Some(399));
        assert_eq!(generated[3].max_quantity, None);
        // 2.50 discounted by <=3% still snaps back to 2.50
        assert!(generated.iter().all(|t| t.price_per_unit_cents == 250));
        assert_eq!(generated[0].display_text, "80 unidades");
    }

    #[test]
    fn test_generate_tiers_collapses_indistinguishable_breakpoints() {
        // 500€ variant: 200€ and 400€ thresholds both need 1 unit
        let tiers = vec![
            DiscountTier { min_order_value: dec("200"), discount_percent: dec("1") },
            DiscountTier { min_order_value: dec("400"), discount_percent: dec("2") },
            DiscountTier { min_order_value: dec("1000"), discount_percent: dec("5") },
        ];
        let generated = generate_tiers(dec("500"), &tiers);
        let quantities: Vec<i32> = generated.iter().map(|t| t.min_quantity).collect();
        assert_eq!(quantities, vec![1, 2]);
        assert_eq!(generated[0].max_quantity, Some(1));
        assert_eq!(generated[1].max_quantity, None);
    }

    #[test]
    fn test_generate_tiers_strictly_increasing() {
        let tiers: Vec<DiscountTier> = (1..=8)
            .map(|i| DiscountTier {
                min_order_value: Decimal::from(i * 150),
                discount_percent: Decimal::from(i),
            })
            .collect();
        for price in ["0.75", "2.50", "12.30", "99.99", "450"] {
            let generated = generate_tiers(dec(price), &tiers);
            for pair in generated.windows(2) {
                assert!(pair[1].min_quantity > pair[0].min_quantity, "price {price}");
                assert_eq!(pair[0].max_quantity, Some(pair[1].min_quantity - 1));
            }
            if let Some(last) = generated.last() {
                assert_eq!(last.max_quantity, None);
            }
        }
    }

    #[test]
    fn test_generate_tiers_zero_price_yields_nothing() {
        let tiers = vec![DiscountTier { min_order_value: dec("200"), discount_percent: dec("1") }];
        assert!(generate_tiers(Decimal::ZERO, &tiers).is_empty());
    }

    #[test]
    fn test_validate_tiers() {
        let good = vec![
            DiscountTier { min_order_value: dec("200"), discount_percent: dec("0.5") },
            DiscountTier { min_order_value: dec("400"), discount_percent: dec("1") },
        ];
        assert!(validate_tiers(&good).is_ok());

        assert!(matches!(validate_tiers(&[]), Err(TierConfigError::Empty)));

        let regressive = vec![
            DiscountTier { min_order_value: dec("400"), discount_percent: dec("1") },
            DiscountTier { min_order_value: dec("400"), discount_percent: dec("2") },
        ];
        assert!(matches!(validate_tiers(&regressive), Err(TierConfigError::NotIncreasing)));

        let bad_pct = vec![DiscountTier { min_order_value: dec("200"), discount_percent: dec("0") }];
        assert!(matches!(validate_tiers(&bad_pct), Err(TierConfigError::DiscountOutOfRange)));
    }
}
