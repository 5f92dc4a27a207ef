//! Shipping calculation endpoints

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::domain::shipping::{
    apply_free_shipping, match_zone, pick_class, postal_code_prefix, rate_cost_cents, CartLine,
    ShippingClass, ShippingQuote, ShippingRate, ShippingResolutionError, ShippingZone,
};
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct ShippingCalculationRequest {
    #[validate(length(min = 1, message = "Adicione produtos ao carrinho para calcular o envio."))]
    pub cart_items: Vec<CartLineRequest>,
    #[validate(length(min = 4, max = 10, message = "Código postal inválido."))]
    pub postal_code: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct CartLineRequest {
    pub variant_id: Uuid,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
}

fn default_quantity() -> i32 {
    1
}

#[derive(Debug, Serialize)]
pub struct ShippingCalculationResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<&'static str>,
    #[serde(flatten)]
    pub quote: Option<ShippingQuote>,
}

impl ShippingCalculationResponse {
    fn ok(quote: ShippingQuote) -> Self {
        Self { success: true, error: None, error_code: None, quote: Some(quote) }
    }

    fn failure(err: &ShippingResolutionError) -> Self {
        let code = match err {
            ShippingResolutionError::InvalidPostalCode => "invalid_postal_code",
            ShippingResolutionError::NoZone => "no_zone",
            ShippingResolutionError::NoClass => "no_class",
            ShippingResolutionError::NoRate => "no_rate",
            ShippingResolutionError::UnknownVariant => "unknown_variant",
        };
        Self {
            success: false,
            error: Some(err.to_string()),
            error_code: Some(code),
            quote: None,
        }
    }
}

/// POST /api/shipping/calculate — public, no auth.
pub async fn calculate(
    State(state): State<AppState>,
    Json(request): Json<ShippingCalculationRequest>,
) -> Result<Response, ApiError> {
    super::check_payload(&request)?;

    let lines: Vec<CartLine> = request
        .cart_items
        .iter()
        .map(|l| CartLine { variant_id: l.variant_id, quantity: l.quantity.max(1) })
        .collect();

    match resolve_shipping(&state.db, &lines, &request.postal_code).await? {
        Ok(quote) => Ok(Json(ShippingCalculationResponse::ok(quote)).into_response()),
        Err(err) => Ok((
            StatusCode::BAD_REQUEST,
            Json(ShippingCalculationResponse::failure(&err)),
        )
            .into_response()),
    }
}

/// GET /api/shipping/zones — active zones for the storefront selector.
pub async fn list_active_zones(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let zones: Vec<ShippingZone> = sqlx::query_as(
        "SELECT * FROM shipping_zones WHERE is_active = TRUE ORDER BY display_order, code",
    )
    .fetch_all(&state.db)
    .await?;
    Ok(Json(serde_json::json!({ "success": true, "data": zones })))
}

/// Full resolution: postal code -> zone, weight -> class, (zone, class,
/// weight) -> rate, then the free-shipping override.
///
/// The outer `Result` is infrastructure failure; the inner one is the
/// structured business outcome.
pub async fn resolve_shipping(
    db: &PgPool,
    lines: &[CartLine],
    postal_code: &str,
) -> Result<Result<ShippingQuote, ShippingResolutionError>, ApiError> {
    // postal validation happens before any query
    let Some(prefix) = postal_code_prefix(postal_code) else {
        return Ok(Err(ShippingResolutionError::InvalidPostalCode));
    };

    let ids: Vec<Uuid> = lines.iter().map(|l| l.variant_id).collect();
    let variants: Vec<(Uuid, i32, i64)> = sqlx::query_as(
        "SELECT id, weight_grams, base_price_cents FROM product_variants WHERE id = ANY($1)",
    )
    .bind(&ids)
    .fetch_all(db)
    .await?;

    let mut total_weight: i64 = 0;
    let mut subtotal_cents: i64 = 0;
    for line in lines {
        let Some((_, weight, price)) = variants.iter().find(|(id, _, _)| *id == line.variant_id)
        else {
            return Ok(Err(ShippingResolutionError::UnknownVariant));
        };
        total_weight += *weight as i64 * line.quantity as i64;
        subtotal_cents += price * line.quantity as i64;
    }
    let total_weight = total_weight.min(i32::MAX as i64) as i32;

    let zones: Vec<ShippingZone> =
        sqlx::query_as("SELECT * FROM shipping_zones WHERE is_active = TRUE")
            .fetch_all(db)
            .await?;
    let Some(zone) = match_zone(&zones, prefix) else {
        return Ok(Err(ShippingResolutionError::NoZone));
    };

    let classes: Vec<ShippingClass> =
        sqlx::query_as("SELECT * FROM shipping_classes WHERE is_active = TRUE")
            .fetch_all(db)
            .await?;
    let Some(class) = pick_class(&classes, total_weight) else {
        return Ok(Err(ShippingResolutionError::NoClass));
    };

    let rate: Option<ShippingRate> = sqlx::query_as(
        "SELECT * FROM shipping_rates
         WHERE zone_id = $1 AND class_id = $2 AND is_active = TRUE
           AND min_weight_grams <= $3 AND max_weight_grams >= $3",
    )
    .bind(zone.id)
    .bind(class.id)
    .bind(total_weight)
    .fetch_optional(db)
    .await?;
    let Some(rate) = rate else {
        return Ok(Err(ShippingResolutionError::NoRate));
    };

    let cost = rate_cost_cents(&rate, total_weight);
    let (cost, is_free) =
        apply_free_shipping(cost, subtotal_cents, zone.free_shipping_threshold_cents);

    Ok(Ok(ShippingQuote {
        zone_code: zone.code.clone(),
        zone_name: zone.name.clone(),
        shipping_class_code: class.code.clone(),
        shipping_class_name: class.name.clone(),
        carrier_name: class.carrier_name.clone(),
        total_weight_grams: total_weight,
        shipping_cost_cents: cost,
        free_shipping_threshold_cents: zone.free_shipping_threshold_cents,
        is_free_shipping: is_free,
        estimated_days_min: rate.estimated_days_min,
        estimated_days_max: rate.estimated_days_max,
    }))
}
