//! Storefront catalog lookups

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::domain::pricing::PriceTier;
use crate::domain::stock::{max_orderable, StockStatus};
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct VariantRow {
    pub id: Uuid,
    pub product_name: String,
    pub sku: String,
    pub size_format: Option<String>,
    pub base_price_cents: i64,
    pub weight_grams: i32,
    pub stock_quantity: i32,
    pub is_active: bool,
}

#[derive(Debug, Serialize)]
pub struct StockInfo {
    pub quantity: i32,
    pub status: StockStatus,
    pub can_order: bool,
    pub max_orderable: i32,
}

/// GET /api/variants/:id — variant with stock state and quantity discounts.
pub async fn get_variant(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let variant: Option<VariantRow> = sqlx::query_as(
        "SELECT id, product_name, sku, size_format, base_price_cents, weight_grams,
                stock_quantity, is_active
         FROM product_variants WHERE id = $1 AND is_active = TRUE",
    )
    .bind(id)
    .fetch_optional(&state.db)
    .await?;
    let Some(variant) = variant else {
        return Err(ApiError::NotFound("Produto não encontrado".to_string()));
    };

    let tiers: Vec<PriceTier> = sqlx::query_as(
        "SELECT * FROM price_tiers WHERE product_variant_id = $1 ORDER BY min_quantity",
    )
    .bind(id)
    .fetch_all(&state.db)
    .await?;

    let status = StockStatus::from_quantity(variant.stock_quantity);
    let stock = StockInfo {
        quantity: variant.stock_quantity,
        status,
        can_order: status.can_order(),
        max_orderable: max_orderable(variant.stock_quantity, status),
    };

    Ok(Json(json!({
        "success": true,
        "data": { "variant": variant, "stock": stock, "price_tiers": tiers },
    })))
}
