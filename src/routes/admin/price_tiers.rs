//! Price-tier regeneration

use axum::extract::State;
use axum::Json;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::QueryBuilder;
use uuid::Uuid;

use crate::auth::AdminUser;
use crate::domain::pricing::{generate_tiers, validate_tiers, DiscountTier, GeneratedTier};
use crate::error::ApiError;
use crate::state::AppState;

const INSERT_BATCH_SIZE: usize = 500;

#[derive(Debug, Deserialize)]
pub struct ApplyTiersRequest {
    pub tiers: Vec<TierConfigPayload>,
}

#[derive(Debug, Deserialize)]
pub struct TierConfigPayload {
    pub min_value: Decimal,
    pub discount_pct: Decimal,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyTiersResponse {
    pub success: bool,
    pub variants_updated: usize,
    pub tiers_created: usize,
}

/// POST /api/admin/price-tiers/apply
///
/// Full regeneration: every existing tier is dropped and the new set is
/// derived from the current variant prices, all inside one transaction so a
/// reader never observes a half-regenerated table.
pub async fn apply(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    Json(request): Json<ApplyTiersRequest>,
) -> Result<Json<ApplyTiersResponse>, ApiError> {
    let mut tiers: Vec<DiscountTier> = request
        .tiers
        .into_iter()
        .map(|t| DiscountTier { min_order_value: t.min_value, discount_percent: t.discount_pct })
        .collect();
    tiers.sort_by(|a, b| a.min_order_value.cmp(&b.min_order_value));
    validate_tiers(&tiers).map_err(|e| ApiError::Validation(e.to_string()))?;

    let variants: Vec<(Uuid, i64)> = sqlx::query_as(
        "SELECT id, base_price_cents FROM product_variants
         WHERE is_active = TRUE AND base_price_cents > 0",
    )
    .fetch_all(&state.db)
    .await?;
    if variants.is_empty() {
        return Err(ApiError::NotFound("Nenhuma variante encontrada".to_string()));
    }

    let mut generated: Vec<(Uuid, GeneratedTier)> = Vec::new();
    for (variant_id, base_price_cents) in &variants {
        let base_price = Decimal::new(*base_price_cents, 2);
        for tier in generate_tiers(base_price, &tiers) {
            generated.push((*variant_id, tier));
        }
    }

    let mut tx = state.db.begin().await?;

    sqlx::query("DELETE FROM price_tiers").execute(&mut *tx).await?;

    for batch in generated.chunks(INSERT_BATCH_SIZE) {
        let mut builder: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(
            "INSERT INTO price_tiers (id, product_variant_id, min_quantity, max_quantity, \
             discount_percentage, price_per_unit_cents, display_text) ",
        );
        builder.push_values(batch, |mut row, (variant_id, tier)| {
            row.push_bind(Uuid::now_v7())
                .push_bind(variant_id)
                .push_bind(tier.min_quantity)
                .push_bind(tier.max_quantity)
                .push_bind(tier.discount_percentage)
                .push_bind(tier.price_per_unit_cents)
                .push_bind(&tier.display_text);
        });
        builder.build().execute(&mut *tx).await?;
    }

    tx.commit().await?;

    tracing::info!(
        variants = variants.len(),
        tiers = generated.len(),
        "price tiers regenerated"
    );

    Ok(Json(ApplyTiersResponse {
        success: true,
        variants_updated: variants.len(),
        tiers_created: generated.len(),
    }))
}
