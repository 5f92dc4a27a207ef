//! Payment-reference endpoints (Multibanco, MB Way)

use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::error::ApiError;
use crate::payments::{format_reference, mask_phone_number, validate_phone_number};
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MultibancoRequest {
    #[validate(length(min = 1, message = "ID da encomenda em falta"))]
    pub order_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MultibancoData {
    pub entity: String,
    pub reference: String,
    pub reference_formatted: String,
    pub amount_cents: i64,
    pub deadline: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct PayableOrder {
    id: Uuid,
    order_number: String,
    total_incl_vat_cents: i64,
    payment_status: String,
    eupago_entity: Option<String>,
    eupago_reference: Option<String>,
    payment_deadline: Option<DateTime<Utc>>,
}

async fn fetch_payable_order(state: &AppState, order_number: &str) -> Result<PayableOrder, ApiError> {
    let order: Option<PayableOrder> = sqlx::query_as(
        "SELECT id, order_number, total_incl_vat_cents, payment_status,
                eupago_entity, eupago_reference, payment_deadline
         FROM orders WHERE order_number = $1",
    )
    .bind(order_number)
    .fetch_optional(&state.db)
    .await?;
    let order = order.ok_or_else(|| ApiError::NotFound("Encomenda não encontrada".to_string()))?;
    if order.payment_status == "paid" {
        return Err(ApiError::Validation("Esta encomenda já foi paga".to_string()));
    }
    Ok(order)
}

/// POST /api/payment/multibanco
///
/// Idempotent per order: an existing reference is returned instead of
/// asking the gateway for a second one.
pub async fn create_multibanco(
    State(state): State<AppState>,
    Json(request): Json<MultibancoRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    super::check_payload(&request)?;
    let order = fetch_payable_order(&state, &request.order_id).await?;

    if let (Some(entity), Some(reference)) = (&order.eupago_entity, &order.eupago_reference) {
        let data = MultibancoData {
            entity: entity.clone(),
            reference: reference.clone(),
            reference_formatted: format_reference(reference),
            amount_cents: order.total_incl_vat_cents,
            deadline: order.payment_deadline.unwrap_or_else(Utc::now),
        };
        return Ok(Json(json!({ "success": true, "data": data })));
    }

    let result = state
        .gateway
        .create_multibanco_reference(&order.order_number, order.total_incl_vat_cents, 24)
        .await?;

    // the reference exists at the gateway even if this update fails, so log
    // instead of failing the request
    if let Err(err) = sqlx::query(
        "UPDATE orders
         SET payment_method = 'multibanco', eupago_entity = $2, eupago_reference = $3,
             payment_deadline = $4, payment_status = 'pending', updated_at = NOW()
         WHERE id = $1",
    )
    .bind(order.id)
    .bind(&result.entity)
    .bind(&result.reference)
    .bind(result.deadline)
    .execute(&state.db)
    .await
    {
        tracing::error!(order_number = %order.order_number, error = %err,
            "failed to store multibanco reference");
    }

    let data = MultibancoData {
        entity: result.entity,
        reference_formatted: format_reference(&result.reference),
        reference: result.reference,
        amount_cents: result.amount_cents,
        deadline: result.deadline,
    };
    Ok(Json(json!({ "success": true, "data": data })))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MbwayRequest {
    #[validate(length(min = 1, message = "Dados em falta"))]
    pub order_id: String,
    #[validate(length(min = 9, message = "Dados em falta"))]
    pub phone_number: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MbwayData {
    pub reference: String,
    pub amount_cents: i64,
    pub phone: String,
}

/// POST /api/payment/mbway
pub async fn create_mbway(
    State(state): State<AppState>,
    Json(request): Json<MbwayRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    super::check_payload(&request)?;

    if !validate_phone_number(&request.phone_number) {
        return Err(ApiError::Validation(
            "Número de telemóvel inválido. Use formato 9XXXXXXXX (91, 92, 93 ou 96)".to_string(),
        ));
    }

    let order = fetch_payable_order(&state, &request.order_id).await?;

    let result = state
        .gateway
        .create_mbway_payment(&order.order_number, order.total_incl_vat_cents, &request.phone_number)
        .await?;

    if let Err(err) = sqlx::query(
        "UPDATE orders
         SET payment_method = 'mbway', eupago_transaction_id = $2,
             payment_status = 'pending', updated_at = NOW()
         WHERE id = $1",
    )
    .bind(order.id)
    .bind(&result.reference)
    .execute(&state.db)
    .await
    {
        tracing::error!(order_number = %order.order_number, error = %err,
            "failed to store mbway reference");
    }

    let data = MbwayData {
        reference: result.reference,
        amount_cents: result.amount_cents,
        phone: mask_phone_number(&request.phone_number),
    };
    Ok(Json(json!({
        "success": true,
        "data": data,
        "message": "Pedido de pagamento enviado. Confirme no seu telemóvel.",
    })))
}
