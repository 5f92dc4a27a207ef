//! EuPago webhook
//!
//! The gateway retries any non-200 response. Conditions that a retry cannot
//! fix (unknown order, internal failure) therefore answer 200 and rely on
//! server-side logs; only a structurally invalid payload gets a 400.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::events::{OrderPaidEvent, SUBJECT_ORDER_PAID};
use crate::payments::{euros_to_cents, EupagoCallback};
use crate::state::AppState;

/// Amount mismatches within one cent are rounding noise, not fraud.
const AMOUNT_TOLERANCE_CENTS: i64 = 1;

/// POST /api/webhooks/eupago
pub async fn eupago_callback(
    State(state): State<AppState>,
    payload: Result<Json<EupagoCallback>, JsonRejection>,
) -> Response {
    let Ok(Json(callback)) = payload else {
        tracing::error!("invalid eupago callback format");
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "error": "Invalid callback format" })),
        )
            .into_response();
    };

    tracing::info!(
        order_number = %callback.identificador,
        channel = %callback.canal,
        reference = %callback.referencia,
        "eupago webhook received"
    );

    match confirm_payment(&state, &callback).await {
        Ok(message) => Json(json!({ "success": true, "message": message })).into_response(),
        Err(err) => {
            // still 200: a retry would hit the same failure
            tracing::error!(error = ?err, "eupago webhook processing failed");
            Json(json!({ "success": false, "error": "Internal error" })).into_response()
        }
    }
}

/// GET /api/webhooks/eupago — liveness probe for gateway configuration.
pub async fn eupago_health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "EuPago Webhook",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

async fn confirm_payment(
    state: &AppState,
    callback: &EupagoCallback,
) -> Result<&'static str, sqlx::Error> {
    let order_number = &callback.identificador;

    // Compare-and-set: the WHERE clause is the idempotency guard, so two
    // near-simultaneous deliveries cannot both transition the order.
    let updated: Option<(Uuid, i64)> = sqlx::query_as(
        "UPDATE orders
         SET payment_status = 'paid', status = 'processing', paid_at = NOW(),
             eupago_transaction_id = $2, updated_at = NOW()
         WHERE order_number = $1 AND payment_status <> 'paid'
         RETURNING id, total_incl_vat_cents",
    )
    .bind(order_number)
    .bind(&callback.transacao)
    .fetch_optional(&state.db)
    .await?;

    let Some((_, total_cents)) = updated else {
        let existing: Option<(String,)> =
            sqlx::query_as("SELECT payment_status FROM orders WHERE order_number = $1")
                .bind(order_number)
                .fetch_optional(&state.db)
                .await?;
        return Ok(match existing {
            Some(_) => {
                tracing::info!(%order_number, "order already marked as paid");
                "Already processed"
            }
            None => {
                tracing::error!(%order_number, "webhook for unknown order");
                "Order not found"
            }
        });
    };

    let reported_cents = euros_to_cents(callback.valor);
    if (total_cents - reported_cents).abs() > AMOUNT_TOLERANCE_CENTS {
        tracing::error!(
            %order_number,
            expected_cents = total_cents,
            reported_cents,
            "amount mismatch on paid order"
        );
        // logged for manual investigation; the payment is still accepted
    }

    tracing::info!(
        %order_number,
        channel = %callback.canal,
        transaction = %callback.transacao,
        "order paid"
    );

    state
        .events
        .publish(
            SUBJECT_ORDER_PAID,
            &OrderPaidEvent {
                order_number: order_number.clone(),
                channel: callback.canal.clone(),
                transaction_id: callback.transacao.clone(),
                amount_cents: reported_cents,
            },
        )
        .await;

    Ok("Payment processed")
}
