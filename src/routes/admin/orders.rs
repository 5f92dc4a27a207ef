//! Backoffice order management

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::auth::AdminUser;
use crate::domain::order::{Order, OrderStatus};
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub status: Option<String>,
}

/// GET /api/admin/orders — newest first, optionally filtered by status.
pub async fn list_orders(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let page = params.page.unwrap_or(1).max(1);
    let per_page = params.per_page.unwrap_or(20).min(100);

    if let Some(status) = &params.status {
        if OrderStatus::parse(status).is_none() {
            return Err(ApiError::Validation(format!("Unknown order status '{status}'")));
        }
    }

    let orders: Vec<Order> = sqlx::query_as(
        "SELECT * FROM orders
         WHERE ($1::TEXT IS NULL OR status = $1)
         ORDER BY created_at DESC
         LIMIT $2 OFFSET $3",
    )
    .bind(&params.status)
    .bind(per_page as i64)
    .bind(((page - 1) * per_page) as i64)
    .fetch_all(&state.db)
    .await?;

    let total: (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM orders WHERE ($1::TEXT IS NULL OR status = $1)")
            .bind(&params.status)
            .fetch_one(&state.db)
            .await?;

    Ok(Json(json!({ "success": true, "data": orders, "total": total.0, "page": page })))
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

/// PATCH /api/admin/orders/:order_number/status
///
/// Fulfillment status only; there is deliberately no transition graph, and
/// payment fields cannot be touched through this path.
pub async fn update_status(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(order_number): Path<String>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Some(status) = OrderStatus::parse(&request.status) else {
        return Err(ApiError::Validation(format!("Unknown order status '{}'", request.status)));
    };

    let updated: Option<Order> = sqlx::query_as(
        "UPDATE orders SET status = $2, updated_at = NOW()
         WHERE order_number = $1 RETURNING *",
    )
    .bind(&order_number)
    .bind(status.as_str())
    .fetch_optional(&state.db)
    .await?;
    let order = updated.ok_or_else(|| ApiError::NotFound("Encomenda não encontrada".to_string()))?;

    tracing::info!(
        %order_number,
        status = status.as_str(),
        admin = %admin.user_id,
        "order status updated"
    );
    Ok(Json(json!({ "success": true, "data": order })))
}
