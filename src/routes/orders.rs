//! Order creation and lookup

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::auth::Principal;
use crate::domain::order::{cents_excluding_vat, generate_order_number, Order, OrderItem};
use crate::error::ApiError;
use crate::events::{OrderCreatedEvent, SUBJECT_ORDER_CREATED};
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderRequest {
    #[validate]
    pub customer: CustomerPayload,
    #[validate]
    pub shipping: ShippingPayload,
    #[validate(length(min = 1, message = "No items in order"))]
    pub items: Vec<OrderItemPayload>,
    #[validate(range(min = 0))]
    pub subtotal_cents: i64,
    #[validate(range(min = 0))]
    pub shipping_cost_cents: i64,
    #[validate(range(min = 0))]
    pub total_cents: i64,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CustomerPayload {
    #[validate(length(min = 1, message = "Missing customer information"))]
    pub name: String,
    #[validate(email(message = "Missing customer information"))]
    pub email: String,
    #[validate(length(min = 1, message = "Missing customer information"))]
    pub phone: String,
    pub company: Option<String>,
    pub nif: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ShippingPayload {
    #[validate(length(min = 1, message = "Missing shipping information"))]
    pub address: String,
    #[validate(length(min = 1, message = "Missing shipping information"))]
    pub city: String,
    #[validate(length(min = 4, message = "Missing shipping information"))]
    pub postal_code: String,
    #[serde(default = "default_country")]
    pub country: String,
}

fn default_country() -> String {
    "PT".to_string()
}

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct OrderItemPayload {
    pub variant_id: Uuid,
    #[validate(range(min = 1, message = "Invalid quantity"))]
    pub quantity: i32,
    #[validate(range(min = 0))]
    pub unit_price_cents: i64,
    #[validate(range(min = 0))]
    pub line_total_cents: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderResponse {
    pub success: bool,
    pub order_id: String,
    pub message: &'static str,
}

/// POST /api/orders
///
/// Customer upsert, address, order, items and stock decrement commit as one
/// transaction; a failure partway leaves nothing behind.
pub async fn create_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateOrderRequest>,
) -> Result<Response, ApiError> {
    super::check_payload(&request)?;
    for item in &request.items {
        super::check_payload(item)?;
    }

    let auth_user_id = Principal::from_headers(&headers).map(|p| p.user_id);

    let (first_name, last_name) = split_name(&request.customer.name);

    let mut tx = state.db.begin().await?;

    let (customer_id,): (Uuid,) = sqlx::query_as(
        "INSERT INTO customers (id, first_name, last_name, email, phone, company_name, tax_id, auth_user_id)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         ON CONFLICT (email) DO UPDATE
           SET first_name = EXCLUDED.first_name, last_name = EXCLUDED.last_name,
               phone = EXCLUDED.phone, company_name = EXCLUDED.company_name,
               tax_id = EXCLUDED.tax_id, updated_at = NOW()
         RETURNING id",
    )
    .bind(Uuid::now_v7())
    .bind(first_name)
    .bind(last_name)
    .bind(request.customer.email.trim().to_lowercase())
    .bind(&request.customer.phone)
    .bind(&request.customer.company)
    .bind(&request.customer.nif)
    .bind(&auth_user_id)
    .fetch_one(&mut *tx)
    .await?;

    let (address_id,): (Uuid,) = sqlx::query_as(
        "INSERT INTO shipping_addresses (id, customer_id, address_line_1, city, postal_code, country)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING id",
    )
    .bind(Uuid::now_v7())
    .bind(customer_id)
    .bind(&request.shipping.address)
    .bind(&request.shipping.city)
    .bind(&request.shipping.postal_code)
    .bind(&request.shipping.country)
    .fetch_one(&mut *tx)
    .await?;

    let order_number = generate_order_number();
    let order_id = Uuid::now_v7();
    let subtotal = request.subtotal_cents;
    let shipping_cost = request.shipping_cost_cents;

    sqlx::query(
        "INSERT INTO orders (id, order_number, customer_id, status, payment_status,
             subtotal_excl_vat_cents, subtotal_incl_vat_cents,
             shipping_excl_vat_cents, shipping_incl_vat_cents,
             total_excl_vat_cents, total_incl_vat_cents,
             shipping_address_id, notes)
         VALUES ($1, $2, $3, 'pending', 'pending', $4, $5, $6, $7, $8, $9, $10, $11)",
    )
    .bind(order_id)
    .bind(&order_number)
    .bind(customer_id)
    .bind(cents_excluding_vat(subtotal))
    .bind(subtotal)
    .bind(cents_excluding_vat(shipping_cost))
    .bind(shipping_cost)
    .bind(cents_excluding_vat(subtotal + shipping_cost))
    .bind(request.total_cents)
    .bind(address_id)
    .bind(&request.notes)
    .execute(&mut *tx)
    .await?;

    for item in &request.items {
        let snapshot: Option<(String, String, Option<String>)> = sqlx::query_as(
            "SELECT product_name, sku, size_format FROM product_variants WHERE id = $1",
        )
        .bind(item.variant_id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some((product_name, sku, size_format)) = snapshot else {
            return Err(ApiError::NotFound(format!("Unknown variant {}", item.variant_id)));
        };

        sqlx::query(
            "INSERT INTO order_items (id, order_id, product_variant_id, product_name, sku, size_format,
                 quantity, unit_price_excl_vat_cents, unit_price_incl_vat_cents,
                 line_total_excl_vat_cents, line_total_incl_vat_cents)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(Uuid::now_v7())
        .bind(order_id)
        .bind(item.variant_id)
        .bind(&product_name)
        .bind(&sku)
        .bind(&size_format)
        .bind(item.quantity)
        .bind(cents_excluding_vat(item.unit_price_cents))
        .bind(item.unit_price_cents)
        .bind(cents_excluding_vat(item.line_total_cents))
        .bind(item.line_total_cents)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE product_variants
             SET stock_quantity = GREATEST(stock_quantity - $2, 0), updated_at = NOW()
             WHERE id = $1",
        )
        .bind(item.variant_id)
        .bind(item.quantity)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    tracing::info!(%order_number, items = request.items.len(), "order created");
    state
        .events
        .publish(
            SUBJECT_ORDER_CREATED,
            &OrderCreatedEvent {
                order_number: order_number.clone(),
                total_incl_vat_cents: request.total_cents,
                item_count: request.items.len(),
            },
        )
        .await;

    Ok((
        StatusCode::CREATED,
        Json(CreateOrderResponse {
            success: true,
            order_id: order_number,
            message: "Order created successfully",
        }),
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
pub struct OrderListParams {
    pub order_number: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// GET /api/orders
///
/// With `?order_number=` the order number acts as the capability; without
/// it the caller gets their own order history and must be authenticated.
pub async fn list_orders(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<OrderListParams>,
) -> Result<Response, ApiError> {
    if let Some(order_number) = &params.order_number {
        let order: Option<Order> = sqlx::query_as("SELECT * FROM orders WHERE order_number = $1")
            .bind(order_number)
            .fetch_optional(&state.db)
            .await?;
        let Some(order) = order else {
            return Err(ApiError::NotFound("Encomenda não encontrada".to_string()));
        };
        let items: Vec<OrderItem> =
            sqlx::query_as("SELECT * FROM order_items WHERE order_id = $1")
                .bind(order.id)
                .fetch_all(&state.db)
                .await?;
        return Ok(Json(json!({ "success": true, "data": { "order": order, "items": items } }))
            .into_response());
    }

    let principal = Principal::from_headers(&headers).ok_or(ApiError::Unauthorized)?;
    let page = params.page.unwrap_or(1).max(1);
    let per_page = params.per_page.unwrap_or(20).min(100);

    let orders: Vec<Order> = sqlx::query_as(
        "SELECT o.* FROM orders o
         JOIN customers c ON c.id = o.customer_id
         WHERE c.auth_user_id = $1
         ORDER BY o.created_at DESC
         LIMIT $2 OFFSET $3",
    )
    .bind(&principal.user_id)
    .bind(per_page as i64)
    .bind(((page - 1) * per_page) as i64)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(json!({ "success": true, "data": orders, "page": page })).into_response())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OrderStatusData {
    payment_status: String,
    order_status: String,
    paid_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// GET /api/orders/:order_number/status — checkout polling endpoint.
pub async fn order_status(
    State(state): State<AppState>,
    Path(order_number): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let row: Option<(String, String, Option<chrono::DateTime<chrono::Utc>>)> = sqlx::query_as(
        "SELECT payment_status, status, paid_at FROM orders WHERE order_number = $1",
    )
    .bind(&order_number)
    .fetch_optional(&state.db)
    .await?;
    let Some((payment_status, status, paid_at)) = row else {
        return Err(ApiError::NotFound("Encomenda não encontrada".to_string()));
    };
    let data = OrderStatusData { payment_status, order_status: status, paid_at };
    Ok(Json(json!({ "success": true, "data": data })))
}

fn split_name(full_name: &str) -> (String, String) {
    let mut parts = full_name.trim().split_whitespace();
    let first = parts.next().unwrap_or_default().to_string();
    let rest: Vec<&str> = parts.collect();
    (first, rest.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_name() {
        assert_eq!(split_name("Maria"), ("Maria".to_string(), String::new()));
        assert_eq!(
            split_name("  Maria João Silva "),
            ("Maria".to_string(), "João Silva".to_string())
        );
    }

    #[test]
    fn test_create_order_request_validation() {
        let request = CreateOrderRequest {
            customer: CustomerPayload {
                name: "Maria Silva".into(),
                email: "maria@example.com".into(),
                phone: "912345678".into(),
                company: None,
                nif: None,
            },
            shipping: ShippingPayload {
                address: "Rua das Flores 1".into(),
                city: "Lisboa".into(),
                postal_code: "1000-001".into(),
                country: "PT".into(),
            },
            items: vec![],
            subtotal_cents: 1000,
            shipping_cost_cents: 500,
            total_cents: 1500,
            notes: None,
        };
        // empty item list is rejected
        assert!(request.validate().is_err());
    }
}
