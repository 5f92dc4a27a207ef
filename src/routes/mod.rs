//! HTTP API surface

pub mod admin;
pub mod catalog;
pub mod orders;
pub mod payments;
pub mod shipping;
pub mod webhooks;

use axum::routing::{get, patch, post, put};
use axum::{middleware, Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use validator::Validate;

use crate::error::ApiError;
use crate::rate_limit::public_rate_limit;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/api/variants/:id", get(catalog::get_variant))
        .route("/api/orders", get(orders::list_orders).post(orders::create_order))
        .route("/api/orders/:order_number/status", get(orders::order_status))
        .route("/api/payment/multibanco", post(payments::create_multibanco))
        .route("/api/payment/mbway", post(payments::create_mbway))
        .route("/api/shipping/calculate", post(shipping::calculate))
        .route("/api/shipping/zones", get(shipping::list_active_zones))
        .layer(middleware::from_fn_with_state(state.clone(), public_rate_limit));

    let admin_routes = Router::new()
        .route("/api/admin/price-tiers/apply", post(admin::price_tiers::apply))
        .route(
            "/api/admin/shipping/zones",
            get(admin::shipping::list_zones).post(admin::shipping::create_zone),
        )
        .route(
            "/api/admin/shipping/zones/:id",
            put(admin::shipping::update_zone).delete(admin::shipping::delete_zone),
        )
        .route(
            "/api/admin/shipping/classes",
            get(admin::shipping::list_classes).post(admin::shipping::create_class),
        )
        .route(
            "/api/admin/shipping/classes/:id",
            put(admin::shipping::update_class).delete(admin::shipping::delete_class),
        )
        .route(
            "/api/admin/shipping/rates",
            get(admin::shipping::list_rates).post(admin::shipping::create_rate),
        )
        .route(
            "/api/admin/shipping/rates/:id",
            put(admin::shipping::update_rate).delete(admin::shipping::delete_rate),
        )
        .route("/api/admin/orders", get(admin::orders::list_orders))
        .route(
            "/api/admin/orders/:order_number/status",
            patch(admin::orders::update_status),
        )
        .route("/api/admin/users/:user_id/role", patch(admin::users::update_role));

    // the webhook is exempt from rate limiting: the gateway retries are not ours to throttle
    let webhook = Router::new().route(
        "/api/webhooks/eupago",
        post(webhooks::eupago_callback).get(webhooks::eupago_health),
    );

    Router::new()
        .route("/health", get(health))
        .merge(public)
        .merge(admin_routes)
        .merge(webhook)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "healthy", "service": "acrilux-ecommerce" }))
}

/// Run validator-derive checks, surfacing the first message as a 400.
pub(crate) fn check_payload<T: Validate>(payload: &T) -> Result<(), ApiError> {
    payload.validate().map_err(|errors| {
        let message =
            first_validation_message(&errors).unwrap_or_else(|| "invalid request".to_string());
        ApiError::Validation(message)
    })
}

fn first_validation_message(errors: &validator::ValidationErrors) -> Option<String> {
    use validator::ValidationErrorsKind;
    for (field, kind) in errors.errors() {
        match kind {
            ValidationErrorsKind::Field(errs) => {
                if let Some(err) = errs.first() {
                    return Some(
                        err.message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| format!("invalid {field}")),
                    );
                }
            }
            ValidationErrorsKind::Struct(nested) => {
                if let Some(message) = first_validation_message(nested) {
                    return Some(message);
                }
            }
            ValidationErrorsKind::List(items) => {
                for nested in items.values() {
                    if let Some(message) = first_validation_message(nested) {
                        return Some(message);
                    }
                }
            }
        }
    }
    None
}
