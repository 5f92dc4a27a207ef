//! Shipping configuration CRUD (zones, classes, rates)

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::auth::AdminUser;
use crate::domain::shipping::{ShippingClass, ShippingRate, ShippingZone};
use crate::error::ApiError;
use crate::state::AppState;

fn validate_slug(code: &str) -> Result<(), ValidationError> {
    let ok = code
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');
    if ok {
        Ok(())
    } else {
        let mut err = ValidationError::new("slug");
        err.message = Some(
            "O código deve conter apenas letras minúsculas, números, hífens e underscores".into(),
        );
        Err(err)
    }
}

// ---------------------------------------------------------------------------
// Zones
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct ZonePayload {
    #[validate(
        length(min = 2, max = 50, message = "O código deve ter entre 2 e 50 caracteres"),
        custom = "validate_slug"
    )]
    pub code: String,
    #[validate(length(min = 2, max = 100, message = "O nome deve ter entre 2 e 100 caracteres"))]
    pub name: String,
    #[validate(range(min = 1000, max = 9999, message = "O código postal inicial deve estar entre 1000 e 9999"))]
    pub postal_code_start: i32,
    #[validate(range(min = 1000, max = 9999, message = "O código postal final deve estar entre 1000 e 9999"))]
    pub postal_code_end: i32,
    #[validate(range(min = 0, message = "O valor não pode ser negativo"))]
    pub free_shipping_threshold_cents: Option<i64>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[validate(range(min = 0, message = "A ordem não pode ser negativa"))]
    #[serde(default)]
    pub display_order: i32,
}

fn default_true() -> bool {
    true
}

impl ZonePayload {
    fn check(&self) -> Result<(), ApiError> {
        super::super::check_payload(self)?;
        if self.postal_code_end < self.postal_code_start {
            return Err(ApiError::Validation(
                "O código postal final deve ser maior ou igual ao inicial".to_string(),
            ));
        }
        Ok(())
    }
}

/// GET /api/admin/shipping/zones — includes inactive zones.
pub async fn list_zones(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let zones: Vec<ShippingZone> =
        sqlx::query_as("SELECT * FROM shipping_zones ORDER BY display_order, code")
            .fetch_all(&state.db)
            .await?;
    Ok(Json(json!({ "success": true, "data": zones })))
}

/// POST /api/admin/shipping/zones
pub async fn create_zone(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    Json(payload): Json<ZonePayload>,
) -> Result<Response, ApiError> {
    payload.check()?;
    let zone: ShippingZone = sqlx::query_as(
        "INSERT INTO shipping_zones (id, code, name, postal_code_start, postal_code_end,
             free_shipping_threshold_cents, is_active, display_order)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(&payload.code)
    .bind(&payload.name)
    .bind(payload.postal_code_start)
    .bind(payload.postal_code_end)
    .bind(payload.free_shipping_threshold_cents)
    .bind(payload.is_active)
    .bind(payload.display_order)
    .fetch_one(&state.db)
    .await
    .map_err(conflict_on_duplicate("Já existe uma zona com este código"))?;
    Ok((StatusCode::CREATED, Json(json!({ "success": true, "data": zone }))).into_response())
}

/// PUT /api/admin/shipping/zones/:id
pub async fn update_zone(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ZonePayload>,
) -> Result<Json<serde_json::Value>, ApiError> {
    payload.check()?;
    let zone: Option<ShippingZone> = sqlx::query_as(
        "UPDATE shipping_zones
         SET code = $2, name = $3, postal_code_start = $4, postal_code_end = $5,
             free_shipping_threshold_cents = $6, is_active = $7, display_order = $8,
             updated_at = NOW()
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(&payload.code)
    .bind(&payload.name)
    .bind(payload.postal_code_start)
    .bind(payload.postal_code_end)
    .bind(payload.free_shipping_threshold_cents)
    .bind(payload.is_active)
    .bind(payload.display_order)
    .fetch_optional(&state.db)
    .await
    .map_err(conflict_on_duplicate("Já existe uma zona com este código"))?;
    let zone = zone.ok_or_else(|| ApiError::NotFound("Zona não encontrada".to_string()))?;
    Ok(Json(json!({ "success": true, "data": zone })))
}

/// DELETE /api/admin/shipping/zones/:id — rates cascade.
pub async fn delete_zone(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let result = sqlx::query("DELETE FROM shipping_zones WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("Zona não encontrada".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Classes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct ClassPayload {
    #[validate(
        length(min = 2, max = 50, message = "O código deve ter entre 2 e 50 caracteres"),
        custom = "validate_slug"
    )]
    pub code: String,
    #[validate(length(min = 2, max = 100, message = "O nome deve ter entre 2 e 100 caracteres"))]
    pub name: String,
    #[validate(range(min = 1, message = "O peso máximo deve ser pelo menos 1 grama"))]
    pub max_weight_grams: i32,
    #[validate(length(min = 2, max = 200, message = "O nome da transportadora deve ter entre 2 e 200 caracteres"))]
    pub carrier_name: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// GET /api/admin/shipping/classes
pub async fn list_classes(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let classes: Vec<ShippingClass> =
        sqlx::query_as("SELECT * FROM shipping_classes ORDER BY max_weight_grams")
            .fetch_all(&state.db)
            .await?;
    Ok(Json(json!({ "success": true, "data": classes })))
}

/// POST /api/admin/shipping/classes
pub async fn create_class(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    Json(payload): Json<ClassPayload>,
) -> Result<Response, ApiError> {
    super::super::check_payload(&payload)?;
    let class: ShippingClass = sqlx::query_as(
        "INSERT INTO shipping_classes (id, code, name, max_weight_grams, carrier_name, is_active)
         VALUES ($1, $2, $3, $4, $5, $6) RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(&payload.code)
    .bind(&payload.name)
    .bind(payload.max_weight_grams)
    .bind(&payload.carrier_name)
    .bind(payload.is_active)
    .fetch_one(&state.db)
    .await
    .map_err(conflict_on_duplicate("Já existe uma classe com este código"))?;
    Ok((StatusCode::CREATED, Json(json!({ "success": true, "data": class }))).into_response())
}

/// PUT /api/admin/shipping/classes/:id
pub async fn update_class(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ClassPayload>,
) -> Result<Json<serde_json::Value>, ApiError> {
    super::super::check_payload(&payload)?;
    let class: Option<ShippingClass> = sqlx::query_as(
        "UPDATE shipping_classes
         SET code = $2, name = $3, max_weight_grams = $4, carrier_name = $5, is_active = $6,
             updated_at = NOW()
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(&payload.code)
    .bind(&payload.name)
    .bind(payload.max_weight_grams)
    .bind(&payload.carrier_name)
    .bind(payload.is_active)
    .fetch_optional(&state.db)
    .await
    .map_err(conflict_on_duplicate("Já existe uma classe com este código"))?;
    let class = class.ok_or_else(|| ApiError::NotFound("Classe não encontrada".to_string()))?;
    Ok(Json(json!({ "success": true, "data": class })))
}

/// DELETE /api/admin/shipping/classes/:id
pub async fn delete_class(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let result = sqlx::query("DELETE FROM shipping_classes WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("Classe não encontrada".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Rates
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct RatePayload {
    pub zone_id: Uuid,
    pub class_id: Uuid,
    #[validate(range(min = 0, message = "O peso mínimo não pode ser negativo"))]
    pub min_weight_grams: i32,
    #[validate(range(min = 1, message = "O peso máximo deve ser pelo menos 1 grama"))]
    pub max_weight_grams: i32,
    #[validate(range(min = 0, message = "O valor não pode ser negativo"))]
    pub base_rate_cents: i64,
    #[validate(range(min = 0, message = "O valor não pode ser negativo"))]
    #[serde(default)]
    pub extra_kg_rate_cents: i64,
    #[validate(range(min = 1, message = "O mínimo de dias deve ser pelo menos 1"))]
    #[serde(default = "default_days_min")]
    pub estimated_days_min: i32,
    #[validate(range(min = 1, message = "O máximo de dias deve ser pelo menos 1"))]
    #[serde(default = "default_days_max")]
    pub estimated_days_max: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_days_min() -> i32 {
    1
}

fn default_days_max() -> i32 {
    3
}

impl RatePayload {
    fn check(&self) -> Result<(), ApiError> {
        super::super::check_payload(self)?;
        if self.max_weight_grams <= self.min_weight_grams {
            return Err(ApiError::Validation(
                "O peso máximo deve ser maior que o peso mínimo".to_string(),
            ));
        }
        if self.estimated_days_max < self.estimated_days_min {
            return Err(ApiError::Validation(
                "O máximo de dias deve ser maior ou igual ao mínimo".to_string(),
            ));
        }
        Ok(())
    }
}

/// GET /api/admin/shipping/rates
pub async fn list_rates(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let rates: Vec<ShippingRate> =
        sqlx::query_as("SELECT * FROM shipping_rates ORDER BY zone_id, class_id, min_weight_grams")
            .fetch_all(&state.db)
            .await?;
    Ok(Json(json!({ "success": true, "data": rates })))
}

/// POST /api/admin/shipping/rates
pub async fn create_rate(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    Json(payload): Json<RatePayload>,
) -> Result<Response, ApiError> {
    payload.check()?;
    let rate: ShippingRate = sqlx::query_as(
        "INSERT INTO shipping_rates (id, zone_id, class_id, min_weight_grams, max_weight_grams,
             base_rate_cents, extra_kg_rate_cents, estimated_days_min, estimated_days_max, is_active)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(payload.zone_id)
    .bind(payload.class_id)
    .bind(payload.min_weight_grams)
    .bind(payload.max_weight_grams)
    .bind(payload.base_rate_cents)
    .bind(payload.extra_kg_rate_cents)
    .bind(payload.estimated_days_min)
    .bind(payload.estimated_days_max)
    .bind(payload.is_active)
    .fetch_one(&state.db)
    .await
    .map_err(conflict_on_duplicate("Já existe uma taxa para esta zona, classe e peso mínimo"))?;
    Ok((StatusCode::CREATED, Json(json!({ "success": true, "data": rate }))).into_response())
}

/// PUT /api/admin/shipping/rates/:id
pub async fn update_rate(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RatePayload>,
) -> Result<Json<serde_json::Value>, ApiError> {
    payload.check()?;
    let rate: Option<ShippingRate> = sqlx::query_as(
        "UPDATE shipping_rates
         SET zone_id = $2, class_id = $3, min_weight_grams = $4, max_weight_grams = $5,
             base_rate_cents = $6, extra_kg_rate_cents = $7,
             estimated_days_min = $8, estimated_days_max = $9, is_active = $10,
             updated_at = NOW()
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(payload.zone_id)
    .bind(payload.class_id)
    .bind(payload.min_weight_grams)
    .bind(payload.max_weight_grams)
    .bind(payload.base_rate_cents)
    .bind(payload.extra_kg_rate_cents)
    .bind(payload.estimated_days_min)
    .bind(payload.estimated_days_max)
    .bind(payload.is_active)
    .fetch_optional(&state.db)
    .await
    .map_err(conflict_on_duplicate("Já existe uma taxa para esta zona, classe e peso mínimo"))?;
    let rate = rate.ok_or_else(|| ApiError::NotFound("Taxa não encontrada".to_string()))?;
    Ok(Json(json!({ "success": true, "data": rate })))
}

/// DELETE /api/admin/shipping/rates/:id
pub async fn delete_rate(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let result = sqlx::query("DELETE FROM shipping_rates WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("Taxa não encontrada".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Map unique-constraint violations to a 409 with a useful message.
fn conflict_on_duplicate(message: &'static str) -> impl Fn(sqlx::Error) -> ApiError {
    move |err| {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.code().as_deref() == Some("23505") {
                return ApiError::Conflict(message.to_string());
            }
        }
        err.into()
    }
}
