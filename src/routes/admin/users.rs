//! User role management

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::auth::AdminUser;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRoleRequest {
    pub is_admin: bool,
}

/// PATCH /api/admin/users/:user_id/role
pub async fn update_role(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(request): Json<UpdateRoleRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    // an admin cannot lock themselves out
    if user_id == admin.user_id && !request.is_admin {
        return Err(ApiError::Validation(
            "Não pode remover o seu próprio acesso de administrador".to_string(),
        ));
    }

    state
        .authz
        .set_admin(&user_id, request.is_admin)
        .await
        .map_err(ApiError::from)?;

    tracing::info!(target_user = %user_id, is_admin = request.is_admin, admin = %admin.user_id,
        "user role updated");
    Ok(Json(json!({ "success": true })))
}
