//! Authorization
//!
//! Identity arrives from the upstream auth proxy as `x-user-*` headers; this
//! module only answers the one capability question the backoffice needs:
//! is this principal an admin? The check is tiered — proxy-asserted roles
//! first, then the env allowlist, then the `user_roles` table — so most
//! admin requests never touch the database.

use std::collections::HashSet;
use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::header::HeaderMap;
use axum::http::request::Parts;
use sqlx::PgPool;

use crate::error::ApiError;
use crate::state::AppState;

const ADMIN_ROLE_NAMES: [&str; 4] = ["admin", "super_admin", "superadmin", "owner"];

/// Authenticated identity as asserted by the reverse proxy.
#[derive(Clone, Debug)]
pub struct Principal {
    pub user_id: String,
    pub email: Option<String>,
    pub roles: Vec<String>,
}

impl Principal {
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let user_id = headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())?
            .to_string();
        let email = headers
            .get("x-user-email")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim().to_lowercase())
            .filter(|v| !v.is_empty());
        let roles = headers
            .get("x-user-roles")
            .and_then(|v| v.to_str().ok())
            .map(|v| {
                v.split(',')
                    .map(|r| r.trim().to_lowercase())
                    .filter(|r| !r.is_empty())
                    .collect()
            })
            .unwrap_or_default();
        Some(Self { user_id, email, roles })
    }

    fn has_admin_role(&self) -> bool {
        self.roles.iter().any(|r| ADMIN_ROLE_NAMES.contains(&r.as_str()))
    }
}

#[derive(Clone)]
pub struct AuthorizationService {
    db: PgPool,
    admin_emails: Arc<HashSet<String>>,
}

impl AuthorizationService {
    pub fn new(db: PgPool, admin_emails: &[String]) -> Self {
        Self {
            db,
            admin_emails: Arc::new(admin_emails.iter().map(|e| e.to_lowercase()).collect()),
        }
    }

    /// Tiered admin check: asserted roles, then allowlist, then DB.
    pub async fn is_admin(&self, principal: &Principal) -> bool {
        if principal.has_admin_role() {
            return true;
        }
        if let Some(email) = &principal.email {
            if self.admin_emails.contains(email) {
                return true;
            }
        }
        self.has_admin_role_in_db(&principal.user_id).await
    }

    async fn has_admin_role_in_db(&self, user_id: &str) -> bool {
        let row: Result<Option<(String,)>, _> =
            sqlx::query_as("SELECT role FROM user_roles WHERE user_id = $1 AND role = 'admin'")
                .bind(user_id)
                .fetch_optional(&self.db)
                .await;
        match row {
            Ok(found) => found.is_some(),
            Err(err) => {
                tracing::error!(user_id, error = %err, "admin role lookup failed");
                false
            }
        }
    }

    /// Grant or revoke the admin role for a user.
    pub async fn set_admin(&self, user_id: &str, is_admin: bool) -> Result<(), sqlx::Error> {
        if is_admin {
            sqlx::query(
                "INSERT INTO user_roles (user_id, role) VALUES ($1, 'admin') ON CONFLICT DO NOTHING",
            )
            .bind(user_id)
            .execute(&self.db)
            .await?;
        } else {
            sqlx::query("DELETE FROM user_roles WHERE user_id = $1 AND role = 'admin'")
                .bind(user_id)
                .execute(&self.db)
                .await?;
        }
        Ok(())
    }
}

/// Extractor guarding admin routes: 401 without identity, 429 over quota,
/// 403 without the admin capability.
pub struct AdminUser(pub Principal);

#[axum::async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let principal = Principal::from_headers(&parts.headers).ok_or(ApiError::Unauthorized)?;
        if state
            .rate_limiter
            .check_admin(&principal.user_id)
            .limited
        {
            tracing::warn!(user_id = %principal.user_id, "admin rate limit exceeded");
            return Err(ApiError::RateLimited);
        }
        if !state.authz.is_admin(&principal).await {
            return Err(ApiError::Forbidden);
        }
        Ok(AdminUser(principal))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(
                axum::http::header::HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        map
    }

    #[test]
    fn test_principal_from_headers() {
        let map = headers(&[
            ("x-user-id", "u1"),
            ("x-user-email", " Admin@Example.COM "),
            ("x-user-roles", "Editor, ADMIN"),
        ]);
        let principal = Principal::from_headers(&map).unwrap();
        assert_eq!(principal.user_id, "u1");
        assert_eq!(principal.email.as_deref(), Some("admin@example.com"));
        assert!(principal.has_admin_role());
    }

    #[test]
    fn test_principal_requires_user_id() {
        assert!(Principal::from_headers(&headers(&[("x-user-email", "a@b.c")])).is_none());
        assert!(Principal::from_headers(&headers(&[("x-user-id", "  ")])).is_none());
    }

    #[test]
    fn test_non_admin_roles_do_not_elevate() {
        let map = headers(&[("x-user-id", "u1"), ("x-user-roles", "editor,viewer")]);
        let principal = Principal::from_headers(&map).unwrap();
        assert!(!principal.has_admin_role());
    }
}
