//! Shared application state

use std::sync::Arc;

use sqlx::PgPool;

use crate::auth::AuthorizationService;
use crate::config::Config;
use crate::events::EventPublisher;
use crate::payments::EupagoClient;
use crate::rate_limit::RateLimiter;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<Config>,
    pub gateway: EupagoClient,
    pub events: EventPublisher,
    pub rate_limiter: RateLimiter,
    pub authz: AuthorizationService,
}

impl AppState {
    pub fn new(db: PgPool, config: Config, events: EventPublisher) -> Self {
        let gateway = EupagoClient::new(&config);
        let authz = AuthorizationService::new(db.clone(), &config.admin_emails);
        Self {
            db,
            config: Arc::new(config),
            gateway,
            events,
            rate_limiter: RateLimiter::new(),
            authz,
        }
    }
}
