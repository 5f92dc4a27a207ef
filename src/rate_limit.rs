//! Fixed-window rate limiting
//!
//! Process-local counters; a multi-instance deployment must replace this
//! with a shared store (Redis or similar) keyed the same way.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::error::ApiError;
use crate::state::AppState;

pub const RATE_LIMIT_PUBLIC: u32 = 30; // requests per window
pub const RATE_LIMIT_ADMIN: u32 = 100;
pub const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);

#[derive(Clone, Copy, Debug)]
pub struct RateOutcome {
    pub limited: bool,
    pub remaining: u32,
}

struct Window {
    count: u32,
    reset_at: Instant,
}

#[derive(Clone, Default)]
pub struct RateLimiter {
    windows: Arc<Mutex<HashMap<String, Window>>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    fn check(&self, key: &str, limit: u32) -> RateOutcome {
        let now = Instant::now();
        let mut windows = match self.windows.lock() {
            Ok(guard) => guard,
            // a poisoned lock should not take the API down
            Err(poisoned) => poisoned.into_inner(),
        };
        let window = windows.entry(key.to_string()).or_insert(Window {
            count: 0,
            reset_at: now + RATE_LIMIT_WINDOW,
        });
        if now > window.reset_at {
            window.count = 0;
            window.reset_at = now + RATE_LIMIT_WINDOW;
        }
        if window.count >= limit {
            return RateOutcome { limited: true, remaining: 0 };
        }
        window.count += 1;
        RateOutcome {
            limited: false,
            remaining: limit - window.count,
        }
    }

    pub fn check_public(&self, client_ip: &str) -> RateOutcome {
        self.check(&format!("public:{client_ip}"), RATE_LIMIT_PUBLIC)
    }

    pub fn check_admin(&self, user_id: &str) -> RateOutcome {
        self.check(&format!("admin:{user_id}"), RATE_LIMIT_ADMIN)
    }
}

fn client_ip(request: &Request) -> String {
    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Per-IP limiter applied to the public API surface.
pub async fn public_rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let ip = client_ip(&request);
    let outcome = state.rate_limiter.check_public(&ip);
    if outcome.limited {
        tracing::warn!(%ip, "public rate limit exceeded");
        return ApiError::RateLimited.into_response();
    }
    let mut response = next.run(request).await;
    if let Ok(value) = outcome.remaining.to_string().parse() {
        response.headers_mut().insert("x-ratelimit-remaining", value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_down_and_limits() {
        let limiter = RateLimiter::new();
        for i in 0..RATE_LIMIT_PUBLIC {
            let outcome = limiter.check_public("1.2.3.4");
            assert!(!outcome.limited, "request {i}");
            assert_eq!(outcome.remaining, RATE_LIMIT_PUBLIC - i - 1);
        }
        assert!(limiter.check_public("1.2.3.4").limited);
        // other clients are unaffected
        assert!(!limiter.check_public("5.6.7.8").limited);
    }

    #[test]
    fn test_admin_and_public_keys_are_separate() {
        let limiter = RateLimiter::new();
        for _ in 0..RATE_LIMIT_PUBLIC {
            limiter.check_public("shared");
        }
        assert!(limiter.check_public("shared").limited);
        assert!(!limiter.check_admin("shared").limited);
    }
}
