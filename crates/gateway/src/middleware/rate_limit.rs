//! Rate limiting middleware using token bucket algorithm

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    clock::QuantaClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use paperlens_common::{config::RateLimitConfig, errors::AppError};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Rate limiter using governor crate
pub type GlobalRateLimiter = RateLimiter<NotKeyed, InMemoryState, QuantaClock>;

/// Shared limiter plus the configured rate for error bodies
#[derive(Clone)]
pub struct Limiter {
    inner: Arc<GlobalRateLimiter>,
    per_second: u32,
}

/// Create a new rate limiter; zero values are raised to one
pub fn create_rate_limiter(config: &RateLimitConfig) -> Limiter {
    let per_second = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);
    let burst = NonZeroU32::new(config.burst).unwrap_or(per_second);

    let quota = Quota::per_second(per_second).allow_burst(burst);

    Limiter {
        inner: Arc::new(RateLimiter::direct(quota)),
        per_second: per_second.get(),
    }
}

/// Rate limiting middleware
pub async fn rate_limit_middleware(
    State(limiter): State<Limiter>,
    request: Request,
    next: Next,
) -> Response {
    match limiter.inner.check() {
        Ok(_) => next.run(request).await,
        Err(_) => AppError::RateLimited {
            limit: limiter.per_second,
        }
        .into_response(),
    }
}
