// Per-client rate limiting with governor

use std::net::{IpAddr, Ipv4Addr};
use std::num::NonZeroU32;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use tracing::warn;

use super::ClientAddr;
use crate::error::AppError;
use crate::models::AppState;

pub type ClientRateLimiter = DefaultKeyedRateLimiter<IpAddr>;

pub fn build_rate_limiter(per_minute: u32) -> ClientRateLimiter {
    let quota = Quota::per_minute(NonZeroU32::new(per_minute).unwrap_or(NonZeroU32::MIN));
    RateLimiter::keyed(quota)
}

/// Reject the request with 429 once the client has used up its quota.
/// Clients whose address cannot be determined share one bucket.
pub async fn rate_limiter_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let client = ClientAddr::resolve(
        req.headers(),
        req.extensions(),
        state.config.server.trust_proxy,
    );
    let key = client.0.unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

    if state.rate_limiter.check_key(&key).is_err() {
        warn!(client = %client, path = %req.uri().path(), "Rate limit exceeded");
        return Err(AppError::RateLimited);
    }

    Ok(next.run(req).await)
}
