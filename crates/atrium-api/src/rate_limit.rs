use std::net::{IpAddr, SocketAddr};
use std::num::NonZeroU32;

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};

use crate::AppState;
use crate::error::ApiError;

pub type IpRateLimiter = RateLimiter<IpAddr, DefaultKeyedStateStore<IpAddr>, DefaultClock>;

/// Per-IP limiter for the unauthenticated reset endpoints.
pub fn reset_limiter(per_minute: u32) -> IpRateLimiter {
    let quota = Quota::per_minute(NonZeroU32::new(per_minute.max(1)).unwrap_or(NonZeroU32::MIN));
    RateLimiter::keyed(quota)
}

/// Requires the server to be served with connect info so the peer address
/// is available.
pub async fn limit_by_ip(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if state.reset_limiter.check_key(&addr.ip()).is_err() {
        return Err(ApiError::RateLimited);
    }
    Ok(next.run(req).await)
}
