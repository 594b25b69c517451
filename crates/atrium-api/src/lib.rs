pub mod admin;
pub mod auth;
pub mod email;
pub mod error;
pub mod leads;
pub mod middleware;
pub mod rate_limit;
pub mod reset;
pub mod wizard;

#[cfg(test)]
pub(crate) mod test_util;

use std::sync::Arc;

use atrium_db::Database;

use crate::email::Mailer;
use crate::rate_limit::IpRateLimiter;

pub type AppState = Arc<AppStateInner>;

/// Shared request state. Constructed once by the server entry point, which
/// owns the database and mailer lifecycles; handlers only ever borrow it.
pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub frontend_base_url: String,
    pub mailer: Arc<dyn Mailer>,
    pub reset_limiter: IpRateLimiter,
}
