use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use atrium_api::AppState;

/// Background task that prunes stale password-reset tokens.
///
/// Runs on an interval, deleting tokens past their expiry and tokens that
/// were consumed more than the retention window ago. The same sweep is
/// reachable on demand through the admin cleanup endpoint.
pub async fn run_cleanup_loop(state: AppState, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        interval.tick().await;

        match state.db.delete_stale_tokens(Utc::now()) {
            Ok(count) => {
                if count > 0 {
                    info!("Cleanup: pruned {} stale reset tokens", count);
                }
            }
            Err(e) => {
                warn!("Cleanup error: {}", e);
            }
        }
    }
}
