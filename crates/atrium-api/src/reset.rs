//! Password reset: issue, consume, and garbage-collect single-use tokens.

use axum::{Extension, Json, extract::State};
use chrono::{Duration, Utc};
use rand_core::{OsRng, RngCore};
use tracing::info;

use atrium_db::models::ConsumeOutcome;
use atrium_types::api::{
    Claims, CleanupResponse, MessageResponse, PerformResetRequest, RequestResetRequest,
};
use atrium_types::models::Role;

use crate::AppState;
use crate::auth::{hash_password, normalize_email, validate_email, validate_new_password};
use crate::error::{ApiError, TokenRejection};
use crate::middleware::require_admin;

/// Tokens die an hour after issue.
const RESET_TOKEN_TTL_HOURS: i64 = 1;

/// The one body the request path ever returns on success, so a probe cannot
/// tell a real account from an unknown address.
const RESET_REQUESTED_MESSAGE: &str =
    "If an account with that email exists, a password reset link has been sent.";

/// 32 bytes of OS entropy, hex-encoded: 64 characters, which is both the
/// lookup key and the bearer credential in the emailed link.
pub fn generate_reset_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub async fn request_reset(
    State(state): State<AppState>,
    Json(req): Json<RequestResetRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let email = normalize_email(&req.email);
    if !validate_email(&email) {
        return Err(ApiError::validation("A valid email address is required"));
    }

    // Lookup is partition-scoped; the two identity spaces never mix
    let target = match req.user_type {
        Role::Client => state.db.get_client_by_email(&email)?.map(|c| c.id),
        Role::Admin => state.db.get_admin_by_email(&email)?.map(|a| a.id),
    };

    if let Some(user_id) = target {
        let token = generate_reset_token();
        let now = Utc::now();
        state.db.create_reset_token(
            &token,
            &user_id,
            req.user_type.as_str(),
            &email,
            now + Duration::hours(RESET_TOKEN_TTL_HOURS),
            now,
        )?;

        // Sent to the address as entered (trimmed), not the folded lookup
        // form. A mailer failure propagates; the persisted token stays
        // valid until the cleanup pass reaps it.
        let reset_link = format!("{}/reset-password?token={}", state.frontend_base_url, token);
        state
            .mailer
            .send_password_reset(req.email.trim(), &reset_link)
            .await?;

        info!(
            "Password reset email dispatched for {} {}",
            req.user_type.as_str(),
            user_id
        );
    }

    Ok(Json(MessageResponse {
        message: RESET_REQUESTED_MESSAGE.to_string(),
    }))
}

pub async fn perform_reset(
    State(state): State<AppState>,
    Json(req): Json<PerformResetRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    // Local checks first — nothing touches the store until they pass
    validate_new_password(&req.new_password)?;
    if req.token.len() != 64 || !req.token.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ApiError::validation("Malformed reset token"));
    }

    let new_hash = hash_password(&req.new_password)?;
    match state
        .db
        .consume_reset_token(&req.token, &new_hash, Utc::now())?
    {
        ConsumeOutcome::Consumed { user_id, user_type } => {
            info!("Password reset completed for {} {}", user_type, user_id);
            Ok(Json(MessageResponse {
                message: "Password has been reset.".to_string(),
            }))
        }
        ConsumeOutcome::NotFound => Err(ApiError::ResetTokenRejected {
            reason: TokenRejection::NotFound,
        }),
        ConsumeOutcome::AlreadyUsed => Err(ApiError::ResetTokenRejected {
            reason: TokenRejection::AlreadyUsed,
        }),
        ConsumeOutcome::Expired => Err(ApiError::ResetTokenRejected {
            reason: TokenRejection::Expired,
        }),
    }
}

/// Admin-triggered sweep of the same pruning the background loop runs.
pub async fn cleanup_tokens(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<CleanupResponse>, ApiError> {
    require_admin(&claims)?;
    let count = state.db.delete_stale_tokens(Utc::now())?;
    info!("Pruned {} stale reset tokens", count);
    Ok(Json(CleanupResponse { count }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::verify_password;
    use crate::test_util::{RecordingMailer, test_state};

    fn token_rows(state: &AppState) -> i64 {
        state
            .db
            .with_conn(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM password_reset_tokens", [], |r| r.get(0))?)
            })
            .unwrap()
    }

    #[test]
    fn token_is_64_hex_chars_and_unique() {
        let a = generate_reset_token();
        let b = generate_reset_token();
        assert_eq!(a.len(), 64);
        assert_eq!(b.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn unknown_email_returns_success_with_no_side_effects() {
        let mailer = RecordingMailer::new();
        let state = test_state(mailer.clone());

        let res = request_reset(
            State(state.clone()),
            Json(RequestResetRequest {
                email: "ghost@example.com".to_string(),
                user_type: Role::Client,
            }),
        )
        .await
        .unwrap();

        assert_eq!(res.0.message, RESET_REQUESTED_MESSAGE);
        assert!(mailer.sent.lock().unwrap().is_empty());
        assert_eq!(token_rows(&state), 0);
    }

    #[tokio::test]
    async fn admin_partition_does_not_match_client_emails() {
        let mailer = RecordingMailer::new();
        let state = test_state(mailer.clone());
        state
            .db
            .create_client("c1", "Client", "shared@example.com", "h", Utc::now())
            .unwrap();

        // Same address, wrong partition: still the generic success, no token
        let res = request_reset(
            State(state.clone()),
            Json(RequestResetRequest {
                email: "shared@example.com".to_string(),
                user_type: Role::Admin,
            }),
        )
        .await
        .unwrap();

        assert_eq!(res.0.message, RESET_REQUESTED_MESSAGE);
        assert_eq!(token_rows(&state), 0);
    }

    #[tokio::test]
    async fn known_email_mints_token_and_mails_original_address() {
        let mailer = RecordingMailer::new();
        let state = test_state(mailer.clone());
        state
            .db
            .create_client("c1", "Alice", "alice@example.com", "h", Utc::now())
            .unwrap();

        request_reset(
            State(state.clone()),
            Json(RequestResetRequest {
                email: "  Alice@Example.COM ".to_string(),
                user_type: Role::Client,
            }),
        )
        .await
        .unwrap();

        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        let (to, link) = &sent[0];
        assert_eq!(to, "Alice@Example.COM");
        assert!(link.starts_with("https://atrium.test/reset-password?token="));

        let token = link.rsplit_once("token=").unwrap().1.to_string();
        assert_eq!(token.len(), 64);

        let row = state.db.get_reset_token(&token).unwrap().unwrap();
        assert_eq!(row.user_id, "c1");
        assert_eq!(row.user_type, "client");
        assert_eq!(row.email, "alice@example.com");
        assert!(!row.used);

        let expires = atrium_db::parse_timestamp(&row.expires_at);
        let ttl = expires - Utc::now();
        assert!(ttl > Duration::minutes(59) && ttl <= Duration::minutes(61));
    }

    #[tokio::test]
    async fn mailer_failure_propagates_but_keeps_token() {
        let mailer = RecordingMailer::failing();
        let state = test_state(mailer);
        state
            .db
            .create_client("c1", "Alice", "alice@example.com", "h", Utc::now())
            .unwrap();

        let res = request_reset(
            State(state.clone()),
            Json(RequestResetRequest {
                email: "alice@example.com".to_string(),
                user_type: Role::Client,
            }),
        )
        .await;

        assert!(matches!(res, Err(ApiError::Store(_))));
        // The orphaned row stays behind for the cleanup pass
        assert_eq!(token_rows(&state), 1);
    }

    #[tokio::test]
    async fn weak_password_fails_before_any_token_lookup() {
        let mailer = RecordingMailer::new();
        let state = test_state(mailer);
        state
            .db
            .create_client("c1", "Alice", "alice@example.com", "h", Utc::now())
            .unwrap();
        let now = Utc::now();
        state
            .db
            .create_reset_token("a".repeat(64).as_str(), "c1", "client", "alice@example.com", now + Duration::hours(1), now)
            .unwrap();

        let res = perform_reset(
            State(state.clone()),
            Json(PerformResetRequest {
                token: "a".repeat(64),
                new_password: "short".to_string(),
            }),
        )
        .await;

        assert!(matches!(res, Err(ApiError::Validation { .. })));
        // Token untouched
        let row = state.db.get_reset_token(&"a".repeat(64)).unwrap().unwrap();
        assert!(!row.used);
    }

    #[tokio::test]
    async fn full_reset_flow_works_exactly_once() {
        let mailer = RecordingMailer::new();
        let state = test_state(mailer.clone());
        let old_hash = hash_password("OldSecret1").unwrap();
        state
            .db
            .create_client("11111111-1111-1111-1111-111111111111", "Alice", "alice@example.com", &old_hash, Utc::now())
            .unwrap();

        request_reset(
            State(state.clone()),
            Json(RequestResetRequest {
                email: "alice@example.com".to_string(),
                user_type: Role::Client,
            }),
        )
        .await
        .unwrap();

        let token = {
            let sent = mailer.sent.lock().unwrap();
            sent[0].1.rsplit_once("token=").unwrap().1.to_string()
        };

        perform_reset(
            State(state.clone()),
            Json(PerformResetRequest {
                token: token.clone(),
                new_password: "NewSecret1".to_string(),
            }),
        )
        .await
        .unwrap();

        let client = state
            .db
            .get_client_by_id("11111111-1111-1111-1111-111111111111")
            .unwrap()
            .unwrap();
        assert!(verify_password("NewSecret1", &client.password));
        assert!(!verify_password("OldSecret1", &client.password));

        // Replay with the same token is rejected and changes nothing
        let res = perform_reset(
            State(state.clone()),
            Json(PerformResetRequest {
                token,
                new_password: "Attacker123".to_string(),
            }),
        )
        .await;
        assert!(matches!(
            res,
            Err(ApiError::ResetTokenRejected {
                reason: TokenRejection::AlreadyUsed
            })
        ));
        let client = state
            .db
            .get_client_by_id("11111111-1111-1111-1111-111111111111")
            .unwrap()
            .unwrap();
        assert!(verify_password("NewSecret1", &client.password));
    }

    #[tokio::test]
    async fn malformed_token_is_rejected_locally() {
        let mailer = RecordingMailer::new();
        let state = test_state(mailer);

        let res = perform_reset(
            State(state),
            Json(PerformResetRequest {
                token: "not-hex".to_string(),
                new_password: "GoodPass1".to_string(),
            }),
        )
        .await;
        assert!(matches!(res, Err(ApiError::Validation { .. })));
    }

    #[tokio::test]
    async fn cleanup_is_admin_gated() {
        let mailer = RecordingMailer::new();
        let state = test_state(mailer);

        let client_claims = Claims {
            sub: uuid::Uuid::new_v4(),
            role: Role::Client,
            exp: usize::MAX,
        };
        let res = cleanup_tokens(State(state.clone()), Extension(client_claims)).await;
        assert!(matches!(res, Err(ApiError::Forbidden { .. })));

        let admin_claims = Claims {
            sub: uuid::Uuid::new_v4(),
            role: Role::Admin,
            exp: usize::MAX,
        };
        let res = cleanup_tokens(State(state), Extension(admin_claims))
            .await
            .unwrap();
        assert_eq!(res.0.count, 0);
    }
}
