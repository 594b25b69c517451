use anyhow::anyhow;
use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Json, extract::State, http::StatusCode};
use chrono::Utc;
use jsonwebtoken::{EncodingKey, Header, encode};
use uuid::Uuid;

use atrium_types::api::{Claims, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};
use atrium_types::models::Role;

use crate::AppState;
use crate::error::ApiError;

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    if req.name.trim().is_empty() {
        return Err(ApiError::validation("Name is required"));
    }
    let email = normalize_email(&req.email);
    if !validate_email(&email) {
        return Err(ApiError::validation("A valid email address is required"));
    }
    validate_new_password(&req.password)?;

    if state.db.get_client_by_email(&email)?.is_some() {
        return Err(ApiError::Conflict {
            message: "An account with this email address already exists".to_string(),
        });
    }

    let password_hash = hash_password(&req.password)?;
    let client_id = Uuid::new_v4();
    state
        .db
        .create_client(&client_id.to_string(), req.name.trim(), &email, &password_hash, Utc::now())?;

    let token = create_token(&state.jwt_secret, client_id, Role::Client)?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse { client_id, token }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let email = normalize_email(&req.email);

    // The two partitions are disjoint; a login only ever searches its own
    let (id, name, stored_hash) = match req.user_type {
        Role::Client => {
            let client = state
                .db
                .get_client_by_email(&email)?
                .ok_or(ApiError::Unauthenticated)?;
            (client.id, client.name, client.password)
        }
        Role::Admin => {
            let admin = state
                .db
                .get_admin_by_email(&email)?
                .ok_or(ApiError::Unauthenticated)?;
            (admin.id, admin.name, admin.password)
        }
    };

    if !verify_password(&req.password, &stored_hash) {
        return Err(ApiError::Unauthenticated);
    }

    let user_id: Uuid = id
        .parse()
        .map_err(|e| anyhow!("Corrupt account id '{}': {}", id, e))?;
    let token = create_token(&state.jwt_secret, user_id, req.user_type)?;

    Ok(Json(LoginResponse {
        user_id,
        name,
        token,
    }))
}

/// Argon2id with default params — the same cost factor everywhere a
/// credential is written, whether at registration or through a reset.
pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| anyhow!("Hash password: {}", e))
}

pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

pub fn create_token(secret: &str, user_id: Uuid, role: Role) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        role,
        exp: (Utc::now() + chrono::Duration::days(30)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

/// Lower-case and trim before any lookup, so presentation variants of one
/// address resolve to one account.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn validate_email(email: &str) -> bool {
    let Some((local, domain)) = email.rsplit_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.contains(char::is_whitespace)
}

/// At least 8 characters with upper case, lower case, and a digit. Checked
/// locally, before any store access.
pub fn validate_new_password(password: &str) -> Result<(), ApiError> {
    let ok = password.len() >= 8
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_digit());
    if ok {
        Ok(())
    } else {
        Err(ApiError::validation(
            "Password must be at least 8 characters and include upper case, lower case, and a digit",
        ))
    }
}
