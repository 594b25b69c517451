use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, Validation, decode};

use atrium_db::models::ClientRow;
use atrium_types::api::Claims;
use atrium_types::models::Role;

use crate::AppState;
use crate::error::ApiError;

/// Extract and validate the bearer JWT, injecting `Claims` for handlers.
/// The secret comes in through state, not a per-request env read.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::Unauthenticated)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(ApiError::Unauthenticated)?;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(state.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| ApiError::Unauthenticated)?;

    req.extensions_mut().insert(token_data.claims);
    Ok(next.run(req).await)
}

pub fn require_admin(claims: &Claims) -> Result<(), ApiError> {
    match claims.role {
        Role::Admin => Ok(()),
        Role::Client => Err(ApiError::Forbidden {
            message: "Admin access required".to_string(),
        }),
    }
}

/// Wizard writes are gated on an admin-approved client account.
pub fn require_validated_client(
    state: &AppState,
    claims: &Claims,
) -> Result<ClientRow, ApiError> {
    if claims.role != Role::Client {
        return Err(ApiError::Forbidden {
            message: "Client access required".to_string(),
        });
    }
    let client = state
        .db
        .get_client_by_id(&claims.sub.to_string())?
        .ok_or(ApiError::Unauthenticated)?;
    if !client.is_validated {
        return Err(ApiError::Forbidden {
            message: "Account pending validation".to_string(),
        });
    }
    Ok(client)
}
