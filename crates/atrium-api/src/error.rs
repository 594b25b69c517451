use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, error, warn};

/// Why a reset token was refused. The distinction exists for logs only; the
/// client-facing message is the same for all three so the reset endpoint
/// reveals nothing about token state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenRejection {
    NotFound,
    AlreadyUsed,
    Expired,
}

#[derive(Error, Debug)]
pub enum ApiError {
    /// Malformed input, caught before any store access
    #[error("{message}")]
    Validation { message: String },

    /// Reset token absent, consumed, or past expiry
    #[error("Reset token rejected: {reason:?}")]
    ResetTokenRejected { reason: TokenRejection },

    /// Missing or invalid bearer credential
    #[error("Not authenticated")]
    Unauthenticated,

    /// Authenticated but not allowed: wrong role, unvalidated account, or
    /// cross-client access
    #[error("{message}")]
    Forbidden { message: String },

    #[error("{resource} not found")]
    NotFound { resource: &'static str },

    #[error("{message}")]
    Conflict { message: String },

    #[error("Too many requests")]
    RateLimited,

    /// Any underlying persistence or infrastructure failure
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation {
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation { .. } => StatusCode::BAD_REQUEST,
            ApiError::ResetTokenRejected { .. } => StatusCode::BAD_REQUEST,
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden { .. } => StatusCode::FORBIDDEN,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Conflict { .. } => StatusCode::CONFLICT,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// User-safe message, without leaking internals or token state.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Validation { message } => message.clone(),
            ApiError::ResetTokenRejected { .. } => "Invalid or expired reset token".to_string(),
            ApiError::Unauthenticated => "Authentication required".to_string(),
            ApiError::Forbidden { message } => message.clone(),
            ApiError::NotFound { resource } => format!("{} not found", resource),
            ApiError::Conflict { message } => message.clone(),
            ApiError::RateLimited => "Too many requests, try again later".to_string(),
            ApiError::Store(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Full detail stays in the logs; the response body is sanitized
        match &self {
            ApiError::Store(e) => error!("Request failed: {:#}", e),
            ApiError::Unauthenticated | ApiError::Forbidden { .. } => {
                warn!("Request denied: {}", self)
            }
            _ => debug!("Request rejected: {}", self),
        }

        (status, Json(json!({ "error": self.user_message() }))).into_response()
    }
}
