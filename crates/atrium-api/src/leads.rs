//! Lead intake from the public site forms.

use axum::{Json, extract::State, http::StatusCode};
use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use atrium_db::format_timestamp;
use atrium_db::models::LeadRow;
use atrium_db::parse_timestamp;
use atrium_types::api::CreateLeadRequest;
use atrium_types::models::{Lead, LeadSource, LeadStatus};

use crate::AppState;
use crate::auth::{normalize_email, validate_email};
use crate::error::ApiError;

pub(crate) fn lead_from_row(row: LeadRow) -> Lead {
    Lead {
        id: row.id.parse().unwrap_or_else(|e| {
            warn!("Corrupt lead id '{}': {}", row.id, e);
            Uuid::default()
        }),
        name: row.name,
        email: row.email,
        phone: row.phone,
        service: row.service,
        message: row.message,
        source: LeadSource::parse(&row.source).unwrap_or_else(|| {
            warn!("Corrupt lead source '{}'", row.source);
            LeadSource::Contact
        }),
        status: LeadStatus::parse(&row.status).unwrap_or_else(|| {
            warn!("Corrupt lead status '{}'", row.status);
            LeadStatus::New
        }),
        created_at: parse_timestamp(&row.created_at),
        updated_at: parse_timestamp(&row.updated_at),
    }
}

pub async fn create_lead(
    State(state): State<AppState>,
    Json(req): Json<CreateLeadRequest>,
) -> Result<(StatusCode, Json<Lead>), ApiError> {
    if req.name.trim().is_empty() {
        return Err(ApiError::validation("Name is required"));
    }
    if !validate_email(&normalize_email(&req.email)) {
        return Err(ApiError::validation("A valid email address is required"));
    }
    if req.message.trim().is_empty() {
        return Err(ApiError::validation("Message is required"));
    }

    let now = Utc::now();
    let row = LeadRow {
        id: Uuid::new_v4().to_string(),
        name: req.name.trim().to_string(),
        email: req.email.trim().to_string(),
        phone: req.phone.filter(|p| !p.trim().is_empty()),
        service: req.service.filter(|s| !s.trim().is_empty()),
        message: req.message.trim().to_string(),
        source: req.source.as_str().to_string(),
        status: LeadStatus::New.as_str().to_string(),
        created_at: format_timestamp(now),
        updated_at: format_timestamp(now),
    };
    state.db.insert_lead(&row)?;

    info!("New {} lead {}", row.source, row.id);
    Ok((StatusCode::CREATED, Json(lead_from_row(row))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{RecordingMailer, test_state};
    use atrium_types::api::UpdateLeadRequest;

    #[tokio::test]
    async fn lead_intake_validates_and_persists() {
        let state = test_state(RecordingMailer::new());

        let res = create_lead(
            State(state.clone()),
            Json(CreateLeadRequest {
                name: "  ".to_string(),
                email: "visitor@example.com".to_string(),
                phone: None,
                service: None,
                message: "Hi".to_string(),
                source: LeadSource::Contact,
            }),
        )
        .await;
        assert!(matches!(res, Err(ApiError::Validation { .. })));

        let (status, lead) = create_lead(
            State(state.clone()),
            Json(CreateLeadRequest {
                name: "Visitor".to_string(),
                email: "visitor@example.com".to_string(),
                phone: Some("555-0100".to_string()),
                service: Some("branding".to_string()),
                message: "Need a quote".to_string(),
                source: LeadSource::Quote,
            }),
        )
        .await
        .unwrap();

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(lead.0.status, LeadStatus::New);
        assert_eq!(state.db.lead_counts().unwrap(), (1, 1));
    }

    #[test]
    fn unknown_status_strings_are_rejected_at_the_edge() {
        let err = serde_json::from_str::<UpdateLeadRequest>(r#"{"status":"archived"}"#);
        assert!(err.is_err());
    }
}
