//! Admin surface: client management, lead triage, and the wizard overview
//! the dashboard is built from.

use axum::{Extension, Json, extract::Path, extract::State};
use chrono::Utc;
use tracing::warn;
use uuid::Uuid;

use atrium_db::models::{ClientRow, ClientWizardRow, WizardResponseRow};
use atrium_db::parse_timestamp;
use atrium_types::api::{Claims, ClientWizardOverview, DashboardStats, UpdateLeadRequest};
use atrium_types::models::{Client, Lead, WIZARD_STEP_COUNT};

use crate::AppState;
use crate::error::ApiError;
use crate::leads::lead_from_row;
use crate::middleware::require_admin;
use crate::wizard::step_from_row;

pub(crate) fn client_from_row(row: ClientRow) -> Client {
    Client {
        id: row.id.parse().unwrap_or_else(|e| {
            warn!("Corrupt client id '{}': {}", row.id, e);
            Uuid::default()
        }),
        name: row.name,
        email: row.email,
        is_validated: row.is_validated,
        created_at: parse_timestamp(&row.created_at),
    }
}

/// Fold the joined rows (contiguous per client, step-ascending) into one
/// overview per client. Derived on every call — nothing here is persisted.
pub fn group_client_wizards(rows: Vec<ClientWizardRow>) -> Vec<ClientWizardOverview> {
    let mut overviews: Vec<ClientWizardOverview> = Vec::new();
    let mut last_client: Option<String> = None;

    for row in rows {
        if last_client.as_deref() != Some(row.client_id.as_str()) {
            last_client = Some(row.client_id.clone());
            overviews.push(ClientWizardOverview {
                client: client_from_row(ClientRow {
                    id: row.client_id.clone(),
                    name: row.client_name.clone(),
                    email: row.client_email.clone(),
                    password: String::new(),
                    is_validated: row.is_validated,
                    created_at: row.client_created_at.clone(),
                }),
                responses: Vec::new(),
                last_updated: None,
                is_completed: false,
            });
        }
        if let Some(overview) = overviews.last_mut() {
            overview.responses.push(step_from_row(WizardResponseRow {
                client_id: row.client_id,
                step: row.step,
                data: row.data,
                is_draft: row.is_draft,
                updated_at: row.updated_at,
            }));
        }
    }

    for overview in &mut overviews {
        overview.last_updated = overview.responses.iter().map(|s| s.updated_at).max();
        let finalized = overview.responses.iter().filter(|s| !s.is_draft).count();
        overview.is_completed = finalized == WIZARD_STEP_COUNT as usize;
    }

    overviews
}

/// `completed / clients with any wizard activity`. Clients that never touched
/// the wizard are not in `overviews` at all, so they never dilute the rate.
pub fn completion_rate(overviews: &[ClientWizardOverview]) -> f64 {
    if overviews.is_empty() {
        return 0.0;
    }
    let completed = overviews.iter().filter(|o| o.is_completed).count();
    completed as f64 / overviews.len() as f64
}

pub async fn list_client_wizards(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<ClientWizardOverview>>, ApiError> {
    require_admin(&claims)?;
    let rows = state.db.all_client_wizard_rows()?;
    Ok(Json(group_client_wizards(rows)))
}

pub async fn dashboard_stats(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<DashboardStats>, ApiError> {
    require_admin(&claims)?;

    let (total_leads, new_leads) = state.db.lead_counts()?;
    let (total_clients, validated_clients) = state.db.client_counts()?;
    let overviews = group_client_wizards(state.db.all_client_wizard_rows()?);
    let completed_wizards = overviews.iter().filter(|o| o.is_completed).count();

    Ok(Json(DashboardStats {
        total_leads,
        new_leads,
        total_clients,
        validated_clients,
        clients_with_wizard_activity: overviews.len(),
        completed_wizards,
        wizard_completion_rate: completion_rate(&overviews),
    }))
}

pub async fn list_clients(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<Client>>, ApiError> {
    require_admin(&claims)?;
    let rows = state.db.list_clients()?;
    Ok(Json(rows.into_iter().map(client_from_row).collect()))
}

/// Approve a client account, unlocking the wizard for it.
pub async fn validate_client(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(client_id): Path<Uuid>,
) -> Result<Json<Client>, ApiError> {
    require_admin(&claims)?;

    let id = client_id.to_string();
    if !state.db.set_client_validated(&id)? {
        return Err(ApiError::NotFound { resource: "Client" });
    }
    let row = state
        .db
        .get_client_by_id(&id)?
        .ok_or(ApiError::NotFound { resource: "Client" })?;
    Ok(Json(client_from_row(row)))
}

pub async fn list_leads(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<Lead>>, ApiError> {
    require_admin(&claims)?;
    let rows = state.db.list_leads()?;
    Ok(Json(rows.into_iter().map(lead_from_row).collect()))
}

pub async fn update_lead(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(lead_id): Path<Uuid>,
    Json(req): Json<UpdateLeadRequest>,
) -> Result<Json<Lead>, ApiError> {
    require_admin(&claims)?;

    let row = state
        .db
        .update_lead_status(&lead_id.to_string(), req.status.as_str(), Utc::now())?
        .ok_or(ApiError::NotFound { resource: "Lead" })?;
    Ok(Json(lead_from_row(row)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{RecordingMailer, test_state};
    use atrium_db::format_timestamp;
    use atrium_types::models::Role;
    use chrono::{Duration, Utc};

    fn join_row(client_id: &str, step: u8, is_draft: bool, minutes: i64) -> ClientWizardRow {
        let t = Utc::now() + Duration::minutes(minutes);
        ClientWizardRow {
            client_id: client_id.to_string(),
            client_name: "Client".to_string(),
            client_email: format!("{}@example.com", client_id),
            is_validated: true,
            client_created_at: format_timestamp(Utc::now()),
            step,
            data: "{}".to_string(),
            is_draft,
            updated_at: format_timestamp(t),
        }
    }

    #[test]
    fn completed_requires_all_nine_steps_finalized() {
        let rows: Vec<ClientWizardRow> = (1..=9).map(|s| join_row("c1", s, false, 0)).collect();
        let overviews = group_client_wizards(rows);
        assert_eq!(overviews.len(), 1);
        assert!(overviews[0].is_completed);

        // Nine rows with one still draft is not complete
        let rows: Vec<ClientWizardRow> =
            (1..=9).map(|s| join_row("c1", s, s == 4, 0)).collect();
        assert!(!group_client_wizards(rows)[0].is_completed);

        // Eight finalized rows is not complete either
        let rows: Vec<ClientWizardRow> = (1..=8).map(|s| join_row("c1", s, false, 0)).collect();
        assert!(!group_client_wizards(rows)[0].is_completed);
    }

    #[test]
    fn last_updated_is_the_latest_touch() {
        let rows = vec![
            join_row("c1", 1, false, 0),
            join_row("c1", 2, true, 30),
            join_row("c1", 3, true, 10),
        ];
        let overviews = group_client_wizards(rows);
        let latest = overviews[0].last_updated.unwrap();
        assert_eq!(
            latest,
            overviews[0].responses[1].updated_at,
            "step 2 was touched last"
        );
    }

    #[test]
    fn rate_counts_only_clients_with_activity() {
        let mut rows: Vec<ClientWizardRow> =
            (1..=9).map(|s| join_row("done", s, false, 0)).collect();
        rows.push(join_row("started", 1, true, 0));

        let overviews = group_client_wizards(rows);
        assert_eq!(overviews.len(), 2);
        assert_eq!(completion_rate(&overviews), 0.5);

        assert_eq!(completion_rate(&[]), 0.0);
    }

    #[tokio::test]
    async fn dashboard_reflects_a_submitted_wizard() {
        let state = test_state(RecordingMailer::new());
        let now = Utc::now();
        state
            .db
            .create_client("c1", "Done", "done@example.com", "h", now)
            .unwrap();
        state
            .db
            .create_client("c2", "Started", "started@example.com", "h", now)
            .unwrap();

        for step in 1..=9u8 {
            state
                .db
                .upsert_wizard_response("c1", step, "{}", true, now)
                .unwrap();
        }
        let (flipped, _) = state.db.submit_wizard("c1", now).unwrap();
        assert_eq!(flipped, 9);
        state
            .db
            .upsert_wizard_response("c2", 1, "{}", true, now)
            .unwrap();

        let admin = Claims {
            sub: Uuid::new_v4(),
            role: Role::Admin,
            exp: usize::MAX,
        };
        let stats = dashboard_stats(State(state), Extension(admin))
            .await
            .unwrap();
        assert_eq!(stats.0.total_clients, 2);
        assert_eq!(stats.0.clients_with_wizard_activity, 2);
        assert_eq!(stats.0.completed_wizards, 1);
        assert_eq!(stats.0.wizard_completion_rate, 0.5);
    }
}
