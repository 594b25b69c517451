//! Project wizard: per-step draft/final answers for onboarded clients.

use axum::{Extension, Json, extract::Path, extract::State};
use chrono::Utc;
use tracing::warn;
use uuid::Uuid;

use atrium_db::models::WizardResponseRow;
use atrium_db::parse_timestamp;
use atrium_types::api::{Claims, SaveStepRequest, SubmitWizardResponse};
use atrium_types::models::{Role, WIZARD_STEP_COUNT, WizardStep};

use crate::AppState;
use crate::error::ApiError;
use crate::middleware::require_validated_client;

pub(crate) fn step_from_row(row: WizardResponseRow) -> WizardStep {
    WizardStep {
        client_id: row.client_id.parse().unwrap_or_else(|e| {
            warn!("Corrupt client id '{}': {}", row.client_id, e);
            Uuid::default()
        }),
        step: row.step,
        data: serde_json::from_str(&row.data).unwrap_or_else(|e| {
            warn!("Corrupt wizard payload at step {}: {}", row.step, e);
            serde_json::Value::Null
        }),
        is_draft: row.is_draft,
        updated_at: parse_timestamp(&row.updated_at),
    }
}

/// Upsert one step. Saves default to draft; an explicit `is_draft: false`
/// finalizes the step on its own.
pub async fn save_step(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SaveStepRequest>,
) -> Result<Json<WizardStep>, ApiError> {
    let client = require_validated_client(&state, &claims)?;

    if !(1..=WIZARD_STEP_COUNT).contains(&req.step) {
        return Err(ApiError::validation(format!(
            "step must be between 1 and {}",
            WIZARD_STEP_COUNT
        )));
    }

    let data = serde_json::to_string(&req.data)
        .map_err(|e| anyhow::anyhow!("Serialize wizard payload: {}", e))?;

    let row = state
        .db
        .upsert_wizard_response(&client.id, req.step, &data, req.is_draft, Utc::now())?;

    Ok(Json(step_from_row(row)))
}

/// Finalize the whole wizard: every draft flips in one pass and the returned
/// list reflects the post-flip state.
pub async fn submit(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<SubmitWizardResponse>, ApiError> {
    let client = require_validated_client(&state, &claims)?;

    let (updated_count, rows) = state.db.submit_wizard(&client.id, Utc::now())?;

    Ok(Json(SubmitWizardResponse {
        updated_count,
        responses: rows.into_iter().map(step_from_row).collect(),
    }))
}

/// A client's own responses, step-ascending.
pub async fn get_own(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<WizardStep>>, ApiError> {
    if claims.role != Role::Client {
        return Err(ApiError::validation(
            "Admins must address a client: GET /api/wizard/{client_id}",
        ));
    }

    let rows = state.db.wizard_responses(&claims.sub.to_string())?;
    Ok(Json(rows.into_iter().map(step_from_row).collect()))
}

/// Responses for an explicit client: admins see anyone, clients only
/// themselves.
pub async fn get_for_client(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(client_id): Path<Uuid>,
) -> Result<Json<Vec<WizardStep>>, ApiError> {
    match claims.role {
        Role::Admin => {}
        Role::Client if claims.sub == client_id => {}
        Role::Client => {
            return Err(ApiError::Forbidden {
                message: "Cannot access another client's wizard".to_string(),
            });
        }
    }

    let rows = state.db.wizard_responses(&client_id.to_string())?;
    Ok(Json(rows.into_iter().map(step_from_row).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{RecordingMailer, test_state};
    use serde_json::json;

    const CLIENT_ID: &str = "22222222-2222-2222-2222-222222222222";

    fn seeded_state(validated: bool) -> AppState {
        let state = test_state(RecordingMailer::new());
        state
            .db
            .create_client(CLIENT_ID, "Client", "client@example.com", "h", Utc::now())
            .unwrap();
        if validated {
            state.db.set_client_validated(CLIENT_ID).unwrap();
        }
        state
    }

    fn client_claims() -> Claims {
        Claims {
            sub: CLIENT_ID.parse().unwrap(),
            role: Role::Client,
            exp: usize::MAX,
        }
    }

    #[tokio::test]
    async fn save_rejects_out_of_range_steps() {
        let state = seeded_state(true);
        for step in [0u8, 10] {
            let res = save_step(
                State(state.clone()),
                Extension(client_claims()),
                Json(SaveStepRequest {
                    step,
                    data: json!({}),
                    is_draft: true,
                }),
            )
            .await;
            assert!(matches!(res, Err(ApiError::Validation { .. })));
        }
    }

    #[tokio::test]
    async fn save_requires_validated_account() {
        let state = seeded_state(false);
        let res = save_step(
            State(state),
            Extension(client_claims()),
            Json(SaveStepRequest {
                step: 1,
                data: json!({}),
                is_draft: true,
            }),
        )
        .await;
        assert!(matches!(res, Err(ApiError::Forbidden { .. })));
    }

    #[tokio::test]
    async fn save_then_submit_finalizes_drafts() {
        let state = seeded_state(true);

        for step in 1..=2u8 {
            let saved = save_step(
                State(state.clone()),
                Extension(client_claims()),
                Json(SaveStepRequest {
                    step,
                    data: json!({ "answer": step }),
                    is_draft: true,
                }),
            )
            .await
            .unwrap();
            assert!(saved.0.is_draft);
        }

        let res = submit(State(state.clone()), Extension(client_claims()))
            .await
            .unwrap();
        assert_eq!(res.0.updated_count, 2);
        let steps: Vec<u8> = res.0.responses.iter().map(|r| r.step).collect();
        assert_eq!(steps, vec![1, 2]);
        assert!(res.0.responses.iter().all(|r| !r.is_draft));

        let own = get_own(State(state), Extension(client_claims()))
            .await
            .unwrap();
        assert_eq!(own.0.len(), 2);
        assert_eq!(own.0[1].data, json!({ "answer": 2 }));
    }

    #[tokio::test]
    async fn cross_client_reads_are_forbidden() {
        let state = seeded_state(true);
        let other: Uuid = "33333333-3333-3333-3333-333333333333".parse().unwrap();

        let res = get_for_client(
            State(state.clone()),
            Extension(client_claims()),
            Path(other),
        )
        .await;
        assert!(matches!(res, Err(ApiError::Forbidden { .. })));

        // Admins read anyone
        let admin = Claims {
            sub: Uuid::new_v4(),
            role: Role::Admin,
            exp: usize::MAX,
        };
        let res = get_for_client(State(state), Extension(admin), Path(other)).await;
        assert!(res.unwrap().0.is_empty());
    }
}
