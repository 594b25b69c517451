use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Client, LeadSource, LeadStatus, Role, WizardStep};

// -- JWT Claims --

/// JWT claims shared between the REST middleware and the auth handlers.
/// Canonical definition lives here in atrium-types to eliminate duplication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: Role,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub client_id: Uuid,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    pub user_type: Role,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub name: String,
    pub token: String,
}

// -- Password reset --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequestResetRequest {
    pub email: String,
    pub user_type: Role,
}

/// Generic success envelope. The reset-request path returns this regardless
/// of whether the email matched an account, so callers cannot probe for
/// registered addresses.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PerformResetRequest {
    pub token: String,
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct CleanupResponse {
    pub count: usize,
}

// -- Wizard --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SaveStepRequest {
    pub step: u8,
    pub data: serde_json::Value,
    #[serde(default = "default_is_draft")]
    pub is_draft: bool,
}

fn default_is_draft() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct SubmitWizardResponse {
    pub updated_count: usize,
    pub responses: Vec<WizardStep>,
}

/// Admin view of one client's wizard, derived from the raw rows on every
/// request.
#[derive(Debug, Serialize)]
pub struct ClientWizardOverview {
    pub client: Client,
    pub responses: Vec<WizardStep>,
    pub last_updated: Option<DateTime<Utc>>,
    pub is_completed: bool,
}

// -- Leads --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateLeadRequest {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub service: Option<String>,
    pub message: String,
    pub source: LeadSource,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateLeadRequest {
    pub status: LeadStatus,
}

// -- Admin dashboard --

#[derive(Debug, Serialize)]
pub struct DashboardStats {
    pub total_leads: usize,
    pub new_leads: usize,
    pub total_clients: usize,
    pub validated_clients: usize,
    pub clients_with_wizard_activity: usize,
    pub completed_wizards: usize,
    /// `completed_wizards / clients_with_wizard_activity`; clients that never
    /// touched the wizard are left out of the denominator entirely.
    pub wizard_completion_rate: f64,
}
