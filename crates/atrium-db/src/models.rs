/// Database row types — these map directly to SQLite rows.
/// Distinct from atrium-types API models to keep the DB layer independent.

pub struct ClientRow {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password: String,
    pub is_validated: bool,
    pub created_at: String,
}

pub struct AdminRow {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password: String,
    pub created_at: String,
}

pub struct ResetTokenRow {
    pub token: String,
    pub user_id: String,
    pub user_type: String,
    pub email: String,
    pub expires_at: String,
    pub used: bool,
    pub used_at: Option<String>,
    pub created_at: String,
}

pub struct WizardResponseRow {
    pub client_id: String,
    pub step: u8,
    pub data: String,
    pub is_draft: bool,
    pub updated_at: String,
}

/// Wizard row joined with its owning client, for the admin aggregate view.
pub struct ClientWizardRow {
    pub client_id: String,
    pub client_name: String,
    pub client_email: String,
    pub is_validated: bool,
    pub client_created_at: String,
    pub step: u8,
    pub data: String,
    pub is_draft: bool,
    pub updated_at: String,
}

pub struct LeadRow {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub service: Option<String>,
    pub message: String,
    pub source: String,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Result of a reset-token consume attempt. Credential and token writes
/// happen only on `Consumed`; every other outcome leaves the store untouched.
#[derive(Debug, PartialEq, Eq)]
pub enum ConsumeOutcome {
    Consumed { user_id: String, user_type: String },
    NotFound,
    AlreadyUsed,
    Expired,
}
