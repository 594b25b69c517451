use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Number of steps in the project wizard. A wizard is complete once every
/// step has a finalized response.
pub const WIZARD_STEP_COUNT: u8 = 9;

/// The two identity partitions. Clients and admins live in separate tables
/// with separate email spaces; a role tag on every credential keeps lookups
/// partition-scoped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Client,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Client => "client",
            Role::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "client" => Some(Role::Client),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

/// Client account as exposed over the API. Password hashes never leave the
/// DB layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub is_validated: bool,
    pub created_at: DateTime<Utc>,
}

/// One wizard step response. `data` is an opaque JSON payload owned by the
/// frontend forms; the backend never inspects its shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WizardStep {
    pub client_id: Uuid,
    pub step: u8,
    pub data: serde_json::Value,
    pub is_draft: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeadSource {
    Contact,
    Quote,
    Booking,
}

impl LeadSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadSource::Contact => "contact",
            LeadSource::Quote => "quote",
            LeadSource::Booking => "booking",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "contact" => Some(LeadSource::Contact),
            "quote" => Some(LeadSource::Quote),
            "booking" => Some(LeadSource::Booking),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeadStatus {
    New,
    Contacted,
    Closed,
}

impl LeadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::New => "new",
            LeadStatus::Contacted => "contacted",
            LeadStatus::Closed => "closed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "new" => Some(LeadStatus::New),
            "contacted" => Some(LeadStatus::Contacted),
            "closed" => Some(LeadStatus::Closed),
            _ => None,
        }
    }
}

/// A lead captured from one of the public site forms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub service: Option<String>,
    pub message: String,
    pub source: LeadSource,
    pub status: LeadStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
