use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The two kinds of form this site accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Quote,
    Contact,
}

impl RecordKind {
    pub fn api_path(self) -> &'static str {
        match self {
            RecordKind::Quote => "/api/quotes",
            RecordKind::Contact => "/api/contacts",
        }
    }
}

/// Insertable view of a quote request. `id` and `createdAt` are assigned by
/// storage; a body carrying either is rejected at deserialization.
///
/// Missing keys deserialize to empty strings so that validation reports them
/// as `required` against the right field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewQuote {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub service: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub service: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl Quote {
    pub fn from_new(id: Uuid, created_at: DateTime<Utc>, new: NewQuote) -> Self {
        Quote {
            id,
            first_name: new.first_name,
            last_name: new.last_name,
            email: new.email,
            phone: new.phone,
            service: new.service,
            message: new.message,
            created_at,
        }
    }
}

/// Insertable view of a contact message. Unlike a quote, `phone` is mandatory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewContact {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub service: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub service: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl Contact {
    pub fn from_new(id: Uuid, created_at: DateTime<Utc>, new: NewContact) -> Self {
        Contact {
            id,
            name: new.name,
            email: new.email,
            phone: new.phone,
            service: new.service,
            message: new.message,
            created_at,
        }
    }
}
