use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Role subtype of a service provider. Selects which buffer rule applies
/// when one of their slots is booked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Designation {
    Psychologist,
    Cosmetologist,
}

impl fmt::Display for Designation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Designation::Psychologist => write!(f, "psychologist"),
            Designation::Cosmetologist => write!(f, "cosmetologist"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Associate {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub designation: Designation,
    pub bio: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAssociateRequest {
    pub id: Option<Uuid>,
    pub full_name: String,
    pub email: String,
    pub designation: Designation,
    pub bio: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateAssociateRequest {
    pub full_name: Option<String>,
    pub bio: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
pub enum AssociateError {
    #[error("Associate not found")]
    NotFound,

    #[error("Associate already exists")]
    AlreadyExists,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}
