use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use patient_cell::PatientError;
use shared_models::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CrmStage {
    pub id: Uuid,
    pub name: String,
    pub position: i32,
    pub color: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    pub id: Uuid,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub patient_id: Option<Uuid>,
    pub source: Option<String>,
    pub estimated_value: Option<f64>,
    pub stage_id: Option<Uuid>,
    pub position: i32,
    pub status: LeadStatus,
    pub notes: Option<String>,
    #[serde(default)]
    pub lost_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    #[default]
    Open,
    Won,
    Lost,
}

#[derive(Debug, Clone, Serialize)]
pub struct BoardColumn {
    pub stage: CrmStage,
    pub leads: Vec<Lead>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Board {
    pub stages: Vec<BoardColumn>,
    pub unassigned: Vec<Lead>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateStageRequest {
    pub name: String,
    pub position: Option<i32>,
    pub color: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateStageRequest {
    pub name: Option<String>,
    pub position: Option<i32>,
    pub color: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateLeadRequest {
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub source: Option<String>,
    pub estimated_value: Option<f64>,
    pub stage_id: Uuid,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateLeadRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub source: Option<String>,
    pub estimated_value: Option<f64>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MoveLeadRequest {
    pub stage_id: Uuid,
    pub position: i32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MarkLostRequest {
    pub reason: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum CrmError {
    #[error("Stage not found")]
    StageNotFound,

    #[error("Lead not found")]
    LeadNotFound,

    #[error("Lead is already {0:?}")]
    LeadClosed(LeadStatus),

    #[error("Lead already linked to patient {0}")]
    AlreadyConverted(Uuid),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error(transparent)]
    Patient(#[from] PatientError),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<anyhow::Error> for CrmError {
    fn from(err: anyhow::Error) -> Self {
        CrmError::DatabaseError(err.to_string())
    }
}

impl From<CrmError> for AppError {
    fn from(err: CrmError) -> Self {
        match err {
            CrmError::StageNotFound | CrmError::LeadNotFound => AppError::NotFound(err.to_string()),
            CrmError::LeadClosed(_) | CrmError::AlreadyConverted(_) => AppError::Conflict(err.to_string()),
            CrmError::ValidationError(_) => AppError::ValidationError(err.to_string()),
            CrmError::Patient(inner) => AppError::from(inner),
            CrmError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn closed_leads_map_to_conflict() {
        assert_matches!(AppError::from(CrmError::LeadClosed(LeadStatus::Won)), AppError::Conflict(_));
        assert_matches!(AppError::from(CrmError::LeadNotFound), AppError::NotFound(_));
    }

    #[test]
    fn patient_errors_keep_their_status() {
        let err = CrmError::from(PatientError::DuplicatePhone { phone: "5511987654321".to_string() });
        assert_matches!(AppError::from(err), AppError::Conflict(msg) if msg.contains("5511987654321"));
    }
}
