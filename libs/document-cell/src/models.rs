use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use patient_cell::PatientError;
use shared_models::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentTemplate {
    pub id: Uuid,
    pub name: String,
    /// Free-form category such as `receipt`, `warranty` or `report`.
    pub kind: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub template_id: Option<Uuid>,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneratedDocument {
    pub document: Document,
    pub missing_fields: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTemplateRequest {
    pub name: String,
    pub kind: String,
    pub body: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateDocumentRequest {
    pub template_id: Uuid,
    pub patient_id: Uuid,
    #[serde(default)]
    pub fields: HashMap<String, String>,
    pub title: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("Template not found")]
    TemplateNotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error(transparent)]
    Patient(#[from] PatientError),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<anyhow::Error> for DocumentError {
    fn from(err: anyhow::Error) -> Self {
        DocumentError::DatabaseError(err.to_string())
    }
}

impl From<DocumentError> for AppError {
    fn from(err: DocumentError) -> Self {
        match err {
            DocumentError::TemplateNotFound => AppError::NotFound(err.to_string()),
            DocumentError::ValidationError(_) => AppError::ValidationError(err.to_string()),
            DocumentError::Patient(inner) => AppError::from(inner),
            DocumentError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    #[test]
    fn generate_request_fields_default_to_empty() {
        let request: GenerateDocumentRequest = serde_json::from_value(json!({
            "template_id": Uuid::new_v4(),
            "patient_id": Uuid::new_v4()
        }))
        .unwrap();

        assert!(request.fields.is_empty());
        assert!(request.title.is_none());
    }

    #[test]
    fn missing_patient_is_not_found() {
        assert_matches!(AppError::from(DocumentError::Patient(PatientError::NotFound)), AppError::NotFound(_));
        assert_matches!(AppError::from(DocumentError::TemplateNotFound), AppError::NotFound(_));
    }
}
