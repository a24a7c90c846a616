use chrono::{Local, Utc};
use reqwest::Method;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use patient_cell::PatientService;
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{Document, DocumentError, GenerateDocumentRequest, GeneratedDocument};
use crate::services::renderer::{render_template, RenderContext};
use crate::services::templates::TemplateService;

pub struct DocumentService<'a> {
    config: &'a AppConfig,
    supabase: SupabaseClient,
}

impl<'a> DocumentService<'a> {
    pub fn new(config: &'a AppConfig) -> Self {
        Self {
            config,
            supabase: SupabaseClient::new(config),
        }
    }

    /// Renders a template for a patient and stores the result.
    pub async fn generate(
        &self,
        request: GenerateDocumentRequest,
        auth_token: &str,
    ) -> Result<GeneratedDocument, DocumentError> {
        let templates = TemplateService::new(self.config);
        let patients = PatientService::new(self.config);
        let (template, patient) = futures::join!(
            templates.get_template(request.template_id, auth_token),
            patients.get_patient(request.patient_id, auth_token),
        );
        let template = template?;
        let patient = patient?;

        let context = RenderContext::new(&request.fields, Some(&patient), Local::now().naive_local());
        let rendered = render_template(&template.body, &context);

        if !rendered.missing_fields.is_empty() {
            warn!(
                "Template {} rendered for patient {} with missing fields: {}",
                template.id,
                patient.id,
                rendered.missing_fields.join(", ")
            );
        }

        let title = request
            .title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| format!("{} - {}", template.name, patient.full_name));

        let result: Vec<Document> = self.supabase
            .insert_returning(
                "documents",
                json!({
                    "patient_id": patient.id,
                    "template_id": template.id,
                    "title": title,
                    "content": rendered.content,
                    "created_at": Utc::now().to_rfc3339()
                }),
                Some(auth_token),
            )
            .await?;

        let document = result
            .into_iter()
            .next()
            .ok_or_else(|| DocumentError::DatabaseError("Failed to store document".to_string()))?;

        info!("Document {} generated from template {}", document.id, template.id);
        Ok(GeneratedDocument {
            document,
            missing_fields: rendered.missing_fields,
        })
    }

    pub async fn list_for_patient(&self, patient_id: Uuid, auth_token: &str) -> Result<Vec<Document>, DocumentError> {
        let path = format!(
            "/rest/v1/documents?patient_id=eq.{}&order=created_at.desc",
            patient_id
        );
        Ok(self.supabase.request(Method::GET, &path, Some(auth_token), None).await?)
    }
}
