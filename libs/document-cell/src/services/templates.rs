use chrono::Utc;
use reqwest::Method;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{CreateTemplateRequest, DocumentError, DocumentTemplate};

pub struct TemplateService {
    supabase: SupabaseClient,
}

fn required(value: &str, field: &str) -> Result<String, DocumentError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(DocumentError::ValidationError(format!("{} is required", field)));
    }
    Ok(value.to_string())
}

impl TemplateService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn list_templates(&self, auth_token: &str) -> Result<Vec<DocumentTemplate>, DocumentError> {
        Ok(self.supabase.request(
            Method::GET,
            "/rest/v1/document_templates?order=name.asc",
            Some(auth_token),
            None,
        ).await?)
    }

    pub async fn get_template(&self, template_id: Uuid, auth_token: &str) -> Result<DocumentTemplate, DocumentError> {
        let path = format!("/rest/v1/document_templates?id=eq.{}", template_id);
        let result: Vec<DocumentTemplate> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;

        result.into_iter().next().ok_or(DocumentError::TemplateNotFound)
    }

    pub async fn create_template(
        &self,
        request: CreateTemplateRequest,
        auth_token: &str,
    ) -> Result<DocumentTemplate, DocumentError> {
        let name = required(&request.name, "name")?;
        let kind = required(&request.kind, "kind")?;
        if request.body.trim().is_empty() {
            return Err(DocumentError::ValidationError("body is required".to_string()));
        }

        let result: Vec<DocumentTemplate> = self.supabase
            .insert_returning(
                "document_templates",
                json!({
                    "name": name,
                    "kind": kind,
                    "body": request.body,
                    "created_at": Utc::now().to_rfc3339()
                }),
                Some(auth_token),
            )
            .await?;

        let template = result
            .into_iter()
            .next()
            .ok_or_else(|| DocumentError::DatabaseError("Failed to create template".to_string()))?;

        info!("Document template {} ({}) created", template.id, template.kind);
        Ok(template)
    }
}
