use reqwest::Method;
use serde_json::{json, Map, Value};
use tracing::info;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{CreateStageRequest, CrmError, CrmStage, UpdateStageRequest};

pub struct StageService {
    supabase: SupabaseClient,
}

impl StageService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn get_stage(&self, stage_id: Uuid, auth_token: &str) -> Result<CrmStage, CrmError> {
        let path = format!("/rest/v1/crm_stages?id=eq.{}", stage_id);
        let result: Vec<CrmStage> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;

        result.into_iter().next().ok_or(CrmError::StageNotFound)
    }

    pub async fn create_stage(
        &self,
        request: CreateStageRequest,
        auth_token: &str,
    ) -> Result<CrmStage, CrmError> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(CrmError::ValidationError("name is required".to_string()));
        }

        let position = match request.position {
            Some(position) => position,
            None => {
                let existing: Vec<Value> = self.supabase.request(
                    Method::GET,
                    "/rest/v1/crm_stages?select=id",
                    Some(auth_token),
                    None,
                ).await?;
                existing.len() as i32
            }
        };

        let result: Vec<CrmStage> = self.supabase
            .insert_returning(
                "crm_stages",
                json!({ "name": name, "position": position, "color": request.color }),
                Some(auth_token),
            )
            .await?;

        let stage = result
            .into_iter()
            .next()
            .ok_or_else(|| CrmError::DatabaseError("Failed to create stage".to_string()))?;

        info!("CRM stage '{}' created at position {}", stage.name, stage.position);
        Ok(stage)
    }

    pub async fn update_stage(
        &self,
        stage_id: Uuid,
        request: UpdateStageRequest,
        auth_token: &str,
    ) -> Result<CrmStage, CrmError> {
        let mut update_data = Map::new();
        if let Some(name) = request.name {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(CrmError::ValidationError("name cannot be blank".to_string()));
            }
            update_data.insert("name".to_string(), json!(name));
        }
        if let Some(position) = request.position {
            update_data.insert("position".to_string(), json!(position));
        }
        if let Some(color) = request.color {
            update_data.insert("color".to_string(), json!(color));
        }

        if update_data.is_empty() {
            return self.get_stage(stage_id, auth_token).await;
        }

        let result: Vec<CrmStage> = self.supabase
            .update_returning(
                "crm_stages",
                &format!("id=eq.{}", stage_id),
                Value::Object(update_data),
                Some(auth_token),
            )
            .await?;

        result.into_iter().next().ok_or(CrmError::StageNotFound)
    }
}
