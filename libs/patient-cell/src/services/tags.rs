use reqwest::{
    header::{HeaderMap, HeaderValue},
    Method,
};
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{CreateTagRequest, PatientError, Tag};

/// Tag names are unique ignoring case; compared here so `%` or `_` in a
/// name stay literal.
fn name_taken(tags: &[Tag], name: &str) -> bool {
    let wanted = name.to_lowercase();
    tags.iter().any(|t| t.name.trim().to_lowercase() == wanted)
}

pub struct TagService {
    supabase: SupabaseClient,
}

impl TagService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn list_tags(&self, auth_token: &str) -> Result<Vec<Tag>, PatientError> {
        let tags: Vec<Tag> = self.supabase.request(
            Method::GET,
            "/rest/v1/tags?order=name.asc",
            Some(auth_token),
            None,
        ).await?;

        Ok(tags)
    }

    pub async fn create_tag(&self, request: CreateTagRequest, auth_token: &str) -> Result<Tag, PatientError> {
        let name = request.name.trim().to_string();
        if name.is_empty() {
            return Err(PatientError::ValidationError("Tag name is required".to_string()));
        }

        let existing = self.list_tags(auth_token).await?;
        if name_taken(&existing, &name) {
            return Err(PatientError::DuplicateTag { name });
        }

        let created: Vec<Tag> = self.supabase.insert_returning(
            "tags",
            json!({ "name": name, "color": request.color }),
            Some(auth_token),
        ).await?;

        let tag = created
            .into_iter()
            .next()
            .ok_or_else(|| PatientError::DatabaseError("Failed to create tag".to_string()))?;

        info!("Tag created: {} ({})", tag.name, tag.id);
        Ok(tag)
    }

    pub async fn get_patient_tags(&self, patient_id: Uuid, auth_token: &str) -> Result<Vec<Tag>, PatientError> {
        debug!("Fetching tags for patient {}", patient_id);

        let rows: Vec<Value> = self.supabase.request(
            Method::GET,
            &format!("/rest/v1/patient_tags?select=tags(id,name,color)&patient_id=eq.{}", patient_id),
            Some(auth_token),
            None,
        ).await?;

        let mut tags = rows
            .into_iter()
            .filter_map(|mut row| row.get_mut("tags").map(Value::take))
            .filter(|tag| !tag.is_null())
            .map(serde_json::from_value)
            .collect::<Result<Vec<Tag>, _>>()?;

        tags.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        Ok(tags)
    }

    /// Attaching an already attached tag is a no-op.
    pub async fn add_tag_to_patient(
        &self,
        patient_id: Uuid,
        tag_id: Uuid,
        auth_token: &str,
    ) -> Result<(), PatientError> {
        let tag: Vec<Value> = self.supabase.request(
            Method::GET,
            &format!("/rest/v1/tags?select=id&id=eq.{}", tag_id),
            Some(auth_token),
            None,
        ).await?;

        if tag.is_empty() {
            return Err(PatientError::TagNotFound);
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            "Prefer",
            HeaderValue::from_static("resolution=ignore-duplicates,return=minimal"),
        );

        let _: Value = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/patient_tags?on_conflict=patient_id,tag_id",
            Some(auth_token),
            Some(json!({ "patient_id": patient_id, "tag_id": tag_id })),
            Some(headers),
        ).await?;

        info!("Tag {} attached to patient {}", tag_id, patient_id);
        Ok(())
    }

    /// Returns whether a link existed.
    pub async fn remove_tag_from_patient(
        &self,
        patient_id: Uuid,
        tag_id: Uuid,
        auth_token: &str,
    ) -> Result<bool, PatientError> {
        let removed: Vec<Value> = self.supabase.delete_returning(
            "patient_tags",
            &format!("patient_id=eq.{}&tag_id=eq.{}", patient_id, tag_id),
            Some(auth_token),
        ).await?;

        Ok(!removed.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(name: &str) -> Tag {
        Tag { id: Uuid::new_v4(), name: name.to_string(), color: None }
    }

    #[test]
    fn names_compare_case_insensitively_and_literally() {
        let tags = vec![tag("Retorno"), tag("100%_ganho")];

        assert!(name_taken(&tags, "retorno"));
        assert!(name_taken(&tags, "100%_GANHO"));
        assert!(!name_taken(&tags, "100"));
        assert!(!name_taken(&tags, "100xyganho"));
    }
}
