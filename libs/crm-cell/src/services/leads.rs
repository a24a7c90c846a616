use chrono::Utc;
use futures::future::try_join_all;
use reqwest::Method;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use patient_cell::{CreatePatientRequest, Patient, PatientError, PatientService};
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_utils::phone::normalize_phone;

use crate::models::{
    CreateLeadRequest, CrmError, Lead, LeadStatus, MarkLostRequest, MoveLeadRequest,
    UpdateLeadRequest,
};
use crate::services::board::place_in_column;
use crate::services::stages::StageService;

pub struct LeadService {
    supabase: SupabaseClient,
    stages: StageService,
    patients: PatientService,
    default_country_code: String,
}

impl LeadService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            stages: StageService::new(config),
            patients: PatientService::new(config),
            default_country_code: config.default_country_code.clone(),
        }
    }

    fn normalize_optional_phone(&self, phone: Option<&str>) -> Result<Option<String>, CrmError> {
        match phone.map(str::trim).filter(|p| !p.is_empty()) {
            None => Ok(None),
            Some(raw) => normalize_phone(raw, &self.default_country_code)
                .map(Some)
                .ok_or_else(|| CrmError::ValidationError(format!("Invalid phone number: {}", raw))),
        }
    }

    pub async fn get_lead(&self, lead_id: Uuid, auth_token: &str) -> Result<Lead, CrmError> {
        let path = format!("/rest/v1/crm_leads?id=eq.{}", lead_id);
        let result: Vec<Lead> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;

        result.into_iter().next().ok_or(CrmError::LeadNotFound)
    }

    async fn open_leads_in_stage(&self, stage_id: Uuid, auth_token: &str) -> Result<Vec<Lead>, CrmError> {
        let path = format!(
            "/rest/v1/crm_leads?stage_id=eq.{}&status=eq.open&order=position.asc",
            stage_id
        );
        Ok(self.supabase.request(Method::GET, &path, Some(auth_token), None).await?)
    }

    /// New positions for the open leads left in `stage_id` once `leaving` is gone.
    async fn closing_gap(
        &self,
        stage_id: Uuid,
        leaving: Uuid,
        auth_token: &str,
    ) -> Result<Vec<(Uuid, i32)>, CrmError> {
        let column = self.open_leads_in_stage(stage_id, auth_token).await?;
        Ok(column
            .iter()
            .filter(|l| l.id != leaving)
            .enumerate()
            .filter(|(index, l)| l.position != *index as i32)
            .map(|(index, l)| (l.id, index as i32))
            .collect())
    }

    async fn write_positions(
        &self,
        positions: &[(Uuid, i32)],
        now: &str,
        auth_token: &str,
    ) -> Result<(), CrmError> {
        try_join_all(positions.iter().map(|(id, position)| {
            let path = format!("/rest/v1/crm_leads?id=eq.{}", id);
            let body = json!({ "position": position, "updated_at": now });
            async move {
                self.supabase
                    .request::<Value>(Method::PATCH, &path, Some(auth_token), Some(body))
                    .await
            }
        }))
        .await?;
        Ok(())
    }

    /// Sets a terminal status and closes the hole it leaves in its column.
    async fn close_lead(&self, lead: Lead, mut update: Value, auth_token: &str) -> Result<Lead, CrmError> {
        if lead.status != LeadStatus::Open {
            return Err(CrmError::LeadClosed(lead.status));
        }

        let now = Utc::now().to_rfc3339();
        update["updated_at"] = json!(now);
        let closed = self.patch_lead(lead.id, update, auth_token).await?;

        if let Some(stage_id) = lead.stage_id {
            let renumbered = self.closing_gap(stage_id, lead.id, auth_token).await?;
            debug!("Closing lead {} shifts {} leads in its column", lead.id, renumbered.len());
            self.write_positions(&renumbered, &now, auth_token).await?;
        }

        Ok(closed)
    }

    async fn patch_lead(&self, lead_id: Uuid, body: Value, auth_token: &str) -> Result<Lead, CrmError> {
        let result: Vec<Lead> = self.supabase
            .update_returning("crm_leads", &format!("id=eq.{}", lead_id), body, Some(auth_token))
            .await?;

        result.into_iter().next().ok_or(CrmError::LeadNotFound)
    }

    pub async fn create_lead(&self, request: CreateLeadRequest, auth_token: &str) -> Result<Lead, CrmError> {
        let name = request.name.trim().to_string();
        if name.is_empty() {
            return Err(CrmError::ValidationError("name is required".to_string()));
        }

        let phone = self.normalize_optional_phone(request.phone.as_deref())?;
        let stage = self.stages.get_stage(request.stage_id, auth_token).await?;
        let position = self
            .open_leads_in_stage(stage.id, auth_token)
            .await?
            .last()
            .map_or(0, |l| l.position + 1);

        let now = Utc::now().to_rfc3339();
        let lead_data = json!({
            "name": name,
            "phone": phone,
            "email": request.email,
            "source": request.source,
            "estimated_value": request.estimated_value,
            "stage_id": stage.id,
            "position": position,
            "status": LeadStatus::Open,
            "notes": request.notes,
            "created_at": now,
            "updated_at": now
        });

        let result: Vec<Lead> = self.supabase
            .insert_returning("crm_leads", lead_data, Some(auth_token))
            .await?;

        let lead = result
            .into_iter()
            .next()
            .ok_or_else(|| CrmError::DatabaseError("Failed to create lead".to_string()))?;

        info!("Lead {} created in stage '{}'", lead.id, stage.name);
        Ok(lead)
    }

    pub async fn update_lead(
        &self,
        lead_id: Uuid,
        request: UpdateLeadRequest,
        auth_token: &str,
    ) -> Result<Lead, CrmError> {
        let mut update_data = Map::new();
        if let Some(name) = request.name {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(CrmError::ValidationError("name cannot be blank".to_string()));
            }
            update_data.insert("name".to_string(), json!(name));
        }
        if request.phone.is_some() {
            let phone = self.normalize_optional_phone(request.phone.as_deref())?;
            update_data.insert("phone".to_string(), json!(phone));
        }
        if let Some(email) = request.email {
            update_data.insert("email".to_string(), json!(email));
        }
        if let Some(source) = request.source {
            update_data.insert("source".to_string(), json!(source));
        }
        if let Some(value) = request.estimated_value {
            update_data.insert("estimated_value".to_string(), json!(value));
        }
        if let Some(notes) = request.notes {
            update_data.insert("notes".to_string(), json!(notes));
        }
        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        self.patch_lead(lead_id, Value::Object(update_data), auth_token).await
    }

    /// Moves a lead and renumbers both affected columns to `0..n`.
    pub async fn move_lead(
        &self,
        lead_id: Uuid,
        request: MoveLeadRequest,
        auth_token: &str,
    ) -> Result<Lead, CrmError> {
        let lead = self.get_lead(lead_id, auth_token).await?;
        if lead.status != LeadStatus::Open {
            return Err(CrmError::LeadClosed(lead.status));
        }

        let destination = self.stages.get_stage(request.stage_id, auth_token).await?;
        debug!("Moving lead {} to stage '{}' position {}", lead_id, destination.name, request.position);

        let column = self.open_leads_in_stage(destination.id, auth_token).await?;
        let column_ids: Vec<Uuid> = column.iter().map(|l| l.id).collect();
        let order = place_in_column(&column_ids, lead_id, request.position);

        let mut renumbered: Vec<(Uuid, i32)> = order
            .iter()
            .enumerate()
            .filter(|(index, id)| {
                **id != lead_id
                    && column
                        .iter()
                        .any(|l| l.id == **id && l.position != *index as i32)
            })
            .map(|(index, id)| (*id, index as i32))
            .collect();

        if let Some(source_stage) = lead.stage_id.filter(|s| *s != destination.id) {
            renumbered.extend(self.closing_gap(source_stage, lead_id, auth_token).await?);
        }

        let now = Utc::now().to_rfc3339();
        self.write_positions(&renumbered, &now, auth_token).await?;

        let final_position = order.iter().position(|id| *id == lead_id).unwrap_or(0) as i32;
        let moved = self
            .patch_lead(
                lead_id,
                json!({ "stage_id": destination.id, "position": final_position, "updated_at": now }),
                auth_token,
            )
            .await?;

        info!("Lead {} now at position {} of stage '{}'", lead_id, final_position, destination.name);
        Ok(moved)
    }

    pub async fn mark_won(&self, lead_id: Uuid, auth_token: &str) -> Result<Lead, CrmError> {
        let lead = self.get_lead(lead_id, auth_token).await?;
        let lead = self
            .close_lead(lead, json!({ "status": LeadStatus::Won }), auth_token)
            .await?;

        info!("Lead {} won", lead_id);
        Ok(lead)
    }

    pub async fn mark_lost(
        &self,
        lead_id: Uuid,
        request: MarkLostRequest,
        auth_token: &str,
    ) -> Result<Lead, CrmError> {
        let lead = self.get_lead(lead_id, auth_token).await?;
        let lead = self
            .close_lead(
                lead,
                json!({ "status": LeadStatus::Lost, "lost_reason": request.reason }),
                auth_token,
            )
            .await?;

        info!("Lead {} lost", lead_id);
        Ok(lead)
    }

    /// Creates a patient from the lead, or links the existing patient with
    /// the same phone, and stores the link on the lead.
    pub async fn convert_to_patient(
        &self,
        lead_id: Uuid,
        auth_token: &str,
    ) -> Result<(Lead, Patient), CrmError> {
        let lead = self.get_lead(lead_id, auth_token).await?;
        if let Some(patient_id) = lead.patient_id {
            return Err(CrmError::AlreadyConverted(patient_id));
        }

        let request = CreatePatientRequest {
            full_name: lead.name.clone(),
            phone: lead.phone.clone(),
            email: lead.email.clone(),
            notes: lead.notes.clone(),
            ..Default::default()
        };

        let patient = match self.patients.create_patient(request, auth_token).await {
            Ok(patient) => patient,
            Err(PatientError::DuplicatePhone { phone }) => {
                warn!("Lead {} phone already belongs to a patient, linking it", lead_id);
                self.patients
                    .find_by_phone(&phone, Some(auth_token))
                    .await?
                    .ok_or(PatientError::DuplicatePhone { phone })?
            }
            Err(err) => return Err(err.into()),
        };

        let lead = self
            .patch_lead(
                lead_id,
                json!({ "patient_id": patient.id, "updated_at": Utc::now().to_rfc3339() }),
                auth_token,
            )
            .await?;

        info!("Lead {} converted to patient {}", lead_id, patient.id);
        Ok((lead, patient))
    }
}
