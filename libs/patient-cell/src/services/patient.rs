use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Map, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::{encode_filter, SupabaseClient};
use shared_utils::phone::{normalize_phone, phones_match};

use crate::models::{
    CreatePatientRequest, Patient, PatientError, PatientSearchQuery, UpdatePatientRequest,
};

const DEFAULT_PAGE_SIZE: i32 = 50;
const MAX_PAGE_SIZE: i32 = 200;

pub struct PatientService {
    supabase: SupabaseClient,
    default_country_code: String,
}

impl PatientService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            default_country_code: config.default_country_code.clone(),
        }
    }

    /// Variant used by webhook handlers, which carry no user session.
    pub fn with_service_role(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::with_service_role(config),
            default_country_code: config.default_country_code.clone(),
        }
    }

    fn normalize_optional_phone(&self, phone: Option<&str>) -> Result<Option<String>, PatientError> {
        match phone.map(str::trim).filter(|p| !p.is_empty()) {
            None => Ok(None),
            Some(raw) => normalize_phone(raw, &self.default_country_code)
                .map(Some)
                .ok_or_else(|| PatientError::ValidationError(format!("Invalid phone number: {}", raw))),
        }
    }

    /// Rejects `phone` when another patient owns the same line, including
    /// records stored with or without the ninth digit.
    async fn ensure_phone_free(
        &self,
        phone: &str,
        exclude_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<(), PatientError> {
        let mut path = format!(
            "/rest/v1/patients?select=id,phone&phone=like.*{}",
            encode_filter(phone_suffix(phone))
        );
        if let Some(id) = exclude_id {
            path.push_str(&format!("&id=neq.{}", id));
        }

        let candidates: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;

        let taken = candidates.iter().any(|row| {
            row.get("phone")
                .and_then(Value::as_str)
                .is_some_and(|existing| phones_match(existing, phone, &self.default_country_code))
        });

        if taken {
            return Err(PatientError::DuplicatePhone { phone: phone.to_string() });
        }

        Ok(())
    }

    pub async fn create_patient(
        &self,
        request: CreatePatientRequest,
        auth_token: &str,
    ) -> Result<Patient, PatientError> {
        let full_name = request.full_name.trim().to_string();
        if full_name.is_empty() {
            return Err(PatientError::ValidationError("full_name is required".to_string()));
        }

        debug!("Creating patient record for: {}", full_name);

        let phone = self.normalize_optional_phone(request.phone.as_deref())?;
        if let Some(phone) = &phone {
            self.ensure_phone_free(phone, None, auth_token).await?;
        }

        let now = Utc::now().to_rfc3339();
        let patient_data = json!({
            "full_name": full_name,
            "phone": phone,
            "email": request.email,
            "cpf": request.cpf,
            "birth_date": request.birth_date.map(|d| d.format("%Y-%m-%d").to_string()),
            "address": request.address,
            "city": request.city,
            "notes": request.notes,
            "hearing_loss_type": request.hearing_loss_type,
            "created_at": now,
            "updated_at": now
        });

        let result: Vec<Patient> = self.supabase
            .insert_returning("patients", patient_data, Some(auth_token))
            .await?;

        let patient = result
            .into_iter()
            .next()
            .ok_or_else(|| PatientError::DatabaseError("Failed to create patient".to_string()))?;

        info!("Patient created with ID: {}", patient.id);
        Ok(patient)
    }

    pub async fn get_patient(&self, patient_id: Uuid, auth_token: &str) -> Result<Patient, PatientError> {
        debug!("Fetching patient: {}", patient_id);

        let path = format!("/rest/v1/patients?id=eq.{}", patient_id);
        let result: Vec<Patient> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;

        result.into_iter().next().ok_or(PatientError::NotFound)
    }

    pub async fn update_patient(
        &self,
        patient_id: Uuid,
        request: UpdatePatientRequest,
        auth_token: &str,
    ) -> Result<Patient, PatientError> {
        debug!("Updating patient: {}", patient_id);

        let mut update_data = Map::new();

        if let Some(full_name) = request.full_name {
            let full_name = full_name.trim().to_string();
            if full_name.is_empty() {
                return Err(PatientError::ValidationError("full_name cannot be blank".to_string()));
            }
            update_data.insert("full_name".to_string(), json!(full_name));
        }
        if let Some(phone) = self.normalize_optional_phone(request.phone.as_deref())? {
            self.ensure_phone_free(&phone, Some(patient_id), auth_token).await?;
            update_data.insert("phone".to_string(), json!(phone));
        }
        if let Some(email) = request.email {
            update_data.insert("email".to_string(), json!(email));
        }
        if let Some(cpf) = request.cpf {
            update_data.insert("cpf".to_string(), json!(cpf));
        }
        if let Some(birth_date) = request.birth_date {
            update_data.insert("birth_date".to_string(), json!(birth_date.format("%Y-%m-%d").to_string()));
        }
        if let Some(address) = request.address {
            update_data.insert("address".to_string(), json!(address));
        }
        if let Some(city) = request.city {
            update_data.insert("city".to_string(), json!(city));
        }
        if let Some(notes) = request.notes {
            update_data.insert("notes".to_string(), json!(notes));
        }
        if let Some(hearing_loss_type) = request.hearing_loss_type {
            update_data.insert("hearing_loss_type".to_string(), json!(hearing_loss_type));
        }

        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let result: Vec<Patient> = self.supabase.update_returning(
            "patients",
            &format!("id=eq.{}", patient_id),
            Value::Object(update_data),
            Some(auth_token),
        ).await?;

        result.into_iter().next().ok_or(PatientError::NotFound)
    }

    pub async fn delete_patient(&self, patient_id: Uuid, auth_token: &str) -> Result<(), PatientError> {
        debug!("Deleting patient: {}", patient_id);

        let removed: Vec<Value> = self.supabase.delete_returning(
            "patients",
            &format!("id=eq.{}", patient_id),
            Some(auth_token),
        ).await?;

        if removed.is_empty() {
            return Err(PatientError::NotFound);
        }

        info!("Patient {} deleted", patient_id);
        Ok(())
    }

    pub async fn search_patients(
        &self,
        query: PatientSearchQuery,
        auth_token: &str,
    ) -> Result<Vec<Patient>, PatientError> {
        debug!("Searching patients with query: {:?}", query);

        let patient_ids = match query.tag_id {
            Some(tag_id) => {
                let path = format!("/rest/v1/patient_tags?select=patient_id&tag_id=eq.{}", tag_id);
                let rows: Vec<Value> = self.supabase.request(
                    Method::GET,
                    &path,
                    Some(auth_token),
                    None,
                ).await?;

                let ids: Vec<String> = rows
                    .iter()
                    .filter_map(|row| row["patient_id"].as_str().map(str::to_string))
                    .collect();

                if ids.is_empty() {
                    return Ok(vec![]);
                }
                Some(ids)
            }
            None => None,
        };

        let path = build_search_path(&query, patient_ids.as_deref(), &self.default_country_code);

        let patients: Vec<Patient> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;

        Ok(patients)
    }

    /// Finds the patient owning a phone line, if any. Used to link WhatsApp traffic to records.
    pub async fn find_by_phone(
        &self,
        phone: &str,
        auth_token: Option<&str>,
    ) -> Result<Option<Patient>, PatientError> {
        let Some(digits) = normalize_phone(phone, &self.default_country_code) else {
            return Ok(None);
        };

        let path = format!(
            "/rest/v1/patients?phone=like.*{}&limit=10",
            encode_filter(phone_suffix(&digits))
        );

        let candidates: Vec<Patient> = self.supabase.request(
            Method::GET,
            &path,
            auth_token,
            None,
        ).await?;

        Ok(candidates.into_iter().find(|p| {
            p.phone
                .as_deref()
                .is_some_and(|candidate| phones_match(candidate, &digits, &self.default_country_code))
        }))
    }
}

/// Last eight digits: identical with and without the Brazilian ninth digit.
fn phone_suffix(digits: &str) -> &str {
    &digits[digits.len().saturating_sub(8)..]
}

fn build_search_path(
    query: &PatientSearchQuery,
    patient_ids: Option<&[String]>,
    default_country_code: &str,
) -> String {
    let mut query_parts = vec![];

    if let Some(name) = query.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        query_parts.push(format!("full_name=ilike.*{}*", encode_filter(name)));
    }
    if let Some(email) = query.email.as_deref().map(str::trim).filter(|e| !e.is_empty()) {
        query_parts.push(format!("email=ilike.*{}*", encode_filter(email)));
    }
    if let Some(phone) = query.phone.as_deref() {
        let digits = normalize_phone(phone, default_country_code)
            .unwrap_or_else(|| phone.chars().filter(|c| c.is_ascii_digit()).collect());
        if !digits.is_empty() {
            query_parts.push(format!("phone=like.*{}*", phone_suffix(&digits)));
        }
    }
    if let Some(ids) = patient_ids {
        query_parts.push(format!("id=in.({})", ids.join(",")));
    }

    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = query.offset.unwrap_or(0).max(0);
    query_parts.push("order=full_name.asc".to_string());
    query_parts.push(format!("limit={}", limit));
    query_parts.push(format!("offset={}", offset));

    format!("/rest/v1/patients?{}", query_parts.join("&"))
}
