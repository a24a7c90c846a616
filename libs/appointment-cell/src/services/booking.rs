use chrono::{Duration, Utc};
use reqwest::Method;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::{encode_filter, SupabaseClient};

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, CalendarQuery, ConflictCheckQuery,
    ConflictCheckResponse, CreateAppointmentRequest, StatusChangeRequest, UpdateAppointmentRequest,
};
use crate::services::conflict::ConflictDetectionService;
use crate::services::lifecycle::{AppointmentLifecycleService, DEFAULT_DURATION_MINUTES};

const MAX_CALENDAR_RANGE_DAYS: i64 = 62;

pub struct AppointmentService {
    supabase: SupabaseClient,
    conflict_service: ConflictDetectionService,
    lifecycle_service: AppointmentLifecycleService,
}

/// Calendar listing plus the entries that look like missed visits.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CalendarView {
    pub appointments: Vec<Appointment>,
    pub total: usize,
    pub overdue: Vec<Uuid>,
}

impl AppointmentService {
    pub fn new(config: &AppConfig) -> Self {
        let supabase = SupabaseClient::new(config);

        Self {
            conflict_service: ConflictDetectionService::new(supabase.clone()),
            lifecycle_service: AppointmentLifecycleService::new(),
            supabase,
        }
    }

    pub async fn create_appointment(
        &self,
        request: CreateAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let duration = request.duration_minutes.unwrap_or(DEFAULT_DURATION_MINUTES);
        self.lifecycle_service.validate_duration(duration)?;
        self.lifecycle_service.validate_start_time(request.starts_at, Utc::now())?;

        debug!("Booking appointment for patient {} at {}", request.patient_id, request.starts_at);

        if let Some(professional_id) = request.professional_id {
            let end = request.starts_at + Duration::minutes(duration as i64);
            let check = self.conflict_service
                .check_conflicts(professional_id, request.starts_at, end, None, auth_token)
                .await?;
            if check.has_conflict {
                return Err(AppointmentError::ConflictDetected(check.conflicting_appointments));
            }
        }

        let now = Utc::now().to_rfc3339();
        let appointment_data = json!({
            "patient_id": request.patient_id,
            "professional_id": request.professional_id,
            "title": request.title,
            "appointment_type": request.appointment_type,
            "status": AppointmentStatus::Scheduled,
            "starts_at": request.starts_at.to_rfc3339(),
            "duration_minutes": duration,
            "location": request.location,
            "notes": request.notes,
            "created_at": now,
            "updated_at": now
        });

        let result: Vec<Appointment> = self.supabase
            .insert_returning("appointments", appointment_data, Some(auth_token))
            .await?;

        let appointment = result
            .into_iter()
            .next()
            .ok_or_else(|| AppointmentError::DatabaseError("Failed to create appointment".to_string()))?;

        info!("Appointment {} booked for patient {}", appointment.id, appointment.patient_id);
        Ok(appointment)
    }

    pub async fn get_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Fetching appointment: {}", appointment_id);

        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let result: Vec<Appointment> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;

        result.into_iter().next().ok_or(AppointmentError::NotFound)
    }

    pub async fn update_appointment(
        &self,
        appointment_id: Uuid,
        request: UpdateAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let current = self.get_appointment(appointment_id, auth_token).await?;

        if current.status.is_terminal() {
            return Err(AppointmentError::NotModifiable(current.status));
        }

        let starts_at = request.starts_at.unwrap_or(current.starts_at);
        let duration = request.duration_minutes.unwrap_or(current.duration_minutes);
        let professional_id = request.professional_id.or(current.professional_id);

        if request.duration_minutes.is_some() {
            self.lifecycle_service.validate_duration(duration)?;
        }
        if request.starts_at.is_some() {
            self.lifecycle_service.validate_start_time(starts_at, Utc::now())?;
        }

        if request.changes_schedule() {
            if let Some(professional_id) = professional_id {
                let end = starts_at + Duration::minutes(duration as i64);
                let check = self.conflict_service
                    .check_conflicts(professional_id, starts_at, end, Some(appointment_id), auth_token)
                    .await?;
                if check.has_conflict {
                    return Err(AppointmentError::ConflictDetected(check.conflicting_appointments));
                }
            }
        }

        let mut update_data = Map::new();
        if let Some(professional_id) = request.professional_id {
            update_data.insert("professional_id".to_string(), json!(professional_id));
        }
        if let Some(title) = request.title {
            update_data.insert("title".to_string(), json!(title));
        }
        if let Some(appointment_type) = request.appointment_type {
            update_data.insert("appointment_type".to_string(), json!(appointment_type));
        }
        if let Some(starts_at) = request.starts_at {
            update_data.insert("starts_at".to_string(), json!(starts_at.to_rfc3339()));
        }
        if let Some(duration) = request.duration_minutes {
            update_data.insert("duration_minutes".to_string(), json!(duration));
        }
        if let Some(location) = request.location {
            update_data.insert("location".to_string(), json!(location));
        }
        if let Some(notes) = request.notes {
            update_data.insert("notes".to_string(), json!(notes));
        }
        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let result: Vec<Appointment> = self.supabase
            .update_returning(
                "appointments",
                &format!("id=eq.{}", appointment_id),
                Value::Object(update_data),
                Some(auth_token),
            )
            .await?;

        let appointment = result.into_iter().next().ok_or(AppointmentError::NotFound)?;
        info!("Appointment {} updated", appointment.id);
        Ok(appointment)
    }

    pub async fn change_status(
        &self,
        appointment_id: Uuid,
        request: StatusChangeRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let current = self.get_appointment(appointment_id, auth_token).await?;
        self.lifecycle_service.validate_status_transition(current.status, request.status)?;

        // Reactivating puts the slot back on the agenda.
        if !current.status.is_active() && request.status.is_active() {
            if let Some(professional_id) = current.professional_id {
                let check = self.conflict_service
                    .check_conflicts(
                        professional_id,
                        current.starts_at,
                        current.ends_at(),
                        Some(appointment_id),
                        auth_token,
                    )
                    .await?;
                if check.has_conflict {
                    return Err(AppointmentError::ConflictDetected(check.conflicting_appointments));
                }
            }
        }

        let update_data = json!({
            "status": request.status,
            "status_reason": request.reason,
            "updated_at": Utc::now().to_rfc3339()
        });

        let result: Vec<Appointment> = self.supabase
            .update_returning(
                "appointments",
                &format!("id=eq.{}", appointment_id),
                update_data,
                Some(auth_token),
            )
            .await?;

        let appointment = result.into_iter().next().ok_or(AppointmentError::NotFound)?;
        info!("Appointment {} moved from {} to {}", appointment_id, current.status, appointment.status);
        Ok(appointment)
    }

    pub async fn get_calendar(
        &self,
        query: CalendarQuery,
        auth_token: &str,
    ) -> Result<CalendarView, AppointmentError> {
        if query.from >= query.to {
            return Err(AppointmentError::ValidationError("from must be before to".to_string()));
        }
        if query.to - query.from > Duration::days(MAX_CALENDAR_RANGE_DAYS) {
            return Err(AppointmentError::ValidationError(format!(
                "calendar range cannot exceed {} days",
                MAX_CALENDAR_RANGE_DAYS
            )));
        }

        let mut path = format!(
            "/rest/v1/appointments?starts_at=gte.{}&starts_at=lt.{}",
            encode_filter(&query.from.to_rfc3339()),
            encode_filter(&query.to.to_rfc3339()),
        );
        if let Some(professional_id) = query.professional_id {
            path.push_str(&format!("&professional_id=eq.{}", professional_id));
        }
        path.push_str("&order=starts_at.asc");

        let appointments: Vec<Appointment> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;

        let now = Utc::now();
        let overdue: Vec<Uuid> = appointments
            .iter()
            .filter(|a| self.lifecycle_service.should_mark_no_show(a.status, a.starts_at, now))
            .map(|a| a.id)
            .collect();

        if !overdue.is_empty() {
            warn!("{} past appointments still open in calendar range", overdue.len());
        }

        Ok(CalendarView {
            total: appointments.len(),
            appointments,
            overdue,
        })
    }

    pub async fn get_patient_history(
        &self,
        patient_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        debug!("Fetching appointment history for patient {}", patient_id);

        let path = format!(
            "/rest/v1/appointments?patient_id=eq.{}&order=starts_at.desc",
            patient_id
        );

        let appointments: Vec<Appointment> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;

        Ok(appointments)
    }

    pub async fn check_conflicts(
        &self,
        query: ConflictCheckQuery,
        auth_token: &str,
    ) -> Result<ConflictCheckResponse, AppointmentError> {
        let duration = query.duration_minutes.unwrap_or(DEFAULT_DURATION_MINUTES);
        self.lifecycle_service.validate_duration(duration)?;

        let end = query.starts_at + Duration::minutes(duration as i64);
        self.conflict_service
            .check_conflicts(query.professional_id, query.starts_at, end, query.exclude_id, auth_token)
            .await
    }
}
