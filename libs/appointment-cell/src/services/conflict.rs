use chrono::{DateTime, Duration, Utc};
use reqwest::Method;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_database::supabase::{encode_filter, SupabaseClient};

use crate::models::{Appointment, AppointmentError, ConflictCheckResponse};
use crate::services::lifecycle::MAX_DURATION_MINUTES;

pub struct ConflictDetectionService {
    supabase: SupabaseClient,
}

/// Half-open interval overlap: back-to-back appointments do not conflict.
pub fn appointments_overlap(
    a_start: DateTime<Utc>,
    a_end: DateTime<Utc>,
    b_start: DateTime<Utc>,
    b_end: DateTime<Utc>,
) -> bool {
    a_start < b_end && b_start < a_end
}

/// IDs of active appointments overlapping `[start, end)`, ignoring `exclude`.
pub fn find_conflicts(
    candidates: &[Appointment],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    exclude: Option<Uuid>,
) -> Vec<Uuid> {
    candidates
        .iter()
        .filter(|a| Some(a.id) != exclude)
        .filter(|a| a.status.is_active())
        .filter(|a| appointments_overlap(start, end, a.starts_at, a.ends_at()))
        .map(|a| a.id)
        .collect()
}

impl ConflictDetectionService {
    pub fn new(supabase: SupabaseClient) -> Self {
        Self { supabase }
    }

    pub async fn check_conflicts(
        &self,
        professional_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude_appointment_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<ConflictCheckResponse, AppointmentError> {
        debug!("Checking conflicts for professional {} from {} to {}", professional_id, start, end);

        // Anything starting earlier than this cannot reach `start`.
        let window_start = start - Duration::minutes(MAX_DURATION_MINUTES as i64);
        let path = format!(
            "/rest/v1/appointments?professional_id=eq.{}&status=in.(scheduled,confirmed,in_progress)&starts_at=gt.{}&starts_at=lt.{}",
            professional_id,
            encode_filter(&window_start.to_rfc3339()),
            encode_filter(&end.to_rfc3339()),
        );

        let candidates: Vec<Appointment> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;

        let conflicting_appointments = find_conflicts(&candidates, start, end, exclude_appointment_id);

        if !conflicting_appointments.is_empty() {
            warn!(
                "Conflict detected for professional {} - {} conflicting appointments",
                professional_id,
                conflicting_appointments.len()
            );
        }

        Ok(ConflictCheckResponse {
            has_conflict: !conflicting_appointments.is_empty(),
            conflicting_appointments,
        })
    }
}
