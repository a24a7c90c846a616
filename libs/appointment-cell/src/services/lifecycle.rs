// libs/appointment-cell/src/services/lifecycle.rs
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use crate::models::{AppointmentError, AppointmentStatus};

/// Minutes of clock skew tolerated when booking "now".
const PAST_BOOKING_TOLERANCE_MINUTES: i64 = 5;
pub const MIN_DURATION_MINUTES: i32 = 5;
pub const MAX_DURATION_MINUTES: i32 = 480;
pub const DEFAULT_DURATION_MINUTES: i32 = 30;

#[derive(Default)]
pub struct AppointmentLifecycleService;

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    pub fn validate_status_transition(
        &self,
        current_status: AppointmentStatus,
        new_status: AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        debug!("Validating status transition from {} to {}", current_status, new_status);

        if !self.get_valid_transitions(current_status).contains(&new_status) {
            warn!("Invalid status transition attempted: {} -> {}", current_status, new_status);
            return Err(AppointmentError::InvalidStatusTransition {
                from: current_status,
                to: new_status,
            });
        }

        Ok(())
    }

    pub fn get_valid_transitions(&self, current_status: AppointmentStatus) -> Vec<AppointmentStatus> {
        match current_status {
            AppointmentStatus::Scheduled => vec![
                AppointmentStatus::Confirmed,
                AppointmentStatus::Cancelled,
                AppointmentStatus::NoShow,
                AppointmentStatus::Rescheduled,
            ],
            AppointmentStatus::Confirmed => vec![
                AppointmentStatus::InProgress,
                AppointmentStatus::Completed,
                AppointmentStatus::Cancelled,
                AppointmentStatus::NoShow,
                AppointmentStatus::Rescheduled,
            ],
            AppointmentStatus::InProgress => vec![
                AppointmentStatus::Completed,
                AppointmentStatus::Cancelled,
            ],
            AppointmentStatus::Rescheduled => vec![
                AppointmentStatus::Confirmed,
                AppointmentStatus::Cancelled,
            ],
            AppointmentStatus::Completed
            | AppointmentStatus::Cancelled
            | AppointmentStatus::NoShow => vec![],
        }
    }

    pub fn validate_duration(&self, duration_minutes: i32) -> Result<(), AppointmentError> {
        if !(MIN_DURATION_MINUTES..=MAX_DURATION_MINUTES).contains(&duration_minutes) {
            return Err(AppointmentError::InvalidTime(format!(
                "duration must be between {} and {} minutes",
                MIN_DURATION_MINUTES, MAX_DURATION_MINUTES
            )));
        }
        Ok(())
    }

    pub fn validate_start_time(
        &self,
        starts_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), AppointmentError> {
        if starts_at < now - Duration::minutes(PAST_BOOKING_TOLERANCE_MINUTES) {
            return Err(AppointmentError::InvalidTime(
                "appointment cannot start in the past".to_string(),
            ));
        }
        Ok(())
    }

    /// Past-due appointments still waiting for the patient.
    pub fn should_mark_no_show(
        &self,
        current_status: AppointmentStatus,
        starts_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> bool {
        matches!(current_status, AppointmentStatus::Scheduled | AppointmentStatus::Confirmed)
            && now > starts_at + Duration::minutes(30)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn terminal_statuses_have_no_exits() {
        let lifecycle = AppointmentLifecycleService::new();
        for status in [AppointmentStatus::Completed, AppointmentStatus::Cancelled, AppointmentStatus::NoShow] {
            assert!(lifecycle.get_valid_transitions(status).is_empty());
            assert!(status.is_terminal());
        }
    }

    #[test]
    fn confirm_then_complete_is_allowed() {
        let lifecycle = AppointmentLifecycleService::new();
        assert!(lifecycle
            .validate_status_transition(AppointmentStatus::Scheduled, AppointmentStatus::Confirmed)
            .is_ok());
        assert!(lifecycle
            .validate_status_transition(AppointmentStatus::Confirmed, AppointmentStatus::Completed)
            .is_ok());
    }

    #[test]
    fn cancelled_cannot_be_reopened() {
        let lifecycle = AppointmentLifecycleService::new();
        assert_matches!(
            lifecycle.validate_status_transition(AppointmentStatus::Cancelled, AppointmentStatus::Scheduled),
            Err(AppointmentError::InvalidStatusTransition { from: AppointmentStatus::Cancelled, .. })
        );
    }

    #[test]
    fn scheduled_cannot_skip_to_in_progress() {
        let lifecycle = AppointmentLifecycleService::new();
        assert!(lifecycle
            .validate_status_transition(AppointmentStatus::Scheduled, AppointmentStatus::InProgress)
            .is_err());
    }

    #[test]
    fn duration_bounds() {
        let lifecycle = AppointmentLifecycleService::new();
        assert!(lifecycle.validate_duration(4).is_err());
        assert!(lifecycle.validate_duration(5).is_ok());
        assert!(lifecycle.validate_duration(480).is_ok());
        assert!(lifecycle.validate_duration(481).is_err());
    }

    #[test]
    fn start_time_tolerates_small_skew() {
        let lifecycle = AppointmentLifecycleService::new();
        let now = Utc::now();
        assert!(lifecycle.validate_start_time(now - Duration::minutes(3), now).is_ok());
        assert!(lifecycle.validate_start_time(now - Duration::minutes(10), now).is_err());
    }

    #[test]
    fn no_show_after_half_an_hour() {
        let lifecycle = AppointmentLifecycleService::new();
        let start = Utc::now() - Duration::minutes(31);
        assert!(lifecycle.should_mark_no_show(AppointmentStatus::Confirmed, start, Utc::now()));
        assert!(!lifecycle.should_mark_no_show(AppointmentStatus::Completed, start, Utc::now()));
    }
}
