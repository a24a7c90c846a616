use tracing::warn;

use crate::models::{RepairError, RepairStatus};

/// Allowed moves of a repair ticket through the workshop.
#[derive(Default)]
pub struct RepairWorkflow;

impl RepairWorkflow {
    pub fn new() -> Self {
        Self
    }

    pub fn valid_transitions(&self, current: RepairStatus) -> &'static [RepairStatus] {
        use RepairStatus::*;

        match current {
            Received => &[InAnalysis, SentToManufacturer, Cancelled],
            InAnalysis => &[SentToManufacturer, InRepair, ReadyForPickup, Cancelled],
            SentToManufacturer => &[ReturnedFromManufacturer, Cancelled],
            ReturnedFromManufacturer => &[ReadyForPickup, InRepair],
            InRepair => &[ReadyForPickup, Cancelled],
            ReadyForPickup => &[Delivered],
            Delivered | Cancelled => &[],
        }
    }

    pub fn validate_transition(&self, current: RepairStatus, next: RepairStatus) -> Result<(), RepairError> {
        if !self.valid_transitions(current).contains(&next) {
            warn!("Rejected repair transition {} -> {}", current, next);
            return Err(RepairError::InvalidTransition { from: current, to: next });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn manufacturer_round_trip_is_allowed() {
        let workflow = RepairWorkflow::new();
        assert!(workflow.validate_transition(RepairStatus::Received, RepairStatus::SentToManufacturer).is_ok());
        assert!(workflow
            .validate_transition(RepairStatus::SentToManufacturer, RepairStatus::ReturnedFromManufacturer)
            .is_ok());
        assert!(workflow
            .validate_transition(RepairStatus::ReturnedFromManufacturer, RepairStatus::ReadyForPickup)
            .is_ok());
        assert!(workflow.validate_transition(RepairStatus::ReadyForPickup, RepairStatus::Delivered).is_ok());
    }

    #[test]
    fn pickup_cannot_be_cancelled() {
        let workflow = RepairWorkflow::new();
        assert_matches!(
            workflow.validate_transition(RepairStatus::ReadyForPickup, RepairStatus::Cancelled),
            Err(RepairError::InvalidTransition { .. })
        );
    }

    #[test]
    fn terminal_statuses_have_no_exits() {
        let workflow = RepairWorkflow::new();
        for status in [RepairStatus::Delivered, RepairStatus::Cancelled] {
            assert!(status.is_terminal());
            assert!(workflow.valid_transitions(status).is_empty());
        }
    }

    #[test]
    fn received_cannot_skip_to_repair() {
        let workflow = RepairWorkflow::new();
        assert!(workflow.validate_transition(RepairStatus::Received, RepairStatus::InRepair).is_err());
        assert!(workflow.validate_transition(RepairStatus::Received, RepairStatus::Received).is_err());
    }
}
