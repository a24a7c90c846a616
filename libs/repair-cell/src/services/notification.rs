use tracing::{info, warn};

use messaging_cell::UazapiClient;
use patient_cell::{Patient, PatientService};
use shared_config::AppConfig;

use crate::models::RepairTicket;

pub fn pickup_message(patient: &Patient, ticket: &RepairTicket) -> String {
    format!(
        "Olá, {}! Seu aparelho {} já está pronto para retirada na Audicare. Aguardamos sua visita!",
        patient.first_name(),
        ticket.device_label()
    )
}

/// WhatsApp notice sent when a device is ready for pickup.
pub struct PickupNotifier<'a> {
    config: &'a AppConfig,
}

impl<'a> PickupNotifier<'a> {
    pub fn new(config: &'a AppConfig) -> Self {
        Self { config }
    }

    /// Returns whether the message left. Failures are only logged.
    pub async fn notify(&self, ticket: &RepairTicket, auth_token: &str) -> bool {
        let patient = match PatientService::new(self.config)
            .get_patient(ticket.patient_id, auth_token)
            .await
        {
            Ok(patient) => patient,
            Err(e) => {
                warn!("Pickup notice for ticket {}: patient lookup failed: {}", ticket.id, e);
                return false;
            }
        };

        let Some(phone) = patient.phone.as_deref().filter(|p| !p.is_empty()) else {
            warn!("Pickup notice for ticket {}: patient {} has no phone", ticket.id, patient.id);
            return false;
        };

        let client = match UazapiClient::new(self.config) {
            Ok(client) => client,
            Err(e) => {
                warn!("Pickup notice for ticket {} skipped: {}", ticket.id, e);
                return false;
            }
        };

        match client.send_text(phone, &pickup_message(&patient, ticket)).await {
            Ok(_) => {
                info!("Pickup notice sent for ticket {}", ticket.id);
                true
            }
            Err(e) => {
                warn!("Pickup notice for ticket {} failed: {}", ticket.id, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RepairStatus;
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn pickup_message_names_patient_and_device() {
        let patient: Patient = serde_json::from_value(serde_json::json!({
            "id": Uuid::new_v4(),
            "full_name": "Maria da Silva",
            "phone": "5511987654321",
            "email": null,
            "cpf": null,
            "birth_date": null,
            "address": null,
            "city": null,
            "notes": null,
            "hearing_loss_type": null,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        }))
        .unwrap();

        let ticket = RepairTicket {
            id: Uuid::new_v4(),
            patient_id: patient.id,
            device_brand: "Phonak".to_string(),
            device_model: Some("Audéo P90".to_string()),
            serial_number: None,
            problem_description: "Sem som".to_string(),
            status: RepairStatus::ReadyForPickup,
            under_warranty: true,
            estimated_cost: None,
            notes: None,
            received_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let message = pickup_message(&patient, &ticket);
        assert!(message.starts_with("Olá, Maria!"));
        assert!(message.contains("Phonak Audéo P90"));
    }
}
