use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    CreateRepairRequest, RepairError, RepairEvent, RepairListQuery, RepairStatus,
    RepairStatusRequest, RepairTicket, RepairTicketWithHistory, StatusChangeResult,
    UpdateRepairRequest,
};
use crate::services::notification::PickupNotifier;
use crate::services::workflow::RepairWorkflow;

pub struct RepairService<'a> {
    config: &'a AppConfig,
    supabase: SupabaseClient,
    workflow: RepairWorkflow,
}

fn required(value: &str, field: &str) -> Result<String, RepairError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(RepairError::ValidationError(format!("{} is required", field)));
    }
    Ok(value.to_string())
}

impl<'a> RepairService<'a> {
    pub fn new(config: &'a AppConfig) -> Self {
        Self {
            config,
            supabase: SupabaseClient::new(config),
            workflow: RepairWorkflow::new(),
        }
    }

    /// Event rows are history only; a failed write does not undo the change.
    async fn record_event(
        &self,
        ticket_id: Uuid,
        from_status: Option<RepairStatus>,
        to_status: RepairStatus,
        note: Option<String>,
        auth_token: &str,
    ) -> Option<RepairEvent> {
        let event = json!({
            "ticket_id": ticket_id,
            "from_status": from_status,
            "to_status": to_status,
            "note": note,
            "created_at": Utc::now().to_rfc3339()
        });

        match self.supabase
            .insert_returning::<RepairEvent>("repair_ticket_events", event, Some(auth_token))
            .await
        {
            Ok(rows) => rows.into_iter().next(),
            Err(e) => {
                warn!("Could not record repair event for ticket {}: {}", ticket_id, e);
                None
            }
        }
    }

    pub async fn create_ticket(
        &self,
        request: CreateRepairRequest,
        auth_token: &str,
    ) -> Result<RepairTicket, RepairError> {
        let device_brand = required(&request.device_brand, "device_brand")?;
        let problem_description = required(&request.problem_description, "problem_description")?;

        if request.estimated_cost.is_some_and(|cost| cost < 0.0) {
            return Err(RepairError::ValidationError("estimated_cost cannot be negative".to_string()));
        }

        let now = Utc::now().to_rfc3339();
        let ticket_data = json!({
            "patient_id": request.patient_id,
            "device_brand": device_brand,
            "device_model": request.device_model,
            "serial_number": request.serial_number,
            "problem_description": problem_description,
            "status": RepairStatus::Received,
            "under_warranty": request.under_warranty.unwrap_or(false),
            "estimated_cost": request.estimated_cost,
            "notes": request.notes,
            "received_at": now,
            "updated_at": now
        });

        let result: Vec<RepairTicket> = self.supabase
            .insert_returning("repair_tickets", ticket_data, Some(auth_token))
            .await?;

        let ticket = result
            .into_iter()
            .next()
            .ok_or_else(|| RepairError::DatabaseError("Failed to create repair ticket".to_string()))?;

        self.record_event(ticket.id, None, RepairStatus::Received, None, auth_token).await;

        info!("Repair ticket {} opened for patient {}", ticket.id, ticket.patient_id);
        Ok(ticket)
    }

    pub async fn list_tickets(
        &self,
        query: RepairListQuery,
        auth_token: &str,
    ) -> Result<Vec<RepairTicket>, RepairError> {
        let mut path = "/rest/v1/repair_tickets?order=received_at.desc".to_string();
        if let Some(status) = query.status {
            path.push_str(&format!("&status=eq.{}", status));
        }
        if let Some(patient_id) = query.patient_id {
            path.push_str(&format!("&patient_id=eq.{}", patient_id));
        }

        debug!("Listing repair tickets: {}", path);

        Ok(self.supabase.request(Method::GET, &path, Some(auth_token), None).await?)
    }

    pub async fn get_ticket(&self, ticket_id: Uuid, auth_token: &str) -> Result<RepairTicket, RepairError> {
        let path = format!("/rest/v1/repair_tickets?id=eq.{}", ticket_id);
        let result: Vec<RepairTicket> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;

        result.into_iter().next().ok_or(RepairError::NotFound)
    }

    pub async fn get_ticket_with_history(
        &self,
        ticket_id: Uuid,
        auth_token: &str,
    ) -> Result<RepairTicketWithHistory, RepairError> {
        let events_path = format!(
            "/rest/v1/repair_ticket_events?ticket_id=eq.{}&order=created_at.asc",
            ticket_id
        );

        let (ticket, events) = futures::try_join!(
            self.get_ticket(ticket_id, auth_token),
            async {
                self.supabase
                    .request::<Vec<RepairEvent>>(Method::GET, &events_path, Some(auth_token), None)
                    .await
                    .map_err(RepairError::from)
            }
        )?;

        Ok(RepairTicketWithHistory { ticket, events })
    }

    pub async fn update_ticket(
        &self,
        ticket_id: Uuid,
        request: UpdateRepairRequest,
        auth_token: &str,
    ) -> Result<RepairTicket, RepairError> {
        let mut update_data = Map::new();
        if let Some(brand) = request.device_brand {
            update_data.insert("device_brand".to_string(), json!(required(&brand, "device_brand")?));
        }
        if let Some(model) = request.device_model {
            update_data.insert("device_model".to_string(), json!(model));
        }
        if let Some(serial) = request.serial_number {
            update_data.insert("serial_number".to_string(), json!(serial));
        }
        if let Some(problem) = request.problem_description {
            update_data.insert(
                "problem_description".to_string(),
                json!(required(&problem, "problem_description")?),
            );
        }
        if let Some(warranty) = request.under_warranty {
            update_data.insert("under_warranty".to_string(), json!(warranty));
        }
        if let Some(cost) = request.estimated_cost {
            if cost < 0.0 {
                return Err(RepairError::ValidationError("estimated_cost cannot be negative".to_string()));
            }
            update_data.insert("estimated_cost".to_string(), json!(cost));
        }
        if let Some(notes) = request.notes {
            update_data.insert("notes".to_string(), json!(notes));
        }
        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let result: Vec<RepairTicket> = self.supabase
            .update_returning(
                "repair_tickets",
                &format!("id=eq.{}", ticket_id),
                Value::Object(update_data),
                Some(auth_token),
            )
            .await?;

        result.into_iter().next().ok_or(RepairError::NotFound)
    }

    pub async fn change_status(
        &self,
        ticket_id: Uuid,
        request: RepairStatusRequest,
        auth_token: &str,
    ) -> Result<StatusChangeResult, RepairError> {
        let current = self.get_ticket(ticket_id, auth_token).await?;
        self.workflow.validate_transition(current.status, request.status)?;

        let result: Vec<RepairTicket> = self.supabase
            .update_returning(
                "repair_tickets",
                &format!("id=eq.{}", ticket_id),
                json!({ "status": request.status, "updated_at": Utc::now().to_rfc3339() }),
                Some(auth_token),
            )
            .await?;

        let ticket = result.into_iter().next().ok_or(RepairError::NotFound)?;
        info!("Repair ticket {} moved from {} to {}", ticket_id, current.status, ticket.status);

        let event = self
            .record_event(ticket_id, Some(current.status), request.status, request.note, auth_token)
            .await;

        let notification_sent = if request.status == RepairStatus::ReadyForPickup
            && request.notify_patient.unwrap_or(true)
        {
            PickupNotifier::new(self.config).notify(&ticket, auth_token).await
        } else {
            false
        };

        Ok(StatusChangeResult {
            ticket,
            event,
            notification_sent,
        })
    }
}
