use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_models::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepairTicket {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub device_brand: String,
    pub device_model: Option<String>,
    pub serial_number: Option<String>,
    pub problem_description: String,
    pub status: RepairStatus,
    #[serde(default)]
    pub under_warranty: bool,
    pub estimated_cost: Option<f64>,
    pub notes: Option<String>,
    pub received_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RepairTicket {
    pub fn device_label(&self) -> String {
        match &self.device_model {
            Some(model) if !model.trim().is_empty() => format!("{} {}", self.device_brand, model.trim()),
            _ => self.device_brand.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RepairStatus {
    Received,
    InAnalysis,
    SentToManufacturer,
    ReturnedFromManufacturer,
    InRepair,
    ReadyForPickup,
    Delivered,
    Cancelled,
}

impl RepairStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RepairStatus::Delivered | RepairStatus::Cancelled)
    }
}

impl fmt::Display for RepairStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RepairStatus::Received => "received",
            RepairStatus::InAnalysis => "in_analysis",
            RepairStatus::SentToManufacturer => "sent_to_manufacturer",
            RepairStatus::ReturnedFromManufacturer => "returned_from_manufacturer",
            RepairStatus::InRepair => "in_repair",
            RepairStatus::ReadyForPickup => "ready_for_pickup",
            RepairStatus::Delivered => "delivered",
            RepairStatus::Cancelled => "cancelled",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepairEvent {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub from_status: Option<RepairStatus>,
    pub to_status: RepairStatus,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RepairTicketWithHistory {
    #[serde(flatten)]
    pub ticket: RepairTicket,
    pub events: Vec<RepairEvent>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusChangeResult {
    pub ticket: RepairTicket,
    pub event: Option<RepairEvent>,
    pub notification_sent: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateRepairRequest {
    pub patient_id: Uuid,
    pub device_brand: String,
    pub device_model: Option<String>,
    pub serial_number: Option<String>,
    pub problem_description: String,
    pub under_warranty: Option<bool>,
    pub estimated_cost: Option<f64>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateRepairRequest {
    pub device_brand: Option<String>,
    pub device_model: Option<String>,
    pub serial_number: Option<String>,
    pub problem_description: Option<String>,
    pub under_warranty: Option<bool>,
    pub estimated_cost: Option<f64>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RepairListQuery {
    pub status: Option<RepairStatus>,
    pub patient_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RepairStatusRequest {
    pub status: RepairStatus,
    pub note: Option<String>,
    pub notify_patient: Option<bool>,
}

#[derive(Debug, thiserror::Error)]
pub enum RepairError {
    #[error("Repair ticket not found")]
    NotFound,

    #[error("Invalid repair status transition from {from} to {to}")]
    InvalidTransition { from: RepairStatus, to: RepairStatus },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<anyhow::Error> for RepairError {
    fn from(err: anyhow::Error) -> Self {
        RepairError::DatabaseError(err.to_string())
    }
}

impl From<RepairError> for AppError {
    fn from(err: RepairError) -> Self {
        match err {
            RepairError::NotFound => AppError::NotFound(err.to_string()),
            RepairError::InvalidTransition { .. } => AppError::Conflict(err.to_string()),
            RepairError::ValidationError(_) => AppError::ValidationError(err.to_string()),
            RepairError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}
