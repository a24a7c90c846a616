pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::{Board, CrmError, CrmStage, Lead, LeadStatus};
pub use router::crm_routes;
