pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::{RepairError, RepairEvent, RepairStatus, RepairTicket};
pub use router::repair_routes;
