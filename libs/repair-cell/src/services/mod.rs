pub mod notification;
pub mod tickets;
pub mod workflow;

pub use notification::PickupNotifier;
pub use tickets::RepairService;
pub use workflow::RepairWorkflow;
