pub mod booking;
pub mod conflict;
pub mod lifecycle;

pub use booking::AppointmentService;
pub use conflict::ConflictDetectionService;
pub use lifecycle::AppointmentLifecycleService;
