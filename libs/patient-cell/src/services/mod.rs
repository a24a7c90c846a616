pub mod patient;
pub mod tags;

pub use patient::PatientService;
pub use tags::TagService;
