pub mod board;
pub mod leads;
pub mod stages;

pub use board::BoardService;
pub use leads::LeadService;
pub use stages::StageService;
