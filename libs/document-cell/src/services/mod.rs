pub mod documents;
pub mod renderer;
pub mod templates;

pub use documents::DocumentService;
pub use templates::TemplateService;
