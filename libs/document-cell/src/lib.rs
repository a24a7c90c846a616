pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::{Document, DocumentError, DocumentTemplate, GeneratedDocument};
pub use router::document_routes;
pub use services::renderer::{render_template, RenderContext, RenderedTemplate};
