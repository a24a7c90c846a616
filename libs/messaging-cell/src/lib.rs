pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::{MessagingError, RelayOutcome, SendMessageRequest, SendMessageResult};
pub use router::{messaging_routes, MessagingState};
pub use services::{MessageDeduplicator, UazapiClient};
