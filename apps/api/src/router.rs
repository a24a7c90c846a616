use std::sync::Arc;

use axum::{routing::get, Router};

use appointment_cell::router::appointment_routes;
use auth_cell::router::auth_routes;
use crm_cell::router::crm_routes;
use document_cell::router::document_routes;
use messaging_cell::messaging_routes;
use patient_cell::router::patient_routes;
use repair_cell::router::repair_routes;
use shared_config::AppConfig;

pub fn create_router(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(|| async { "Audicare API is running!" }))
        .nest("/auth", auth_routes(state.clone()))
        .nest("/patients", patient_routes(state.clone()))
        .nest("/appointments", appointment_routes(state.clone()))
        .nest("/crm", crm_routes(state.clone()))
        .nest("/repairs", repair_routes(state.clone()))
        .nest("/documents", document_routes(state.clone()))
        .nest("/messaging", messaging_routes(state))
}
