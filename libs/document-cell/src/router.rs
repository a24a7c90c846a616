use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers::*;

pub fn document_routes(config: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/templates", get(list_templates).post(create_template))
        .route("/templates/{template_id}", get(get_template))
        .route("/generate", post(generate_document))
        .route("/patients/{patient_id}", get(get_patient_documents))
        .layer(middleware::from_fn_with_state(config.clone(), auth_middleware))
        .with_state(config)
}
