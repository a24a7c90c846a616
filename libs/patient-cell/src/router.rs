use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers::*;

pub fn patient_routes(config: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", post(create_patient))
        .route("/search", get(search_patients))
        .route("/tags", get(list_tags).post(create_tag))
        .route("/{id}", get(get_patient).put(update_patient).delete(delete_patient))
        .route("/{id}/tags", get(get_patient_tags))
        .route("/{id}/tags/{tag_id}", post(add_patient_tag).delete(remove_patient_tag))
        .layer(middleware::from_fn_with_state(config.clone(), auth_middleware))
        .with_state(config)
}
