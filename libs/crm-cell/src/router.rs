use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers::*;

pub fn crm_routes(config: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/board", get(get_board))
        .route("/stages", post(create_stage))
        .route("/stages/{id}", put(update_stage))
        .route("/leads", post(create_lead))
        .route("/leads/{id}", put(update_lead))
        .route("/leads/{id}/move", post(move_lead))
        .route("/leads/{id}/won", post(mark_lead_won))
        .route("/leads/{id}/lost", post(mark_lead_lost))
        .route("/leads/{id}/convert", post(convert_lead))
        .layer(middleware::from_fn_with_state(config.clone(), auth_middleware))
        .with_state(config)
}
