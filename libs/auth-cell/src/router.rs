use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers::*;

/// `/validate` and `/verify` read the bearer themselves; the rest sit behind
/// the staff auth middleware.
pub fn auth_routes(config: Arc<AppConfig>) -> Router {
    let staff_routes = Router::new()
        .route("/me", get(current_user))
        .route("/profile", post(get_profile))
        .layer(middleware::from_fn_with_state(config.clone(), auth_middleware));

    Router::new()
        .route("/validate", post(validate_token))
        .route("/verify", post(verify_token))
        .merge(staff_routes)
        .with_state(config)
}
