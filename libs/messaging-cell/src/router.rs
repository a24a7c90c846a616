// libs/messaging-cell/src/router.rs
use std::sync::Arc;
use std::time::Duration;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::services::MessageDeduplicator;

/// Router state: configuration plus the process-wide dedup map.
#[derive(Clone)]
pub struct MessagingState {
    pub config: Arc<AppConfig>,
    pub dedup: Arc<MessageDeduplicator>,
}

impl MessagingState {
    pub fn new(config: Arc<AppConfig>) -> Self {
        let ttl = Duration::from_secs(config.dedup_ttl_secs);
        Self {
            config,
            dedup: Arc::new(MessageDeduplicator::new(ttl)),
        }
    }
}

pub fn messaging_routes(config: Arc<AppConfig>) -> Router {
    let state = MessagingState::new(Arc::clone(&config));

    let public_routes = Router::new()
        .route("/webhooks/whatsapp", post(handlers::whatsapp_webhook))
        .route("/webhooks/chatwoot", post(handlers::chatwoot_webhook))
        .route("/health", get(handlers::messaging_health));

    let protected_routes = Router::new()
        .route("/send", post(handlers::send_message))
        .route("/ai/suggest-reply", post(handlers::suggest_reply))
        .route("/knowledge-base", post(handlers::add_knowledge_entry))
        .route("/knowledge-base/search", get(handlers::search_knowledge_base))
        .layer(middleware::from_fn_with_state(config, auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
