// libs/messaging-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    AddKnowledgeRequest, ChatwootWebhook, KnowledgeSearchQuery, SendMessageRequest,
    SuggestReplyRequest, UazapiWebhook,
};
use crate::router::MessagingState;
use crate::services::assistant::conversation_turns;
use crate::services::{AssistantService, ChatwootClient, KnowledgeBaseService, RelayService};

const WEBHOOK_TOKEN_HEADER: &str = "x-webhook-token";
const DEFAULT_SEARCH_LIMIT: usize = 5;

#[derive(Debug, Default, Deserialize)]
pub struct WebhookAuthQuery {
    pub token: Option<String>,
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Webhooks carry the shared secret in a header or a `token` query parameter.
/// An empty secret disables the check.
pub fn verify_webhook_token(
    headers: &HeaderMap,
    query_token: Option<&str>,
    secret: &str,
) -> Result<(), AppError> {
    if secret.is_empty() {
        return Ok(());
    }

    let provided = headers
        .get(WEBHOOK_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .or(query_token)
        .ok_or_else(|| AppError::Auth("Missing webhook token".to_string()))?;

    if !constant_time_eq(provided.as_bytes(), secret.as_bytes()) {
        warn!("Webhook called with an invalid token");
        return Err(AppError::Auth("Invalid webhook token".to_string()));
    }

    Ok(())
}

#[axum::debug_handler]
pub async fn whatsapp_webhook(
    State(state): State<MessagingState>,
    Query(auth): Query<WebhookAuthQuery>,
    headers: HeaderMap,
    Json(payload): Json<UazapiWebhook>,
) -> Result<Json<Value>, AppError> {
    verify_webhook_token(&headers, auth.token.as_deref(), &state.config.webhook_secret)?;
    debug!("WhatsApp webhook received: {:?}", payload.event_type);

    let relay = RelayService::new(Arc::clone(&state.config), Arc::clone(&state.dedup));
    let outcome = relay.handle_whatsapp_event(payload).await;

    Ok(Json(json!(outcome)))
}

#[axum::debug_handler]
pub async fn chatwoot_webhook(
    State(state): State<MessagingState>,
    Query(auth): Query<WebhookAuthQuery>,
    headers: HeaderMap,
    Json(payload): Json<ChatwootWebhook>,
) -> Result<Json<Value>, AppError> {
    verify_webhook_token(&headers, auth.token.as_deref(), &state.config.webhook_secret)?;
    debug!("Chatwoot webhook received: {:?}", payload.event);

    let relay = RelayService::new(Arc::clone(&state.config), Arc::clone(&state.dedup));
    let outcome = relay.handle_chatwoot_event(payload).await;

    Ok(Json(json!(outcome)))
}

#[axum::debug_handler]
pub async fn messaging_health(State(state): State<MessagingState>) -> Json<Value> {
    state.dedup.purge_expired();

    Json(json!({
        "status": "ok",
        "integrations": state.config.integration_status(),
        "dedup_entries": state.dedup.len(),
    }))
}

#[axum::debug_handler]
pub async fn send_message(
    State(state): State<MessagingState>,
    Extension(user): Extension<User>,
    Json(request): Json<SendMessageRequest>,
) -> Json<Value> {
    info!("User {} sending WhatsApp message", user.id);

    let relay = RelayService::new(Arc::clone(&state.config), Arc::clone(&state.dedup));
    let result = relay.send_outbound(request).await;

    Json(json!(result))
}

#[axum::debug_handler]
pub async fn suggest_reply(
    State(state): State<MessagingState>,
    Extension(user): Extension<User>,
    Json(request): Json<SuggestReplyRequest>,
) -> Result<Json<Value>, AppError> {
    debug!("User {} requesting reply suggestion", user.id);
    let assistant = AssistantService::new(&state.config)?;

    let history = match request.conversation_id {
        Some(conversation_id) => {
            let messages = match ChatwootClient::new(&state.config) {
                Ok(chatwoot) => chatwoot.list_messages(conversation_id).await,
                Err(e) => Err(e),
            };
            match messages {
                Ok(messages) => conversation_turns(&messages, &request.message),
                Err(e) => {
                    warn!("Conversation {} history unavailable: {}", conversation_id, e);
                    Vec::new()
                }
            }
        }
        None => Vec::new(),
    };

    let reply = assistant.suggest_reply(&request.message, &history).await?;

    Ok(Json(json!({ "reply": reply })))
}

#[axum::debug_handler]
pub async fn add_knowledge_entry(
    State(state): State<MessagingState>,
    Extension(user): Extension<User>,
    Json(request): Json<AddKnowledgeRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    info!("User {} adding knowledge entry", user.id);

    let entry = KnowledgeBaseService::new(&state.config)?
        .add_entry(&request.title, &request.content)
        .await?;

    Ok((StatusCode::CREATED, Json(json!(entry))))
}

#[axum::debug_handler]
pub async fn search_knowledge_base(
    State(state): State<MessagingState>,
    Query(query): Query<KnowledgeSearchQuery>,
) -> Result<Json<Value>, AppError> {
    let entries = KnowledgeBaseService::new(&state.config)?
        .search(&query.q, query.limit.unwrap_or(DEFAULT_SEARCH_LIMIT))
        .await?;

    Ok(Json(json!({ "total": entries.len(), "entries": entries })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn empty_secret_disables_the_check() {
        assert!(verify_webhook_token(&HeaderMap::new(), None, "").is_ok());
    }

    #[test]
    fn header_or_query_token_is_accepted() {
        let mut headers = HeaderMap::new();
        headers.insert(WEBHOOK_TOKEN_HEADER, HeaderValue::from_static("s3cret"));
        assert!(verify_webhook_token(&headers, None, "s3cret").is_ok());
        assert!(verify_webhook_token(&HeaderMap::new(), Some("s3cret"), "s3cret").is_ok());
    }

    #[test]
    fn wrong_or_missing_token_is_rejected() {
        assert!(verify_webhook_token(&HeaderMap::new(), Some("nope"), "s3cret").is_err());
        assert!(verify_webhook_token(&HeaderMap::new(), None, "s3cret").is_err());
    }
}
