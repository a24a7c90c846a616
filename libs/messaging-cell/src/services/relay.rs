// libs/messaging-cell/src/services/relay.rs
use std::sync::Arc;

use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use patient_cell::PatientService;
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_utils::phone::normalize_phone;

use crate::models::{
    ChatwootConversation, ChatwootWebhook, MediaAttachment, MediaKind, MessageDirection,
    MessagingError, NewChatwootMessage, RelayOutcome, SendMessageRequest, SendMessageResult,
    UazapiMessage, UazapiWebhook,
};
use crate::services::assistant::AssistantService;
use crate::services::chatwoot::ChatwootClient;
use crate::services::dedup::MessageDeduplicator;
use crate::services::uazapi::UazapiClient;

pub const ORIGIN_WHATSAPP: &str = "whatsapp";
pub const ORIGIN_ASSISTANT: &str = "assistant";
const UNSUPPORTED_MESSAGE: &str = "[unsupported message]";

/// One row of `whatsapp_messages`.
struct MessageRecord<'a> {
    direction: &'a str,
    phone: &'a str,
    content: Option<&'a str>,
    media_url: Option<&'a str>,
    wa_message_id: Option<&'a str>,
    conversation_id: Option<i64>,
    chatwoot_message_id: Option<i64>,
}

/// Bridges WhatsApp (Uazapi) and the Chatwoot inbox in both directions.
pub struct RelayService {
    config: Arc<AppConfig>,
    dedup: Arc<MessageDeduplicator>,
    supabase: SupabaseClient,
    patients: PatientService,
}

fn file_name_from_url(url: &str) -> Option<String> {
    url.split(['?', '#'])
        .next()
        .and_then(|path| path.rsplit('/').next())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

fn extension_for(mime_type: &str) -> &str {
    match mime_type {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        "video/mp4" => "mp4",
        "audio/ogg" => "ogg",
        "audio/mpeg" => "mp3",
        "application/pdf" => "pdf",
        _ => "bin",
    }
}

impl RelayService {
    pub fn new(config: Arc<AppConfig>, dedup: Arc<MessageDeduplicator>) -> Self {
        Self {
            supabase: SupabaseClient::with_service_role(&config),
            patients: PatientService::with_service_role(&config),
            config,
            dedup,
        }
    }

    // ==========================================================================
    // WHATSAPP -> CHATWOOT
    // ==========================================================================

    pub async fn handle_whatsapp_event(&self, payload: UazapiWebhook) -> RelayOutcome {
        if let Some(event) = payload.event_type.as_deref() {
            if !matches!(event.to_ascii_lowercase().as_str(), "messages" | "message") {
                return RelayOutcome::ignored(format!("event {} is not a message", event));
            }
        }

        let Some(message) = payload.message else {
            return RelayOutcome::ignored("payload carries no message");
        };

        let chat = message
            .chatid
            .clone()
            .or_else(|| message.sender.clone())
            .unwrap_or_default();

        if message.is_group || chat.ends_with("@g.us") {
            return RelayOutcome::ignored("group chat");
        }
        if chat.starts_with("status@") {
            return RelayOutcome::ignored("status broadcast");
        }

        let Some(key) = message.key().map(|k| format!("wa:{}", k)) else {
            return RelayOutcome::ignored("message has no id");
        };

        if !self.dedup.check_and_mark(&key) {
            return RelayOutcome::Duplicate;
        }

        if message.from_me && message.was_sent_by_api {
            return RelayOutcome::ignored("echo of a message sent through the API");
        }

        let Some(phone) = normalize_phone(&chat, &self.config.default_country_code) else {
            return RelayOutcome::ignored(format!("unparseable phone {}", chat));
        };

        match self.relay_to_chatwoot(&message, &phone).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Failed to relay WhatsApp message {} into Chatwoot: {}", key, e);
                self.dedup.forget(&key);
                RelayOutcome::Failed { error: e.to_string() }
            }
        }
    }

    async fn relay_to_chatwoot(
        &self,
        message: &UazapiMessage,
        phone: &str,
    ) -> Result<RelayOutcome, MessagingError> {
        let chatwoot = ChatwootClient::new(&self.config)?;

        let direction = if message.from_me {
            MessageDirection::Outgoing
        } else {
            MessageDirection::Incoming
        };

        let contact_name = if message.from_me {
            phone.to_string()
        } else {
            message
                .sender_name
                .clone()
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| phone.to_string())
        };

        let contact = chatwoot.find_or_create_contact(&contact_name, phone).await?;
        let conversation = chatwoot.find_or_create_conversation(contact.id, phone).await?;

        let text = message.body_text();
        let media_url = message.media_url();
        let wa_id = message.key().map(str::to_string);

        let mut outgoing = NewChatwootMessage {
            content: text.clone(),
            message_type: direction,
            private: false,
            source_id: wa_id.as_ref().map(|id| format!("WAID:{}", id)),
            content_attributes: Some(json!({ "origin": ORIGIN_WHATSAPP, "wa_message_id": wa_id })),
            attachments: Vec::new(),
        };

        if let Some(url) = &media_url {
            let kind = message.media_kind().unwrap_or(MediaKind::Document);
            match self.fetch_media(url, kind, wa_id.as_deref()).await {
                Ok(attachment) => outgoing.attachments.push(attachment),
                Err(e) => {
                    warn!("Media download failed, relaying link instead: {}", e);
                    let line = format!("[{}] {}", kind.as_str(), url);
                    outgoing.content = Some(match &text {
                        Some(caption) => format!("{}\n{}", caption, line),
                        None => line,
                    });
                }
            }
        }

        if outgoing.content.is_none() && outgoing.attachments.is_empty() {
            debug!("WhatsApp message type {:?} has no text or media", message.message_type);
            outgoing.content = Some(UNSUPPORTED_MESSAGE.to_string());
        }

        let created = chatwoot.create_message(conversation.id, outgoing).await?;
        info!(
            "Relayed WhatsApp message from {} into Chatwoot conversation {}",
            phone, conversation.id
        );

        self.record_message(MessageRecord {
            direction: if message.from_me { "outbound" } else { "inbound" },
            phone,
            content: created.content.as_deref().or(text.as_deref()),
            media_url: media_url.as_deref(),
            wa_message_id: wa_id.as_deref(),
            conversation_id: Some(conversation.id),
            chatwoot_message_id: Some(created.id),
        })
        .await;

        if direction == MessageDirection::Incoming && media_url.is_none() {
            if let Some(text) = &text {
                self.maybe_auto_reply(&chatwoot, &conversation, phone, text).await;
            }
        }

        Ok(RelayOutcome::Relayed {
            conversation_id: Some(conversation.id),
            message_id: Some(created.id.to_string()),
        })
    }

    async fn fetch_media(
        &self,
        url: &str,
        kind: MediaKind,
        wa_id: Option<&str>,
    ) -> Result<MediaAttachment, MessagingError> {
        let uazapi = UazapiClient::new(&self.config)?;
        let media = uazapi.download_media(url).await?;

        let mime_type = media
            .mime_type
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| kind.default_mime().to_string());

        let file_name = format!(
            "whatsapp-{}.{}",
            wa_id.unwrap_or("media"),
            extension_for(&mime_type)
        );

        Ok(MediaAttachment {
            file_name,
            mime_type,
            bytes: media.bytes,
        })
    }

    /// Answers unattended conversations with the assistant. Never fails the
    /// relay that triggered it.
    async fn maybe_auto_reply(
        &self,
        chatwoot: &ChatwootClient,
        conversation: &ChatwootConversation,
        phone: &str,
        text: &str,
    ) {
        if !self.config.ai_auto_reply || !self.config.is_ai_configured() {
            return;
        }
        if conversation.has_assignee() {
            debug!("Conversation {} has an agent, skipping auto-reply", conversation.id);
            return;
        }

        let result = async {
            let assistant = AssistantService::new(&self.config)?;
            let reply = assistant.suggest_reply(text, &[]).await?;

            let uazapi = UazapiClient::new(&self.config)?;
            let wa_id = uazapi.send_text(phone, &reply).await?;

            let mut note = NewChatwootMessage::text(reply.clone(), MessageDirection::Outgoing);
            note.content_attributes = Some(json!({ "origin": ORIGIN_ASSISTANT }));
            let created = chatwoot.create_message(conversation.id, note).await?;

            Ok::<_, MessagingError>((reply, wa_id, created.id))
        }
        .await;

        match result {
            Ok((reply, wa_id, message_id)) => {
                info!("Assistant answered conversation {}", conversation.id);
                self.record_message(MessageRecord {
                    direction: "outbound",
                    phone,
                    content: Some(&reply),
                    media_url: None,
                    wa_message_id: wa_id.as_deref(),
                    conversation_id: Some(conversation.id),
                    chatwoot_message_id: Some(message_id),
                })
                .await;
            }
            Err(e) => warn!("Auto-reply for conversation {} failed: {}", conversation.id, e),
        }
    }

    // ==========================================================================
    // CHATWOOT -> WHATSAPP
    // ==========================================================================

    pub async fn handle_chatwoot_event(&self, payload: ChatwootWebhook) -> RelayOutcome {
        let event = payload.event.as_deref().unwrap_or_default();
        if event != "message_created" {
            return RelayOutcome::ignored(format!("event {} is not relayed", event));
        }
        if !payload.is_outgoing() {
            return RelayOutcome::ignored("only outgoing messages are relayed");
        }
        if payload.private {
            return RelayOutcome::ignored("private note");
        }
        if let Some(origin) = payload.origin() {
            return RelayOutcome::ignored(format!("message created by the bridge ({})", origin));
        }

        let Some(message_id) = payload.id else {
            return RelayOutcome::ignored("message has no id");
        };

        let key = format!("cw:{}", message_id);
        if !self.dedup.check_and_mark(&key) {
            return RelayOutcome::Duplicate;
        }

        let Some(phone) = payload.recipient_phone(&self.config.default_country_code) else {
            return RelayOutcome::ignored("conversation has no recipient phone");
        };

        match self.relay_to_whatsapp(&payload, message_id, &phone).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Failed to relay Chatwoot message {} to WhatsApp: {}", message_id, e);
                self.dedup.forget(&key);
                RelayOutcome::Failed { error: e.to_string() }
            }
        }
    }

    async fn relay_to_whatsapp(
        &self,
        payload: &ChatwootWebhook,
        message_id: i64,
        phone: &str,
    ) -> Result<RelayOutcome, MessagingError> {
        let content = payload
            .content
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty());

        let attachments: Vec<(&str, MediaKind)> = payload
            .attachments
            .iter()
            .filter_map(|a| {
                let url = a.data_url.as_deref().filter(|u| !u.is_empty())?;
                let kind = a
                    .file_type
                    .as_deref()
                    .and_then(MediaKind::from_label)
                    .unwrap_or(MediaKind::Document);
                Some((url, kind))
            })
            .collect();

        if content.is_none() && attachments.is_empty() {
            return Ok(RelayOutcome::ignored("message has no content"));
        }

        let uazapi = UazapiClient::new(&self.config)?;

        let mut wa_id = None;
        if attachments.is_empty() {
            if let Some(text) = content {
                wa_id = uazapi.send_text(phone, text).await?;
            }
        } else {
            for (index, (url, kind)) in attachments.iter().enumerate() {
                let caption = if index == 0 { content } else { None };
                let file_name = match kind {
                    MediaKind::Document => file_name_from_url(url),
                    _ => None,
                };
                wa_id = uazapi
                    .send_media(phone, *kind, url, caption, file_name.as_deref())
                    .await?;
            }
        }

        let conversation_id = payload.conversation.as_ref().and_then(|c| c.id);
        info!("Relayed Chatwoot message {} to WhatsApp {}", message_id, phone);

        self.record_message(MessageRecord {
            direction: "outbound",
            phone,
            content,
            media_url: attachments.first().map(|(url, _)| *url),
            wa_message_id: wa_id.as_deref(),
            conversation_id,
            chatwoot_message_id: Some(message_id),
        })
        .await;

        Ok(RelayOutcome::Relayed {
            conversation_id,
            message_id: wa_id,
        })
    }

    // ==========================================================================
    // OUTBOUND API
    // ==========================================================================

    /// Queues a WhatsApp message through Chatwoot. Failures are reported as a
    /// warning so callers such as automations keep running.
    pub async fn send_outbound(&self, request: SendMessageRequest) -> SendMessageResult {
        match self.try_send_outbound(&request).await {
            Ok((conversation_id, message_id)) => SendMessageResult {
                success: true,
                conversation_id: Some(conversation_id),
                message_id: Some(message_id),
                warning: None,
            },
            Err(e) => {
                warn!("Outbound message to {} not delivered: {}", request.phone, e);
                SendMessageResult {
                    success: true,
                    conversation_id: None,
                    message_id: None,
                    warning: Some(e.to_string()),
                }
            }
        }
    }

    async fn try_send_outbound(&self, request: &SendMessageRequest) -> Result<(i64, i64), MessagingError> {
        let text = request.message.trim();
        if text.is_empty() {
            return Err(MessagingError::ValidationError("message is required".to_string()));
        }

        let phone = normalize_phone(&request.phone, &self.config.default_country_code)
            .ok_or_else(|| MessagingError::InvalidPhone(request.phone.clone()))?;

        let chatwoot = ChatwootClient::new(&self.config)?;
        let name = request
            .name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&phone);

        let contact = chatwoot.find_or_create_contact(name, &phone).await?;
        let conversation = chatwoot.find_or_create_conversation(contact.id, &phone).await?;

        // No origin marker: Chatwoot's webhook delivers it to WhatsApp.
        let created = chatwoot
            .create_message(conversation.id, NewChatwootMessage::text(text, MessageDirection::Outgoing))
            .await?;

        info!("Queued outbound message {} for {}", created.id, phone);
        Ok((conversation.id, created.id))
    }

    // ==========================================================================
    // HISTORY
    // ==========================================================================

    async fn record_message(&self, record: MessageRecord<'_>) {
        let patient_id: Option<Uuid> = match self.patients.find_by_phone(record.phone, None).await {
            Ok(patient) => patient.map(|p| p.id),
            Err(e) => {
                warn!("Patient lookup for {} failed: {}", record.phone, e);
                None
            }
        };

        let body = json!({
            "direction": record.direction,
            "phone": record.phone,
            "content": record.content,
            "media_url": record.media_url,
            "wa_message_id": record.wa_message_id,
            "chatwoot_conversation_id": record.conversation_id,
            "chatwoot_message_id": record.chatwoot_message_id,
            "patient_id": patient_id,
        });

        if let Err(e) = self
            .supabase
            .request::<Value>(Method::POST, "/rest/v1/whatsapp_messages", None, Some(body))
            .await
        {
            warn!("Could not record WhatsApp message history: {}", e);
        }
    }
}
