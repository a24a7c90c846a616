// libs/messaging-cell/src/models.rs
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use shared_models::error::AppError;
use shared_utils::phone::{normalize_international_phone, normalize_phone};

// ==============================================================================
// CHATWOOT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatwootContact {
    pub id: i64,
    pub name: Option<String>,
    pub phone_number: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationSender {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub phone_number: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationMeta {
    pub sender: Option<ConversationSender>,
    pub assignee: Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContactInbox {
    pub source_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatwootConversation {
    pub id: i64,
    pub inbox_id: Option<i64>,
    pub status: Option<String>,
    #[serde(default)]
    pub last_activity_at: Option<i64>,
    #[serde(default)]
    pub meta: Option<ConversationMeta>,
    #[serde(default)]
    pub contact_inbox: Option<ContactInbox>,
}

impl ChatwootConversation {
    pub fn is_resolved(&self) -> bool {
        self.status.as_deref() == Some("resolved")
    }

    pub fn has_assignee(&self) -> bool {
        self.meta
            .as_ref()
            .and_then(|m| m.assignee.as_ref())
            .is_some_and(|a| !a.is_null())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatwootMessage {
    pub id: i64,
    pub content: Option<String>,
    #[serde(default)]
    pub message_type: Option<Value>,
    #[serde(default)]
    pub private: bool,
}

impl ChatwootMessage {
    /// Chatwoot encodes the type as `0`/`"incoming"` depending on the endpoint.
    pub fn is_incoming(&self) -> bool {
        match &self.message_type {
            Some(Value::Number(n)) => n.as_i64() == Some(0),
            Some(Value::String(s)) => s == "incoming",
            _ => false,
        }
    }

    pub fn is_outgoing(&self) -> bool {
        match &self.message_type {
            Some(Value::Number(n)) => n.as_i64() == Some(1),
            Some(Value::String(s)) => s == "outgoing",
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MessageDirection {
    Incoming,
    Outgoing,
}

impl MessageDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageDirection::Incoming => "incoming",
            MessageDirection::Outgoing => "outgoing",
        }
    }
}

#[derive(Debug, Clone)]
pub struct MediaAttachment {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct NewChatwootMessage {
    pub content: Option<String>,
    pub message_type: MessageDirection,
    pub private: bool,
    pub source_id: Option<String>,
    pub content_attributes: Option<Value>,
    pub attachments: Vec<MediaAttachment>,
}

impl NewChatwootMessage {
    pub fn text(content: impl Into<String>, message_type: MessageDirection) -> Self {
        Self {
            content: Some(content.into()),
            message_type,
            private: false,
            source_id: None,
            content_attributes: None,
            attachments: Vec::new(),
        }
    }
}

// ==============================================================================
// WEBHOOK PAYLOADS
// ==============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatwootAttachment {
    pub data_url: Option<String>,
    pub file_type: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookConversation {
    pub id: Option<i64>,
    #[serde(default)]
    pub meta: Option<ConversationMeta>,
    #[serde(default)]
    pub contact_inbox: Option<ContactInbox>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatwootWebhook {
    pub event: Option<String>,
    pub id: Option<i64>,
    pub content: Option<String>,
    #[serde(default)]
    pub message_type: Option<Value>,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub content_attributes: Option<Value>,
    #[serde(default)]
    pub attachments: Vec<ChatwootAttachment>,
    #[serde(default)]
    pub conversation: Option<WebhookConversation>,
}

impl ChatwootWebhook {
    pub fn is_outgoing(&self) -> bool {
        match &self.message_type {
            Some(Value::String(s)) => s == "outgoing",
            Some(Value::Number(n)) => n.as_i64() == Some(1),
            _ => false,
        }
    }

    /// Set on messages the bridge itself wrote into Chatwoot.
    pub fn origin(&self) -> Option<&str> {
        self.content_attributes
            .as_ref()
            .and_then(|attrs| attrs.get("origin"))
            .and_then(Value::as_str)
    }

    /// Contact phone (may be national), else the inbox `source_id`, which already
    /// holds international digits.
    pub fn recipient_phone(&self, default_country_code: &str) -> Option<String> {
        let conversation = self.conversation.as_ref()?;
        let contact_phone = conversation
            .meta
            .as_ref()
            .and_then(|m| m.sender.as_ref())
            .and_then(|s| s.phone_number.as_deref())
            .filter(|p| !p.trim().is_empty());

        match contact_phone {
            Some(phone) => normalize_phone(phone, default_country_code),
            None => conversation
                .contact_inbox
                .as_ref()
                .and_then(|ci| ci.source_id.as_deref())
                .and_then(normalize_international_phone),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UazapiMessage {
    pub id: Option<String>,
    #[serde(rename = "messageid")]
    pub message_id: Option<String>,
    pub chatid: Option<String>,
    pub sender: Option<String>,
    pub sender_name: Option<String>,
    #[serde(default)]
    pub from_me: bool,
    #[serde(default)]
    pub was_sent_by_api: bool,
    #[serde(default)]
    pub is_group: bool,
    pub message_type: Option<String>,
    pub text: Option<String>,
    #[serde(default)]
    pub content: Option<Value>,
    pub media_type: Option<String>,
    #[serde(rename = "fileURL")]
    pub file_url: Option<String>,
}

impl UazapiMessage {
    pub fn key(&self) -> Option<&str> {
        self.message_id
            .as_deref()
            .or(self.id.as_deref())
            .filter(|id| !id.is_empty())
    }

    pub fn body_text(&self) -> Option<String> {
        let from_content = || match &self.content {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Object(map)) => map
                .get("text")
                .or_else(|| map.get("caption"))
                .and_then(Value::as_str)
                .map(str::to_string),
            _ => None,
        };

        self.text
            .clone()
            .or_else(from_content)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    }

    pub fn media_url(&self) -> Option<String> {
        self.file_url
            .clone()
            .or_else(|| {
                self.content.as_ref().and_then(|c| {
                    c.get("URL")
                        .or_else(|| c.get("url"))
                        .and_then(Value::as_str)
                        .map(str::to_string)
                })
            })
            .filter(|u| !u.is_empty())
    }

    pub fn media_kind(&self) -> Option<MediaKind> {
        self.media_type.as_deref().and_then(MediaKind::from_label)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UazapiWebhook {
    #[serde(rename = "EventType", alias = "event")]
    pub event_type: Option<String>,
    pub message: Option<UazapiMessage>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Audio,
    Document,
}

impl MediaKind {
    pub fn from_label(label: &str) -> Option<Self> {
        match label.to_ascii_lowercase().as_str() {
            "image" | "sticker" => Some(MediaKind::Image),
            "video" => Some(MediaKind::Video),
            "audio" | "ptt" | "myaudio" => Some(MediaKind::Audio),
            "document" | "file" => Some(MediaKind::Document),
            _ => None,
        }
    }

    pub fn default_mime(&self) -> &'static str {
        match self {
            MediaKind::Image => "image/jpeg",
            MediaKind::Video => "video/mp4",
            MediaKind::Audio => "audio/ogg",
            MediaKind::Document => "application/octet-stream",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
            MediaKind::Document => "document",
        }
    }
}

// ==============================================================================
// RELAY RESULTS / API MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RelayOutcome {
    Ignored { reason: String },
    Duplicate,
    Relayed {
        conversation_id: Option<i64>,
        message_id: Option<String>,
    },
    Failed { error: String },
}

impl RelayOutcome {
    pub fn ignored(reason: impl Into<String>) -> Self {
        RelayOutcome::Ignored { reason: reason.into() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SendMessageRequest {
    pub phone: String,
    pub message: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SendMessageResult {
    pub success: bool,
    pub conversation_id: Option<i64>,
    pub message_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SuggestReplyRequest {
    pub message: String,
    pub conversation_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub similarity: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddKnowledgeRequest {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KnowledgeSearchQuery {
    pub q: String,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnRole {
    User,
    Model,
}

#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub role: TurnRole,
    pub text: String,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum MessagingError {
    #[error("{0} integration is not configured")]
    NotConfigured(&'static str),

    #[error("Chatwoot API error ({status}): {message}")]
    ChatwootApi { status: u16, message: String },

    #[error("Uazapi API error ({status}): {message}")]
    UazapiApi { status: u16, message: String },

    #[error("Gemini API error: {0}")]
    GeminiApi(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Media larger than {limit} bytes")]
    MediaTooLarge { limit: usize },

    #[error("Invalid phone number: {0}")]
    InvalidPhone(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<anyhow::Error> for MessagingError {
    fn from(err: anyhow::Error) -> Self {
        MessagingError::DatabaseError(err.to_string())
    }
}

impl From<MessagingError> for AppError {
    fn from(err: MessagingError) -> Self {
        match err {
            MessagingError::NotConfigured(_) => AppError::Internal(err.to_string()),
            MessagingError::InvalidPhone(_) | MessagingError::ValidationError(_) => {
                AppError::ValidationError(err.to_string())
            }
            MessagingError::DatabaseError(msg) => AppError::Database(msg),
            MessagingError::ChatwootApi { .. }
            | MessagingError::UazapiApi { .. }
            | MessagingError::GeminiApi(_)
            | MessagingError::MediaTooLarge { .. }
            | MessagingError::Http(_) => AppError::ExternalService(err.to_string()),
        }
    }
}
