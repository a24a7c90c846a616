// libs/messaging-cell/src/services/chatwoot.rs
use reqwest::{multipart, Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, error, info};

use shared_config::AppConfig;
use shared_utils::phone::{normalize_phone, phones_match, to_e164};

use crate::models::{
    ChatwootContact, ChatwootConversation, ChatwootMessage, MessagingError, NewChatwootMessage,
};

/// Chatwoot application API client, scoped to one account and one inbox.
pub struct ChatwootClient {
    client: Client,
    base_url: String,
    api_token: String,
    account_id: String,
    inbox_id: i64,
    default_country_code: String,
}

/// Chatwoot wraps most results in `payload`, sometimes twice
/// (`{"payload": {"contact": {...}}}`).
fn unwrap_payload(body: Value, inner_key: Option<&str>) -> Value {
    let payload = match body {
        Value::Object(mut map) if map.contains_key("payload") => {
            map.remove("payload").unwrap_or(Value::Null)
        }
        other => other,
    };

    match (inner_key, payload) {
        (Some(key), Value::Object(mut map)) if map.contains_key(key) => {
            map.remove(key).unwrap_or(Value::Null)
        }
        (_, payload) => payload,
    }
}

impl ChatwootClient {
    pub fn new(config: &AppConfig) -> Result<Self, MessagingError> {
        if !config.is_chatwoot_configured() {
            return Err(MessagingError::NotConfigured("Chatwoot"));
        }

        let inbox_id = config
            .chatwoot_inbox_id
            .trim()
            .parse::<i64>()
            .map_err(|_| MessagingError::NotConfigured("Chatwoot"))?;

        Ok(Self {
            client: Client::new(),
            base_url: config.chatwoot_base_url.trim_end_matches('/').to_string(),
            api_token: config.chatwoot_api_token.clone(),
            account_id: config.chatwoot_account_id.clone(),
            inbox_id,
            default_country_code: config.default_country_code.clone(),
        })
    }

    fn account_url(&self, path: &str) -> String {
        format!("{}/api/v1/accounts/{}{}", self.base_url, self.account_id, path)
    }

    async fn execute(&self, request: RequestBuilder, action: &str) -> Result<Value, MessagingError> {
        let response = request
            .header("api_access_token", &self.api_token)
            .send()
            .await?;

        let status = response.status();
        let response_text = response.text().await?;

        debug!("Chatwoot {} response: {}", action, status);

        if !status.is_success() {
            error!("Chatwoot {} failed: {} - {}", action, status, response_text);
            return Err(MessagingError::ChatwootApi {
                status: status.as_u16(),
                message: response_text,
            });
        }

        if response_text.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&response_text).map_err(|e| MessagingError::ChatwootApi {
            status: status.as_u16(),
            message: format!("Failed to parse {} response: {}", action, e),
        })
    }

    fn decode<T: DeserializeOwned>(value: Value, action: &str) -> Result<T, MessagingError> {
        serde_json::from_value(value).map_err(|e| MessagingError::ChatwootApi {
            status: 200,
            message: format!("Unexpected {} payload: {}", action, e),
        })
    }

    /// First contact whose phone matches `phone`, tolerant of formatting
    /// differences.
    pub async fn search_contact(&self, phone: &str) -> Result<Option<ChatwootContact>, MessagingError> {
        let digits = normalize_phone(phone, &self.default_country_code)
            .ok_or_else(|| MessagingError::InvalidPhone(phone.to_string()))?;

        // Chatwoot matches substrings; the last eight digits survive the
        // Brazilian ninth-digit ambiguity.
        let query = &digits[digits.len().saturating_sub(8)..];

        let request = self
            .client
            .get(self.account_url("/contacts/search"))
            .query(&[("q", query)]);

        let body = self.execute(request, "contact search").await?;
        let contacts: Vec<ChatwootContact> = Self::decode(unwrap_payload(body, None), "contact search")?;

        Ok(contacts.into_iter().find(|c| {
            c.phone_number
                .as_deref()
                .is_some_and(|p| phones_match(p, &digits, &self.default_country_code))
        }))
    }

    pub async fn create_contact(&self, name: &str, phone: &str) -> Result<ChatwootContact, MessagingError> {
        let digits = normalize_phone(phone, &self.default_country_code)
            .ok_or_else(|| MessagingError::InvalidPhone(phone.to_string()))?;

        info!("Creating Chatwoot contact for {}", digits);

        let request = self
            .client
            .post(self.account_url("/contacts"))
            .json(&json!({
                "inbox_id": self.inbox_id,
                "name": name,
                "phone_number": to_e164(&digits),
            }));

        let body = self.execute(request, "contact creation").await?;
        Self::decode(unwrap_payload(body, Some("contact")), "contact creation")
    }

    pub async fn find_or_create_contact(&self, name: &str, phone: &str) -> Result<ChatwootContact, MessagingError> {
        if let Some(contact) = self.search_contact(phone).await? {
            debug!("Reusing Chatwoot contact {}", contact.id);
            return Ok(contact);
        }

        self.create_contact(name, phone).await
    }

    pub async fn list_contact_conversations(
        &self,
        contact_id: i64,
    ) -> Result<Vec<ChatwootConversation>, MessagingError> {
        let request = self
            .client
            .get(self.account_url(&format!("/contacts/{}/conversations", contact_id)));

        let body = self.execute(request, "conversation listing").await?;
        Self::decode(unwrap_payload(body, None), "conversation listing")
    }

    pub async fn create_conversation(
        &self,
        contact_id: i64,
        source_id: &str,
    ) -> Result<ChatwootConversation, MessagingError> {
        info!("Opening Chatwoot conversation for contact {}", contact_id);

        let request = self
            .client
            .post(self.account_url("/conversations"))
            .json(&json!({
                "source_id": source_id,
                "inbox_id": self.inbox_id,
                "contact_id": contact_id,
                "status": "open",
            }));

        let body = self.execute(request, "conversation creation").await?;
        Self::decode(body, "conversation creation")
    }

    /// Prefers the most recent unresolved conversation in our inbox, then the
    /// most recent resolved one (re-opened), and only then creates a new one.
    pub async fn find_or_create_conversation(
        &self,
        contact_id: i64,
        source_id: &str,
    ) -> Result<ChatwootConversation, MessagingError> {
        let mut conversations: Vec<ChatwootConversation> = self
            .list_contact_conversations(contact_id)
            .await?
            .into_iter()
            .filter(|c| c.inbox_id == Some(self.inbox_id))
            .collect();

        conversations.sort_by_key(|c| std::cmp::Reverse(c.last_activity_at.unwrap_or(0)));

        if let Some(open) = conversations.iter().find(|c| !c.is_resolved()) {
            debug!("Reusing Chatwoot conversation {}", open.id);
            return Ok(open.clone());
        }

        if let Some(mut latest) = conversations.into_iter().next() {
            info!("Re-opening Chatwoot conversation {}", latest.id);
            self.toggle_status(latest.id, "open").await?;
            latest.status = Some("open".to_string());
            return Ok(latest);
        }

        self.create_conversation(contact_id, source_id).await
    }

    pub async fn toggle_status(&self, conversation_id: i64, status: &str) -> Result<(), MessagingError> {
        let request = self
            .client
            .post(self.account_url(&format!("/conversations/{}/toggle_status", conversation_id)))
            .json(&json!({ "status": status }));

        self.execute(request, "status toggle").await?;
        Ok(())
    }

    pub async fn list_messages(&self, conversation_id: i64) -> Result<Vec<ChatwootMessage>, MessagingError> {
        let request = self
            .client
            .get(self.account_url(&format!("/conversations/{}/messages", conversation_id)));

        let body = self.execute(request, "message listing").await?;
        Self::decode(unwrap_payload(body, None), "message listing")
    }

    pub async fn create_message(
        &self,
        conversation_id: i64,
        message: NewChatwootMessage,
    ) -> Result<ChatwootMessage, MessagingError> {
        let url = self.account_url(&format!("/conversations/{}/messages", conversation_id));

        let request = if message.attachments.is_empty() {
            let mut body = json!({
                "content": message.content,
                "message_type": message.message_type.as_str(),
                "private": message.private,
            });
            if let Some(source_id) = &message.source_id {
                body["source_id"] = json!(source_id);
            }
            if let Some(attrs) = &message.content_attributes {
                body["content_attributes"] = attrs.clone();
            }
            self.client.post(&url).json(&body)
        } else {
            let mut form = multipart::Form::new()
                .text("message_type", message.message_type.as_str())
                .text("private", message.private.to_string());

            if let Some(content) = message.content {
                form = form.text("content", content);
            }
            if let Some(source_id) = message.source_id {
                form = form.text("source_id", source_id);
            }
            if let Some(attrs) = message.content_attributes {
                form = form.text("content_attributes", attrs.to_string());
            }
            for attachment in message.attachments {
                let part = multipart::Part::bytes(attachment.bytes)
                    .file_name(attachment.file_name)
                    .mime_str(&attachment.mime_type)?;
                form = form.part("attachments[]", part);
            }

            self.client.post(&url).multipart(form)
        };

        let body = self.execute(request, "message creation").await?;
        Self::decode(body, "message creation")
    }
}
