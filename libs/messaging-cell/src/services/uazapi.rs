// libs/messaging-cell/src/services/uazapi.rs
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use shared_config::AppConfig;

use crate::models::{MediaKind, MessagingError};

/// Largest attachment mirrored into Chatwoot.
pub const MAX_MEDIA_BYTES: usize = 16 * 1024 * 1024;

/// WhatsApp gateway client. Numbers are plain international digits.
#[derive(Clone)]
pub struct UazapiClient {
    client: Client,
    base_url: String,
    token: String,
}

#[derive(Debug, Clone)]
pub struct DownloadedMedia {
    pub bytes: Vec<u8>,
    pub mime_type: Option<String>,
}

/// WhatsApp message id from a send response, when the gateway returns one.
fn sent_message_id(body: &Value) -> Option<String> {
    ["messageid", "messageId", "id"]
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}

impl UazapiClient {
    pub fn new(config: &AppConfig) -> Result<Self, MessagingError> {
        if !config.is_uazapi_configured() {
            return Err(MessagingError::NotConfigured("Uazapi"));
        }

        Ok(Self {
            client: Client::new(),
            base_url: config.uazapi_base_url.trim_end_matches('/').to_string(),
            token: config.uazapi_token.clone(),
        })
    }

    /// Media URLs come from webhook payloads; the token only goes to the gateway itself.
    fn is_gateway_url(&self, url: &str) -> bool {
        url == self.base_url
            || url
                .strip_prefix(self.base_url.as_str())
                .is_some_and(|rest| rest.starts_with('/') || rest.starts_with('?'))
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value, MessagingError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Sending Uazapi request to: {}", url);

        let response = self
            .client
            .post(&url)
            .header("token", &self.token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let response_text = response.text().await?;

        if !status.is_success() {
            error!("Uazapi request {} failed: {} - {}", path, status, response_text);
            return Err(MessagingError::UazapiApi {
                status: status.as_u16(),
                message: response_text,
            });
        }

        Ok(serde_json::from_str(&response_text).unwrap_or(Value::Null))
    }

    pub async fn send_text(&self, number: &str, text: &str) -> Result<Option<String>, MessagingError> {
        info!("Sending WhatsApp text to {}", number);

        let body = self
            .post("/send/text", json!({ "number": number, "text": text }))
            .await?;

        Ok(sent_message_id(&body))
    }

    pub async fn send_media(
        &self,
        number: &str,
        kind: MediaKind,
        file_url: &str,
        caption: Option<&str>,
        file_name: Option<&str>,
    ) -> Result<Option<String>, MessagingError> {
        info!("Sending WhatsApp {} to {}", kind.as_str(), number);

        let mut body = json!({
            "number": number,
            "type": kind,
            "file": file_url,
        });
        if let Some(caption) = caption.filter(|c| !c.is_empty()) {
            body["text"] = json!(caption);
        }
        if let Some(file_name) = file_name {
            body["docName"] = json!(file_name);
        }

        let body = self.post("/send/media", body).await?;
        Ok(sent_message_id(&body))
    }

    pub async fn download_media(&self, url: &str) -> Result<DownloadedMedia, MessagingError> {
        self.download_media_capped(url, MAX_MEDIA_BYTES).await
    }

    async fn download_media_capped(&self, url: &str, limit: usize) -> Result<DownloadedMedia, MessagingError> {
        debug!("Downloading WhatsApp media from {}", url);

        let mut request = self.client.get(url);
        if self.is_gateway_url(url) {
            request = request.header("token", &self.token);
        }
        let mut response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            error!("Media download failed: {} - {}", status, message);
            return Err(MessagingError::UazapiApi {
                status: status.as_u16(),
                message,
            });
        }

        let mime_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string());

        if response.content_length().is_some_and(|len| len > limit as u64) {
            warn!("Media at {} declares {:?} bytes, over the limit", url, response.content_length());
            return Err(MessagingError::MediaTooLarge { limit });
        }

        let mut bytes = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if bytes.len() + chunk.len() > limit {
                warn!("Media at {} exceeded {} bytes while downloading", url, limit);
                return Err(MessagingError::MediaTooLarge { limit });
            }
            bytes.extend_from_slice(&chunk);
        }

        Ok(DownloadedMedia { bytes, mime_type })
    }
}
