//! Gemini REST client for reply generation and embeddings.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use shared_config::AppConfig;

use crate::models::{ChatTurn, MessagingError, TurnRole};

pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    embedding_model: String,
}

#[derive(Serialize)]
struct GenerateRequest {
    #[serde(rename = "systemInstruction")]
    system_instruction: Content,
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    text: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Deserialize, Debug)]
struct GenerateResponse {
    candidates: Option<Vec<Candidate>>,
    #[serde(rename = "promptFeedback")]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize, Debug)]
struct PromptFeedback {
    #[serde(rename = "blockReason")]
    block_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    content: Option<CandidateContent>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize, Debug)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Serialize)]
struct EmbedRequest {
    model: String,
    content: Content,
}

#[derive(Deserialize, Debug)]
struct EmbedResponse {
    embedding: Option<Embedding>,
}

#[derive(Deserialize, Debug)]
struct Embedding {
    values: Vec<f32>,
}

fn text_content(role: Option<&'static str>, text: &str) -> Content {
    Content {
        role,
        parts: vec![Part { text: text.to_string() }],
    }
}

impl GeminiClient {
    pub fn new(config: &AppConfig) -> Result<Self, MessagingError> {
        if !config.is_ai_configured() {
            return Err(MessagingError::NotConfigured("Gemini"));
        }

        Ok(Self {
            client: Client::new(),
            api_key: config.gemini_api_key.clone(),
            base_url: config.gemini_base_url.trim_end_matches('/').to_string(),
            model: config.gemini_model.clone(),
            embedding_model: config.gemini_embedding_model.clone(),
        })
    }

    async fn post<B: Serialize>(&self, model: &str, action: &str, body: &B) -> Result<String, MessagingError> {
        let url = format!("{}/models/{}:{}", self.base_url, model, action);

        let response = self
            .client
            .post(&url)
            .query(&[("key", &self.api_key)])
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        debug!("Gemini {} response status: {}", action, status);

        if !status.is_success() {
            error!("Gemini {} failed: {} - {}", action, status, text);
            return Err(MessagingError::GeminiApi(format!("API error {}: {}", status, text)));
        }

        Ok(text)
    }

    /// Runs a chat completion and returns the concatenated text of the first
    /// candidate.
    pub async fn generate(
        &self,
        system_prompt: &str,
        turns: &[ChatTurn],
        temperature: f32,
    ) -> Result<String, MessagingError> {
        let request = GenerateRequest {
            system_instruction: text_content(None, system_prompt),
            contents: turns
                .iter()
                .map(|turn| {
                    let role = match turn.role {
                        TurnRole::User => "user",
                        TurnRole::Model => "model",
                    };
                    text_content(Some(role), &turn.text)
                })
                .collect(),
            generation_config: GenerationConfig { temperature },
        };

        let body = self.post(&self.model, "generateContent", &request).await?;
        let parsed: GenerateResponse = serde_json::from_str(&body)
            .map_err(|e| MessagingError::GeminiApi(format!("Failed to parse response: {}", e)))?;

        if let Some(reason) = parsed.prompt_feedback.and_then(|f| f.block_reason) {
            warn!("Gemini blocked the prompt: {}", reason);
            return Err(MessagingError::GeminiApi(format!("Prompt blocked: {}", reason)));
        }

        let candidate = parsed
            .candidates
            .and_then(|c| c.into_iter().next())
            .ok_or_else(|| MessagingError::GeminiApi("No candidates in response".to_string()))?;

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            let reason = candidate.finish_reason.unwrap_or_else(|| "unknown".to_string());
            return Err(MessagingError::GeminiApi(format!("Empty candidate (finish reason: {})", reason)));
        }

        info!("Gemini generated {} characters", text.len());
        Ok(text)
    }

    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, MessagingError> {
        let request = EmbedRequest {
            model: format!("models/{}", self.embedding_model),
            content: text_content(None, text),
        };

        let body = self.post(&self.embedding_model, "embedContent", &request).await?;
        let parsed: EmbedResponse = serde_json::from_str(&body)
            .map_err(|e| MessagingError::GeminiApi(format!("Failed to parse embedding: {}", e)))?;

        parsed
            .embedding
            .map(|e| e.values)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| MessagingError::GeminiApi("Empty embedding".to_string()))
    }
}
