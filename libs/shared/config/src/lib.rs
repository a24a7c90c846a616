use std::env;

use serde::Serialize;
use tracing::warn;

#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_service_role_key: String,
    pub supabase_jwt_secret: String,
    pub chatwoot_base_url: String,
    pub chatwoot_api_token: String,
    pub chatwoot_account_id: String,
    pub chatwoot_inbox_id: String,
    pub uazapi_base_url: String,
    pub uazapi_token: String,
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub gemini_embedding_model: String,
    pub gemini_base_url: String,
    pub webhook_secret: String,
    pub dedup_ttl_secs: u64,
    pub ai_auto_reply: bool,
    pub default_country_code: String,
    pub port: u16,
}

/// Which external integrations are usable with the loaded configuration.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct IntegrationStatus {
    pub supabase: bool,
    pub chatwoot: bool,
    pub uazapi: bool,
    pub gemini: bool,
    pub ai_auto_reply: bool,
    pub webhook_secret: bool,
}

fn required(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| {
        warn!("{} not set, using empty value", key);
        String::new()
    })
}

fn with_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| {
        warn!("{} not set, using default", key);
        default.to_string()
    })
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

impl AppConfig {
    pub fn from_env() -> Self {
        let dedup_ttl_secs = env::var("MESSAGE_DEDUP_TTL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(120);

        let port = env::var("PORT")
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(3000);

        let config = Self {
            supabase_url: required("SUPABASE_URL"),
            supabase_anon_key: required("SUPABASE_ANON_PUBLIC_KEY"),
            supabase_service_role_key: required("SUPABASE_SERVICE_ROLE_KEY"),
            supabase_jwt_secret: required("SUPABASE_JWT_SECRET"),
            chatwoot_base_url: required("CHATWOOT_BASE_URL"),
            chatwoot_api_token: required("CHATWOOT_API_TOKEN"),
            chatwoot_account_id: required("CHATWOOT_ACCOUNT_ID"),
            chatwoot_inbox_id: required("CHATWOOT_INBOX_ID"),
            uazapi_base_url: required("UAZAPI_BASE_URL"),
            uazapi_token: required("UAZAPI_TOKEN"),
            gemini_api_key: required("GEMINI_API_KEY"),
            gemini_model: with_default("GEMINI_MODEL", "gemini-2.0-flash"),
            gemini_embedding_model: with_default("GEMINI_EMBEDDING_MODEL", "text-embedding-004"),
            gemini_base_url: with_default(
                "GEMINI_BASE_URL",
                "https://generativelanguage.googleapis.com/v1beta",
            ),
            webhook_secret: env::var("WEBHOOK_SECRET").unwrap_or_default(),
            dedup_ttl_secs,
            ai_auto_reply: env::var("AI_AUTO_REPLY")
                .map(|v| parse_flag(&v))
                .unwrap_or(false),
            default_country_code: with_default("DEFAULT_COUNTRY_CODE", "55"),
            port,
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        if config.webhook_secret.is_empty() {
            warn!("WEBHOOK_SECRET not set, webhook endpoints accept unauthenticated calls");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }

    pub fn is_chatwoot_configured(&self) -> bool {
        !self.chatwoot_base_url.is_empty()
            && !self.chatwoot_api_token.is_empty()
            && !self.chatwoot_account_id.is_empty()
            && !self.chatwoot_inbox_id.is_empty()
    }

    pub fn is_uazapi_configured(&self) -> bool {
        !self.uazapi_base_url.is_empty() && !self.uazapi_token.is_empty()
    }

    pub fn is_ai_configured(&self) -> bool {
        !self.gemini_api_key.is_empty() && !self.gemini_base_url.is_empty()
    }

    pub fn integration_status(&self) -> IntegrationStatus {
        IntegrationStatus {
            supabase: self.is_configured(),
            chatwoot: self.is_chatwoot_configured(),
            uazapi: self.is_uazapi_configured(),
            gemini: self.is_ai_configured(),
            ai_auto_reply: self.ai_auto_reply && self.is_ai_configured(),
            webhook_secret: !self.webhook_secret.is_empty(),
        }
    }
}
