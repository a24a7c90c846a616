use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;

pub const TEST_JWT_SECRET: &str = "test-secret-key-for-jwt-validation-must-be-long-enough";

/// Builds an `AppConfig` whose integrations point at mock servers.
pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub chatwoot_url: String,
    pub uazapi_url: String,
    pub gemini_url: String,
    pub webhook_secret: String,
    pub ai_auto_reply: bool,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: TEST_JWT_SECRET.to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            chatwoot_url: "http://localhost:3001".to_string(),
            uazapi_url: "http://localhost:3002".to_string(),
            gemini_url: "http://localhost:3003".to_string(),
            webhook_secret: String::new(),
            ai_auto_reply: false,
        }
    }
}

impl TestConfig {
    pub fn with_supabase(mut self, uri: impl Into<String>) -> Self {
        self.supabase_url = uri.into();
        self
    }

    pub fn with_chatwoot(mut self, uri: impl Into<String>) -> Self {
        self.chatwoot_url = uri.into();
        self
    }

    pub fn with_uazapi(mut self, uri: impl Into<String>) -> Self {
        self.uazapi_url = uri.into();
        self
    }

    pub fn with_gemini(mut self, uri: impl Into<String>) -> Self {
        self.gemini_url = uri.into();
        self
    }

    pub fn with_webhook_secret(mut self, secret: impl Into<String>) -> Self {
        self.webhook_secret = secret.into();
        self
    }

    pub fn with_auto_reply(mut self, enabled: bool) -> Self {
        self.ai_auto_reply = enabled;
        self
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_service_role_key: "test-service-role-key".to_string(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            chatwoot_base_url: self.chatwoot_url.clone(),
            chatwoot_api_token: "test-chatwoot-token".to_string(),
            chatwoot_account_id: "1".to_string(),
            chatwoot_inbox_id: "7".to_string(),
            uazapi_base_url: self.uazapi_url.clone(),
            uazapi_token: "test-uazapi-token".to_string(),
            gemini_api_key: "test-gemini-key".to_string(),
            gemini_model: "gemini-2.0-flash".to_string(),
            gemini_embedding_model: "text-embedding-004".to_string(),
            gemini_base_url: self.gemini_url.clone(),
            webhook_secret: self.webhook_secret.clone(),
            dedup_ttl_secs: 120,
            ai_auto_reply: self.ai_auto_reply,
            default_country_code: "55".to_string(),
            port: 3000,
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: "test@audicare.test".to_string(),
            role: "receptionist".to_string(),
        }
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }

    pub fn audiologist(email: &str) -> Self {
        Self::new(email, "audiologist")
    }

    pub fn receptionist(email: &str) -> Self {
        Self::new(email, "receptionist")
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, "admin")
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some(self.role.clone()),
            metadata: None,
            created_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.id,
            "email": user.email,
            "role": user.role,
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }
}

pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn patient_response(patient_id: &str, phone: &str) -> serde_json::Value {
        json!({
            "id": patient_id,
            "full_name": "Maria da Silva",
            "phone": phone,
            "email": "maria@example.com",
            "cpf": null,
            "birth_date": "1950-03-12",
            "address": "Rua das Flores, 100",
            "city": "Campinas",
            "notes": null,
            "hearing_loss_type": "sensorineural",
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn appointment_response(appointment_id: &str, patient_id: &str, starts_at: &str) -> serde_json::Value {
        json!({
            "id": appointment_id,
            "patient_id": patient_id,
            "professional_id": null,
            "title": "Audiometria",
            "appointment_type": "hearing_test",
            "status": "scheduled",
            "starts_at": starts_at,
            "duration_minutes": 30,
            "location": null,
            "notes": null,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn error_response(message: &str, code: &str) -> serde_json::Value {
        json!({
            "message": message,
            "code": code
        })
    }
}

pub struct MockChatwootResponses;

impl MockChatwootResponses {
    pub fn contact(id: i64, name: &str, phone_e164: &str) -> serde_json::Value {
        json!({
            "id": id,
            "name": name,
            "phone_number": phone_e164,
            "email": null
        })
    }

    pub fn conversation(id: i64, inbox_id: i64, status: &str) -> serde_json::Value {
        json!({
            "id": id,
            "inbox_id": inbox_id,
            "status": status,
            "last_activity_at": 1_700_000_000,
            "meta": {
                "sender": { "id": 1, "name": "Maria", "phone_number": "+5511987654321" },
                "assignee": null
            }
        })
    }

    pub fn message(id: i64, content: &str, message_type: i64) -> serde_json::Value {
        json!({
            "id": id,
            "content": content,
            "message_type": message_type,
            "private": false
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_creation() {
        let config = TestConfig::default()
            .with_chatwoot("http://chatwoot.test")
            .to_app_config();

        assert_eq!(config.supabase_url, "http://localhost:54321");
        assert_eq!(config.chatwoot_base_url, "http://chatwoot.test");
        assert!(config.is_configured());
        assert!(config.is_chatwoot_configured());
        assert!(config.is_uazapi_configured());
    }

    #[test]
    fn test_user_creation() {
        let user = TestUser::audiologist("fono@audicare.test");
        let user_model = user.to_user();
        assert_eq!(user_model.role.as_deref(), Some("audiologist"));
        assert_eq!(user_model.id, user.id);
    }

    #[test]
    fn test_jwt_token_creation() {
        let user = TestUser::default();
        let token = JwtTestUtils::create_test_token(&user, TEST_JWT_SECRET, Some(1));
        assert_eq!(token.split('.').count(), 3);
    }
}
