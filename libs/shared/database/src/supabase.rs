use anyhow::{Result, anyhow};
use reqwest::{
    Client,
    header::{HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION},
    Method,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, error, warn};

use shared_config::AppConfig;

/// Thin PostgREST client. Every table access in the cells goes through `request`.
#[derive(Clone)]
pub struct SupabaseClient {
    client: Client,
    base_url: String,
    api_key: String,
    default_token: Option<String>,
}

/// Percent-encodes a value for use inside a PostgREST filter (`phone=eq.{value}`).
pub fn encode_filter(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            api_key: config.supabase_anon_key.clone(),
            default_token: None,
        }
    }

    /// Client for server-side callers without a user session (webhooks).
    pub fn with_service_role(config: &AppConfig) -> Self {
        let mut client = Self::new(config);

        if config.supabase_service_role_key.is_empty() {
            warn!("SUPABASE_SERVICE_ROLE_KEY not set, falling back to anon key");
        } else {
            client.api_key = config.supabase_service_role_key.clone();
            client.default_token = Some(config.supabase_service_role_key.clone());
        }

        client
    }

    fn get_headers(&self, auth_token: Option<&str>) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();

        headers.insert("apikey", HeaderValue::from_str(&self.api_key)?);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = auth_token.or(self.default_token.as_deref()) {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", token))?,
            );
        }

        Ok(headers)
    }

    pub async fn request<T>(&self, method: Method, path: &str,
                            auth_token: Option<&str>, body: Option<Value>)
                            -> Result<T>
    where T: DeserializeOwned {
        self.request_with_headers(method, path, auth_token, body, None).await
    }

    pub async fn request_with_headers<T>(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
        extra_headers: Option<HeaderMap>,
    ) -> Result<T>
    where T: DeserializeOwned {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut headers = self.get_headers(auth_token)?;
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut req = self.client.request(method, &url)
            .headers(headers);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            error!("API error ({}): {}", status, text);

            return Err(match status.as_u16() {
                401 | 403 => anyhow!("Authentication error: {}", text),
                404 => anyhow!("Resource not found: {}", text),
                _ => anyhow!("API error ({}): {}", status, text),
            });
        }

        // return=minimal writes answer with an empty body
        let value = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text)?
        };

        serde_json::from_value(value)
            .map_err(|e| anyhow!("Failed to decode response from {}: {}", path, e))
    }

    /// POST into a table asking PostgREST to echo the inserted rows.
    pub async fn insert_returning<T>(
        &self,
        table: &str,
        body: Value,
        auth_token: Option<&str>,
    ) -> Result<Vec<T>>
    where T: DeserializeOwned {
        self.request_with_headers(
            Method::POST,
            &format!("/rest/v1/{}", table),
            auth_token,
            Some(body),
            Some(Self::representation_headers()),
        ).await
    }

    /// PATCH rows matching `filter` (e.g. `id=eq.<uuid>`) and return them.
    pub async fn update_returning<T>(
        &self,
        table: &str,
        filter: &str,
        body: Value,
        auth_token: Option<&str>,
    ) -> Result<Vec<T>>
    where T: DeserializeOwned {
        self.request_with_headers(
            Method::PATCH,
            &format!("/rest/v1/{}?{}", table, filter),
            auth_token,
            Some(body),
            Some(Self::representation_headers()),
        ).await
    }

    /// DELETE rows matching `filter` and return what was removed.
    pub async fn delete_returning<T>(
        &self,
        table: &str,
        filter: &str,
        auth_token: Option<&str>,
    ) -> Result<Vec<T>>
    where T: DeserializeOwned {
        self.request_with_headers(
            Method::DELETE,
            &format!("/rest/v1/{}?{}", table, filter),
            auth_token,
            None,
            Some(Self::representation_headers()),
        ).await
    }

    pub async fn rpc<T>(&self, function: &str, body: Value, auth_token: Option<&str>) -> Result<T>
    where T: DeserializeOwned {
        self.request(
            Method::POST,
            &format!("/rest/v1/rpc/{}", function),
            auth_token,
            Some(body),
        ).await
    }

    fn representation_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));
        headers
    }

    pub async fn get_user_profile(&self, auth_token: &str) -> Result<Value> {
        self.request::<Value>(
            Method::GET,
            "/auth/v1/user",
            Some(auth_token),
            None,
        ).await
    }

    pub async fn get_staff_profile(&self, user_id: &str, auth_token: &str) -> Result<Value> {
        let path = format!("/rest/v1/profiles?id=eq.{}", encode_filter(user_id));

        let result: Vec<Value> = self.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;

        match result.into_iter().next() {
            Some(profile) => Ok(profile),
            None => Ok(json!({
                "id": user_id,
                "exists": false
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(uri: &str) -> AppConfig {
        AppConfig {
            supabase_url: uri.to_string(),
            supabase_anon_key: "anon".to_string(),
            supabase_service_role_key: "service".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn filter_values_are_percent_encoded() {
        assert_eq!(encode_filter("+5511999999999"), "%2B5511999999999");
        assert_eq!(encode_filter("Ana Maria"), "Ana%20Maria");
    }

    #[tokio::test]
    async fn service_role_client_sends_service_key_as_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/patients"))
            .and(header("apikey", "service"))
            .and(header("Authorization", "Bearer service"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let client = SupabaseClient::with_service_role(&config_for(&server.uri()));
        let rows: Vec<Value> = client
            .request(Method::GET, "/rest/v1/patients", None, None)
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn empty_body_decodes_as_null() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/whatsapp_messages"))
            .respond_with(ResponseTemplate::new(201))
            .mount(&server)
            .await;

        let client = SupabaseClient::new(&config_for(&server.uri()));
        let value: Value = client
            .request(Method::POST, "/rest/v1/whatsapp_messages", Some("t"), Some(json!({})))
            .await
            .unwrap();
        assert!(value.is_null());
    }

    #[tokio::test]
    async fn missing_staff_profile_is_reported_as_not_existing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/profiles"))
            .and(query_param("id", "eq.user-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let client = SupabaseClient::new(&config_for(&server.uri()));
        let profile = client.get_staff_profile("user-1", "token").await.unwrap();
        assert_eq!(profile["exists"], false);
    }

    #[tokio::test]
    async fn not_found_status_becomes_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("missing"))
            .mount(&server)
            .await;

        let client = SupabaseClient::new(&config_for(&server.uri()));
        let err = client
            .request::<Value>(Method::GET, "/rest/v1/nothing", None, None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Resource not found"));
    }
}
