use serde_json::json;
use tracing::{debug, info};

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{KnowledgeEntry, MessagingError};
use crate::services::gemini::GeminiClient;

const MAX_SEARCH_RESULTS: usize = 20;

/// Clinic FAQ entries stored with Gemini embeddings for similarity search.
pub struct KnowledgeBaseService {
    supabase: SupabaseClient,
    gemini: GeminiClient,
}

impl KnowledgeBaseService {
    pub fn new(config: &AppConfig) -> Result<Self, MessagingError> {
        Ok(Self {
            supabase: SupabaseClient::with_service_role(config),
            gemini: GeminiClient::new(config)?,
        })
    }

    pub async fn add_entry(&self, title: &str, content: &str) -> Result<KnowledgeEntry, MessagingError> {
        let title = title.trim();
        let content = content.trim();
        if title.is_empty() || content.is_empty() {
            return Err(MessagingError::ValidationError("title and content are required".to_string()));
        }

        let embedding = self.gemini.embed(&format!("{}\n{}", title, content)).await?;

        let result: Vec<KnowledgeEntry> = self.supabase
            .insert_returning(
                "knowledge_base",
                json!({ "title": title, "content": content, "embedding": embedding }),
                None,
            )
            .await?;

        let entry = result
            .into_iter()
            .next()
            .ok_or_else(|| MessagingError::DatabaseError("Failed to store knowledge entry".to_string()))?;

        info!("Knowledge entry '{}' stored", entry.title);
        Ok(entry)
    }

    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<KnowledgeEntry>, MessagingError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(MessagingError::ValidationError("query is required".to_string()));
        }

        let match_count = limit.clamp(1, MAX_SEARCH_RESULTS);
        debug!("Searching knowledge base for '{}' (top {})", query, match_count);

        let embedding = self.gemini.embed(query).await?;

        let entries: Vec<KnowledgeEntry> = self.supabase
            .rpc(
                "match_knowledge_base",
                json!({ "query_embedding": embedding, "match_count": match_count }),
                None,
            )
            .await?;

        Ok(entries)
    }
}
