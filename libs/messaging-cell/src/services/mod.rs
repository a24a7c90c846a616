pub mod assistant;
pub mod chatwoot;
pub mod dedup;
pub mod gemini;
pub mod knowledge_base;
pub mod relay;
pub mod uazapi;

pub use assistant::AssistantService;
pub use chatwoot::ChatwootClient;
pub use dedup::MessageDeduplicator;
pub use gemini::GeminiClient;
pub use knowledge_base::KnowledgeBaseService;
pub use relay::RelayService;
pub use uazapi::UazapiClient;
