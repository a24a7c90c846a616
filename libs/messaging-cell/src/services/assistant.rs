use tracing::{debug, warn};

use shared_config::AppConfig;

use crate::models::{ChatTurn, ChatwootMessage, KnowledgeEntry, MessagingError, TurnRole};
use crate::services::gemini::GeminiClient;
use crate::services::knowledge_base::KnowledgeBaseService;

const CONTEXT_ENTRIES: usize = 3;
const MAX_HISTORY_TURNS: usize = 10;
const REPLY_TEMPERATURE: f32 = 0.4;

const PERSONA: &str = "Você é a assistente virtual da Audicare, uma clínica de audiologia e \
aparelhos auditivos. Responda sempre em português do Brasil, com cordialidade e em no máximo \
três frases curtas. Ajude com agendamentos, horários, manutenção de aparelhos e dúvidas gerais. \
Nunca forneça diagnósticos nem recomende tratamentos; oriente o paciente a agendar uma avaliação. \
Se o paciente pedir para falar com uma pessoa, diga que um atendente da equipe vai continuar a \
conversa em breve.";

/// Builds the system prompt, appending retrieved clinic knowledge when any.
pub fn build_system_prompt(knowledge: &[KnowledgeEntry]) -> String {
    if knowledge.is_empty() {
        return PERSONA.to_string();
    }

    let context = knowledge
        .iter()
        .map(|entry| format!("- {}: {}", entry.title, entry.content))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "{}\n\nInformações da clínica que podem ajudar:\n{}",
        PERSONA, context
    )
}

/// Last public messages of a Chatwoot conversation as chat turns, oldest
/// first. Activity and template messages are left out, as is a final user
/// turn repeating `pending`, the message about to be answered.
pub fn conversation_turns(messages: &[ChatwootMessage], pending: &str) -> Vec<ChatTurn> {
    let mut turns: Vec<ChatTurn> = messages
        .iter()
        .filter(|m| !m.private)
        .filter_map(|m| {
            let role = if m.is_incoming() {
                TurnRole::User
            } else if m.is_outgoing() {
                TurnRole::Model
            } else {
                return None;
            };
            let text = m.content.as_deref()?.trim();
            if text.is_empty() {
                return None;
            }
            Some(ChatTurn { role, text: text.to_string() })
        })
        .collect();

    if turns
        .last()
        .is_some_and(|t| t.role == TurnRole::User && t.text == pending.trim())
    {
        turns.pop();
    }

    let skip = turns.len().saturating_sub(MAX_HISTORY_TURNS);
    turns.into_iter().skip(skip).collect()
}

pub struct AssistantService {
    gemini: GeminiClient,
    knowledge_base: KnowledgeBaseService,
}

impl AssistantService {
    pub fn new(config: &AppConfig) -> Result<Self, MessagingError> {
        Ok(Self {
            gemini: GeminiClient::new(config)?,
            knowledge_base: KnowledgeBaseService::new(config)?,
        })
    }

    /// Drafts a reply to `message`. `conversation_context` holds earlier turns,
    /// oldest first.
    pub async fn suggest_reply(
        &self,
        message: &str,
        conversation_context: &[ChatTurn],
    ) -> Result<String, MessagingError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(MessagingError::ValidationError("message is required".to_string()));
        }

        let knowledge = match self.knowledge_base.search(message, CONTEXT_ENTRIES).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Knowledge retrieval failed, answering without context: {}", e);
                Vec::new()
            }
        };

        debug!("Suggesting reply with {} knowledge entries", knowledge.len());

        let mut turns = conversation_context.to_vec();
        turns.push(ChatTurn {
            role: TurnRole::User,
            text: message.to_string(),
        });

        let reply = self
            .gemini
            .generate(&build_system_prompt(&knowledge), &turns, REPLY_TEMPERATURE)
            .await?;

        let reply = reply.trim().to_string();
        if reply.is_empty() {
            return Err(MessagingError::GeminiApi("Empty reply".to_string()));
        }

        Ok(reply)
    }
}
