
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::prompts::{chat_system_prompt, format_chat_context};
use crate::llm::{ChatMessage, GenerationParams, LanguageModel};
use crate::retrieval::{Retriever, ScoredChunk};
use crate::{PipelineStage, ResearchError, Result};

pub const DEFAULT_CHAT_TOP_K: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSource {
    pub id: String,
    pub source: String,
    pub text: String,
    pub score: f32,
}

impl From<ScoredChunk> for ChatSource {
    #[inline]
    fn from(scored: ScoredChunk) -> Self {
        Self {
            id: scored.chunk.id,
            source: scored.chunk.source,
            text: scored.chunk.content,
            score: scored.score,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatAnswer {
    pub query: String,
    pub answer: String,
    pub sources: Vec<ChatSource>,
}

/// Single-shot retrieval-augmented chat: one lookup, one chat call
pub struct RagAgent {
    llm: Arc<dyn LanguageModel>,
    retriever: Arc<dyn Retriever>,
    params: GenerationParams,
}

impl RagAgent {
    #[inline]
    pub fn new(
        llm: Arc<dyn LanguageModel>,
        retriever: Arc<dyn Retriever>,
        params: GenerationParams,
    ) -> Self {
        Self {
            llm,
            retriever,
            params,
        }
    }

    #[inline]
    pub async fn run(&self, query: &str, top_k: usize) -> Result<ChatAnswer> {
        info!("Chat query '{}' with top_k={}", query, top_k);

        let results = self.retriever.retrieve(query, top_k).await?;
        info!("Retrieved {} documents for chat", results.len());

        let messages = [
            ChatMessage::system(chat_system_prompt(&format_chat_context(&results))),
            ChatMessage::user(query),
        ];

        let answer = self
            .llm
            .chat(&messages, &self.params)
            .await
            .map_err(|e| {
                warn!("Chat completion failed for query '{}': {:#}", query, e);
                ResearchError::generation(PipelineStage::Chat, &e)
            })?;

        Ok(ChatAnswer {
            query: query.to_string(),
            answer: answer.trim().to_string(),
            sources: results.into_iter().map(ChatSource::from).collect(),
        })
    }
}
