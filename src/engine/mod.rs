// Research engine
// Owns the retrieval backend and agents; the CLI and MCP server only talk to this

#[cfg(test)]
mod tests;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::agents::{ChatAnswer, RagAgent, ReasoningAgent, ResearchAnswer};
use crate::config::{Config, RetrievalBackend, validate_max_sources};
use crate::llm::{Embedder, LanguageModel, OllamaClient};
use crate::retrieval::{EmbeddingStore, HostedIndexClient, IngestOutcome, Retriever, StoreStats};
use crate::{ResearchError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeBaseStats {
    pub backend: RetrievalBackend,
    /// Only known for the in-memory backend
    #[serde(flatten)]
    pub store: Option<StoreStats>,
}

pub struct ResearchEngine {
    store: Option<Arc<EmbeddingStore>>,
    reasoning: ReasoningAgent,
    chat: RagAgent,
    backend: RetrievalBackend,
    default_max_sources: usize,
    request_timeout: Option<Duration>,
}

impl ResearchEngine {
    /// Build the engine against Ollama and the configured retrieval backend
    #[inline]
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        let client = Arc::new(OllamaClient::new(&config.ollama)?);

        match config.retrieval.backend {
            RetrievalBackend::Memory => Ok(Self::with_memory_store(
                Arc::clone(&client) as Arc<dyn LanguageModel>,
                client,
                config,
            )),
            RetrievalBackend::Hosted => {
                let hosted = config
                    .retrieval
                    .hosted
                    .as_ref()
                    .ok_or(crate::config::ConfigError::MissingHostedIndex)?;
                let index = HostedIndexClient::from_config(hosted)?;
                info!("Using hosted index at {}", index.search_url());
                Ok(Self::with_retriever(client, Arc::new(index), config))
            }
        }
    }

    /// Engine over a fresh in-memory store
    #[inline]
    pub fn with_memory_store(
        llm: Arc<dyn LanguageModel>,
        embedder: Arc<dyn Embedder>,
        config: &Config,
    ) -> Self {
        let store = Arc::new(EmbeddingStore::new(embedder, config.chunking));
        let mut engine = Self::build(
            llm,
            Arc::clone(&store) as Arc<dyn Retriever>,
            RetrievalBackend::Memory,
            config,
        );
        engine.store = Some(store);
        engine
    }

    /// Engine over an external, read-only retriever
    #[inline]
    pub fn with_retriever(
        llm: Arc<dyn LanguageModel>,
        retriever: Arc<dyn Retriever>,
        config: &Config,
    ) -> Self {
        Self::build(llm, retriever, RetrievalBackend::Hosted, config)
    }

    fn build(
        llm: Arc<dyn LanguageModel>,
        retriever: Arc<dyn Retriever>,
        backend: RetrievalBackend,
        config: &Config,
    ) -> Self {
        let generation = &config.generation;
        let chat = RagAgent::new(
            Arc::clone(&llm),
            Arc::clone(&retriever),
            generation.params(generation.chat),
        );
        let reasoning = ReasoningAgent::new(llm, retriever, generation);
        let timeout_secs = config.retrieval.request_timeout_secs;

        Self {
            store: None,
            reasoning,
            chat,
            backend,
            default_max_sources: config.retrieval.default_max_sources,
            request_timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
        }
    }

    #[inline]
    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[inline]
    pub fn backend(&self) -> RetrievalBackend {
        self.backend
    }

    #[inline]
    pub fn default_max_sources(&self) -> usize {
        self.default_max_sources
    }

    /// Add a document to the in-memory store
    #[inline]
    pub async fn ingest(
        &self,
        content: &str,
        source: &str,
        metadata: Option<Map<String, Value>>,
    ) -> Result<IngestOutcome> {
        let Some(store) = self.store.as_ref() else {
            return Err(ResearchError::Unsupported(
                "Ingestion is only available with the in-memory backend".to_string(),
            ));
        };
        store.ingest(content, source, metadata).await
    }

    /// Answer a question, with or without decomposition
    #[inline]
    pub async fn research(
        &self,
        query: &str,
        max_sources: Option<usize>,
        use_reasoning: bool,
    ) -> Result<ResearchAnswer> {
        let query = validate_query(query)?;
        let max_sources = max_sources.unwrap_or(self.default_max_sources);
        validate_max_sources(max_sources)?;

        info!(
            "Research query '{}' (max_sources: {}, reasoning: {})",
            query, max_sources, use_reasoning
        );

        self.with_deadline(
            query,
            self.reasoning
                .reason_and_answer(query, max_sources, use_reasoning),
        )
        .await
    }

    /// Single-shot chat over retrieved context
    #[inline]
    pub async fn chat(&self, query: &str, top_k: usize) -> Result<ChatAnswer> {
        let query = validate_query(query)?;
        validate_max_sources(top_k)?;

        self.with_deadline(query, self.chat.run(query, top_k)).await
    }

    #[inline]
    pub async fn stats(&self) -> KnowledgeBaseStats {
        let store = match self.store.as_ref() {
            Some(store) => Some(store.stats().await),
            None => None,
        };
        KnowledgeBaseStats {
            backend: self.backend,
            store,
        }
    }

    async fn with_deadline<T, F>(&self, query: &str, request: F) -> Result<T>
    where
        F: Future<Output = Result<T>> + Send,
        T: Send,
    {
        let Some(limit) = self.request_timeout else {
            return request.await;
        };

        tokio::time::timeout(limit, request).await.map_err(|_| {
            warn!("Request for '{}' timed out after {:?}", query, limit);
            ResearchError::Timeout(limit)
        })?
    }
}

fn validate_query(query: &str) -> Result<&str> {
    let query = query.trim();
    if query.is_empty() {
        return Err(ResearchError::InvalidRequest(
            "Query cannot be empty".to_string(),
        ));
    }
    Ok(query)
}
