// Retrieval module
// Chunking, the in-memory embedding store, similarity ranking and the hosted index client

pub mod chunker;
pub mod hosted;
pub mod similarity;
pub mod store;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use chunker::{ChunkingConfig, chunk_text};
pub use hosted::HostedIndexClient;
pub use store::{EmbeddingStore, IngestOutcome, StoreStats};

/// A window of a source document, optionally carrying its embedding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// `{document_id}_{chunk_index}`
    pub id: String,
    pub content: String,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// A retrieved chunk with its relevance score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Anything that can return the chunks most relevant to a query, best first
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, query: &str, top_k: usize) -> crate::Result<Vec<ScoredChunk>>;
}
