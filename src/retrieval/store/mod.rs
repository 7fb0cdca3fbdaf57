
use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::chunker::ChunkingConfig;
use super::similarity::{cosine_scores, rank_top_k};
use super::{Chunk, Retriever, ScoredChunk};
use crate::llm::Embedder;
use crate::{ResearchError, Result};

/// Result of ingesting one document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestOutcome {
    /// Empty when the document produced no chunks
    pub document_id: String,
    pub chunks_created: usize,
}

impl IngestOutcome {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.chunks_created == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreStats {
    pub total_chunks: usize,
    pub total_documents: usize,
    pub dimension: Option<usize>,
    pub last_ingested_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct StoreState {
    chunks: Vec<Chunk>,
    /// One row per chunk, same order as `chunks`
    matrix: Option<Array2<f32>>,
    documents: usize,
    last_ingested_at: Option<DateTime<Utc>>,
}

impl StoreState {
    fn dimension(&self) -> Option<usize> {
        self.matrix.as_ref().map(Array2::ncols)
    }
}

/// In-memory embedding table with cosine-similarity retrieval.
///
/// Chunks and the embedding matrix are only ever changed together under the
/// write lock, so readers always see them aligned.
pub struct EmbeddingStore {
    embedder: Arc<dyn Embedder>,
    chunking: ChunkingConfig,
    state: RwLock<StoreState>,
}

impl EmbeddingStore {
    #[inline]
    pub fn new(embedder: Arc<dyn Embedder>, chunking: ChunkingConfig) -> Self {
        Self {
            embedder,
            chunking,
            state: RwLock::new(StoreState::default()),
        }
    }

    /// Chunk, embed and append a document.
    ///
    /// Fails without touching the store if embedding fails or returns vectors
    /// that do not fit the existing matrix.
    #[inline]
    pub async fn ingest(
        &self,
        content: &str,
        source: &str,
        metadata: Option<Map<String, Value>>,
    ) -> Result<IngestOutcome> {
        let pieces = self.chunking.chunk(content)?;
        if pieces.is_empty() {
            debug!("Document from '{}' produced no chunks", source);
            return Ok(IngestOutcome {
                document_id: String::new(),
                chunks_created: 0,
            });
        }

        let embeddings = self.embedder.embed(&pieces).await.map_err(|e| {
            warn!("Embedding failed while ingesting '{}': {:#}", source, e);
            ResearchError::Embedding(format!("{:#}", e))
        })?;

        if embeddings.len() != pieces.len() {
            return Err(ResearchError::Embedding(format!(
                "Expected {} embeddings, got {}",
                pieces.len(),
                embeddings.len()
            )));
        }

        let dimension = embeddings.first().map_or(0, Vec::len);
        if dimension == 0 {
            return Err(ResearchError::Embedding(
                "Embedding service returned empty vectors".to_string(),
            ));
        }
        if let Some(bad) = embeddings.iter().find(|e| e.len() != dimension) {
            return Err(ResearchError::DimensionMismatch {
                expected: dimension,
                actual: bad.len(),
            });
        }

        let rows = Array2::from_shape_vec(
            (embeddings.len(), dimension),
            embeddings.iter().flatten().copied().collect(),
        )
        .map_err(|e| anyhow!("Failed to shape embedding rows: {}", e))?;

        let document_id = Uuid::new_v4().to_string();
        let base_metadata = metadata.unwrap_or_default();
        let new_chunks = pieces
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(index, (piece, embedding))| {
                let mut chunk_metadata = base_metadata.clone();
                chunk_metadata.insert("chunk_index".to_string(), Value::from(index));
                chunk_metadata.insert("parent_doc".to_string(), Value::from(document_id.clone()));
                Chunk {
                    id: format!("{}_{}", document_id, index),
                    content: piece,
                    source: source.to_string(),
                    embedding: Some(embedding),
                    metadata: chunk_metadata,
                }
            })
            .collect::<Vec<_>>();
        let chunks_created = new_chunks.len();

        let mut state = self.state.write().await;
        let previous = state.matrix.take();
        let matrix = match previous {
            None => rows,
            Some(existing) if existing.ncols() != dimension => {
                let expected = existing.ncols();
                state.matrix = Some(existing);
                return Err(ResearchError::DimensionMismatch {
                    expected,
                    actual: dimension,
                });
            }
            Some(existing) => {
                let extended = ndarray::concatenate(Axis(0), &[existing.view(), rows.view()]);
                match extended {
                    Ok(matrix) => matrix,
                    Err(e) => {
                        state.matrix = Some(existing);
                        return Err(anyhow!("Failed to extend embedding matrix: {}", e).into());
                    }
                }
            }
        };

        state.matrix = Some(matrix);
        state.chunks.extend(new_chunks);
        state.documents += 1;
        state.last_ingested_at = Some(Utc::now());

        info!(
            "Ingested document {} from '{}' ({} chunks, {} total)",
            document_id,
            source,
            chunks_created,
            state.chunks.len()
        );

        Ok(IngestOutcome {
            document_id,
            chunks_created,
        })
    }

    /// Copy of the embedding matrix, `None` while the store is empty
    #[inline]
    pub async fn embeddings_matrix(&self) -> Option<Array2<f32>> {
        self.state.read().await.matrix.clone()
    }

    #[inline]
    pub async fn len(&self) -> usize {
        self.state.read().await.chunks.len()
    }

    #[inline]
    pub async fn is_empty(&self) -> bool {
        self.state.read().await.chunks.is_empty()
    }

    /// Snapshot of every stored chunk in insertion order
    #[inline]
    pub async fn chunks(&self) -> Vec<Chunk> {
        self.state.read().await.chunks.clone()
    }

    #[inline]
    pub async fn stats(&self) -> StoreStats {
        let state = self.state.read().await;
        StoreStats {
            total_chunks: state.chunks.len(),
            total_documents: state.documents,
            dimension: state.dimension(),
            last_ingested_at: state.last_ingested_at,
        }
    }
}

#[async_trait]
impl Retriever for EmbeddingStore {
    async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<ScoredChunk>> {
        if self.is_empty().await {
            debug!("Store is empty, skipping retrieval for '{}'", query);
            return Ok(Vec::new());
        }

        let mut embedded = self
            .embedder
            .embed(&[query.to_string()])
            .await
            .map_err(|e| {
                warn!("Failed to embed query '{}': {:#}", query, e);
                ResearchError::Embedding(format!("{:#}", e))
            })?;
        if embedded.len() != 1 {
            return Err(ResearchError::Embedding(format!(
                "Expected 1 query embedding, got {}",
                embedded.len()
            )));
        }
        let query_embedding = ndarray::Array1::from(embedded.remove(0));

        let state = self.state.read().await;
        let Some(matrix) = state.matrix.as_ref() else {
            return Ok(Vec::new());
        };
        if matrix.ncols() != query_embedding.len() {
            return Err(ResearchError::DimensionMismatch {
                expected: matrix.ncols(),
                actual: query_embedding.len(),
            });
        }

        let scores = cosine_scores(matrix.view(), query_embedding.view());
        let results = rank_top_k(&scores, top_k)
            .into_iter()
            .map(|(index, score)| ScoredChunk {
                chunk: state.chunks[index].clone(),
                score,
            })
            .collect::<Vec<_>>();

        debug!(
            "Retrieved {} of {} chunks for '{}'",
            results.len(),
            state.chunks.len(),
            query
        );

        Ok(results)
    }
}
