
use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};
use url::Url;

use super::{Chunk, Retriever, ScoredChunk};
use crate::config::HostedIndexConfig;
use crate::ResearchError;
use crate::http::{DEFAULT_RETRY_ATTEMPTS, DEFAULT_TIMEOUT_SECONDS, build_agent, send_with_retry};

const UNKNOWN_SOURCE: &str = "Unknown";

/// Client for a Pinecone-compatible integrated-embedding index
#[derive(Debug, Clone)]
pub struct HostedIndexClient {
    search_url: Url,
    api_key: String,
    api_version: String,
    text_field: String,
    source_field: String,
    agent: ureq::Agent,
    retry_attempts: u32,
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: SearchQuery<'a>,
    fields: &'a [String],
}

#[derive(Debug, Serialize)]
struct SearchQuery<'a> {
    inputs: SearchInputs<'a>,
    top_k: usize,
}

#[derive(Debug, Serialize)]
struct SearchInputs<'a> {
    text: &'a str,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SearchResponse {
    pub result: SearchResult,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct SearchResult {
    #[serde(default)]
    pub hits: Vec<SearchHit>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SearchHit {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_score")]
    pub score: f32,
    #[serde(default)]
    pub fields: HashMap<String, Value>,
}

impl HostedIndexClient {
    /// Build a client, reading the API key from the configured environment variable
    #[inline]
    pub fn from_config(config: &HostedIndexConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).with_context(|| {
            format!(
                "Hosted index API key not found in environment variable {}",
                config.api_key_env
            )
        })?;
        Self::new(config, api_key)
    }

    #[inline]
    pub fn new(config: &HostedIndexConfig, api_key: String) -> Result<Self> {
        config
            .validate()
            .context("Invalid hosted index configuration")?;

        let base = Url::parse(&config.index_host)
            .with_context(|| format!("Invalid index host: {}", config.index_host))?;
        let search_url = base
            .join(&format!("records/namespaces/{}/search", config.namespace))
            .context("Failed to build search URL")?;

        Ok(Self {
            search_url,
            api_key,
            api_version: config.api_version.clone(),
            text_field: config.text_field.clone(),
            source_field: config.source_field.clone(),
            agent: build_agent(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS)),
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
        })
    }

    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts;
        self
    }

    #[inline]
    pub fn search_url(&self) -> &Url {
        &self.search_url
    }

    /// Blocking records search returning the raw hits
    #[inline]
    pub fn search(&self, query: &str, top_k: usize, fields: &[String]) -> Result<SearchResponse> {
        debug!(
            "Searching hosted index at {} (top_k: {})",
            self.search_url, top_k
        );

        let request = SearchRequest {
            query: SearchQuery {
                inputs: SearchInputs { text: query },
                top_k,
            },
            fields,
        };
        let request_json =
            serde_json::to_string(&request).context("Failed to serialize search request")?;

        let response_text = send_with_retry(self.search_url.as_str(), self.retry_attempts, || {
            self.agent
                .post(self.search_url.as_str())
                .header("Api-Key", &self.api_key)
                .header("Content-Type", "application/json")
                .header("X-Pinecone-API-Version", &self.api_version)
                .send(&request_json)
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })
        .context("Hosted index search failed")?;

        let response: SearchResponse =
            serde_json::from_str(&response_text).context("Failed to parse search response")?;
        debug!("Hosted index returned {} hits", response.result.hits.len());
        Ok(response)
    }

    /// Turn a hit into a chunk using the configured field names
    #[inline]
    pub fn hit_to_scored_chunk(&self, hit: SearchHit) -> ScoredChunk {
        let content = field_as_string(&hit.fields, &self.text_field).unwrap_or_default();
        let source = field_as_string(&hit.fields, &self.source_field)
            .unwrap_or_else(|| UNKNOWN_SOURCE.to_string());

        let mut metadata = hit.fields.into_iter().collect::<Map<String, Value>>();
        metadata.insert("hit_id".to_string(), Value::from(hit.id.clone()));

        ScoredChunk {
            chunk: Chunk {
                id: hit.id,
                content,
                source,
                embedding: None,
                metadata,
            },
            score: hit.score,
        }
    }

    fn requested_fields(&self) -> Vec<String> {
        vec![self.text_field.clone(), self.source_field.clone()]
    }
}

fn field_as_string(fields: &HashMap<String, Value>, name: &str) -> Option<String> {
    match fields.get(name)? {
        Value::String(text) => Some(text.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

#[async_trait]
impl Retriever for HostedIndexClient {
    async fn retrieve(&self, query: &str, top_k: usize) -> crate::Result<Vec<ScoredChunk>> {
        let client = self.clone();
        let query_text = query.to_string();
        let fields = self.requested_fields();

        let response = tokio::task::spawn_blocking(move || {
            client.search(&query_text, top_k, &fields)
        })
        .await
        .map_err(|e| anyhow!("Search task failed to complete: {}", e))?
        .map_err(|e| {
            warn!("Hosted index search failed for '{}': {:#}", query, e);
            ResearchError::Search(format!("{:#}", e))
        })?;

        Ok(response
            .result
            .hits
            .into_iter()
            .take(top_k)
            .map(|hit| self.hit_to_scored_chunk(hit))
            .collect())
    }
}
