//! MCP Tools Implementation
//!
//! Tool definitions and handlers exposing the research engine: multi-step
//! research, quick chat, document ingestion and knowledge base statistics.

use crate::ResearchError;
use crate::agents::DEFAULT_CHAT_TOP_K;
use crate::engine::ResearchEngine;
use crate::mcp::protocol::*;
use crate::mcp::server::{McpServer, ToolHandler};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error};

type Arguments = HashMap<String, Value>;

/// Multi-step research tool handler
pub struct ResearchQueryHandler {
    engine: Arc<ResearchEngine>,
}

/// Single-shot chat tool handler
pub struct ChatQueryHandler {
    engine: Arc<ResearchEngine>,
}

/// Document ingestion tool handler
pub struct IngestDocumentHandler {
    engine: Arc<ResearchEngine>,
}

/// Knowledge base statistics tool handler
pub struct KnowledgeBaseStatsHandler {
    engine: Arc<ResearchEngine>,
}

/// Register every research tool on the server
#[inline]
pub async fn register_research_tools(server: &McpServer, engine: &Arc<ResearchEngine>) {
    server
        .register_tool(
            ResearchQueryHandler::tool_definition(),
            ResearchQueryHandler::new(Arc::clone(engine)),
        )
        .await;
    server
        .register_tool(
            ChatQueryHandler::tool_definition(),
            ChatQueryHandler::new(Arc::clone(engine)),
        )
        .await;
    server
        .register_tool(
            IngestDocumentHandler::tool_definition(),
            IngestDocumentHandler::new(Arc::clone(engine)),
        )
        .await;
    server
        .register_tool(
            KnowledgeBaseStatsHandler::tool_definition(),
            KnowledgeBaseStatsHandler::new(Arc::clone(engine)),
        )
        .await;
}

impl ResearchQueryHandler {
    #[inline]
    pub fn new(engine: Arc<ResearchEngine>) -> Self {
        Self { engine }
    }

    /// Create the research_query tool definition
    #[inline]
    pub fn tool_definition() -> Tool {
        Tool {
            name: "research_query".to_string(),
            description: Some(
                "Answer a research question from the knowledge base, optionally decomposing it into sub-questions"
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Research question"
                    },
                    "max_sources": {
                        "type": "integer",
                        "description": "Maximum number of sources per question (default: 5)",
                        "minimum": 1,
                        "maximum": crate::config::MAX_SOURCES_LIMIT
                    },
                    "use_reasoning": {
                        "type": "boolean",
                        "description": "Decompose the question into sub-questions (default: true)"
                    }
                },
                "required": ["query"],
                "additionalProperties": false
            }),
        }
    }
}

#[async_trait]
impl ToolHandler for ResearchQueryHandler {
    #[inline]
    async fn handle(&self, params: CallToolParams) -> Result<CallToolResult> {
        let args = params.arguments.unwrap_or_default();
        let query = required_str(&args, "query")?;
        let max_sources = optional_usize(&args, "max_sources")?;
        let use_reasoning = optional_bool(&args, "use_reasoning")?.unwrap_or(true);

        debug!(
            "research_query: query='{}', max_sources={:?}, use_reasoning={}",
            query, max_sources, use_reasoning
        );

        match self
            .engine
            .research(query, max_sources, use_reasoning)
            .await
        {
            Ok(answer) => json_result(&answer),
            Err(e) => Ok(failure("research_query", &e)),
        }
    }
}

impl ChatQueryHandler {
    #[inline]
    pub fn new(engine: Arc<ResearchEngine>) -> Self {
        Self { engine }
    }

    /// Create the chat_query tool definition
    #[inline]
    pub fn tool_definition() -> Tool {
        Tool {
            name: "chat_query".to_string(),
            description: Some(
                "Quick answer grounded in the most relevant documents".to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Question to answer"
                    },
                    "top_k": {
                        "type": "integer",
                        "description": "Number of documents to retrieve (default: 3)",
                        "minimum": 1,
                        "maximum": crate::config::MAX_SOURCES_LIMIT
                    }
                },
                "required": ["query"],
                "additionalProperties": false
            }),
        }
    }
}

#[async_trait]
impl ToolHandler for ChatQueryHandler {
    #[inline]
    async fn handle(&self, params: CallToolParams) -> Result<CallToolResult> {
        let args = params.arguments.unwrap_or_default();
        let query = required_str(&args, "query")?;
        let top_k = optional_usize(&args, "top_k")?.unwrap_or(DEFAULT_CHAT_TOP_K);

        debug!("chat_query: query='{}', top_k={}", query, top_k);

        match self.engine.chat(query, top_k).await {
            Ok(answer) => json_result(&answer),
            Err(e) => Ok(failure("chat_query", &e)),
        }
    }
}

impl IngestDocumentHandler {
    #[inline]
    pub fn new(engine: Arc<ResearchEngine>) -> Self {
        Self { engine }
    }

    /// Create the ingest_document tool definition
    #[inline]
    pub fn tool_definition() -> Tool {
        Tool {
            name: "ingest_document".to_string(),
            description: Some("Chunk, embed and store a document".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "content": {
                        "type": "string",
                        "description": "Document text"
                    },
                    "source": {
                        "type": "string",
                        "description": "Name shown when the document is cited"
                    },
                    "metadata": {
                        "type": "object",
                        "description": "Optional: metadata copied onto every chunk"
                    }
                },
                "required": ["content", "source"],
                "additionalProperties": false
            }),
        }
    }
}

#[async_trait]
impl ToolHandler for IngestDocumentHandler {
    #[inline]
    async fn handle(&self, params: CallToolParams) -> Result<CallToolResult> {
        let mut args = params.arguments.unwrap_or_default();
        let content = required_str(&args, "content")?.to_string();
        let source = required_str(&args, "source")?.to_string();
        let metadata = match args.remove("metadata") {
            None | Some(Value::Null) => None,
            Some(Value::Object(map)) => Some(map),
            Some(_) => return Err(anyhow!("Parameter 'metadata' must be an object")),
        };

        debug!(
            "ingest_document: source='{}', {} characters",
            source,
            content.chars().count()
        );

        match self.engine.ingest(&content, &source, metadata).await {
            Ok(outcome) if outcome.is_empty() => json_result(&json!({
                "success": false,
                "document_id": outcome.document_id,
                "chunks_created": 0,
                "message": "No content to ingest"
            })),
            Ok(outcome) => json_result(&json!({
                "success": true,
                "document_id": outcome.document_id,
                "chunks_created": outcome.chunks_created,
                "message": format!(
                    "Ingested '{}' as {} chunks",
                    source, outcome.chunks_created
                )
            })),
            Err(e) => Ok(failure("ingest_document", &e)),
        }
    }
}

impl KnowledgeBaseStatsHandler {
    #[inline]
    pub fn new(engine: Arc<ResearchEngine>) -> Self {
        Self { engine }
    }

    /// Create the knowledge_base_stats tool definition
    #[inline]
    pub fn tool_definition() -> Tool {
        Tool {
            name: "knowledge_base_stats".to_string(),
            description: Some("Report the size and state of the knowledge base".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {},
                "additionalProperties": false
            }),
        }
    }
}

#[async_trait]
impl ToolHandler for KnowledgeBaseStatsHandler {
    #[inline]
    async fn handle(&self, _params: CallToolParams) -> Result<CallToolResult> {
        let stats = self.engine.stats().await;
        let mut response = match serde_json::to_value(&stats)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        response.insert("status".to_string(), json!("ready"));
        json_result(&response)
    }
}

fn required_str<'a>(args: &'a Arguments, name: &str) -> Result<&'a str> {
    args.get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("Missing required parameter: {}", name))
}

fn optional_usize(args: &Arguments, name: &str) -> Result<Option<usize>> {
    match args.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| anyhow!("Parameter '{}' must be a positive integer", name)),
    }
}

fn optional_bool(args: &Arguments, name: &str) -> Result<Option<bool>> {
    match args.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_bool()
            .map(Some)
            .ok_or_else(|| anyhow!("Parameter '{}' must be a boolean", name)),
    }
}

fn json_result<T: Serialize>(value: &T) -> Result<CallToolResult> {
    Ok(CallToolResult::text(serde_json::to_string_pretty(value)?))
}

fn failure(tool: &str, error: &ResearchError) -> CallToolResult {
    error!("Tool {} failed: {}", tool, error);
    CallToolResult::error(user_message(error))
}

/// Message safe to show a client; details stay in the server log
fn user_message(error: &ResearchError) -> String {
    match error {
        ResearchError::InvalidRequest(message) | ResearchError::Unsupported(message) => {
            message.clone()
        }
        ResearchError::Config(e) => e.to_string(),
        ResearchError::Timeout(_) => {
            "The request timed out. Try a narrower question or fewer sources.".to_string()
        }
        ResearchError::Generation { stage, .. } => format!(
            "The language model failed during {}. Check that the model server is running.",
            stage
        ),
        ResearchError::Embedding(_) | ResearchError::DimensionMismatch { .. } => {
            "Failed to embed the request. Check the embedding model configuration.".to_string()
        }
        ResearchError::Search(_) => "The search backend did not answer. Try again later.".to_string(),
        _ => "Failed to process the request.".to_string(),
    }
}
