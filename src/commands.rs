use anyhow::{Context, Result, bail};
use serde_json::{Map, Value, json};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::agents::{ChatAnswer, ResearchAnswer};
use crate::config::{Config, RetrievalBackend};
use crate::engine::ResearchEngine;
use crate::llm::OllamaClient;
use crate::mcp::research_server;

/// Options for a one-off question from the command line
#[derive(Debug, Clone, Default)]
pub struct AskOptions {
    pub query: String,
    pub documents: Vec<PathBuf>,
    pub max_sources: Option<usize>,
    pub use_reasoning: bool,
    pub chat: bool,
    pub json: bool,
}

/// A document read from disk, ready for ingestion
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedDocument {
    pub source: String,
    pub content: String,
    pub metadata: Map<String, Value>,
}

/// Ingest the given documents, answer one question and print the result
#[inline]
pub async fn ask(config: &Config, options: &AskOptions) -> Result<()> {
    let engine = ResearchEngine::from_config(config).context("Failed to build research engine")?;

    if !options.documents.is_empty() && engine.backend() == RetrievalBackend::Hosted {
        bail!("--document cannot be used with the hosted retrieval backend");
    }

    for path in &options.documents {
        let document = load_document(path).await?;
        let outcome = engine
            .ingest(&document.content, &document.source, Some(document.metadata))
            .await
            .with_context(|| format!("Failed to ingest {}", path.display()))?;
        if outcome.is_empty() {
            warn!("{} has no content, skipping", path.display());
        } else {
            info!(
                "Ingested {} as {} chunks",
                path.display(),
                outcome.chunks_created
            );
        }
    }

    if engine.backend() == RetrievalBackend::Memory && options.documents.is_empty() {
        warn!("No documents given; answers will have no supporting context");
    }

    let output = if options.chat {
        let top_k = options
            .max_sources
            .unwrap_or(crate::agents::DEFAULT_CHAT_TOP_K);
        let answer = engine.chat(&options.query, top_k).await?;
        if options.json {
            serde_json::to_string_pretty(&answer)?
        } else {
            render_chat_answer(&answer)
        }
    } else {
        let answer = engine
            .research(&options.query, options.max_sources, options.use_reasoning)
            .await?;
        if options.json {
            serde_json::to_string_pretty(&answer)?
        } else {
            render_research_answer(&answer)
        }
    };

    println!("{}", output);
    Ok(())
}

/// Read a UTF-8 text document, naming it after its file name
#[inline]
pub async fn load_document(path: &Path) -> Result<LoadedDocument> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read document: {}", path.display()))?;

    let source = path.file_name().map_or_else(
        || path.display().to_string(),
        |name| name.to_string_lossy().into_owned(),
    );

    let mut metadata = Map::new();
    metadata.insert("path".to_string(), json!(path.display().to_string()));

    Ok(LoadedDocument {
        source,
        content,
        metadata,
    })
}

/// Human-readable research answer
#[inline]
pub fn render_research_answer(answer: &ResearchAnswer) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", answer.answer);

    if !answer.reasoning_steps.is_empty() {
        let _ = writeln!(out, "\nReasoning:");
        for step in &answer.reasoning_steps {
            let _ = writeln!(out, "  - {}", step);
        }
    }

    if !answer.sources.is_empty() {
        let _ = writeln!(out, "\nSources:");
        for (i, source) in answer.sources.iter().enumerate() {
            let _ = writeln!(
                out,
                "  [{}] {} (relevance {:.3})",
                i + 1,
                source.source,
                source.relevance_score
            );
        }
    }

    let _ = write!(out, "\nConfidence: {:.2}", answer.confidence);
    out
}

/// Human-readable chat answer
#[inline]
pub fn render_chat_answer(answer: &ChatAnswer) -> String {
    let mut out = answer.answer.clone();
    if !answer.sources.is_empty() {
        out.push_str("\n\nSources:");
        for source in &answer.sources {
            let _ = write!(out, "\n  - {} ({:.3})", source.source, source.score);
        }
    }
    out
}

/// Start MCP server on stdio
#[inline]
pub async fn serve_mcp(config: &Config) -> Result<()> {
    info!("Starting MCP server on stdio");

    // Stdout belongs to the protocol; problems go to the log only
    let client = OllamaClient::new(&config.ollama)?;
    match tokio::task::spawn_blocking(move || client.health_check()).await? {
        Ok(()) => info!(
            "Ollama connected at {}:{} (generation: {}, embedding: {})",
            config.ollama.host,
            config.ollama.port,
            config.ollama.generation_model,
            config.ollama.embedding_model
        ),
        Err(e) => warn!("Ollama may not be ready, requests may fail: {:#}", e),
    }

    let engine =
        Arc::new(ResearchEngine::from_config(config).context("Failed to build research engine")?);
    let server = research_server(&engine).await;

    if let Err(e) = server.serve_stdio().await {
        error!("MCP server failed: {:#}", e);
        return Err(e);
    }
    Ok(())
}

/// Show connectivity and configuration status
#[inline]
pub async fn show_status(config: &Config) -> Result<()> {
    println!("📊 Research Assistant Status Report");
    println!("{}", "=".repeat(50));
    println!();

    println!("🤖 Ollama Status:");
    match OllamaClient::new(&config.ollama) {
        Ok(client) => {
            let probe = client.clone();
            match tokio::task::spawn_blocking(move || probe.health_check()).await? {
                Ok(()) => {
                    println!(
                        "   ✅ Ollama: Connected ({}:{})",
                        config.ollama.host, config.ollama.port
                    );
                }
                Err(e) => {
                    println!("   ⚠️  Ollama: Connected but unhealthy - {:#}", e);
                }
            }
            if let Ok(models) = tokio::task::spawn_blocking(move || client.list_models()).await? {
                println!("   📋 Models available: {}", models.len());
            }
        }
        Err(e) => {
            println!("   ❌ Ollama: Failed to connect - {:#}", e);
        }
    }
    println!("   🧮 Embedding model: {}", config.ollama.embedding_model);
    println!("   ✍️  Generation model: {}", config.ollama.generation_model);
    println!("   🔢 Batch size: {}", config.ollama.batch_size);

    println!();
    println!("🔍 Retrieval:");
    match config.retrieval.backend {
        RetrievalBackend::Memory => {
            println!("   Backend: in-memory (documents are ingested per session)");
            println!(
                "   Chunking: {} characters, {} overlap",
                config.chunking.chunk_size, config.chunking.chunk_overlap
            );
        }
        RetrievalBackend::Hosted => {
            println!("   Backend: hosted index");
            match config.retrieval.hosted.as_ref() {
                Some(hosted) => {
                    println!("   Host: {}", hosted.index_host);
                    println!("   Namespace: {}", hosted.namespace);
                    let key_state = if std::env::var_os(&hosted.api_key_env).is_some() {
                        "set"
                    } else {
                        "missing"
                    };
                    println!("   API key ({}): {}", hosted.api_key_env, key_state);
                }
                None => println!("   ❌ [retrieval.hosted] is not configured"),
            }
        }
    }
    println!(
        "   Default max sources: {}",
        config.retrieval.default_max_sources
    );
    println!();
    println!("📁 Config: {}", config.config_file_path().display());

    Ok(())
}
