use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use super::*;
use crate::PipelineStage;
use crate::llm::{ChatMessage, GenerationParams};
use crate::test_support::{LetterEmbedder, ScriptedModel, StaticRetriever, scored};

fn memory_engine(model: &Arc<ScriptedModel>) -> ResearchEngine {
    ResearchEngine::with_memory_store(
        Arc::clone(model) as Arc<dyn LanguageModel>,
        Arc::new(LetterEmbedder::default()),
        &Config::default(),
    )
}

/// Never answers within any reasonable deadline
struct StalledModel;

#[async_trait]
impl LanguageModel for StalledModel {
    async fn generate(&self, _prompt: &str, _params: &GenerationParams) -> anyhow::Result<String> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(String::new())
    }

    async fn chat(
        &self,
        _messages: &[ChatMessage],
        _params: &GenerationParams,
    ) -> anyhow::Result<String> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(String::new())
    }
}

#[tokio::test]
async fn ingest_then_research_direct() {
    let model = Arc::new(ScriptedModel::new(["It is about bees."]));
    let engine = memory_engine(&model);

    let outcome = engine
        .ingest("bees build hives", "bees.txt", Some(Map::new()))
        .await
        .expect("ingest succeeds");
    assert_eq!(outcome.chunks_created, 1);

    let answer = engine
        .research("bees", Some(3), false)
        .await
        .expect("research succeeds");

    assert_eq!(answer.answer, "It is about bees.");
    assert_eq!(answer.sources.len(), 1);
    assert_eq!(answer.sources[0].source, "bees.txt");
    assert!(answer.confidence > 0.0 && answer.confidence <= 1.0);
    let metadata = answer.sources[0]
        .metadata
        .as_ref()
        .expect("store metadata is carried");
    assert_eq!(metadata["parent_doc"], json!(outcome.document_id));
}

#[tokio::test]
async fn research_validates_inputs() {
    let model = Arc::new(ScriptedModel::default());
    let engine = memory_engine(&model);

    assert!(matches!(
        engine.research("   ", None, true).await,
        Err(ResearchError::InvalidRequest(_))
    ));
    assert!(matches!(
        engine.research("q", Some(0), true).await,
        Err(ResearchError::Config(_))
    ));
    assert!(matches!(
        engine.research("q", Some(21), true).await,
        Err(ResearchError::Config(_))
    ));
    assert!(matches!(
        engine.chat("q", 0).await,
        Err(ResearchError::Config(_))
    ));
    assert_eq!(model.call_count(), 0);
}

#[tokio::test]
async fn research_on_empty_store_reports_missing_context() {
    let model = Arc::new(ScriptedModel::default());
    let engine = memory_engine(&model);

    let answer = engine
        .research("anything", None, false)
        .await
        .expect("empty store is not an error");

    assert_eq!(
        answer.answer,
        "I couldn't find relevant information to answer this question."
    );
    assert!(answer.sources.is_empty());
    assert!(answer.confidence.abs() < f32::EPSILON);
}

#[tokio::test]
async fn hosted_engine_rejects_ingest() {
    let model = Arc::new(ScriptedModel::default());
    let engine = ResearchEngine::with_retriever(
        Arc::clone(&model) as Arc<dyn LanguageModel>,
        Arc::new(StaticRetriever::default()),
        &Config::default(),
    );

    let result = engine.ingest("text", "doc.txt", None).await;
    assert!(matches!(result, Err(ResearchError::Unsupported(_))));

    let stats = engine.stats().await;
    assert_eq!(stats.backend, RetrievalBackend::Hosted);
    assert!(stats.store.is_none());
}

#[tokio::test]
async fn chat_goes_through_retriever() {
    let model = Arc::new(ScriptedModel::new(["Chat answer"]));
    let engine = ResearchEngine::with_retriever(
        Arc::clone(&model) as Arc<dyn LanguageModel>,
        Arc::new(StaticRetriever::default().with("q", vec![scored("ctx", "src", 0.5)])),
        &Config::default(),
    );

    let answer = engine.chat("q", 3).await.expect("chat succeeds");
    assert_eq!(answer.answer, "Chat answer");
    assert_eq!(answer.sources.len(), 1);
}

#[tokio::test]
async fn stats_reflect_ingested_documents() {
    let model = Arc::new(ScriptedModel::default());
    let engine = memory_engine(&model);
    engine
        .ingest("first", "a.txt", None)
        .await
        .expect("ingest succeeds");

    let stats = engine.stats().await;
    assert_eq!(stats.backend, RetrievalBackend::Memory);
    let store = stats.store.expect("memory stats");
    assert_eq!(store.total_chunks, 1);
    assert_eq!(store.total_documents, 1);

    let value = serde_json::to_value(engine.stats().await).expect("stats serialize");
    assert_eq!(value["backend"], json!("memory"));
    assert_eq!(value["total_chunks"], json!(1));
}

#[tokio::test]
async fn slow_requests_time_out() {
    let engine = ResearchEngine::with_retriever(
        Arc::new(StalledModel),
        Arc::new(StaticRetriever::default().with("q", vec![scored("ctx", "src", 0.5)])),
        &Config::default(),
    )
    .with_request_timeout(Some(Duration::from_millis(50)));

    let result = engine.research("q", None, false).await;

    assert!(matches!(result, Err(ResearchError::Timeout(limit)) if limit == Duration::from_millis(50)));
}

#[tokio::test]
async fn planning_stage_never_fails_the_request() {
    let model = Arc::new(ScriptedModel::default());
    model.push_err("planner down");
    model.push_err("synthesis down");
    let engine = memory_engine(&model);

    let result = engine.research("question", None, true).await;

    // Planning falls back; the failure surfaces from synthesis
    assert!(matches!(
        result,
        Err(ResearchError::Generation {
            stage: PipelineStage::Synthesis,
            ..
        })
    ));
}
