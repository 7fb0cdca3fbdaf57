use std::sync::Arc;

use super::*;
use crate::test_support::{ScriptedModel, StaticRetriever, scored};

fn agent(model: &Arc<ScriptedModel>, retriever: StaticRetriever) -> ReasoningAgent {
    ReasoningAgent::new(
        Arc::clone(model) as Arc<dyn LanguageModel>,
        Arc::new(retriever),
        &GenerationConfig::default(),
    )
}

fn source(content: &str, score: f32) -> SourceReference {
    SourceReference {
        content: content.to_string(),
        source: "doc.txt".to_string(),
        relevance_score: score,
        metadata: None,
    }
}

#[test]
fn dedupe_keeps_first_occurrence() {
    let sources = vec![
        source("alpha", 0.9),
        source("beta", 0.5),
        source("alpha", 0.2),
    ];

    let unique = dedupe_sources(sources);

    assert_eq!(unique.len(), 2);
    assert_eq!(unique[0].content, "alpha");
    assert!((unique[0].relevance_score - 0.9).abs() < f32::EPSILON);
    assert_eq!(unique[1].content, "beta");
}

#[test]
fn confidence_values() {
    assert!(confidence(&[]).abs() < f32::EPSILON);
    assert!((confidence(&[source("a", 1.0)]) - 1.0).abs() < f32::EPSILON);
    assert!((confidence(&[source("a", 0.4), source("b", 0.6)]) - 0.5).abs() < 1e-6);
    assert!((confidence(&[source("a", 1.2)]) - 1.0).abs() < f32::EPSILON);
}

#[tokio::test]
async fn empty_retrieval_skips_generation() {
    let model = Arc::new(ScriptedModel::default());
    let agent = agent(&model, StaticRetriever::default());

    let (answer, sources) = agent
        .answer_single_question("Unknown topic?", 5)
        .await
        .expect("empty retrieval is not an error");

    assert_eq!(answer, NO_CONTEXT_ANSWER);
    assert!(sources.is_empty());
    assert_eq!(model.call_count(), 0);
}

#[tokio::test]
async fn single_question_uses_numbered_context() {
    let model = Arc::new(ScriptedModel::new(["  Erasure must happen without delay.  "]));
    let retriever = StaticRetriever::default().with(
        "What is erasure?",
        vec![
            scored("Article 17 text", "gdpr.pdf", 0.9),
            scored("Recital 65 text", "recitals.pdf", 0.7),
        ],
    );
    let agent = agent(&model, retriever);

    let (answer, sources) = agent
        .answer_single_question("What is erasure?", 5)
        .await
        .expect("answer succeeds");

    assert_eq!(answer, "Erasure must happen without delay.");
    assert_eq!(sources.len(), 2);
    assert_eq!(sources[0].source, "gdpr.pdf");
    assert!((sources[1].relevance_score - 0.7).abs() < f32::EPSILON);

    let prompt = &model.prompts()[0];
    assert!(prompt.contains("[Source 1: gdpr.pdf]\nArticle 17 text\n"));
    assert!(prompt.contains("[Source 2: recitals.pdf]\nRecital 65 text\n"));
    assert!(prompt.contains("Question: What is erasure?"));
    assert_eq!(model.params()[0].max_new_tokens, 1024);
}

#[tokio::test]
async fn answer_generation_failure_is_reported_with_stage() {
    let model = Arc::new(ScriptedModel::default());
    model.push_err("connection reset");
    let retriever =
        StaticRetriever::default().with("Q", vec![scored("context", "doc.txt", 0.5)]);
    let agent = agent(&model, retriever);

    let result = agent.answer_single_question("Q", 3).await;

    assert!(matches!(
        result,
        Err(ResearchError::Generation {
            stage: PipelineStage::Answering,
            ..
        })
    ));
}

#[tokio::test]
async fn direct_mode_answers_once() {
    let model = Arc::new(ScriptedModel::new(["Direct answer"]));
    let retriever = StaticRetriever::default().with(
        "What is GDPR?",
        vec![
            scored("Regulation text", "gdpr.pdf", 0.8),
            scored("Regulation text", "copy.pdf", 0.4),
        ],
    );
    let agent = agent(&model, retriever);

    let result = agent
        .reason_and_answer("What is GDPR?", 5, false)
        .await
        .expect("direct answer succeeds");

    assert_eq!(result.answer, "Direct answer");
    assert_eq!(result.reasoning_steps, vec!["Directly answering: What is GDPR?"]);
    assert_eq!(result.sources.len(), 1);
    assert_eq!(result.sources[0].source, "gdpr.pdf");
    assert!((result.confidence - 0.8).abs() < 1e-6);
    assert_eq!(model.call_count(), 1);
}

#[tokio::test]
async fn decomposed_pipeline_runs_in_order() {
    let model = Arc::new(ScriptedModel::new([
        "1. Who is a controller?\n2. What is erasure?",
        "A controller decides purposes.",
        "Erasure means deletion.",
        " Final synthesized answer. ",
    ]));
    let retriever = StaticRetriever::default()
        .with(
            "Who is a controller?",
            vec![scored("Article 4 text", "gdpr.pdf", 0.6)],
        )
        .with(
            "What is erasure?",
            vec![
                scored("Article 17 text", "gdpr.pdf", 1.0),
                scored("Article 4 text", "gdpr.pdf", 0.3),
            ],
        );
    let agent = agent(&model, retriever);

    let result = agent
        .reason_and_answer("Explain controller duties on erasure", 4, true)
        .await
        .expect("pipeline succeeds");

    assert_eq!(result.answer, "Final synthesized answer.");
    assert_eq!(
        result.reasoning_steps,
        vec![
            "Analyzing query: Explain controller duties on erasure",
            "Decomposed into 2 sub-questions",
            "Researching: Who is a controller?",
            "Found answer for sub-question 1",
            "Researching: What is erasure?",
            "Found answer for sub-question 2",
            "Synthesizing final answer",
        ]
    );

    // Article 4 appears twice; the first (0.6) is kept
    assert_eq!(result.sources.len(), 2);
    assert_eq!(result.sources[0].content, "Article 4 text");
    assert!((result.sources[0].relevance_score - 0.6).abs() < f32::EPSILON);
    assert!((result.confidence - 0.8).abs() < 1e-6);

    let prompts = model.prompts();
    assert_eq!(prompts.len(), 4);
    let synthesis = &prompts[3];
    assert!(synthesis.contains("Original Question: Explain controller duties on erasure"));
    assert!(synthesis.contains(
        "Q: Who is a controller?\nA: A controller decides purposes.\n\nQ: What is erasure?\nA: Erasure means deletion."
    ));
}

#[tokio::test]
async fn planner_fallback_researches_original_query() {
    let model = Arc::new(ScriptedModel::new(["no list here", "answer", "final"]));
    let retriever = StaticRetriever::default();
    let agent = agent(&model, retriever);

    let result = agent
        .reason_and_answer("Simple question", 5, true)
        .await
        .expect("pipeline succeeds");

    assert_eq!(
        result.reasoning_steps[1],
        "Could not decompose query, researching it as a single question"
    );
    assert_eq!(result.reasoning_steps[2], "Researching: Simple question");
    assert!(result.sources.is_empty());
    assert!(result.confidence.abs() < f32::EPSILON);
    // planner + synthesis; the sub-question had no context
    assert_eq!(model.call_count(), 2);
}

#[tokio::test]
async fn synthesis_failure_is_reported_with_stage() {
    let model = Arc::new(ScriptedModel::new(["1. Only question?"]));
    model.push_err("timeout");
    let agent = agent(&model, StaticRetriever::default());

    let result = agent.reason_and_answer("Query", 5, true).await;

    assert!(matches!(
        result,
        Err(ResearchError::Generation {
            stage: PipelineStage::Synthesis,
            ..
        })
    ));
}

#[tokio::test]
async fn max_sources_is_passed_to_retrieval() {
    let model = Arc::new(ScriptedModel::new(["answer"]));
    let retriever = Arc::new(StaticRetriever::default().with(
        "Q",
        vec![
            scored("one", "a", 0.9),
            scored("two", "b", 0.8),
            scored("three", "c", 0.7),
        ],
    ));
    let agent = ReasoningAgent::new(
        Arc::clone(&model) as Arc<dyn LanguageModel>,
        Arc::clone(&retriever) as Arc<dyn Retriever>,
        &GenerationConfig::default(),
    );

    let result = agent
        .reason_and_answer("Q", 2, false)
        .await
        .expect("answer succeeds");

    assert_eq!(result.sources.len(), 2);
    assert_eq!(retriever.calls(), vec![("Q".to_string(), 2)]);
}
