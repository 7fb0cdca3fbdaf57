#[cfg(test)]
mod tests;

use std::sync::Arc;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::planner::ResearchPlanner;
use super::prompts::{answer_prompt, format_numbered_context, synthesis_prompt};
use crate::config::GenerationConfig;
use crate::llm::{GenerationParams, LanguageModel};
use crate::retrieval::{Retriever, ScoredChunk};
use crate::{PipelineStage, ResearchError, Result};

/// Answer given when retrieval finds nothing for a question
pub const NO_CONTEXT_ANSWER: &str =
    "I couldn't find relevant information to answer this question.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceReference {
    pub content: String,
    pub source: String,
    pub relevance_score: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl From<ScoredChunk> for SourceReference {
    #[inline]
    fn from(scored: ScoredChunk) -> Self {
        let metadata = scored.chunk.metadata;
        Self {
            content: scored.chunk.content,
            source: scored.chunk.source,
            relevance_score: scored.score,
            metadata: (!metadata.is_empty()).then_some(metadata),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchAnswer {
    pub answer: String,
    pub reasoning_steps: Vec<String>,
    pub sources: Vec<SourceReference>,
    /// Mean relevance of the deduplicated sources, within `[0, 1]`
    pub confidence: f32,
}

/// Multi-step research: plan, answer each sub-question from retrieved
/// context, then synthesize a final answer.
pub struct ReasoningAgent {
    llm: Arc<dyn LanguageModel>,
    retriever: Arc<dyn Retriever>,
    planner: ResearchPlanner,
    answer_params: GenerationParams,
    synthesis_params: GenerationParams,
}

impl ReasoningAgent {
    #[inline]
    pub fn new(
        llm: Arc<dyn LanguageModel>,
        retriever: Arc<dyn Retriever>,
        generation: &GenerationConfig,
    ) -> Self {
        let planner = ResearchPlanner::new(
            Arc::clone(&llm),
            generation.params(generation.planner),
        );
        Self {
            llm,
            retriever,
            planner,
            answer_params: generation.params(generation.answer),
            synthesis_params: generation.params(generation.synthesis),
        }
    }

    /// Retrieve context for one question and answer it
    #[inline]
    pub async fn answer_single_question(
        &self,
        question: &str,
        max_sources: usize,
    ) -> Result<(String, Vec<SourceReference>)> {
        let results = self.retriever.retrieve(question, max_sources).await?;

        if results.is_empty() {
            debug!("No context found for question '{}'", question);
            return Ok((NO_CONTEXT_ANSWER.to_string(), Vec::new()));
        }

        let context = format_numbered_context(&results);
        let prompt = answer_prompt(&context, question);

        let answer = self
            .llm
            .generate(&prompt, &self.answer_params)
            .await
            .map_err(|e| {
                warn!("Answer generation failed for question '{}': {:#}", question, e);
                ResearchError::generation(PipelineStage::Answering, &e)
            })?;

        let sources = results.into_iter().map(SourceReference::from).collect();
        Ok((answer.trim().to_string(), sources))
    }

    /// Answer `query`, decomposing it into sub-questions first when asked to
    #[inline]
    pub async fn reason_and_answer(
        &self,
        query: &str,
        max_sources: usize,
        use_decomposition: bool,
    ) -> Result<ResearchAnswer> {
        let mut reasoning_steps = Vec::new();

        let (answer, all_sources) = if use_decomposition {
            reasoning_steps.push(format!("Analyzing query: {}", query));
            let plan = self.planner.create_plan(query).await;
            if plan.fallback {
                reasoning_steps.push(
                    "Could not decompose query, researching it as a single question".to_string(),
                );
            } else {
                reasoning_steps.push(format!(
                    "Decomposed into {} sub-questions",
                    plan.sub_questions.len()
                ));
            }

            let mut sub_answers = Vec::with_capacity(plan.sub_questions.len());
            let mut all_sources = Vec::new();
            for (i, sub_question) in plan.sub_questions.into_iter().enumerate() {
                reasoning_steps.push(format!("Researching: {}", sub_question));
                let (answer, sources) = self
                    .answer_single_question(&sub_question, max_sources)
                    .await?;
                all_sources.extend(sources);
                sub_answers.push((sub_question, answer));
                reasoning_steps.push(format!("Found answer for sub-question {}", i + 1));
            }

            reasoning_steps.push("Synthesizing final answer".to_string());
            let prompt = synthesis_prompt(query, &sub_answers);
            let answer = self
                .llm
                .generate(&prompt, &self.synthesis_params)
                .await
                .map_err(|e| {
                    warn!("Synthesis failed for query '{}': {:#}", query, e);
                    ResearchError::generation(PipelineStage::Synthesis, &e)
                })?;

            (answer, all_sources)
        } else {
            reasoning_steps.push(format!("Directly answering: {}", query));
            self.answer_single_question(query, max_sources).await?
        };

        let sources = dedupe_sources(all_sources);
        let confidence = confidence(&sources);

        info!(
            "Answered query with {} sources (confidence {:.2})",
            sources.len(),
            confidence
        );

        Ok(ResearchAnswer {
            answer: answer.trim().to_string(),
            reasoning_steps,
            sources,
            confidence,
        })
    }
}

/// Keep the first source for each distinct content
#[inline]
pub fn dedupe_sources(sources: Vec<SourceReference>) -> Vec<SourceReference> {
    sources
        .into_iter()
        .unique_by(|source| source.content.clone())
        .collect()
}

/// Mean relevance clamped to `[0, 1]`, or 0 with no sources
#[inline]
pub fn confidence(sources: &[SourceReference]) -> f32 {
    if sources.is_empty() {
        return 0.0;
    }

    let total = sources.iter().map(|s| s.relevance_score).sum::<f32>();
    let mean = total / sources.len() as f32;
    mean.clamp(0.0, 1.0)
}
