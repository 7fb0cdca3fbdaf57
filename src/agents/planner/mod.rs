#[cfg(test)]
mod tests;

use std::sync::{Arc, LazyLock};

use fancy_regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::prompts::planning_prompt;
use crate::llm::{GenerationParams, LanguageModel};

/// Up to three digits and a separator, or a bullet and a space, then the item
/// text. Bold markers around the prefix or the whole line are dropped.
static LIST_ITEM_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\*\*|__)?(?:\d{1,3}\s*[.):\-]|[-*•]\s)(?:\*\*|__)?\s*(.*?)(?:\*\*|__)?$")
        .expect("valid regex")
});

/// Outcome of asking the model to split a query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decomposition {
    Parsed(Vec<String>),
    /// Nothing usable came back; carries the original query
    Fallback(String),
}

impl Decomposition {
    #[inline]
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback(_))
    }

    #[inline]
    pub fn into_questions(self) -> Vec<String> {
        match self {
            Self::Parsed(questions) => questions,
            Self::Fallback(query) => vec![query],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchPlan {
    pub original_query: String,
    pub sub_questions: Vec<String>,
    pub strategy: String,
    /// Sub-questions plus the synthesis step
    pub estimated_steps: usize,
    #[serde(default)]
    pub fallback: bool,
}

pub struct ResearchPlanner {
    llm: Arc<dyn LanguageModel>,
    params: GenerationParams,
}

impl ResearchPlanner {
    #[inline]
    pub fn new(llm: Arc<dyn LanguageModel>, params: GenerationParams) -> Self {
        Self { llm, params }
    }

    /// Ask the model for sub-questions. Never fails: model errors and
    /// unparseable output fall back to the original query.
    #[inline]
    pub async fn decompose(&self, query: &str) -> Decomposition {
        let prompt = planning_prompt(query);

        let response = match self.llm.generate(&prompt, &self.params).await {
            Ok(response) => response,
            Err(e) => {
                warn!(
                    "Planning call failed for query '{}', using it as-is: {:#}",
                    query, e
                );
                return Decomposition::Fallback(query.to_string());
            }
        };

        let questions = parse_numbered_list(&response);
        if questions.is_empty() {
            warn!(
                "No sub-questions found in planner output for query '{}', using it as-is",
                query
            );
            debug!("Unparseable planner output: {}", response);
            return Decomposition::Fallback(query.to_string());
        }

        info!("Decomposed query into {} sub-questions", questions.len());
        Decomposition::Parsed(questions)
    }

    #[inline]
    pub async fn create_plan(&self, query: &str) -> ResearchPlan {
        let decomposition = self.decompose(query).await;
        let fallback = decomposition.is_fallback();
        let sub_questions = decomposition.into_questions();

        ResearchPlan {
            original_query: query.to_string(),
            estimated_steps: sub_questions.len() + 1,
            sub_questions,
            strategy: "sequential".to_string(),
            fallback,
        }
    }
}

/// Pull list items out of free-form model output.
///
/// Only lines starting with a digit, a bullet or a bold marker are
/// candidates. A numbering prefix (`1.`, `2)`, `3:`, `4 -`) or bullet is
/// stripped; a digit-led line without one is kept as written.
#[inline]
pub fn parse_numbered_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| {
            line.starts_with(|c: char| c.is_ascii_digit() || matches!(c, '-' | '*' | '•'))
                || line.starts_with("__")
        })
        .filter_map(|line| {
            let item = match LIST_ITEM_REGEX.captures(line) {
                Ok(Some(captures)) => captures.get(1).map_or("", |m| m.as_str()).trim(),
                _ if line.starts_with(|c: char| c.is_ascii_digit()) => line,
                _ => "",
            };
            (!item.is_empty()).then(|| item.to_string())
        })
        .collect()
}
