// Prompt templates for the planner, the per-question answerer, synthesis and chat

use itertools::Itertools;

use crate::retrieval::ScoredChunk;

/// Chat context used when retrieval comes back empty
pub const NO_DOCUMENTS_CONTEXT: &str = "No relevant documents found.";

#[inline]
pub fn planning_prompt(query: &str) -> String {
    format!(
        "You are a research planning assistant. Given a research question, break it down into \
         smaller, actionable sub-questions that can be answered independently.\n\n\
         Research Question: {query}\n\n\
         Provide a list of 2-5 sub-questions that would help answer the main question \
         comprehensively. Format your response as a numbered list.\n\n\
         Sub-questions:"
    )
}

#[inline]
pub fn answer_prompt(context: &str, question: &str) -> String {
    format!(
        "You are a research assistant. Answer the following question using the provided \
         context. Be thorough and cite your sources.\n\n\
         Context:\n{context}\n\n\
         Question: {question}\n\n\
         Provide a well-reasoned answer based on the context. If the context doesn't contain \
         enough information, say so clearly.\n\n\
         Answer:"
    )
}

#[inline]
pub fn synthesis_prompt(original_query: &str, sub_answers: &[(String, String)]) -> String {
    let sub_answers = sub_answers
        .iter()
        .map(|(question, answer)| format!("Q: {question}\nA: {answer}"))
        .join("\n\n");

    format!(
        "You are a research assistant synthesizing information to answer a complex question.\n\n\
         Original Question: {original_query}\n\n\
         Sub-questions and their answers:\n{sub_answers}\n\n\
         Synthesize these answers into a comprehensive, coherent response to the original \
         question. Make sure to:\n\
         1. Address all aspects of the original question\n\
         2. Highlight key findings\n\
         3. Note any gaps or uncertainties\n\n\
         Final Answer:"
    )
}

#[inline]
pub fn chat_system_prompt(context: &str) -> String {
    format!(
        "You are an AI assistant specialized in answering questions based on retrieved \
         documents.\nUse the following context to answer the user's question. If you cannot \
         find the answer in the context, say so clearly.\nAlways cite the relevant sources \
         when available.\n\nContext:\n{context}\n"
    )
}

/// Numbered context block for the answer prompt, one entry per retrieved chunk
#[inline]
pub fn format_numbered_context(results: &[ScoredChunk]) -> String {
    results
        .iter()
        .enumerate()
        .map(|(i, scored)| {
            format!(
                "[Source {}: {}]\n{}\n",
                i + 1,
                scored.chunk.source,
                scored.chunk.content
            )
        })
        .join("\n")
}

/// Context block for the chat agent
#[inline]
pub fn format_chat_context(results: &[ScoredChunk]) -> String {
    if results.is_empty() {
        return NO_DOCUMENTS_CONTEXT.to_string();
    }

    results
        .iter()
        .map(|scored| format!("[{}]: {}", scored.chunk.source, scored.chunk.content))
        .join("\n\n")
}
