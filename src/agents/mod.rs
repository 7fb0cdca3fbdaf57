// Agents module
// Query planning, multi-step reasoning and single-shot chat over retrieved context

pub mod planner;
pub mod prompts;
pub mod rag;
pub mod reasoning;

pub use planner::{Decomposition, ResearchPlan, ResearchPlanner};
pub use rag::{ChatAnswer, ChatSource, DEFAULT_CHAT_TOP_K, RagAgent};
pub use reasoning::{ReasoningAgent, ResearchAnswer, SourceReference};
