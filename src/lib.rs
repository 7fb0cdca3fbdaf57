use std::fmt;
use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ResearchError>;

/// Stage of the reasoning pipeline a model call belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Answering,
    Synthesis,
    Chat,
}

impl fmt::Display for PipelineStage {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Answering => "answering",
            Self::Synthesis => "synthesis",
            Self::Chat => "chat",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum ResearchError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Generation failed during {stage}: {message}")]
    Generation {
        stage: PipelineStage,
        message: String,
    },

    #[error("Search error: {0}")]
    Search(String),

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl ResearchError {
    /// Wrap a failed model call with the stage it happened in
    #[inline]
    pub fn generation(stage: PipelineStage, error: &anyhow::Error) -> Self {
        Self::Generation {
            stage,
            message: format!("{:#}", error),
        }
    }
}

pub mod agents;
pub mod commands;
pub mod config;
pub mod engine;
pub mod http;
pub mod llm;
pub mod mcp;
pub mod retrieval;

#[cfg(test)]
pub(crate) mod test_support;
