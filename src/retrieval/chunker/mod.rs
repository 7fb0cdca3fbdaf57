#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ConfigError;

/// Configuration for document chunking. Sizes are in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Window length
    pub chunk_size: usize,
    /// Characters shared by consecutive windows
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 512,
            chunk_overlap: 50,
        }
    }
}

impl ChunkingConfig {
    #[inline]
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, ConfigError> {
        let config = Self {
            chunk_size,
            chunk_overlap,
        };
        config.validate()?;
        Ok(config)
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::InvalidChunkSize(self.chunk_size));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(ConfigError::InvalidChunkOverlap(
                self.chunk_overlap,
                self.chunk_size,
            ));
        }
        Ok(())
    }

    /// Split `text` with this configuration
    #[inline]
    pub fn chunk(&self, text: &str) -> Result<Vec<String>, ConfigError> {
        chunk_text(text, self.chunk_size, self.chunk_overlap)
    }
}

/// Split text into overlapping fixed-size character windows.
///
/// Windows start at 0 and advance by `chunk_size - overlap` characters. A
/// window is emitted verbatim unless it is entirely whitespace.
#[inline]
pub fn chunk_text(
    text: &str,
    chunk_size: usize,
    overlap: usize,
) -> Result<Vec<String>, ConfigError> {
    if chunk_size == 0 {
        return Err(ConfigError::InvalidChunkSize(chunk_size));
    }
    if overlap >= chunk_size {
        return Err(ConfigError::InvalidChunkOverlap(overlap, chunk_size));
    }

    let chars = text.chars().collect::<Vec<_>>();
    let step = chunk_size - overlap;

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let end = (start + chunk_size).min(chars.len());
        let window = chars[start..end].iter().collect::<String>();
        if !window.trim().is_empty() {
            chunks.push(window);
        }
        start += step;
    }

    debug!(
        "Split {} characters into {} chunks (size {}, overlap {})",
        chars.len(),
        chunks.len(),
        chunk_size,
        overlap
    );

    Ok(chunks)
}
