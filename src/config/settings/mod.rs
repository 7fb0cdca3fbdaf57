
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

use crate::llm::GenerationParams;
use crate::retrieval::chunker::ChunkingConfig;

/// Environment variable overriding the configuration directory
pub const CONFIG_DIR_ENV: &str = "RESEARCH_ASSISTANT_CONFIG_DIR";

/// Upper bound on sources per question, matching the query tool schema
pub const MAX_SOURCES_LIMIT: usize = 20;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub ollama: OllamaConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OllamaConfig {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub embedding_model: String,
    pub generation_model: String,
    pub batch_size: u32,
    pub timeout_secs: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            protocol: "http".to_string(),
            host: "localhost".to_string(),
            port: 11434,
            embedding_model: "all-minilm:latest".to_string(),
            generation_model: "mistral:7b-instruct".to_string(),
            batch_size: 16,
            timeout_secs: crate::http::DEFAULT_TIMEOUT_SECONDS,
        }
    }
}

/// Sampling settings for one kind of model call
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ModelCallConfig {
    pub max_new_tokens: u32,
    pub temperature: f32,
}

impl ModelCallConfig {
    const fn new(max_new_tokens: u32, temperature: f32) -> Self {
        Self {
            max_new_tokens,
            temperature,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GenerationConfig {
    pub top_p: f32,
    pub planner: ModelCallConfig,
    pub answer: ModelCallConfig,
    pub synthesis: ModelCallConfig,
    pub chat: ModelCallConfig,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            top_p: 0.95,
            planner: ModelCallConfig::new(512, 0.3),
            answer: ModelCallConfig::new(1024, 0.5),
            synthesis: ModelCallConfig::new(1024, 0.5),
            chat: ModelCallConfig::new(512, 0.7),
        }
    }
}

impl GenerationConfig {
    /// Build request parameters for one call kind, applying the shared `top_p`
    #[inline]
    pub fn params(&self, call: ModelCallConfig) -> GenerationParams {
        GenerationParams::new(call.max_new_tokens, call.temperature).with_top_p(self.top_p)
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalBackend {
    #[default]
    Memory,
    Hosted,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrievalConfig {
    pub backend: RetrievalBackend,
    pub default_max_sources: usize,
    /// Per-request deadline in seconds, 0 disables it
    pub request_timeout_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hosted: Option<HostedIndexConfig>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            backend: RetrievalBackend::Memory,
            default_max_sources: 5,
            request_timeout_secs: 300,
            hosted: None,
        }
    }
}

/// Pinecone-compatible hosted index
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HostedIndexConfig {
    pub index_host: String,
    pub namespace: String,
    pub api_key_env: String,
    pub api_version: String,
    pub text_field: String,
    pub source_field: String,
}

impl Default for HostedIndexConfig {
    fn default() -> Self {
        Self {
            index_host: String::new(),
            namespace: String::new(),
            api_key_env: "PINECONE_API_KEY".to_string(),
            api_version: "2025-01".to_string(),
            text_field: "text".to_string(),
            source_field: "source".to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid port: {0} (must be between 1 and 65535)")]
    InvalidPort(u16),
    #[error("Invalid batch size: {0} (must be between 1 and 1000)")]
    InvalidBatchSize(u32),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid protocol: {0} (must be 'http' or 'https')")]
    InvalidProtocol(String),
    #[error("Invalid request timeout: {0} (must be between 1 and 3600 seconds)")]
    InvalidTimeout(u64),
    #[error("Invalid chunk size: {0} (must be greater than 0)")]
    InvalidChunkSize(usize),
    #[error("Chunk overlap ({0}) must be smaller than chunk size ({1})")]
    InvalidChunkOverlap(usize, usize),
    #[error("Invalid max new tokens: {0} (must be between 1 and 32768)")]
    InvalidMaxTokens(u32),
    #[error("Invalid temperature: {0} (must be between 0.0 and 2.0)")]
    InvalidTemperature(f32),
    #[error("Invalid top_p: {0} (must be greater than 0.0 and at most 1.0)")]
    InvalidTopP(f32),
    #[error("Invalid max sources: {0} (must be between 1 and 20)")]
    InvalidMaxSources(usize),
    #[error("Hosted retrieval backend selected but [retrieval.hosted] is missing")]
    MissingHostedIndex,
    #[error("Invalid hosted index setting: {0}")]
    InvalidHostedIndex(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Config {
    /// Resolve the configuration directory: explicit override, then
    /// `RESEARCH_ASSISTANT_CONFIG_DIR`, then the platform config dir
    #[inline]
    pub fn resolve_dir(override_dir: Option<&Path>) -> Result<PathBuf, ConfigError> {
        if let Some(dir) = override_dir {
            return Ok(dir.to_path_buf());
        }
        if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV) {
            return Ok(PathBuf::from(dir));
        }
        dirs::config_dir()
            .map(|dir| dir.join("research-assistant"))
            .ok_or(ConfigError::DirectoryError)
    }

    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join("config.toml");

        if !config_path.exists() {
            return Ok(Self {
                base_dir: config_dir.as_ref().to_path_buf(),
                ..Self::default()
            });
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.base_dir = config_dir.as_ref().to_path_buf();

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        let config_dir = self.get_base_dir();

        fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        let config_path = self.config_file_path();
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    #[inline]
    pub fn get_base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.get_base_dir().join("config.toml")
    }

    #[inline]
    pub fn ollama_url(&self) -> Result<Url, ConfigError> {
        self.ollama.ollama_url()
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.ollama.validate()?;
        self.chunking.validate()?;
        self.generation.validate()?;
        self.retrieval.validate()?;
        Ok(())
    }
}

impl OllamaConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.protocol != "http" && self.protocol != "https" {
            return Err(ConfigError::InvalidProtocol(self.protocol.clone()));
        }

        self.ollama_url()?;

        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }

        if self.embedding_model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.embedding_model.clone()));
        }

        if self.generation_model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.generation_model.clone()));
        }

        if self.batch_size == 0 || self.batch_size > 1000 {
            return Err(ConfigError::InvalidBatchSize(self.batch_size));
        }

        if !(1..=3600).contains(&self.timeout_secs) {
            return Err(ConfigError::InvalidTimeout(self.timeout_secs));
        }

        Ok(())
    }

    pub fn ollama_url(&self) -> Result<Url, ConfigError> {
        let url_str = format!("{}://{}:{}", self.protocol, self.host, self.port);
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))
    }

    pub fn set_protocol(&mut self, protocol: String) -> Result<(), ConfigError> {
        if protocol != "http" && protocol != "https" {
            return Err(ConfigError::InvalidProtocol(protocol));
        }
        self.protocol = protocol;
        Ok(())
    }

    pub fn set_host(&mut self, host: String) -> Result<(), ConfigError> {
        let temp_config = OllamaConfig {
            host: host.clone(),
            ..self.clone()
        };
        temp_config.ollama_url()?;
        self.host = host;
        Ok(())
    }

    pub fn set_port(&mut self, port: u16) -> Result<(), ConfigError> {
        if port == 0 {
            return Err(ConfigError::InvalidPort(port));
        }
        self.port = port;
        Ok(())
    }

    pub fn set_embedding_model(&mut self, model: String) -> Result<(), ConfigError> {
        if model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(model));
        }
        self.embedding_model = model;
        Ok(())
    }

    pub fn set_generation_model(&mut self, model: String) -> Result<(), ConfigError> {
        if model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(model));
        }
        self.generation_model = model;
        Ok(())
    }

    pub fn set_batch_size(&mut self, batch_size: u32) -> Result<(), ConfigError> {
        if batch_size == 0 || batch_size > 1000 {
            return Err(ConfigError::InvalidBatchSize(batch_size));
        }
        self.batch_size = batch_size;
        Ok(())
    }
}

impl ModelCallConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=32768).contains(&self.max_new_tokens) {
            return Err(ConfigError::InvalidMaxTokens(self.max_new_tokens));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::InvalidTemperature(self.temperature));
        }
        Ok(())
    }
}

impl GenerationConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        self.planner.validate()?;
        self.answer.validate()?;
        self.synthesis.validate()?;
        self.chat.validate()?;
        if !(self.top_p > 0.0 && self.top_p <= 1.0) {
            return Err(ConfigError::InvalidTopP(self.top_p));
        }
        Ok(())
    }
}

impl RetrievalConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        validate_max_sources(self.default_max_sources)?;

        if self.request_timeout_secs > 3600 {
            return Err(ConfigError::InvalidTimeout(self.request_timeout_secs));
        }

        match (&self.hosted, self.backend) {
            (None, RetrievalBackend::Hosted) => Err(ConfigError::MissingHostedIndex),
            (Some(hosted), _) => hosted.validate(),
            (None, RetrievalBackend::Memory) => Ok(()),
        }
    }
}

impl HostedIndexConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        Url::parse(&self.index_host)
            .map_err(|_| ConfigError::InvalidUrl(self.index_host.clone()))?;

        for (name, value) in [
            ("namespace", &self.namespace),
            ("api_key_env", &self.api_key_env),
            ("text_field", &self.text_field),
            ("source_field", &self.source_field),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::InvalidHostedIndex(format!(
                    "{} cannot be empty",
                    name
                )));
            }
        }

        Ok(())
    }
}

/// Shared bound check for `max_sources` coming from config or callers
#[inline]
pub fn validate_max_sources(max_sources: usize) -> Result<(), ConfigError> {
    if !(1..=MAX_SOURCES_LIMIT).contains(&max_sources) {
        return Err(ConfigError::InvalidMaxSources(max_sources));
    }
    Ok(())
}
