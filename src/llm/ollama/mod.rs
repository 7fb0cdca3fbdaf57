
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use super::{ChatMessage, Embedder, GenerationParams, LanguageModel};
use crate::config::OllamaConfig;
use crate::http::{DEFAULT_RETRY_ATTEMPTS, build_agent, send_with_retry};

#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: Url,
    embedding_model: String,
    generation_model: String,
    batch_size: u32,
    agent: ureq::Agent,
    retry_attempts: u32,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Debug, Serialize, PartialEq)]
struct ModelOptions {
    num_predict: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    stop: Vec<String>,
}

impl From<&GenerationParams> for ModelOptions {
    #[inline]
    fn from(params: &GenerationParams) -> Self {
        Self {
            num_predict: params.max_new_tokens,
            temperature: params.temperature,
            top_p: params.top_p,
            stop: params.stop_sequences.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: ModelOptions,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: ModelOptions,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub size: Option<u64>,
    pub digest: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    models: Vec<ModelInfo>,
}

impl OllamaClient {
    #[inline]
    pub fn new(config: &OllamaConfig) -> Result<Self> {
        let base_url = config
            .ollama_url()
            .context("Failed to generate Ollama URL from config")?;

        Ok(Self {
            base_url,
            embedding_model: config.embedding_model.clone(),
            generation_model: config.generation_model.clone(),
            batch_size: config.batch_size.max(1),
            agent: build_agent(Duration::from_secs(config.timeout_secs)),
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
        })
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = build_agent(timeout);
        self
    }

    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts;
        self
    }

    /// Test connection to the Ollama server and verify both models are pulled
    #[inline]
    pub fn health_check(&self) -> Result<()> {
        debug!("Performing health check for Ollama at {}", self.base_url);

        let models = self.list_models().context("Server ping failed")?;
        for wanted in [&self.embedding_model, &self.generation_model] {
            if !models.iter().any(|m| &m.name == wanted) {
                let available: Vec<&str> = models.iter().map(|m| m.name.as_str()).collect();
                warn!("Model {} not found. Available models: {:?}", wanted, available);
                return Err(anyhow::anyhow!(
                    "Model '{}' is not available. Available models: {:?}",
                    wanted,
                    available
                ));
            }
        }

        info!(
            "Health check passed for Ollama server at {} (embedding: {}, generation: {})",
            self.base_url, self.embedding_model, self.generation_model
        );
        Ok(())
    }

    /// List all models pulled on the server
    #[inline]
    pub fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let url = self
            .base_url
            .join("/api/tags")
            .context("Failed to build models URL")?;

        let response_text = send_with_retry(url.as_str(), self.retry_attempts, || {
            self.agent
                .get(url.as_str())
                .call()
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })
        .context("Failed to fetch models")?;

        let models_response: ModelsResponse =
            serde_json::from_str(&response_text).context("Failed to parse models response")?;

        debug!("Found {} models", models_response.models.len());
        Ok(models_response.models)
    }

    /// Embed texts, splitting into requests of at most `batch_size` inputs
    #[inline]
    pub fn generate_embeddings_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Generating embeddings for {} texts", texts.len());

        let mut results = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size as usize) {
            let embeddings = self
                .embed_single_batch(batch)
                .with_context(|| format!("Failed to process batch of {} texts", batch.len()))?;
            results.extend(embeddings);
        }

        debug!("Generated {} embeddings total", results.len());
        Ok(results)
    }

    fn embed_single_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = EmbedRequest {
            model: &self.embedding_model,
            input: texts,
        };
        let response: EmbedResponse = self.post_json("/api/embed", &request)?;

        if response.embeddings.len() != texts.len() {
            return Err(anyhow::anyhow!(
                "Mismatch between request and response counts: {} vs {}",
                texts.len(),
                response.embeddings.len()
            ));
        }

        Ok(response.embeddings)
    }

    /// Blocking text completion
    #[inline]
    pub fn generate_text(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        debug!(
            "Generating completion with {} (prompt length: {}, max tokens: {})",
            self.generation_model,
            prompt.len(),
            params.max_new_tokens
        );

        let request = GenerateRequest {
            model: &self.generation_model,
            prompt,
            stream: false,
            options: params.into(),
        };
        let response: GenerateResponse = self.post_json("/api/generate", &request)?;
        Ok(response.response)
    }

    /// Blocking chat completion
    #[inline]
    pub fn chat_completion(
        &self,
        messages: &[ChatMessage],
        params: &GenerationParams,
    ) -> Result<String> {
        debug!(
            "Generating chat completion with {} ({} messages)",
            self.generation_model,
            messages.len()
        );

        let request = ChatRequest {
            model: &self.generation_model,
            messages,
            stream: false,
            options: params.into(),
        };
        let response: ChatResponse = self.post_json("/api/chat", &request)?;
        Ok(response.message.content)
    }

    fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R>
    where
        B: Serialize,
        R: serde::de::DeserializeOwned,
    {
        let url = self
            .base_url
            .join(path)
            .with_context(|| format!("Failed to build URL for {}", path))?;
        let request_json =
            serde_json::to_string(body).with_context(|| format!("Failed to serialize {}", path))?;

        let response_text = send_with_retry(url.as_str(), self.retry_attempts, || {
            self.agent
                .post(url.as_str())
                .header("Content-Type", "application/json")
                .send(&request_json)
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })
        .with_context(|| format!("Request to {} failed", path))?;

        serde_json::from_str(&response_text)
            .with_context(|| format!("Failed to parse response from {}", path))
    }
}

// ureq is blocking, so every trait call moves onto the blocking pool

#[async_trait]
impl LanguageModel for OllamaClient {
    #[inline]
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        let client = self.clone();
        let prompt = prompt.to_string();
        let params = params.clone();
        tokio::task::spawn_blocking(move || client.generate_text(&prompt, &params))
            .await
            .context("Generation task failed to complete")?
    }

    #[inline]
    async fn chat(&self, messages: &[ChatMessage], params: &GenerationParams) -> Result<String> {
        let client = self.clone();
        let messages = messages.to_vec();
        let params = params.clone();
        tokio::task::spawn_blocking(move || client.chat_completion(&messages, &params))
            .await
            .context("Chat task failed to complete")?
    }
}

#[async_trait]
impl Embedder for OllamaClient {
    #[inline]
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let client = self.clone();
        let texts = texts.to_vec();
        tokio::task::spawn_blocking(move || client.generate_embeddings_batch(&texts))
            .await
            .context("Embedding task failed to complete")?
    }
}
