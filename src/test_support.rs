// Deterministic stand-ins for the model services used across unit tests

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Result, anyhow};
use async_trait::async_trait;

use crate::llm::{ChatMessage, Embedder, GenerationParams, LanguageModel};
use crate::retrieval::{Chunk, Retriever, ScoredChunk};

/// Embeds text as lowercase ASCII letter counts (26 dimensions)
#[derive(Debug, Default)]
pub struct LetterEmbedder {
    calls: AtomicUsize,
}

impl LetterEmbedder {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn vector(text: &str) -> Vec<f32> {
        let mut counts = vec![0.0_f32; 26];
        for byte in text.bytes().filter(u8::is_ascii_lowercase) {
            counts[usize::from(byte - b'a')] += 1.0;
        }
        counts
    }
}

#[async_trait]
impl Embedder for LetterEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|text| Self::vector(text)).collect())
    }
}

/// Always fails
#[derive(Debug, Default)]
pub struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(anyhow!("embedding service unavailable"))
    }
}

/// Returns all-ones vectors of an adjustable dimension
#[derive(Debug)]
pub struct ResizableEmbedder {
    dimension: AtomicUsize,
}

impl ResizableEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: AtomicUsize::new(dimension),
        }
    }

    pub fn set_dimension(&self, dimension: usize) {
        self.dimension.store(dimension, Ordering::SeqCst);
    }
}

#[async_trait]
impl Embedder for ResizableEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let dimension = self.dimension.load(Ordering::SeqCst);
        Ok(texts.iter().map(|_| vec![1.0; dimension]).collect())
    }
}

/// Replays queued responses in order and records every request
#[derive(Debug, Default)]
pub struct ScriptedModel {
    responses: Mutex<VecDeque<Result<String, String>>>,
    prompts: Mutex<Vec<String>>,
    chats: Mutex<Vec<Vec<ChatMessage>>>,
    params: Mutex<Vec<GenerationParams>>,
}

impl ScriptedModel {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let model = Self::default();
        for response in responses {
            model.push_ok(response);
        }
        model
    }

    pub fn push_ok(&self, response: impl Into<String>) {
        self.responses
            .lock()
            .expect("responses lock")
            .push_back(Ok(response.into()));
    }

    pub fn push_err(&self, message: impl Into<String>) {
        self.responses
            .lock()
            .expect("responses lock")
            .push_back(Err(message.into()));
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("prompts lock").clone()
    }

    pub fn chats(&self) -> Vec<Vec<ChatMessage>> {
        self.chats.lock().expect("chats lock").clone()
    }

    pub fn params(&self) -> Vec<GenerationParams> {
        self.params.lock().expect("params lock").clone()
    }

    pub fn call_count(&self) -> usize {
        self.params.lock().expect("params lock").len()
    }

    fn next_response(&self, params: &GenerationParams) -> Result<String> {
        self.params
            .lock()
            .expect("params lock")
            .push(params.clone());
        self.responses
            .lock()
            .expect("responses lock")
            .pop_front()
            .unwrap_or_else(|| Err("no scripted response left".to_string()))
            .map_err(|message| anyhow!(message))
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        self.prompts
            .lock()
            .expect("prompts lock")
            .push(prompt.to_string());
        self.next_response(params)
    }

    async fn chat(&self, messages: &[ChatMessage], params: &GenerationParams) -> Result<String> {
        self.chats
            .lock()
            .expect("chats lock")
            .push(messages.to_vec());
        self.next_response(params)
    }
}

/// Build a retrieved chunk without going through a store
pub fn scored(content: &str, source: &str, score: f32) -> ScoredChunk {
    ScoredChunk {
        chunk: Chunk {
            id: format!("{}_0", source),
            content: content.to_string(),
            source: source.to_string(),
            embedding: None,
            metadata: serde_json::Map::new(),
        },
        score,
    }
}

/// Serves canned results per query and records every lookup
#[derive(Debug, Default)]
pub struct StaticRetriever {
    results: HashMap<String, Vec<ScoredChunk>>,
    calls: Mutex<Vec<(String, usize)>>,
}

impl StaticRetriever {
    pub fn with(mut self, query: &str, results: Vec<ScoredChunk>) -> Self {
        self.results.insert(query.to_string(), results);
        self
    }

    pub fn calls(&self) -> Vec<(String, usize)> {
        self.calls.lock().expect("calls lock").clone()
    }
}

#[async_trait]
impl Retriever for StaticRetriever {
    async fn retrieve(&self, query: &str, top_k: usize) -> crate::Result<Vec<ScoredChunk>> {
        self.calls
            .lock()
            .expect("calls lock")
            .push((query.to_string(), top_k));
        Ok(self
            .results
            .get(query)
            .map(|results| results.iter().take(top_k).cloned().collect())
            .unwrap_or_default())
    }
}
