// Test doubles shared by the integration suites

#![allow(dead_code, reason = "each suite uses a different subset")]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use research_assistant::llm::{ChatMessage, Embedder, GenerationParams, LanguageModel};

/// Embeds text as counts of each ASCII letter
#[derive(Debug, Default)]
pub struct LetterEmbedder;

impl LetterEmbedder {
    pub fn vector(text: &str) -> Vec<f32> {
        let mut counts = vec![0.0_f32; 26];
        for c in text.chars().filter(char::is_ascii_alphabetic) {
            let index = (c.to_ascii_lowercase() as u8 - b'a') as usize;
            counts[index] += 1.0;
        }
        counts
    }
}

#[async_trait]
impl Embedder for LetterEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }
}

/// Letter embedder that fails every call after the first `healthy_calls`
#[derive(Debug)]
pub struct FlakyEmbedder {
    healthy_calls: usize,
    calls: AtomicUsize,
}

impl FlakyEmbedder {
    pub fn new(healthy_calls: usize) -> Self {
        Self {
            healthy_calls,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Embedder for FlakyEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call >= self.healthy_calls {
            return Err(anyhow!("embedding service unavailable"));
        }
        Ok(texts.iter().map(|t| LetterEmbedder::vector(t)).collect())
    }
}

/// Model that replays canned responses in order and records prompts
#[derive(Debug, Default)]
pub struct ScriptedModel {
    responses: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("prompts lock").clone()
    }

    fn next(&self, prompt: String) -> Result<String> {
        self.prompts.lock().expect("prompts lock").push(prompt);
        self.responses
            .lock()
            .expect("responses lock")
            .pop_front()
            .ok_or_else(|| anyhow!("no scripted response left"))
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn generate(&self, prompt: &str, _params: &GenerationParams) -> Result<String> {
        self.next(prompt.to_string())
    }

    async fn chat(&self, messages: &[ChatMessage], _params: &GenerationParams) -> Result<String> {
        let prompt = messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        self.next(prompt)
    }
}
