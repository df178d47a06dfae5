// src/llm/mod.rs
//! LLM fallback: backend trait, retry policy and the cached [`LlmAssist`]
//! entry point used by the locator and the HTTP handlers.

pub mod backend;
pub mod prompts;
pub mod response;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::cache::{CacheKey, ResponseCache};
use crate::extractors::toc::{anchor_suggestions, chunk_text, TocEntry};
use crate::utils::error::LlmError;
use response::SimilarityAnswer;

pub use backend::{AnthropicBackend, MistralBackend};

// ── Request / Response ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmRequest {
    pub system: Option<String>,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    pub content: String,
    pub model: String,
}

// ── Trait ─────────────────────────────────────────────────────────────────────

#[async_trait]
pub trait LlmBackend: Send + Sync {
    async fn complete(&self, req: LlmRequest) -> Result<LlmResponse, LlmError>;
    fn model_id(&self) -> &str;
    fn provider(&self) -> &'static str;
}

// ── Retry ─────────────────────────────────────────────────────────────────────

/// Retries transient failures (transport errors, 429, 5xx) with linear backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 1, base_delay: Duration::from_millis(500) }
    }
}

impl RetryPolicy {
    pub async fn run<F, Fut, T>(&self, mut op: F) -> Result<T, LlmError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, LlmError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    let delay = self.base_delay * attempt;
                    tracing::warn!("LLM attempt {}/{} failed ({}), retrying in {:?}", attempt, max_attempts, e, delay);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}

// ── Assist ────────────────────────────────────────────────────────────────────

/// A parsed LLM answer together with the raw text it came from.
#[derive(Debug, Clone)]
pub struct AssistReply<T> {
    pub value: T,
    pub raw: String,
    pub cached: bool,
}

pub const DEFAULT_TOC_CHUNK_CHARS: usize = 10_000;

pub struct LlmAssist {
    backend: Arc<dyn LlmBackend>,
    cache: ResponseCache,
    retry: RetryPolicy,
    context_chars: usize,
}

impl LlmAssist {
    pub fn new(backend: Arc<dyn LlmBackend>, cache: ResponseCache, retry: RetryPolicy, context_chars: usize) -> Self {
        Self { backend, cache, retry, context_chars }
    }

    pub fn provider(&self) -> &'static str {
        self.backend.provider()
    }

    pub fn model_id(&self) -> &str {
        self.backend.model_id()
    }

    /// Characters of document text sent as context for similarity questions.
    pub fn context_chars(&self) -> usize {
        self.context_chars
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// Asks for a term in `context` that is functionally similar to `keyword`.
    pub async fn similar(&self, keyword: &str, context: &str) -> Result<AssistReply<SimilarityAnswer>, LlmError> {
        let request = prompts::similarity_prompt(keyword, context);
        self.ask("similarity", keyword, context, request, response::parse_similarity).await
    }

    /// Asks for the section of `context` that covers `keyword`. `None` means
    /// the model found nothing relevant.
    pub async fn extract_section(&self, keyword: &str, context: &str) -> Result<AssistReply<Option<String>>, LlmError> {
        let request = prompts::section_prompt(keyword, context);
        self.ask("section", keyword, context, request, response::parse_section).await
    }

    /// Free-form question about a document excerpt.
    pub async fn ask_question(&self, query: &str, context: &str) -> Result<AssistReply<String>, LlmError> {
        let request = prompts::question_prompt(query, context);
        self.ask("question", query, context, request, response::parse_answer).await
    }

    /// Heading suggestions for the whole text, one request per chunk.
    /// Chunks with unusable answers are skipped; other errors abort.
    pub async fn suggest_toc(&self, text: &str, chunk_chars: usize) -> Result<Vec<TocEntry>, LlmError> {
        let mut entries = Vec::new();

        for (chunk_offset, chunk) in chunk_text(text, chunk_chars) {
            let request = prompts::toc_prompt(chunk);
            match self.ask("toc", "", chunk, request, response::parse_toc_json).await {
                Ok(reply) => {
                    tracing::debug!("LLM suggested {} headings for chunk at {}", reply.value.len(), chunk_offset);
                    entries.extend(anchor_suggestions(text, chunk_offset, chunk, reply.value));
                }
                Err(LlmError::Malformed(reason)) => {
                    tracing::warn!("Skipping TOC chunk at {}: {}", chunk_offset, reason);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(entries)
    }

    async fn ask<T, P>(
        &self,
        kind: &str,
        keyword: &str,
        context: &str,
        request: LlmRequest,
        parse: P,
    ) -> Result<AssistReply<T>, LlmError>
    where
        P: Fn(&str) -> Result<T, LlmError>,
    {
        let key = CacheKey::derive(self.provider(), self.model_id(), kind, keyword, context);
        if let Some(raw) = self.cache.get(&key) {
            if let Ok(value) = parse(&raw) {
                tracing::debug!("Cache hit for {} request ({})", kind, key.as_str());
                return Ok(AssistReply { value, raw, cached: true });
            }
        }

        tracing::info!("Sending {} request to {} ({})", kind, self.provider(), self.model_id());
        let backend = &self.backend;
        let response = self.retry.run(|| backend.complete(request.clone())).await?;

        // Only answers that parse are worth keeping.
        let value = parse(&response.content)?;
        self.cache.insert(key, response.content.clone());

        Ok(AssistReply { value, raw: response.content, cached: false })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Scripted backend: returns the queued answers in order, repeating the
    /// last one. `Err(status)` fails with that HTTP status.
    pub struct FakeBackend {
        answers: Mutex<Vec<Result<String, u16>>>,
        pub calls: AtomicUsize,
    }

    impl FakeBackend {
        pub fn new(answers: Vec<Result<String, u16>>) -> Self {
            Self { answers: Mutex::new(answers), calls: AtomicUsize::new(0) }
        }

        pub fn answering(answer: &str) -> Self {
            Self::new(vec![Ok(answer.to_string())])
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LlmBackend for FakeBackend {
        async fn complete(&self, _req: LlmRequest) -> Result<LlmResponse, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = {
                let mut answers = self.answers.lock().expect("answers lock");
                if answers.len() > 1 { answers.remove(0) } else { answers.first().cloned().unwrap_or(Err(500)) }
            };
            match next {
                Ok(content) => Ok(LlmResponse { content, model: "fake".into() }),
                Err(429) => Err(LlmError::RateLimited),
                Err(status) => Err(LlmError::Api { status, message: "scripted failure".into() }),
            }
        }

        fn model_id(&self) -> &str {
            "fake-model"
        }

        fn provider(&self) -> &'static str {
            "fake"
        }
    }

    pub fn assist_with(backend: Arc<FakeBackend>) -> LlmAssist {
        LlmAssist::new(backend, ResponseCache::new(16, Duration::ZERO), RetryPolicy::default(), 12_000)
    }
}
