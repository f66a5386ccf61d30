//! OpenAI-compatible HTTP clients for embeddings and coherence judgments.

use crate::capability::{CoherenceJudge, Embedder};
use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, instrument};

const SYSTEM_PROMPT: &str = "You are a patent expert assistant.";
const MAX_RATING: f32 = 10.0;

/// Endpoint, model, and credentials for one HTTP service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpServiceConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    /// Transport-level timeout; the pipeline applies its own per-call bound too.
    pub timeout: Duration,
}

impl HttpServiceConfig {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            model: model.into(),
            api_key: None,
            timeout: Duration::from_secs(30),
        }
    }

    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    fn client(&self) -> Result<Client> {
        Client::builder()
            .timeout(self.timeout)
            .user_agent(concat!("nexus/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("build http client")
    }

    fn post(&self, client: &Client, body: &serde_json::Value) -> reqwest::RequestBuilder {
        let request = client.post(&self.endpoint).json(body);
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }
}

/// Chat-completion backed coherence judge.
#[derive(Debug, Clone)]
pub struct HttpCoherenceJudge {
    config: HttpServiceConfig,
    client: Client,
    rating: Regex,
}

impl HttpCoherenceJudge {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: HttpServiceConfig) -> Result<Self> {
        Ok(Self {
            client: config.client()?,
            rating: rating_pattern()?,
            config,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl CoherenceJudge for HttpCoherenceJudge {
    #[instrument(skip(self, candidate_text), fields(model = %self.config.model))]
    async fn score(&self, query: &str, candidate_text: &str) -> Result<f32> {
        let body = json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": judge_prompt(query, candidate_text) },
            ],
            "temperature": 0.3,
            "max_tokens": 200,
        });

        let response: ChatResponse = self
            .config
            .post(&self.client, &body)
            .send()
            .await
            .context("send chat completion request")?
            .error_for_status()
            .context("chat completion returned an error status")?
            .json()
            .await
            .context("decode chat completion response")?;

        let reply = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("chat completion had no message content"))?;
        debug!(reply_len = reply.len(), "coherence reply received");

        parse_rating(&self.rating, &reply)
            .ok_or_else(|| anyhow!("malformed coherence rating: {reply:?}"))
    }
}

/// Embeddings-endpoint backed embedder.
#[derive(Debug, Clone)]
pub struct HttpEmbedder {
    config: HttpServiceConfig,
    client: Client,
}

impl HttpEmbedder {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: HttpServiceConfig) -> Result<Self> {
        Ok(Self {
            client: config.client()?,
            config,
        })
    }
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[async_trait]
impl Embedder for HttpEmbedder {
    #[instrument(skip(self, text), fields(model = %self.config.model))]
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = json!({ "model": self.config.model, "input": text });
        let response: EmbeddingResponse = self
            .config
            .post(&self.client, &body)
            .send()
            .await
            .context("send embedding request")?
            .error_for_status()
            .context("embedding endpoint returned an error status")?
            .json()
            .await
            .context("decode embedding response")?;

        let embedding = response
            .data
            .into_iter()
            .next()
            .map(|data| data.embedding)
            .ok_or_else(|| anyhow!("embedding response had no data"))?;
        if embedding.is_empty() {
            bail!("embedding response was empty");
        }
        Ok(embedding)
    }
}

/// User prompt sent to the judge.
#[must_use]
pub fn judge_prompt(query: &str, candidate_text: &str) -> String {
    format!(
        "You are a patent expert. Score the relevance of query: {query} versus patent: \
         {candidate_text}. Think step by step about technical alignment, conceptual overlap, \
         and potential relevance before giving a score from 0-10."
    )
}

/// Pattern for the first number in a reply, optionally written as `n/10`.
///
/// # Errors
///
/// Never fails in practice; the pattern is a constant.
pub fn rating_pattern() -> Result<Regex> {
    Regex::new(r"(\d+(?:\.\d+)?)(?:\s*/\s*10)?").context("compile rating pattern")
}

/// First rating in `reply`, if it is a number within `0..=10`.
#[must_use]
pub fn parse_rating(pattern: &Regex, reply: &str) -> Option<f32> {
    let captures = pattern.captures(reply)?;
    let rating: f32 = captures.get(1)?.as_str().parse().ok()?;
    (rating.is_finite() && (0.0..=MAX_RATING).contains(&rating)).then_some(rating)
}
