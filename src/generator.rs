//! Language-model backends implementing the core [`Generator`] trait.
//!
//! | Config Value | Backend | Endpoint | Key |
//! |-------------|---------|----------|-----|
//! | `"gemini"` | [`GeminiGenerator`] | `…/v1beta/models/<model>:generateContent` | `GEMINI_API_KEY` |
//! | `"openai"` | [`OpenAIGenerator`] | `<url>/chat/completions` | `OPENAI_API_KEY` |
//! | `"ollama"` | [`OllamaGenerator`] | `<url>/api/generate` | none |
//!
//! A backend without its key is still constructed but reports
//! `is_ready() == false`, so synthesis goes straight to the rule path.
//! Calls are single-shot, bounded by `generator.timeout_secs`. The one
//! exception is Gemini: when a model is not found (HTTP 404) the next model
//! in `generator.fallback_models` is tried.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::warn;

use qa_harness_core::testgen::Generator;

use crate::config::GeneratorConfig;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_GEMINI_FALLBACKS: &[&str] = &[
    "gemini-2.5-flash",
    "gemini-2.5-pro",
    "gemini-2.0-flash",
    "gemini-1.5-flash",
    "gemini-1.5-pro",
];
const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const DEFAULT_OLLAMA_MODEL: &str = "llama3.1";

/// Build the generator named by `config.provider`, or `None` when disabled.
pub fn create_generator(config: &GeneratorConfig) -> Result<Option<Box<dyn Generator>>> {
    match config.provider.as_str() {
        "disabled" => Ok(None),
        "gemini" => Ok(Some(Box::new(GeminiGenerator::new(config)?))),
        "openai" => Ok(Some(Box::new(OpenAIGenerator::new(config)?))),
        "ollama" => Ok(Some(Box::new(OllamaGenerator::new(config)?))),
        other => bail!("Unknown generator provider: {}", other),
    }
}

fn http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

/// Read the API key from `api_key_env`, or `default_env` when unset.
fn api_key(config: &GeneratorConfig, default_env: &str) -> Option<String> {
    let var = config.api_key_env.as_deref().unwrap_or(default_env);
    std::env::var(var).ok().filter(|k| !k.trim().is_empty())
}

/// Non-success HTTP status from a backend.
#[derive(Debug)]
pub struct ApiError {
    pub backend: &'static str,
    pub status: reqwest::StatusCode,
    pub body: String,
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} API error {}: {}", self.backend, self.status, self.body)
    }
}

impl std::error::Error for ApiError {}

async fn post_json(
    request: reqwest::RequestBuilder,
    body: &serde_json::Value,
    backend: &'static str,
) -> Result<serde_json::Value> {
    let response = request.json(body).send().await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ApiError {
            backend,
            status,
            body,
        }
        .into());
    }
    Ok(response.json().await?)
}

fn is_model_not_found(err: &anyhow::Error) -> bool {
    err.downcast_ref::<ApiError>()
        .is_some_and(|e| e.status == reqwest::StatusCode::NOT_FOUND)
}

// ============ Gemini ============

/// Google Gemini via the `generateContent` REST endpoint.
pub struct GeminiGenerator {
    /// Primary model first, then the fallbacks, without duplicates.
    models: Vec<String>,
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl GeminiGenerator {
    /// `GEMINI_MODEL` overrides `generator.model`.
    pub fn new(config: &GeneratorConfig) -> Result<Self> {
        let model = std::env::var("GEMINI_MODEL")
            .ok()
            .filter(|m| !m.trim().is_empty())
            .or_else(|| config.model.clone())
            .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string());

        let fallbacks = match &config.fallback_models {
            Some(list) => list.clone(),
            None => DEFAULT_GEMINI_FALLBACKS.iter().map(|m| m.to_string()).collect(),
        };

        Ok(Self {
            models: candidate_models(&model, &fallbacks),
            base_url: config
                .url
                .clone()
                .unwrap_or_else(|| GEMINI_BASE_URL.to_string()),
            api_key: api_key(config, "GEMINI_API_KEY"),
            client: http_client(config.timeout_secs)?,
        })
    }

    /// The primary model.
    pub fn model(&self) -> &str {
        self.models
            .first()
            .map(String::as_str)
            .unwrap_or(DEFAULT_GEMINI_MODEL)
    }

    async fn generate(&self, model: &str, key: &str, prompt: &str) -> Result<String> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            model
        );
        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        let json = post_json(
            self.client.post(url).header("x-goog-api-key", key),
            &body,
            "Gemini",
        )
        .await?;
        parse_gemini_response(&json)
    }
}

fn candidate_models(primary: &str, fallbacks: &[String]) -> Vec<String> {
    let mut models: Vec<String> = Vec::with_capacity(fallbacks.len() + 1);
    for name in std::iter::once(primary).chain(fallbacks.iter().map(String::as_str)) {
        let name = name.trim().trim_start_matches("models/");
        if !name.is_empty() && !models.iter().any(|m| m == name) {
            models.push(name.to_string());
        }
    }
    models
}

#[async_trait]
impl Generator for GeminiGenerator {
    fn is_ready(&self) -> bool {
        self.api_key.is_some()
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow!("GEMINI_API_KEY not set"))?;

        let mut last_err = None;
        for model in &self.models {
            match self.generate(model, key, prompt).await {
                Ok(text) => return Ok(text),
                Err(e) if is_model_not_found(&e) => {
                    warn!(model = %model, "Gemini model not available, trying next");
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_err.unwrap_or_else(|| anyhow!("no Gemini model configured")))
    }
}

/// Concatenate the text parts of the first candidate.
fn parse_gemini_response(json: &serde_json::Value) -> Result<String> {
    let parts = json
        .pointer("/candidates/0/content/parts")
        .and_then(|p| p.as_array())
        .ok_or_else(|| anyhow!("Invalid Gemini response: missing candidates[0].content.parts"))?;

    Ok(parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect::<Vec<_>>()
        .join(""))
}

// ============ OpenAI-compatible chat ============

/// OpenAI (or any compatible server) chat completions.
pub struct OpenAIGenerator {
    model: String,
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl OpenAIGenerator {
    pub fn new(config: &GeneratorConfig) -> Result<Self> {
        Ok(Self {
            model: config
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            base_url: config
                .url
                .clone()
                .unwrap_or_else(|| OPENAI_BASE_URL.to_string()),
            api_key: api_key(config, "OPENAI_API_KEY"),
            client: http_client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl Generator for OpenAIGenerator {
    fn is_ready(&self) -> bool {
        self.api_key.is_some()
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow!("OPENAI_API_KEY not set"))?;
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
        });

        let json = post_json(
            self.client
                .post(format!("{}/chat/completions", self.base_url.trim_end_matches('/')))
                .header("Authorization", format!("Bearer {}", key)),
            &body,
            "OpenAI",
        )
        .await?;
        parse_openai_response(&json)
    }
}

fn parse_openai_response(json: &serde_json::Value) -> Result<String> {
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(String::from)
        .ok_or_else(|| anyhow!("Invalid OpenAI response: missing choices[0].message.content"))
}

// ============ Ollama ============

/// A local Ollama instance's `/api/generate`. Always ready; an unreachable
/// server surfaces as a call failure.
pub struct OllamaGenerator {
    model: String,
    url: String,
    client: reqwest::Client,
}

impl OllamaGenerator {
    pub fn new(config: &GeneratorConfig) -> Result<Self> {
        Ok(Self {
            model: config
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_OLLAMA_MODEL.to_string()),
            url: config
                .url
                .clone()
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            client: http_client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    fn is_ready(&self) -> bool {
        true
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
        });

        let json = post_json(
            self.client
                .post(format!("{}/api/generate", self.url.trim_end_matches('/'))),
            &body,
            "Ollama",
        )
        .await
        .map_err(|e| anyhow!("Ollama request failed (is Ollama running at {}?): {}", self.url, e))?;

        json.get("response")
            .and_then(|r| r.as_str())
            .map(String::from)
            .ok_or_else(|| anyhow!("Invalid Ollama response: missing response field"))
    }
}
