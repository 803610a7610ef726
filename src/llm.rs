//! Generative language model providers.
//!
//! The query engine sends one prompt and expects one completion. Providers
//! make a single HTTP request per call with the configured timeout; any
//! failure (transport, non-2xx status, unexpected body) becomes
//! [`RagError::Generation`]. Retrying is left to the caller.
//!
//! | Config Value | Provider | Endpoint |
//! |---|---|---|
//! | `"disabled"` | [`DisabledGenerator`] | none |
//! | `"gemini"` | [`GeminiGenerator`] | `models/{model}:generateContent` |
//! | `"openai"` | [`OpenAIGenerator`] | `/chat/completions` |
//! | `"ollama"` | [`OllamaGenerator`] | `/api/generate` |

use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use async_trait::async_trait;

use crate::config::GenerationConfig;
use crate::error::{RagError, Result};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const OLLAMA_BASE_URL: &str = "http://localhost:11434";

#[async_trait]
pub trait Generator: Send + Sync {
    fn model_name(&self) -> &str;

    /// Generate a completion for `prompt`.
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Always fails. Small-talk and no-result answers still work without a model.
pub struct DisabledGenerator;

#[async_trait]
impl Generator for DisabledGenerator {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn generate(&self, _prompt: &str) -> Result<String> {
        Err(RagError::Generation(
            "generation provider is disabled; set [generation] provider in config".to_string(),
        ))
    }
}

fn http_client(config: &GenerationConfig) -> anyhow::Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?)
}

fn base_url(config: &GenerationConfig, default: &str) -> String {
    config
        .url
        .as_deref()
        .unwrap_or(default)
        .trim_end_matches('/')
        .to_string()
}

/// Send a prepared request and return the JSON body of a 2xx response.
async fn send_json(request: reqwest::RequestBuilder, label: &str) -> Result<serde_json::Value> {
    let response = request.send().await.map_err(|e| {
        if e.is_timeout() {
            RagError::Generation(format!("{} request timed out", label))
        } else {
            RagError::Generation(format!("{} connection error: {}", label, e))
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        tracing::warn!(%status, "{} generation request failed", label);
        return Err(RagError::Generation(format!(
            "{} API error {}: {}",
            label,
            status,
            truncate_for_log(&body, 300)
        )));
    }

    response
        .json()
        .await
        .map_err(|e| RagError::Generation(format!("{} response: {}", label, e)))
}

fn truncate_for_log(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

// ============ Gemini ============

/// Google Gemini `generateContent`. Requires `GEMINI_API_KEY`.
pub struct GeminiGenerator {
    model: String,
    temperature: f32,
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl GeminiGenerator {
    pub fn new(config: &GenerationConfig) -> anyhow::Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| anyhow::anyhow!("GEMINI_API_KEY environment variable not set"))?;
        Ok(Self {
            model: config.model.clone(),
            temperature: config.temperature,
            api_key,
            base_url: base_url(config, GEMINI_BASE_URL),
            client: http_client(config)?,
        })
    }
}

#[async_trait]
impl Generator for GeminiGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": { "temperature": self.temperature },
        });
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let request = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body);
        let json = send_json(request, "Gemini").await?;
        parse_gemini_response(&json)
    }
}

/// Concatenate the text parts of the first candidate.
fn parse_gemini_response(json: &serde_json::Value) -> Result<String> {
    let parts = json
        .pointer("/candidates/0/content/parts")
        .and_then(|p| p.as_array())
        .ok_or_else(|| {
            let reason = json
                .pointer("/promptFeedback/blockReason")
                .and_then(|r| r.as_str())
                .unwrap_or("missing candidates");
            RagError::Generation(format!("invalid Gemini response: {}", reason))
        })?;

    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect();
    if text.is_empty() {
        return Err(RagError::Generation("Gemini returned no text".to_string()));
    }
    Ok(text)
}

// ============ OpenAI-compatible chat ============

/// OpenAI (or compatible) chat completions. Requires `OPENAI_API_KEY`.
pub struct OpenAIGenerator {
    model: String,
    temperature: f32,
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAIGenerator {
    pub fn new(config: &GenerationConfig) -> anyhow::Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;
        Ok(Self {
            model: config.model.clone(),
            temperature: config.temperature,
            api_key,
            base_url: base_url(config, OPENAI_BASE_URL),
            client: http_client(config)?,
        })
    }
}

#[async_trait]
impl Generator for OpenAIGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": self.temperature,
        });
        let request = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body);
        let json = send_json(request, "OpenAI").await?;
        parse_openai_response(&json)
    }
}

fn parse_openai_response(json: &serde_json::Value) -> Result<String> {
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| RagError::Generation("invalid OpenAI response: missing content".into()))
}

// ============ Ollama ============

/// Local Ollama `/api/generate` (non-streaming).
pub struct OllamaGenerator {
    model: String,
    temperature: f32,
    base_url: String,
    client: reqwest::Client,
}

impl OllamaGenerator {
    pub fn new(config: &GenerationConfig) -> anyhow::Result<Self> {
        Ok(Self {
            model: config.model.clone(),
            temperature: config.temperature,
            base_url: base_url(config, OLLAMA_BASE_URL),
            client: http_client(config)?,
        })
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "options": { "temperature": self.temperature },
        });
        let request = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&body);
        let json = send_json(request, "Ollama").await?;
        json.get("response")
            .and_then(|r| r.as_str())
            .map(str::to_string)
            .ok_or_else(|| RagError::Generation("invalid Ollama response: missing response".into()))
    }
}

/// Build the configured [`Generator`].
pub fn create_generator(config: &GenerationConfig) -> anyhow::Result<Arc<dyn Generator>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledGenerator)),
        "gemini" => Ok(Arc::new(GeminiGenerator::new(config)?)),
        "openai" => Ok(Arc::new(OpenAIGenerator::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaGenerator::new(config)?)),
        other => bail!("Unknown generation provider: {}", other),
    }
}
