use std::time::Duration;

use ops_core::config::LlmSettings;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{LlmError, Result};

/// Timeout for the availability probe.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
/// Timeout for a real completion request.
pub const CALL_TIMEOUT: Duration = Duration::from_secs(30);

const OPENAI_URL: &str = "https://api.openai.com";
const ANTHROPIC_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";

// ─── ProviderKind ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Ollama,
    OpenAi,
    Anthropic,
}

impl ProviderKind {
    pub fn key(self) -> &'static str {
        match self {
            ProviderKind::Ollama => "ollama",
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            ProviderKind::Ollama => "Ollama (Local)",
            ProviderKind::OpenAi => "OpenAI GPT",
            ProviderKind::Anthropic => "Anthropic Claude",
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            ProviderKind::Ollama => "phi3:mini",
            ProviderKind::OpenAi => "gpt-3.5-turbo",
            ProviderKind::Anthropic => "claude-3-haiku-20240307",
        }
    }
}

// ─── Provider ─────────────────────────────────────────────────────────────

/// One configured completion backend.
#[derive(Debug, Clone)]
pub struct Provider {
    pub kind: ProviderKind,
    /// Base URL without a trailing slash, e.g. `http://localhost:11434`.
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
}

impl Provider {
    pub fn new(kind: ProviderKind, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            kind,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: kind.default_model().to_string(),
            api_key,
        }
    }

    pub fn ollama(base_url: impl Into<String>) -> Self {
        Self::new(ProviderKind::Ollama, base_url, None)
    }

    pub fn openai(api_key: impl Into<String>) -> Self {
        Self::new(ProviderKind::OpenAi, OPENAI_URL, Some(api_key.into()))
    }

    pub fn anthropic(api_key: impl Into<String>) -> Self {
        Self::new(ProviderKind::Anthropic, ANTHROPIC_URL, Some(api_key.into()))
    }

    /// Point at a different server, keeping kind, model and key.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Send a short prompt and report whether the provider answered.
    pub async fn probe(&self, client: &reqwest::Client) -> bool {
        match self.request(client, "Hello", 10, PROBE_TIMEOUT).await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(provider = self.kind.key(), error = %e, "provider probe failed");
                false
            }
        }
    }

    /// Run one completion and return the generated text.
    pub async fn complete(&self, client: &reqwest::Client, prompt: &str) -> Result<String> {
        self.request(client, prompt, 500, CALL_TIMEOUT).await
    }

    async fn request(
        &self,
        client: &reqwest::Client,
        prompt: &str,
        max_tokens: u32,
        timeout: Duration,
    ) -> Result<String> {
        let provider = self.kind.key();
        let builder = match self.kind {
            ProviderKind::Ollama => client
                .post(format!("{}/api/generate", self.base_url))
                .json(&json!({
                    "model": self.model,
                    "prompt": prompt,
                    "stream": false,
                })),
            ProviderKind::OpenAi => client
                .post(format!("{}/v1/chat/completions", self.base_url))
                .bearer_auth(self.api_key.as_deref().unwrap_or_default())
                .json(&json!({
                    "model": self.model,
                    "messages": [{"role": "user", "content": prompt}],
                    "max_tokens": max_tokens,
                })),
            ProviderKind::Anthropic => client
                .post(format!("{}/v1/messages", self.base_url))
                .header("x-api-key", self.api_key.as_deref().unwrap_or_default())
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&json!({
                    "model": self.model,
                    "max_tokens": max_tokens,
                    "messages": [{"role": "user", "content": prompt}],
                })),
        };

        let resp = builder.timeout(timeout).send().await?;
        if !resp.status().is_success() {
            return Err(LlmError::Status {
                provider,
                status: resp.status().as_u16(),
            });
        }
        let body: Value = resp.json().await?;
        extract_text(self.kind, &body).ok_or_else(|| LlmError::MalformedResponse {
            provider,
            detail: truncate(&body.to_string(), 200),
        })
    }
}

/// Pull the generated text out of a provider response body.
fn extract_text(kind: ProviderKind, body: &Value) -> Option<String> {
    let text = match kind {
        ProviderKind::Ollama => body.get("response")?.as_str()?,
        ProviderKind::OpenAi => body
            .get("choices")?
            .get(0)?
            .get("message")?
            .get("content")?
            .as_str()?,
        ProviderKind::Anthropic => body.get("content")?.get(0)?.get("text")?.as_str()?,
    };
    Some(text.to_string())
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((i, _)) => format!("{}…", &s[..i]),
        None => s.to_string(),
    }
}

// ─── Selection ────────────────────────────────────────────────────────────

/// Providers in preference order. Those needing a missing key are skipped.
pub fn candidates(settings: &LlmSettings) -> Vec<Provider> {
    let mut out = vec![Provider::ollama(&settings.ollama_url)];
    match &settings.openai_api_key {
        Some(key) => out.push(Provider::openai(key)),
        None => tracing::debug!("OpenAI GPT skipped: OPENAI_API_KEY not set"),
    }
    match &settings.anthropic_api_key {
        Some(key) => out.push(Provider::anthropic(key)),
        None => tracing::debug!("Anthropic Claude skipped: ANTHROPIC_API_KEY not set"),
    }
    out
}

/// Probe `candidates` in order and return the first that responds.
pub async fn select_provider(
    client: &reqwest::Client,
    candidates: Vec<Provider>,
) -> Option<Provider> {
    for provider in candidates {
        if provider.probe(client).await {
            tracing::info!(provider = provider.kind.display_name(), model = %provider.model, "LLM provider ready");
            return Some(provider);
        }
        tracing::info!(provider = provider.kind.display_name(), "LLM provider not available");
    }
    tracing::warn!("no LLM provider available, using rule-based processing only");
    None
}
