use std::collections::VecDeque;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use ops_core::command::COMMANDS;
use ops_core::config::LlmSettings;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::provider::{self, Provider, ProviderKind};
use crate::{LlmError, Result};

/// Number of exchanges kept for status reporting.
pub const MAX_HISTORY: usize = 10;

// ─── Types ────────────────────────────────────────────────────────────────

/// One user message and the assistant's reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exchange {
    pub user: String,
    pub assistant: String,
    pub timestamp: DateTime<Utc>,
    pub commands: Vec<String>,
}

/// Successful LLM turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmReply {
    pub response: String,
    /// Command strings found in the response, in explicit syntax.
    pub commands: Vec<String>,
    pub provider: ProviderKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmStatus {
    pub enabled: bool,
    pub provider: Option<ProviderKind>,
    pub provider_name: Option<String>,
    pub model: Option<String>,
    pub conversation_length: usize,
}

// ─── LlmProcessor ─────────────────────────────────────────────────────────

pub struct LlmProcessor {
    client: reqwest::Client,
    provider: Option<Provider>,
    history: VecDeque<Exchange>,
}

impl LlmProcessor {
    /// Probe the configured providers and keep the first that answers.
    ///
    /// With `settings.enabled == false` no network call is made and the
    /// processor reports itself unavailable.
    pub async fn connect(settings: &LlmSettings) -> Self {
        let client = reqwest::Client::new();
        let provider = if settings.enabled {
            provider::select_provider(&client, provider::candidates(settings)).await
        } else {
            tracing::info!("LLM integration disabled");
            None
        };
        Self {
            client,
            provider,
            history: VecDeque::new(),
        }
    }

    /// Use `provider` without probing.
    pub fn with_provider(provider: Option<Provider>) -> Self {
        Self {
            client: reqwest::Client::new(),
            provider,
            history: VecDeque::new(),
        }
    }

    pub fn is_available(&self) -> bool {
        self.provider.is_some()
    }

    pub fn history(&self) -> impl Iterator<Item = &Exchange> {
        self.history.iter()
    }

    /// Ask the provider about `message` and pull commands out of its answer.
    ///
    /// `context` is a short note about the previous command, if any.
    pub async fn process(&mut self, message: &str, context: Option<&str>) -> Result<LlmReply> {
        let reply = self.prepare(message, context)?.send().await?;
        self.record(message, &reply);
        Ok(reply)
    }

    /// Build the request for one turn without touching history.
    ///
    /// The returned [`LlmTurn`] owns everything the call needs, so a caller
    /// sharing the processor behind a lock can release it while the provider
    /// answers and come back to [`record`](Self::record) afterwards.
    pub fn prepare(&self, message: &str, context: Option<&str>) -> Result<LlmTurn> {
        let provider = self.provider.clone().ok_or(LlmError::NoProvider)?;

        let mut prompt = system_prompt();
        if let Some(ctx) = context.filter(|c| !c.is_empty()) {
            prompt.push_str(&format!("\nCONTEXT: {ctx}"));
        }
        prompt.push_str(&format!("\n\nUser: {message}\nAssistant:"));

        Ok(LlmTurn {
            client: self.client.clone(),
            provider,
            prompt,
        })
    }

    /// Append a finished exchange, dropping the oldest past [`MAX_HISTORY`].
    pub fn record(&mut self, message: &str, reply: &LlmReply) {
        self.history.push_back(Exchange {
            user: message.to_string(),
            assistant: reply.response.clone(),
            timestamp: Utc::now(),
            commands: reply.commands.clone(),
        });
        while self.history.len() > MAX_HISTORY {
            self.history.pop_front();
        }
    }

    pub fn status(&self) -> LlmStatus {
        LlmStatus {
            enabled: self.provider.is_some(),
            provider: self.provider.as_ref().map(|p| p.kind),
            provider_name: self
                .provider
                .as_ref()
                .map(|p| p.kind.display_name().to_string()),
            model: self.provider.as_ref().map(|p| p.model.clone()),
            conversation_length: self.history.len(),
        }
    }
}

// ─── LlmTurn ──────────────────────────────────────────────────────────────

/// A prepared request, detached from the processor that built it.
#[derive(Debug, Clone)]
pub struct LlmTurn {
    client: reqwest::Client,
    provider: Provider,
    prompt: String,
}

impl LlmTurn {
    pub async fn send(&self) -> Result<LlmReply> {
        let response = self.provider.complete(&self.client, &self.prompt).await?;
        let commands = extract_commands(&response);
        tracing::debug!(provider = self.provider.kind.key(), commands = ?commands, "LLM reply");
        Ok(LlmReply {
            response,
            commands,
            provider: self.provider.kind,
        })
    }
}

// ─── Prompt & extraction ──────────────────────────────────────────────────

/// Instructions sent ahead of every user message.
pub fn system_prompt() -> String {
    let mut out = String::from(
        "You are an AI assistant for OPS Center, a multi-agent coordination platform.\n\n\
         AVAILABLE COMMANDS:\n",
    );
    for (usage, desc) in COMMANDS {
        out.push_str(&format!("- {usage}: {desc}\n"));
    }
    out.push_str(
        "\nRESPONSE FORMAT:\n\
         Answer naturally. When an action is needed, include the exact command as \
         [MCP_COMMAND: <command>].\n\n\
         EXAMPLES:\n\
         User: \"How many agents do we have?\"\n\
         Response: \"Let me check the current agents for you. [MCP_COMMAND: agents]\"\n\n\
         User: \"Create an agent named Sarah\"\n\
         Response: \"I'll create a new agent named Sarah. [MCP_COMMAND: create-agent Sarah]\"\n",
    );
    out
}

fn marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\[MCP_COMMAND:\s*([^\]]+)\]").unwrap())
}

fn create_agent_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"create agent\s+(\w+)").unwrap())
}

/// Commands named in an LLM response.
///
/// Explicit `[MCP_COMMAND: …]` markers win. Without any, a few common
/// phrases are mapped to a single command.
pub fn extract_commands(response: &str) -> Vec<String> {
    let marked: Vec<String> = marker_re()
        .captures_iter(response)
        .map(|c| c[1].trim().to_string())
        .filter(|c| !c.is_empty())
        .collect();
    if !marked.is_empty() {
        return marked;
    }

    let lower = response.to_lowercase();
    if lower.contains("list agents") || lower.contains("show agents") {
        vec!["agents".into()]
    } else if lower.contains("list workbenches") || lower.contains("show workbenches") {
        vec!["workbenches".into()]
    } else if lower.contains("coverage") {
        vec!["coverage".into()]
    } else if let Some(c) = create_agent_re().captures(&lower) {
        vec![format!("create-agent {}", &c[1])]
    } else {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markers_are_extracted_in_order() {
        let got = extract_commands(
            "Sure. [MCP_COMMAND: agents] and then [mcp_command:  coverage ] done",
        );
        assert_eq!(got, vec!["agents", "coverage"]);
    }

    #[test]
    fn markers_shadow_phrase_inference() {
        let got = extract_commands("I could list agents, but [MCP_COMMAND: workbenches]");
        assert_eq!(got, vec!["workbenches"]);
    }

    #[test]
    fn phrase_inference() {
        assert_eq!(extract_commands("Let me show agents."), vec!["agents"]);
        assert_eq!(
            extract_commands("I will List Workbenches now"),
            vec!["workbenches"]
        );
        assert_eq!(
            extract_commands("Here is the role coverage."),
            vec!["coverage"]
        );
        assert_eq!(
            extract_commands("OK, create agent Sarah"),
            vec!["create-agent sarah"]
        );
        assert!(extract_commands("Nothing to do here.").is_empty());
    }

    #[test]
    fn system_prompt_lists_every_command() {
        let prompt = system_prompt();
        for (usage, _) in COMMANDS {
            assert!(prompt.contains(usage), "missing {usage}");
        }
        assert!(prompt.contains("[MCP_COMMAND:"));
    }

    #[tokio::test]
    async fn no_provider_is_an_error() {
        let mut llm = LlmProcessor::with_provider(None);
        assert!(!llm.is_available());
        let err = llm.process("hello", None).await.unwrap_err();
        assert!(matches!(err, LlmError::NoProvider));
        assert!(!llm.status().enabled);
    }

    #[tokio::test]
    async fn disabled_settings_skip_probing() {
        let settings = LlmSettings {
            enabled: false,
            ollama_url: "http://127.0.0.1:9".into(),
            openai_api_key: None,
            anthropic_api_key: None,
        };
        let llm = LlmProcessor::connect(&settings).await;
        assert!(!llm.is_available());
    }
}
