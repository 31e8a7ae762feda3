use serde::{Deserialize, Serialize};

use crate::error::{OpsError, Result};

pub const DEFAULT_DATABASE_URL: &str = "sqlite:///./ops_center.db";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_MCP_SERVER_URL: &str = "http://localhost:8000";
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

// ---------------------------------------------------------------------------
// LlmSettings
// ---------------------------------------------------------------------------

/// Provider credentials and switches for the chat assistant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmSettings {
    pub enabled: bool,
    pub ollama_url: String,
    #[serde(skip_serializing)]
    pub openai_api_key: Option<String>,
    #[serde(skip_serializing)]
    pub anthropic_api_key: Option<String>,
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Process configuration, read from the environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub mcp_server_url: String,
    pub llm: LlmSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            mcp_server_url: DEFAULT_MCP_SERVER_URL.to_string(),
            llm: LlmSettings {
                enabled: true,
                ollama_url: DEFAULT_OLLAMA_URL.to_string(),
                openai_api_key: None,
                anthropic_api_key: None,
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let port = match get("PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| OpsError::Config(format!("PORT must be a port number, got '{raw}'")))?,
            None => defaults.port,
        };
        let enabled = match get("OPS_LLM_ENABLED") {
            Some(raw) => parse_flag(&raw)
                .ok_or_else(|| OpsError::Config(format!("OPS_LLM_ENABLED must be a boolean, got '{raw}'")))?,
            None => defaults.llm.enabled,
        };

        Ok(Self {
            database_url: get("DATABASE_URL").unwrap_or(defaults.database_url),
            host: get("HOST").unwrap_or(defaults.host),
            port,
            mcp_server_url: get("MCP_SERVER_URL").unwrap_or(defaults.mcp_server_url),
            llm: LlmSettings {
                enabled,
                ollama_url: get("OLLAMA_URL").unwrap_or(defaults.llm.ollama_url),
                openai_api_key: get("OPENAI_API_KEY"),
                anthropic_api_key: get("ANTHROPIC_API_KEY"),
            },
        })
    }

    /// `host:port` for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
