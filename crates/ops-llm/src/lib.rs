//! `ops-llm`: optional language-model front end for the OPS Center chat.
//!
//! The chat path always works without a model. When a provider answers,
//! free text is sent to it first and any commands it names are executed;
//! otherwise callers fall back to the rule-based normalizer in `ops-core`.
//!
//! # Architecture
//!
//! ```text
//! LlmSettings (env)
//!     │
//!     ▼
//! candidates()      ← Ollama, then OpenAI / Anthropic when a key is set
//!     │
//!     ▼
//! select_provider() ← 5 s probe each, first responder wins
//!     │
//!     ▼
//! LlmProcessor      ← system prompt + message, 30 s call,
//!     │                bounded history of the last exchanges
//!     ▼
//! extract_commands  ← `[MCP_COMMAND: …]` markers, then phrase inference
//! ```

pub mod error;
pub mod processor;
pub mod provider;


pub use error::LlmError;
pub use processor::{
    extract_commands, system_prompt, Exchange, LlmProcessor, LlmReply, LlmStatus, LlmTurn,
    MAX_HISTORY,
};
pub use provider::{Provider, ProviderKind};

/// Convenience `Result` alias for this crate.
pub type Result<T> = std::result::Result<T, LlmError>;
