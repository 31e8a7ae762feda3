//! Chat connection manager.
//!
//! One [`ChatService`] lives for the whole process and is shared by the
//! WebSocket route and the `/api/command` fallback. It owns the registry of
//! open sockets and, when a provider answered at startup, the LLM session.
//! Every message goes through [`ChatService::handle`]: the LLM is asked
//! first, and the rule-based normalizer takes over whenever the model is
//! missing, fails, or names no runnable command.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use ops_core::command::{CommandError, Normalizer};
use ops_core::dispatch::{self, SUGGESTED_PROMPTS};
use ops_core::{Command, Store};
use ops_llm::{LlmProcessor, LlmStatus};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A chat frame or `/api/command` body.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub user: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConnectionInfo {
    pub id: Uuid,
    pub user_id: String,
    pub connected_at: DateTime<Utc>,
}

struct LlmSession {
    processor: LlmProcessor,
    /// Last command each user ran, handed to the model as context.
    last_command: HashMap<String, String>,
}

/// What the LLM made of a message.
enum LlmOutcome {
    /// Commands were found and normalized; run them.
    Commands {
        response: String,
        provider: &'static str,
        commands: Vec<(String, Result<Command, CommandError>)>,
    },
    /// The model answered but named nothing runnable.
    TextOnly(String),
}

// ---------------------------------------------------------------------------
// ChatService
// ---------------------------------------------------------------------------

pub struct ChatService {
    store: Store,
    normalizer: Normalizer,
    llm: Option<Mutex<LlmSession>>,
    connections: RwLock<HashMap<Uuid, ConnectionInfo>>,
}

impl ChatService {
    /// A processor without a provider is dropped here, so `llm.is_some()`
    /// always means a model is reachable.
    pub fn new(store: Store, llm: Option<LlmProcessor>) -> Self {
        let llm = llm.filter(LlmProcessor::is_available).map(|processor| {
            Mutex::new(LlmSession {
                processor,
                last_command: HashMap::new(),
            })
        });
        Self {
            store,
            normalizer: Normalizer::default(),
            llm,
            connections: RwLock::new(HashMap::new()),
        }
    }

    pub fn llm_available(&self) -> bool {
        self.llm.is_some()
    }

    pub async fn llm_status(&self) -> Option<LlmStatus> {
        match &self.llm {
            Some(llm) => Some(llm.lock().await.processor.status()),
            None => None,
        }
    }

    // ---- connection registry ------------------------------------------

    pub async fn register(&self, user_id: &str) -> Uuid {
        let info = ConnectionInfo {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            connected_at: Utc::now(),
        };
        let id = info.id;
        let mut conns = self.connections.write().await;
        conns.insert(id, info);
        tracing::info!(user_id, connection = %id, active = conns.len(), "chat client connected");
        id
    }

    pub async fn unregister(&self, id: Uuid) {
        let mut conns = self.connections.write().await;
        if let Some(info) = conns.remove(&id) {
            tracing::info!(user_id = %info.user_id, connection = %id, active = conns.len(), "chat client disconnected");
        }
    }

    pub async fn active_connections(&self) -> usize {
        self.connections.read().await.len()
    }

    pub async fn connections(&self) -> Vec<ConnectionInfo> {
        let mut out: Vec<_> = self.connections.read().await.values().cloned().collect();
        out.sort_by_key(|c| c.connected_at);
        out
    }

    // ---- frames -------------------------------------------------------

    /// First frame on a new socket.
    pub async fn welcome(&self, user_id: &str) -> Value {
        let store = self.store.clone();
        let database = tokio::task::spawn_blocking(move || store.health_check().is_ok())
            .await
            .unwrap_or(false);
        json!({
            "type": "system",
            "message": format!("Welcome {user_id}! Connected to OPS Center chat."),
            "timestamp": Utc::now(),
            "status": {
                "database": database,
                "llm_available": self.llm_available(),
                "active_connections": self.active_connections().await,
            },
        })
    }

    /// Second frame on a new socket.
    pub fn suggestions() -> Value {
        json!({ "type": "suggestions", "prompts": SUGGESTED_PROMPTS })
    }

    /// Parse a raw WebSocket text frame and answer it.
    pub async fn respond_frame(&self, raw: &str, user_id: &str) -> Value {
        match serde_json::from_str::<ChatRequest>(raw) {
            Ok(req) => self.respond(&req.message, user_id).await,
            Err(e) => envelope(
                user_id,
                raw,
                json!({ "error": format!("Invalid message frame: {e}") }),
            ),
        }
    }

    /// Answer `message` wrapped in a `response` envelope.
    pub async fn respond(&self, message: &str, user: &str) -> Value {
        let result = self.handle(message, user).await;
        envelope(user, message, result)
    }

    /// Process one message and return the bare result object.
    pub async fn handle(&self, message: &str, user: &str) -> Value {
        let message = message.trim();
        if message.is_empty() {
            return dispatch::command_error(&CommandError::Empty);
        }

        let llm_text = match self.ask_llm(message, user).await {
            Some(LlmOutcome::Commands {
                response,
                provider,
                commands,
            }) => return self.run_llm_commands(response, provider, commands, user).await,
            Some(LlmOutcome::TextOnly(text)) => Some(text),
            None => None,
        };

        match self.normalizer.normalize(message) {
            Ok(command) => {
                self.remember(user, &command).await;
                self.execute(command, user).await
            }
            Err(CommandError::Unknown(_)) if llm_text.is_some() => json!({
                "type": "llm_response",
                "response": llm_text,
                "commands": [],
                "results": [],
            }),
            Err(e) => dispatch::command_error(&e),
        }
    }

    /// The session lock is held only to build the request and to record the
    /// reply, never across the provider call.
    async fn ask_llm(&self, message: &str, user: &str) -> Option<LlmOutcome> {
        let llm = self.llm.as_ref()?;
        let turn = {
            let session = llm.lock().await;
            let context = session
                .last_command
                .get(user)
                .map(|c| format!("last command was '{c}'"));
            let turn = session.processor.prepare(message, context.as_deref());
            turn
        };
        let reply = match turn {
            Ok(turn) => turn.send().await,
            Err(e) => Err(e),
        };
        let reply = match reply {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(error = %e, "LLM processing failed, using rule-based processing");
                return None;
            }
        };

        let commands: Vec<_> = reply
            .commands
            .iter()
            .map(|raw| (raw.clone(), self.normalizer.normalize(raw)))
            .collect();
        let last_ok = commands
            .iter()
            .rev()
            .find_map(|(_, parsed)| parsed.as_ref().ok())
            .map(Command::canonical);

        {
            let mut session = llm.lock().await;
            session.processor.record(message, &reply);
            if let Some(canonical) = &last_ok {
                session
                    .last_command
                    .insert(user.to_string(), canonical.clone());
            }
        }

        match last_ok {
            Some(_) => Some(LlmOutcome::Commands {
                response: reply.response,
                provider: reply.provider.key(),
                commands,
            }),
            None => {
                tracing::debug!("LLM reply named no runnable command");
                Some(LlmOutcome::TextOnly(reply.response))
            }
        }
    }

    async fn run_llm_commands(
        &self,
        response: String,
        provider: &'static str,
        commands: Vec<(String, Result<Command, CommandError>)>,
        user: &str,
    ) -> Value {
        let mut names = Vec::with_capacity(commands.len());
        let mut results = Vec::with_capacity(commands.len());
        for (raw, parsed) in commands {
            let result = match parsed {
                Ok(command) => self.execute(command, user).await,
                Err(e) => dispatch::command_error(&e),
            };
            results.push(json!({ "command": raw, "result": result }));
            names.push(raw);
        }
        json!({
            "type": "llm_response",
            "response": response,
            "provider": provider,
            "commands": names,
            "results": results,
        })
    }

    async fn remember(&self, user: &str, command: &Command) {
        if let Some(llm) = &self.llm {
            llm.lock()
                .await
                .last_command
                .insert(user.to_string(), command.canonical());
        }
    }

    /// Run a command on the blocking pool.
    pub async fn execute(&self, command: Command, user: &str) -> Value {
        let store = self.store.clone();
        let owner = user.to_string();
        let system_status = command == Command::SystemStatus;
        let joined = tokio::task::spawn_blocking(move || {
            dispatch::execute(&store, &command, &owner)
        })
        .await;
        let mut value = match joined {
            Ok(value) => value,
            Err(e) => json!({ "error": format!("task join error: {e}") }),
        };

        if system_status {
            value["llm"] = serde_json::to_value(self.llm_status().await).unwrap_or(Value::Null);
            value["active_connections"] = json!(self.active_connections().await);
        }
        value
    }
}

fn envelope(user: &str, command: &str, result: Value) -> Value {
    json!({
        "type": "response",
        "user": user,
        "command": command,
        "result": result,
        "timestamp": Utc::now(),
    })
}
