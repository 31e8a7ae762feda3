//! Free-text command normalization.
//!
//! Input is classified by walking an ordered table of [`Rule`]s; the first
//! rule whose predicate matches decides the action and extracts its
//! parameters. Precedence is exactly the table order in
//! [`crate::rules::default_rules`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::rules::default_rules;
use crate::types::Role;

// ---------------------------------------------------------------------------
// Command (output)
// ---------------------------------------------------------------------------

/// A fully parsed chat command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum Command {
    Help,
    #[serde(rename = "agents")]
    ListAgents,
    #[serde(rename = "workbenches")]
    ListWorkbenches,
    #[serde(rename = "roles")]
    WorkbenchRoles { workbench_id: i64 },
    AssignRole {
        agent: String,
        workbench_id: i64,
        role: Role,
    },
    AgentRoles { agent: String },
    Coverage,
    CreateAgent { name: String },
    CreateWorkbench {
        name: String,
        description: Option<String>,
    },
    CreateTask { agent: String, description: String },
    Tasks { agent: String },
    #[serde(rename = "assign")]
    AssignTask {
        agent: String,
        task_id: i64,
        workbench_id: Option<i64>,
    },
    #[serde(rename = "status")]
    UpdateStatus {
        task_id: i64,
        agent: Option<String>,
        status: String,
    },
    Stats { agent: String },
    Greeting,
    Thanks,
    Goodbye,
    SystemStatus,
}

impl Command {
    /// Canonical action name, as used in the rule table.
    pub fn action(&self) -> &'static str {
        match self {
            Command::Help => "help",
            Command::ListAgents => "agents",
            Command::ListWorkbenches => "workbenches",
            Command::WorkbenchRoles { .. } => "roles",
            Command::AssignRole { .. } => "assign-role",
            Command::AgentRoles { .. } => "agent-roles",
            Command::Coverage => "coverage",
            Command::CreateAgent { .. } => "create-agent",
            Command::CreateWorkbench { .. } => "create-workbench",
            Command::CreateTask { .. } => "create-task",
            Command::Tasks { .. } => "tasks",
            Command::AssignTask { .. } => "assign",
            Command::UpdateStatus { .. } => "status",
            Command::Stats { .. } => "stats",
            Command::Greeting => "greeting",
            Command::Thanks => "thanks",
            Command::Goodbye => "goodbye",
            Command::SystemStatus => "system-status",
        }
    }

    /// Conversational commands do not touch the database.
    pub fn is_conversational(&self) -> bool {
        matches!(
            self,
            Command::Greeting | Command::Thanks | Command::Goodbye | Command::SystemStatus
        )
    }

    /// Render back to explicit syntax.
    ///
    /// Normalizing the result yields `self` as long as every name is a single
    /// word outside the filler vocabulary ("the", "agents", "role", ...).
    /// Names that double as keywords, such as an agent called "coverage",
    /// still come back unchanged.
    pub fn canonical(&self) -> String {
        match self {
            Command::Help => "help".into(),
            Command::ListAgents => "agents".into(),
            Command::ListWorkbenches => "workbenches".into(),
            Command::WorkbenchRoles { workbench_id } => format!("roles {workbench_id}"),
            Command::AssignRole {
                agent,
                workbench_id,
                role,
            } => format!("assign-role {agent} {workbench_id} {role}"),
            Command::AgentRoles { agent } => format!("agent-roles {agent}"),
            Command::Coverage => "coverage".into(),
            Command::CreateAgent { name } => format!("create-agent {name}"),
            Command::CreateWorkbench { name, description } => {
                let name = if name.contains(char::is_whitespace) {
                    format!("\"{name}\"")
                } else {
                    name.clone()
                };
                match description {
                    Some(d) => format!("create-workbench {name} \"{d}\""),
                    None => format!("create-workbench {name}"),
                }
            }
            Command::CreateTask { agent, description } => {
                format!("create-task {agent} \"{description}\"")
            }
            Command::Tasks { agent } => format!("tasks {agent}"),
            Command::AssignTask {
                agent,
                task_id,
                workbench_id,
            } => match workbench_id {
                Some(wb) => format!("assign {agent} {task_id} {wb}"),
                None => format!("assign {agent} {task_id}"),
            },
            Command::UpdateStatus {
                task_id,
                agent,
                status,
            } => match agent {
                Some(agent) => format!("status {task_id} {agent} {status}"),
                None => format!("status {task_id} {status}"),
            },
            Command::Stats { agent } => format!("stats {agent}"),
            Command::Greeting => "hello".into(),
            Command::Thanks => "thanks".into(),
            Command::Goodbye => "goodbye".into(),
            Command::SystemStatus => "status".into(),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

// ---------------------------------------------------------------------------
// Errors and usage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CommandError {
    #[error("Empty command")]
    Empty,

    #[error("Unknown command: {0}. Type 'help' for available commands.")]
    Unknown(String),

    #[error("Missing argument for {action}. Usage: {usage}")]
    MissingArgument {
        action: &'static str,
        usage: &'static str,
    },
}

/// Explicit syntax of every command, with a short description.
pub const COMMANDS: &[(&str, &str)] = &[
    ("help", "Show available commands"),
    ("agents", "List all agents"),
    ("workbenches", "List all workbenches"),
    ("roles <workbench_id>", "Show workbench roles"),
    ("assign-role <agent> <workbench_id> <role>", "Assign workbench role"),
    ("agent-roles <agent>", "Show agent's roles"),
    ("coverage", "Show role coverage report"),
    ("create-agent <name>", "Create new agent"),
    ("create-workbench <name> [\"description\"]", "Create new workbench"),
    ("create-task <agent> \"<description>\"", "Create new task for an agent"),
    ("tasks <agent>", "Get tasks for agent"),
    ("assign <agent> <task_id> [workbench_id]", "Assign task to agent"),
    ("status <task_id> [agent] <status>", "Update task status"),
    ("stats <agent>", "Get agent statistics"),
];

/// Usage line for `action`, falling back to the action name itself.
pub fn usage(action: &str) -> &'static str {
    COMMANDS
        .iter()
        .map(|(u, _)| *u)
        .find(|u| u.split_whitespace().next() == Some(action))
        .unwrap_or("help")
}

/// Help lines in `usage - description` form.
pub fn help_lines() -> Vec<String> {
    COMMANDS
        .iter()
        .map(|(usage, desc)| format!("{usage} - {desc}"))
        .collect()
}

pub(crate) fn missing(action: &'static str) -> CommandError {
    CommandError::MissingArgument {
        action,
        usage: usage(action),
    }
}

// ---------------------------------------------------------------------------
// Utterance (input)
// ---------------------------------------------------------------------------

/// Pre-tokenized input shared by every rule.
///
/// `raw_tokens`, `tokens` and `words` are index-aligned: `tokens` strips
/// surrounding punctuation and keeps case, `words` is `tokens` lowercased.
#[derive(Debug, Clone)]
pub struct Utterance {
    pub raw: String,
    pub lower: String,
    pub raw_tokens: Vec<String>,
    pub tokens: Vec<String>,
    pub words: Vec<String>,
}

impl Utterance {
    pub fn new(input: &str) -> Self {
        let raw = input.trim().to_string();
        let raw_tokens: Vec<String> = raw.split_whitespace().map(str::to_string).collect();
        let tokens: Vec<String> = raw_tokens
            .iter()
            .map(|t| {
                t.trim_matches(|c: char| !(c.is_alphanumeric() || c == '-' || c == '_'))
                    .to_string()
            })
            .collect();
        let words = tokens.iter().map(|t| t.to_lowercase()).collect();
        Self {
            lower: raw.to_lowercase(),
            raw,
            raw_tokens,
            tokens,
            words,
        }
    }

    pub fn first_word(&self) -> &str {
        self.words.first().map(String::as_str).unwrap_or("")
    }

    pub fn has_word(&self, w: &str) -> bool {
        self.words.iter().any(|x| x == w)
    }

    pub fn has_any(&self, ws: &[&str]) -> bool {
        ws.iter().any(|w| self.has_word(w))
    }

    pub fn contains(&self, phrase: &str) -> bool {
        self.lower.contains(phrase)
    }

    pub fn position(&self, w: &str) -> Option<usize> {
        self.words.iter().position(|x| x == w)
    }
}

// ---------------------------------------------------------------------------
// Rule
// ---------------------------------------------------------------------------

/// One row of the normalization table.
pub struct Rule {
    pub id: &'static str,
    pub action: &'static str,
    pub matches: fn(&Utterance) -> bool,
    pub build: fn(&Utterance) -> Result<Command, CommandError>,
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("id", &self.id)
            .field("action", &self.action)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Normalizer
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct Normalizer {
    rules: Vec<Rule>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(default_rules())
    }
}

impl Normalizer {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// The rule `normalize` would apply to `input`.
    pub fn classify(&self, input: &str) -> Option<&Rule> {
        self.select(&Utterance::new(input))
    }

    /// Explicit syntax that renders back to the input verbatim wins over
    /// table order. Anything else goes to the first matching rule.
    fn select(&self, u: &Utterance) -> Option<&Rule> {
        self.explicit_rule(u)
            .or_else(|| self.rules.iter().find(|r| (r.matches)(u)))
    }

    fn explicit_rule(&self, u: &Utterance) -> Option<&Rule> {
        let rule = self
            .rules
            .iter()
            .find(|r| r.action == u.first_word() && (r.matches)(u))?;
        let command = (rule.build)(u).ok()?;
        (command.canonical() == u.raw_tokens.join(" ")).then_some(rule)
    }

    pub fn normalize(&self, input: &str) -> Result<Command, CommandError> {
        let u = Utterance::new(input);
        if u.tokens.is_empty() {
            return Err(CommandError::Empty);
        }
        match self.select(&u) {
            Some(rule) => {
                tracing::debug!(rule = rule.id, input = %u.raw, "command matched");
                (rule.build)(&u)
            }
            None => Err(CommandError::Unknown(u.first_word().to_string())),
        }
    }
}

/// Normalize with the default rule table.
pub fn normalize(input: &str) -> Result<Command, CommandError> {
    Normalizer::default().normalize(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input() {
        assert_eq!(normalize("   "), Err(CommandError::Empty));
    }

    #[test]
    fn unknown_input_names_first_word() {
        let err = normalize("frobnicate the widgets").unwrap_err();
        assert_eq!(err, CommandError::Unknown("frobnicate".into()));
        assert!(err.to_string().contains("Type 'help'"));
    }

    #[test]
    fn utterance_alignment() {
        let u = Utterance::new("Assign \"Ashish,\" task #12!");
        assert_eq!(u.tokens, vec!["Assign", "Ashish", "task", "12"]);
        assert_eq!(u.words[1], "ashish");
        assert_eq!(u.raw_tokens.len(), u.words.len());
    }

    #[test]
    fn usage_lookup() {
        assert_eq!(usage("roles"), "roles <workbench_id>");
        assert_eq!(usage("assign"), "assign <agent> <task_id> [workbench_id]");
        assert_eq!(usage("nope"), "help");
    }

    #[test]
    fn command_serializes_with_action_tag() {
        let json = serde_json::to_value(Command::WorkbenchRoles { workbench_id: 3 }).unwrap();
        assert_eq!(json["action"], "roles");
        assert_eq!(json["workbench_id"], 3);
        let json = serde_json::to_value(Command::AssignRole {
            agent: "ashish".into(),
            workbench_id: 1,
            role: Role::TeamLead,
        })
        .unwrap();
        assert_eq!(json["action"], "assign-role");
        assert_eq!(json["role"], "Team Lead");
    }

    #[test]
    fn canonical_forms_normalize_back() {
        let commands = [
            Command::WorkbenchRoles { workbench_id: 3 },
            Command::AssignRole {
                agent: "Ashish".into(),
                workbench_id: 1,
                role: Role::TeamLead,
            },
            Command::CreateWorkbench {
                name: "Account Holder".into(),
                description: Some("Manage accounts".into()),
            },
            Command::CreateTask {
                agent: "chitra".into(),
                description: "review dispute 42".into(),
            },
            Command::AssignTask {
                agent: "ramesh".into(),
                task_id: 1234,
                workbench_id: Some(2),
            },
            Command::UpdateStatus {
                task_id: 1234,
                agent: None,
                status: "completed".into(),
            },
            Command::SystemStatus,
        ];
        for cmd in commands {
            assert_eq!(normalize(&cmd.canonical()).unwrap(), cmd, "{cmd}");
        }
    }

    #[test]
    fn keyword_names_survive_canonical_form() {
        let commands = [
            Command::Tasks {
                agent: "coverage".into(),
            },
            Command::Stats {
                agent: "vacancies".into(),
            },
            Command::CreateAgent {
                name: "coverage".into(),
            },
            Command::AgentRoles {
                agent: "gaps".into(),
            },
            Command::AssignTask {
                agent: "coverage".into(),
                task_id: 4,
                workbench_id: Some(2),
            },
        ];
        for cmd in commands {
            assert_eq!(normalize(&cmd.canonical()).unwrap(), cmd, "{cmd}");
        }

        let normalizer = Normalizer::default();
        assert_eq!(normalizer.classify("tasks coverage").unwrap().id, "tasks");
        // Free-form phrasing keeps table order.
        assert_eq!(normalize("show coverage tasks").unwrap(), Command::Coverage);
        assert_eq!(normalizer.classify("agents and workbenches").unwrap().id, "workbenches");
    }
}
