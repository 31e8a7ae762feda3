use std::sync::OnceLock;

use regex::Regex;

use crate::command::{missing, Command, CommandError, Rule, Utterance};
use crate::types::{status, Role};

// ---------------------------------------------------------------------------
// Vocabulary
// ---------------------------------------------------------------------------

const ASSIGN_VERBS: &[&str] = &["assign", "make", "appoint", "give", "add", "set"];
const CREATE_VERBS: &[&str] = &["create", "add", "new", "register", "make"];
const ROLE_WORDS: &[&str] = &["role", "roles"];
const OWNER_KEYS: &[&str] = &["for", "of", "does", "has"];

/// Words that are never taken as a name.
const FILLER: &[&str] = &[
    "a", "an", "the", "as", "to", "in", "on", "for", "of", "at", "by", "with", "and", "from",
    "into", "is", "are", "be", "do", "does", "has", "have", "what", "which", "show", "list",
    "get", "all", "me", "please", "named", "called", "new", "role", "roles", "task", "tasks",
    "agent", "agents", "workbench", "workbenches", "id",
];

// ---------------------------------------------------------------------------
// Extraction helpers
// ---------------------------------------------------------------------------

static QUOTED_RE: OnceLock<Regex> = OnceLock::new();

fn quoted_re() -> &'static Regex {
    QUOTED_RE.get_or_init(|| Regex::new(r#""([^"]+)"|'([^']+)'"#).unwrap())
}

/// Every `"…"` or `'…'` span in `raw`, in order.
pub fn quoted_strings(raw: &str) -> Vec<String> {
    quoted_re()
        .captures_iter(raw)
        .filter_map(|c| c.get(1).or_else(|| c.get(2)))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn int_at(u: &Utterance, i: usize) -> Option<i64> {
    u.tokens.get(i).and_then(|t| t.parse().ok())
}

/// First integer anywhere in the input.
pub fn first_int(u: &Utterance) -> Option<i64> {
    (0..u.tokens.len()).find_map(|i| int_at(u, i))
}

/// First integer after the first occurrence of `word`.
fn int_after(u: &Utterance, word: &str) -> Option<i64> {
    let pos = u.position(word)?;
    (pos + 1..u.tokens.len()).find_map(|i| int_at(u, i))
}

fn role_at(u: &Utterance, i: usize) -> Option<Role> {
    let w = u.words.get(i)?.as_str();
    if w == "team" && u.words.get(i + 1).is_some_and(|n| n.starts_with("lead")) {
        return Some(Role::TeamLead);
    }
    let singular = w.strip_suffix('s').unwrap_or(w);
    match singular {
        "assessor" | "reviewer" | "viewer" | "teamlead" | "team-lead" | "team_lead" => {
            singular.parse().ok()
        }
        _ => None,
    }
}

/// First role phrase in the input; "team lead" may span two words.
pub fn find_role(u: &Utterance) -> Option<Role> {
    (0..u.words.len()).find_map(|i| role_at(u, i))
}

fn is_name_at(u: &Utterance, i: usize) -> bool {
    let Some(w) = u.words.get(i) else {
        return false;
    };
    !w.is_empty()
        && !FILLER.contains(&w.as_str())
        && role_at(u, i).is_none()
        && w != "lead"
        && int_at(u, i).is_none()
}

/// Index of the first name-like token after `idx`.
fn name_index_after(u: &Utterance, idx: usize) -> Option<usize> {
    (idx + 1..u.tokens.len()).find(|&i| is_name_at(u, i))
}

/// First name-like token after `idx`, original casing kept.
fn name_after(u: &Utterance, idx: usize) -> Option<String> {
    name_index_after(u, idx).map(|i| u.tokens[i].clone())
}

fn first_position(u: &Utterance, words: &[&str]) -> Option<usize> {
    u.words.iter().position(|w| words.contains(&w.as_str()))
}

/// Raw text from token `idx` onwards.
fn rest_from(u: &Utterance, idx: usize) -> Option<String> {
    let rest = u.raw_tokens.get(idx..)?.join(" ");
    let rest = rest.trim();
    (!rest.is_empty()).then(|| rest.to_string())
}

fn opens_quote(u: &Utterance, i: usize) -> bool {
    u.raw_tokens
        .get(i)
        .is_some_and(|t| t.starts_with(['"', '\'']))
}

fn is_explicit(u: &Utterance, action: &str) -> bool {
    u.first_word() == action
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

fn build_assign_role(u: &Utterance) -> Result<Command, CommandError> {
    let verb = if is_explicit(u, "assign-role") {
        Some(0)
    } else {
        first_position(u, ASSIGN_VERBS)
    };
    let agent = verb.and_then(|v| name_after(u, v));
    let workbench_id = int_after(u, "workbench").or_else(|| first_int(u));
    match (agent, workbench_id, find_role(u)) {
        (Some(agent), Some(workbench_id), Some(role)) => Ok(Command::AssignRole {
            agent,
            workbench_id,
            role,
        }),
        _ => Err(missing("assign-role")),
    }
}

fn build_agent_roles(u: &Utterance) -> Result<Command, CommandError> {
    let key = if is_explicit(u, "agent-roles") {
        Some(0)
    } else {
        first_position(u, OWNER_KEYS)
    };
    key.and_then(|k| name_after(u, k))
        .map(|agent| Command::AgentRoles { agent })
        .ok_or_else(|| missing("agent-roles"))
}

fn build_roles(u: &Utterance) -> Result<Command, CommandError> {
    first_int(u)
        .map(|workbench_id| Command::WorkbenchRoles { workbench_id })
        .ok_or_else(|| missing("roles"))
}

fn build_create_task(u: &Utterance) -> Result<Command, CommandError> {
    let key = if is_explicit(u, "create-task") {
        Some(0)
    } else {
        first_position(u, &["for", "to"])
    };
    let agent_idx = key
        .and_then(|k| name_index_after(u, k))
        .ok_or_else(|| missing("create-task"))?;
    let description = quoted_strings(&u.raw).into_iter().next().or_else(|| {
        let rest = rest_from(u, agent_idx + 1)?;
        let rest = rest.strip_prefix("to ").unwrap_or(&rest).trim().to_string();
        (!rest.is_empty()).then_some(rest)
    });
    match description {
        Some(description) => Ok(Command::CreateTask {
            agent: u.tokens[agent_idx].clone(),
            description,
        }),
        None => Err(missing("create-task")),
    }
}

fn build_create_workbench(u: &Utterance) -> Result<Command, CommandError> {
    let explicit = is_explicit(u, "create-workbench");
    let idx = if explicit {
        Some(0)
    } else {
        first_position(u, &["named", "called"]).or_else(|| u.position("workbench"))
    };
    let idx = idx.ok_or_else(|| missing("create-workbench"))?;
    let quoted = quoted_strings(&u.raw);

    if opens_quote(u, idx + 1) {
        let mut quoted = quoted.into_iter();
        let name = quoted.next().ok_or_else(|| missing("create-workbench"))?;
        return Ok(Command::CreateWorkbench {
            name,
            description: quoted.next(),
        });
    }

    let name_idx = name_index_after(u, idx).ok_or_else(|| missing("create-workbench"))?;
    let description = match quoted.into_iter().next() {
        Some(d) => Some(d),
        None if explicit => rest_from(u, name_idx + 1),
        None => None,
    };
    Ok(Command::CreateWorkbench {
        name: u.tokens[name_idx].clone(),
        description,
    })
}

fn build_create_agent(u: &Utterance) -> Result<Command, CommandError> {
    let idx = if is_explicit(u, "create-agent") {
        Some(0)
    } else {
        first_position(u, &["named", "called"]).or_else(|| u.position("agent"))
    };
    idx.and_then(|i| name_after(u, i))
        .map(|name| Command::CreateAgent { name })
        .ok_or_else(|| missing("create-agent"))
}

fn build_assign_task(u: &Utterance) -> Result<Command, CommandError> {
    let explicit = is_explicit(u, "assign") && u.words.get(1).map(String::as_str) != Some("task");
    let parsed = if explicit {
        let agent = u.tokens.get(1).filter(|t| !t.is_empty()).cloned();
        agent.zip(int_at(u, 2)).map(|(agent, task_id)| (agent, task_id, int_at(u, 3)))
    } else {
        let task_id = int_after(u, "task");
        let agent = u.position("to").and_then(|i| name_after(u, i));
        agent
            .zip(task_id)
            .map(|(agent, task_id)| (agent, task_id, int_after(u, "workbench")))
    };
    parsed
        .map(|(agent, task_id, workbench_id)| Command::AssignTask {
            agent,
            task_id,
            workbench_id,
        })
        .ok_or_else(|| missing("assign"))
}

fn is_known_status(s: &str) -> bool {
    [
        status::ASSIGNED,
        status::PENDING,
        status::IN_PROGRESS,
        status::COMPLETED,
    ]
    .contains(&s)
}

/// Explicit forms are `status <id> <status>` and `status <id> <agent> <status>`.
/// A multi-word status is read as one when it is quoted or when the word
/// after the id cannot be a name ("on hold", "in progress"). Otherwise that
/// word is the agent, so a status such as "blocked by legal" must be quoted
/// or joined with `_`.
fn build_update_status(u: &Utterance) -> Result<Command, CommandError> {
    if is_explicit(u, "status") {
        let task_id = int_at(u, 1).ok_or_else(|| missing("status"))?;
        if let Some(quoted) = quoted_strings(&u.raw).pop() {
            let agent = (u.tokens.len() > 2 && !opens_quote(u, 2)).then(|| u.tokens[2].clone());
            return Ok(Command::UpdateStatus {
                task_id,
                agent,
                status: status::normalize(&quoted),
            });
        }
        let whole = rest_from(u, 2)
            .map(|s| status::normalize(&s))
            .ok_or_else(|| missing("status"))?;
        if u.tokens.len() == 3 || is_known_status(&whole) || !is_name_at(u, 2) {
            return Ok(Command::UpdateStatus {
                task_id,
                agent: None,
                status: whole,
            });
        }
        let new_status = rest_from(u, 3).ok_or_else(|| missing("status"))?;
        return Ok(Command::UpdateStatus {
            task_id,
            agent: Some(u.tokens[2].clone()),
            status: status::normalize(&new_status),
        });
    }

    let task_id = int_after(u, "task").ok_or_else(|| missing("status"))?;
    let new_status = quoted_strings(&u.raw)
        .pop()
        .or_else(|| first_position(u, &["as", "to"]).and_then(|i| rest_from(u, i + 1)))
        .map(|s| status::normalize(&s))
        .ok_or_else(|| missing("status"))?;
    Ok(Command::UpdateStatus {
        task_id,
        agent: None,
        status: new_status,
    })
}

fn build_stats(u: &Utterance) -> Result<Command, CommandError> {
    let key = if is_explicit(u, "stats") {
        Some(0)
    } else {
        first_position(u, &["for", "of"])
            .or_else(|| first_position(u, &["stats", "statistics", "performance"]))
    };
    key.and_then(|k| name_after(u, k))
        .map(|agent| Command::Stats { agent })
        .ok_or_else(|| missing("stats"))
}

fn build_tasks(u: &Utterance) -> Result<Command, CommandError> {
    let key = if is_explicit(u, "tasks") {
        Some(0)
    } else {
        first_position(u, &["for", "of"])
    };
    key.and_then(|k| name_after(u, k))
        .map(|agent| Command::Tasks { agent })
        .ok_or_else(|| missing("tasks"))
}

// ---------------------------------------------------------------------------
// Default rule table
// ---------------------------------------------------------------------------

/// Rules in precedence order. Action rules come before conversational ones
/// so that "hi, list agents" lists agents.
pub fn default_rules() -> Vec<Rule> {
    vec![
        Rule {
            id: "help",
            action: "help",
            matches: |u| {
                u.first_word() == "help"
                    || u.lower == "?"
                    || u.has_word("commands")
                    || u.contains("what can you do")
            },
            build: |_| Ok(Command::Help),
        },
        Rule {
            id: "assign-role",
            action: "assign-role",
            matches: |u| {
                is_explicit(u, "assign-role")
                    || (find_role(u).is_some() && u.has_any(ASSIGN_VERBS))
            },
            build: build_assign_role,
        },
        Rule {
            id: "agent-roles",
            action: "agent-roles",
            matches: |u| {
                is_explicit(u, "agent-roles")
                    || (u.has_any(ROLE_WORDS)
                        && u.has_any(OWNER_KEYS)
                        && !u.has_word("workbench")
                        && first_int(u).is_none())
            },
            build: build_agent_roles,
        },
        Rule {
            id: "coverage",
            action: "coverage",
            matches: |u| {
                u.has_any(&["coverage", "gaps", "vacant", "vacancies"])
                    || u.contains("missing roles")
            },
            build: |_| Ok(Command::Coverage),
        },
        Rule {
            id: "roles",
            action: "roles",
            matches: |u| {
                is_explicit(u, "roles")
                    || u.has_any(ROLE_WORDS)
                    || (find_role(u).is_some() && u.has_word("workbench"))
            },
            build: build_roles,
        },
        Rule {
            id: "create-task",
            action: "create-task",
            matches: |u| {
                is_explicit(u, "create-task") || (u.has_any(CREATE_VERBS) && u.has_word("task"))
            },
            build: build_create_task,
        },
        Rule {
            id: "create-workbench",
            action: "create-workbench",
            matches: |u| {
                is_explicit(u, "create-workbench")
                    || (u.has_any(CREATE_VERBS) && u.has_word("workbench"))
            },
            build: build_create_workbench,
        },
        Rule {
            id: "create-agent",
            action: "create-agent",
            matches: |u| {
                is_explicit(u, "create-agent") || (u.has_any(CREATE_VERBS) && u.has_word("agent"))
            },
            build: build_create_agent,
        },
        Rule {
            id: "assign",
            action: "assign",
            matches: |u| {
                is_explicit(u, "assign") || (u.has_any(&["assign", "give"]) && u.has_word("task"))
            },
            build: build_assign_task,
        },
        Rule {
            id: "status",
            action: "status",
            matches: |u| {
                (is_explicit(u, "status") && u.tokens.len() > 1)
                    || (u.has_any(&["mark", "update", "set"]) && u.has_word("task"))
            },
            build: build_update_status,
        },
        Rule {
            id: "stats",
            action: "stats",
            matches: |u| u.has_any(&["stats", "statistics", "performance"]),
            build: build_stats,
        },
        Rule {
            id: "tasks",
            action: "tasks",
            matches: |u| {
                is_explicit(u, "tasks")
                    || (u.has_any(&["tasks", "task"]) && u.has_any(&["for", "of"]))
            },
            build: build_tasks,
        },
        Rule {
            id: "workbenches",
            action: "workbenches",
            matches: |u| u.has_any(&["workbenches", "workbench"]),
            build: |_| Ok(Command::ListWorkbenches),
        },
        Rule {
            id: "agents",
            action: "agents",
            matches: |u| u.has_any(&["agents", "agent"]) || u.contains("who is working"),
            build: |_| Ok(Command::ListAgents),
        },
        // Conversational
        Rule {
            id: "greeting",
            action: "greeting",
            matches: |u| {
                ["hi", "hello", "hey", "greetings", "howdy"].contains(&u.first_word())
                    || u.contains("good morning")
                    || u.contains("good afternoon")
                    || u.contains("good evening")
            },
            build: |_| Ok(Command::Greeting),
        },
        Rule {
            id: "thanks",
            action: "thanks",
            matches: |u| u.has_any(&["thanks", "thank", "thx", "ty"]),
            build: |_| Ok(Command::Thanks),
        },
        Rule {
            id: "goodbye",
            action: "goodbye",
            matches: |u| u.has_any(&["bye", "goodbye", "cya"]) || u.contains("see you"),
            build: |_| Ok(Command::Goodbye),
        },
        Rule {
            id: "system-status",
            action: "system-status",
            matches: |u| {
                u.words == ["status"]
                    || u.contains("system status")
                    || u.has_any(&["health", "ping"])
                    || u.contains("are you up")
                    || u.contains("how are you")
            },
            build: |_| Ok(Command::SystemStatus),
        },
    ]
}
