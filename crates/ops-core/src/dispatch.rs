//! Execute normalized chat commands against the store.
//!
//! Every outcome is a JSON object: successes carry a `type` tag naming the
//! result shape, failures carry a single `error` string. Nothing here
//! panics or propagates, so a bad command never tears down a chat session.

use serde_json::{json, Value};

use crate::command::{help_lines, Command, CommandError};
use crate::error::Result;
use crate::model::NewWorkbench;
use crate::store::Store;

/// Days of history used by the `stats` command.
pub const STATS_WINDOW_DAYS: i64 = 7;

/// Prompts offered to a freshly connected chat client.
pub const SUGGESTED_PROMPTS: &[&str] = &[
    "show me all agents",
    "list workbenches",
    "show roles 1",
    "make ashish a reviewer in workbench 1",
    "what roles does ashish have",
    "show role coverage",
    "create agent sarah",
    "create task for sarah \"review the onboarding queue\"",
];

/// Turn a normalizer failure into a chat result.
pub fn command_error(err: &CommandError) -> Value {
    json!({ "error": err.to_string() })
}

/// Run `command` on behalf of `user`.
pub fn execute(store: &Store, command: &Command, user: &str) -> Value {
    match run(store, command, user) {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!(action = command.action(), error = %e, "command failed");
            json!({ "error": e.to_string() })
        }
    }
}

fn run(store: &Store, command: &Command, user: &str) -> Result<Value> {
    let value = match command {
        Command::Help => json!({ "type": "help", "commands": help_lines() }),

        Command::ListAgents => json!({ "type": "agents", "data": store.list_agents(100)? }),

        Command::ListWorkbenches => {
            json!({ "type": "workbenches", "data": store.list_workbenches()? })
        }

        Command::WorkbenchRoles { workbench_id } => {
            match store.get_workbench_role_assignments(*workbench_id)? {
                Some(roles) => json!({ "type": "workbench_roles", "data": roles }),
                None => json!({ "error": format!("Workbench {workbench_id} not found") }),
            }
        }

        Command::AssignRole {
            agent,
            workbench_id,
            role,
        } => {
            if store.assign_workbench_role(agent, *workbench_id, *role, user)? {
                json!({
                    "type": "role_assignment",
                    "message": format!("Assigned {role} to {agent} in workbench {workbench_id}"),
                })
            } else {
                json!({ "error": "Role assignment failed (may already exist)" })
            }
        }

        Command::AgentRoles { agent } => json!({
            "type": "agent_roles",
            "agent": agent,
            "data": store.get_agent_workbench_roles(agent)?,
        }),

        Command::Coverage => json!({
            "type": "coverage_report",
            "data": store.get_workbench_coverage_report()?,
        }),

        Command::CreateAgent { name } => {
            let agent = store.create_agent(name, None, None)?;
            json!({
                "type": "agent_created",
                "message": format!("Agent '{}' created successfully", agent.name),
                "data": agent,
            })
        }

        Command::CreateWorkbench { name, description } => {
            let wb = store.create_workbench(NewWorkbench {
                name: name.clone(),
                description: description.clone(),
            })?;
            json!({
                "type": "workbench_created",
                "message": format!("Workbench '{}' created with id {}", wb.name, wb.id),
                "data": wb,
            })
        }

        Command::CreateTask { agent, description } => {
            let task = store.create_task_for_agent(agent, description, user)?;
            json!({
                "type": "task_created",
                "message": format!("Task {} created for {agent}", task.task_id),
                "description": description,
                "data": task,
            })
        }

        Command::Tasks { agent } => json!({
            "type": "tasks",
            "agent": agent,
            "data": store.tasks_for_agent(agent)?,
        }),

        Command::AssignTask {
            agent,
            task_id,
            workbench_id,
        } => json!({
            "type": "assignment",
            "data": store.assign_task(agent, *task_id, *workbench_id)?,
        }),

        Command::UpdateStatus {
            task_id,
            agent,
            status,
        } => json!({
            "type": "status_update",
            "data": store.update_task_status(*task_id, agent.as_deref(), status)?,
        }),

        Command::Stats { agent } => json!({
            "type": "stats",
            "agent": agent,
            "task_count": {
                "agent": agent,
                "completed_tasks": store.get_agent_task_count(agent, STATS_WINDOW_DAYS)?,
            },
            "avg_time": {
                "agent": agent,
                "average_completion_time_seconds": store.average_completion_time(agent)?,
            },
        }),

        Command::Greeting => json!({
            "type": "conversation",
            "message": format!("Hello {user}! Type 'help' to see what I can do."),
        }),
        Command::Thanks => json!({
            "type": "conversation",
            "message": "You're welcome!",
        }),
        Command::Goodbye => json!({
            "type": "conversation",
            "message": format!("Goodbye {user}!"),
        }),
        Command::SystemStatus => {
            let database = match store.health_check() {
                Ok(()) => "ok".to_string(),
                Err(e) => e.to_string(),
            };
            json!({ "type": "system_status", "database": database })
        }
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::normalize;
    use crate::store::test_store;

    fn say(store: &Store, text: &str) -> Value {
        match normalize(text) {
            Ok(cmd) => execute(store, &cmd, "tester"),
            Err(e) => command_error(&e),
        }
    }

    #[test]
    fn help_lists_commands() {
        let (_dir, store) = test_store();
        let out = say(&store, "help");
        assert_eq!(out["type"], "help");
        assert!(out["commands"].as_array().unwrap().len() > 10);
    }

    #[test]
    fn role_flow_through_chat() {
        let (_dir, store) = test_store();
        let out = say(&store, "create-workbench intake \"Intake queue\"");
        assert_eq!(out["type"], "workbench_created");
        let id = out["data"]["id"].as_i64().unwrap();

        let out = say(&store, &format!("make ashish a reviewer in workbench {id}"));
        assert_eq!(out["type"], "role_assignment", "{out}");

        let out = say(&store, &format!("assign-role ashish {id} Reviewer"));
        assert!(out["error"].as_str().unwrap().contains("may already exist"));

        let out = say(&store, &format!("roles {id}"));
        assert_eq!(out["type"], "workbench_roles");
        assert_eq!(out["data"]["roles"]["Reviewer"][0]["agent"], "ashish");
        assert_eq!(out["data"]["roles"]["Reviewer"][0]["assigned_by"], "tester");

        let out = say(&store, "coverage");
        assert_eq!(out["data"]["workbenches"][0]["coverage_percentage"], 25.0);
    }

    #[test]
    fn unknown_workbench_is_error_result() {
        let (_dir, store) = test_store();
        let out = say(&store, "roles 42");
        assert_eq!(out["error"], "Workbench 42 not found");
        assert!(out.get("type").is_none());
    }

    #[test]
    fn task_lifecycle() {
        let (_dir, store) = test_store();
        let out = say(&store, "create-task sarah \"triage inbox\"");
        assert_eq!(out["type"], "task_created");
        let task_id = out["data"]["task_id"].as_i64().unwrap();

        let out = say(&store, &format!("status {task_id} completed"));
        assert_eq!(out["type"], "status_update");
        assert_eq!(out["data"]["status"], "completed");

        let out = say(&store, "stats sarah");
        assert_eq!(out["task_count"]["completed_tasks"], 1);

        let out = say(&store, "tasks sarah");
        assert_eq!(out["data"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn errors_never_panic() {
        let (_dir, store) = test_store();
        assert_eq!(say(&store, "")["error"], "Empty command");
        assert!(say(&store, "status 999 done")["error"]
            .as_str()
            .unwrap()
            .contains("not found"));
        assert!(say(&store, "create-agent bob").get("type").is_some());
        assert!(say(&store, "create-agent bob")["error"]
            .as_str()
            .unwrap()
            .contains("already exists"));
    }

    #[test]
    fn conversational_and_status() {
        let (_dir, store) = test_store();
        assert_eq!(say(&store, "hello")["type"], "conversation");
        let out = say(&store, "status");
        assert_eq!(out["type"], "system_status");
        assert_eq!(out["database"], "ok");
    }
}
