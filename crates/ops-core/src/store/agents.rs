//! Agents and per-agent task analytics.

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::tasks::{ensure_agent, generate_task_id, task_row, TASK_COLUMNS};
use super::{get_ts, now_ts, ts, Store};
use crate::error::{OpsError, Result};
use crate::model::{Agent, UserTaskInfo};
use crate::types::status;

/// Names of known agents plus the total count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentList {
    pub agents: Vec<String>,
    pub total_agents: usize,
}

/// Per-agent totals used by `list_all_agents`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSummary {
    pub agent_name: String,
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub completion_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentTask {
    pub task_id: i64,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentInfo {
    pub agent: String,
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub in_progress_tasks: usize,
    pub assigned_tasks: usize,
    pub completion_rate: f64,
    pub most_recent_task: Option<RecentTask>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentStats {
    pub agent: String,
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub completion_rate: f64,
    pub average_completion_time_seconds: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSummary {
    pub total_tasks_all_agents: usize,
    pub total_completed_all_agents: usize,
    pub overall_completion_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentStatsReport {
    pub period_days: i64,
    pub total_agents: usize,
    pub agents: Vec<AgentStats>,
    pub summary: StatsSummary,
}

/// Completed-task count for one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedCount {
    pub agent: String,
    pub completed_tasks: usize,
}

/// Percentage rounded to two decimals; zero when `total` is zero.
pub fn completion_rate(completed: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (completed as f64 / total as f64 * 10_000.0).round() / 100.0
}

fn count_status(tasks: &[UserTaskInfo], wanted: &str) -> usize {
    tasks.iter().filter(|t| t.status == wanted).count()
}

/// Mean of `completed_at - created_at` over completed tasks, in seconds.
fn mean_completion_seconds(tasks: &[UserTaskInfo]) -> f64 {
    let durations: Vec<f64> = tasks
        .iter()
        .filter(|t| t.status == status::COMPLETED)
        .filter_map(|t| t.completed_at.map(|done| done - t.created_at))
        .map(|d| d.num_milliseconds() as f64 / 1000.0)
        .collect();
    if durations.is_empty() {
        0.0
    } else {
        durations.iter().sum::<f64>() / durations.len() as f64
    }
}

impl Store {
    /// Register a new agent. With `task_id` (or a generated one when a
    /// workbench is given) an initial assigned task is created too.
    pub fn create_agent(
        &self,
        name: &str,
        task_id: Option<i64>,
        workbench_id: Option<i64>,
    ) -> Result<Agent> {
        let name = name.trim();
        if name.is_empty() {
            return Err(OpsError::InvalidArgument("agent name must not be empty".into()));
        }
        if self.agent_exists(name)? {
            return Err(OpsError::AgentExists(name.to_string()));
        }
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO agent (name, created_at) VALUES (?1, ?2)",
            params![name, now_ts()],
        )?;
        let agent = conn.query_row(
            "SELECT id, name, created_at FROM agent WHERE id = ?1",
            params![conn.last_insert_rowid()],
            |row| {
                Ok(Agent {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    created_at: get_ts(row, 2)?,
                })
            },
        )?;
        drop(conn);

        let initial = match (task_id, workbench_id) {
            (Some(id), _) => Some(id),
            (None, Some(_)) => Some(generate_task_id()),
            (None, None) => None,
        };
        if let Some(task_id) = initial {
            self.assign_task(name, task_id, workbench_id)?;
        }
        tracing::info!(agent = name, "agent created");
        Ok(agent)
    }

    pub fn agent_exists(&self, name: &str) -> Result<bool> {
        let conn = self.conn()?;
        let found = conn
            .query_row(
                "SELECT 1 FROM agent WHERE name = ?1",
                params![name],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Agent names in alphabetical order, at most `limit`.
    pub fn list_agents(&self, limit: usize) -> Result<AgentList> {
        let conn = self.conn()?;
        let total: i64 = conn.query_row("SELECT COUNT(*) FROM agent", [], |r| r.get(0))?;
        let mut stmt = conn.prepare("SELECT name FROM agent ORDER BY name LIMIT ?1")?;
        let rows = stmt.query_map(params![limit as i64], |r| r.get::<_, String>(0))?;
        let agents = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(AgentList {
            agents,
            total_agents: total as usize,
        })
    }

    pub fn list_agent_rows(&self) -> Result<Vec<Agent>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT id, name, created_at FROM agent ORDER BY name")?;
        let rows = stmt.query_map([], |row| {
            Ok(Agent {
                id: row.get(0)?,
                name: row.get(1)?,
                created_at: get_ts(row, 2)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Every agent with lifetime totals.
    pub fn list_all_agents(&self) -> Result<Vec<AgentSummary>> {
        let mut out = Vec::new();
        for agent in self.list_agent_rows()? {
            let tasks = self.tasks_for_agent(&agent.name)?;
            let completed = count_status(&tasks, status::COMPLETED);
            out.push(AgentSummary {
                completion_rate: completion_rate(completed, tasks.len()),
                agent_name: agent.name,
                total_tasks: tasks.len(),
                completed_tasks: completed,
            });
        }
        Ok(out)
    }

    pub fn get_agent_info(&self, agent: &str) -> Result<AgentInfo> {
        if !self.agent_exists(agent)? {
            return Err(OpsError::AgentNotFound(agent.to_string()));
        }
        let tasks = self.tasks_for_agent(agent)?;
        let completed = count_status(&tasks, status::COMPLETED);
        let most_recent_task = tasks
            .iter()
            .max_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)))
            .map(|t| RecentTask {
                task_id: t.task_id,
                status: t.status.clone(),
                created_at: t.created_at,
                completed_at: t.completed_at,
            });
        Ok(AgentInfo {
            agent: agent.to_string(),
            total_tasks: tasks.len(),
            completed_tasks: completed,
            in_progress_tasks: count_status(&tasks, status::IN_PROGRESS),
            assigned_tasks: count_status(&tasks, status::ASSIGNED),
            completion_rate: completion_rate(completed, tasks.len()),
            most_recent_task,
        })
    }

    /// Per-agent statistics over tasks created in the last `days` days.
    /// Agents without activity in the window are omitted.
    pub fn get_agent_stats(&self, days: i64) -> Result<AgentStatsReport> {
        let since = ts(&window_start(days)?);
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {TASK_COLUMNS} FROM usertaskinfo WHERE created_at >= ?1 ORDER BY agent, id"
        ))?;
        let rows = stmt.query_map(params![since], task_row)?;
        let tasks = rows.collect::<rusqlite::Result<Vec<_>>>()?;

        let mut agents: Vec<AgentStats> = Vec::new();
        for chunk in tasks.chunk_by(|a, b| a.agent == b.agent) {
            let completed = count_status(chunk, status::COMPLETED);
            agents.push(AgentStats {
                agent: chunk[0].agent.clone(),
                total_tasks: chunk.len(),
                completed_tasks: completed,
                completion_rate: completion_rate(completed, chunk.len()),
                average_completion_time_seconds: mean_completion_seconds(chunk),
            });
        }

        let total_tasks: usize = agents.iter().map(|a| a.total_tasks).sum();
        let total_completed: usize = agents.iter().map(|a| a.completed_tasks).sum();
        Ok(AgentStatsReport {
            period_days: days,
            total_agents: agents.len(),
            summary: StatsSummary {
                total_tasks_all_agents: total_tasks,
                total_completed_all_agents: total_completed,
                overall_completion_rate: completion_rate(total_completed, total_tasks),
            },
            agents,
        })
    }

    /// Tasks `agent` completed within the last `days` days.
    pub fn get_agent_task_count(&self, agent: &str, days: i64) -> Result<usize> {
        let since = ts(&window_start(days)?);
        let conn = self.conn()?;
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM usertaskinfo
             WHERE agent = ?1 AND status = ?2 AND completed_at >= ?3",
            params![agent, status::COMPLETED, since],
            |r| r.get(0),
        )?;
        Ok(n as usize)
    }

    /// Most recently completed tasks for `agent`.
    pub fn list_recent_tasks(&self, agent: &str, limit: usize) -> Result<Vec<UserTaskInfo>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {TASK_COLUMNS} FROM usertaskinfo
             WHERE agent = ?1 AND status = ?2
             ORDER BY completed_at DESC LIMIT ?3"
        ))?;
        let rows = stmt.query_map(params![agent, status::COMPLETED, limit as i64], task_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Mean seconds from creation to completion; zero with no completions.
    pub fn average_completion_time(&self, agent: &str) -> Result<f64> {
        Ok(mean_completion_seconds(&self.tasks_for_agent(agent)?))
    }

    /// Completed task counts grouped by agent, busiest first.
    pub fn completed_by_agent(&self) -> Result<Vec<CompletedCount>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT agent, COUNT(*) FROM usertaskinfo
             WHERE status = ?1
             GROUP BY agent ORDER BY COUNT(*) DESC, agent",
        )?;
        let rows = stmt.query_map(params![status::COMPLETED], |r| {
            Ok(CompletedCount {
                agent: r.get(0)?,
                completed_tasks: r.get::<_, i64>(1)? as usize,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Make sure `agent` is registered without touching its tasks.
    pub fn register_agent(&self, agent: &str) -> Result<()> {
        let conn = self.conn()?;
        ensure_agent(&conn, agent.trim())
    }
}

/// Start of a look-back window of `days` days ending now. Negative counts
/// are treated as zero.
fn window_start(days: i64) -> Result<DateTime<Utc>> {
    Duration::try_days(days.max(0))
        .and_then(|span| Utc::now().checked_sub_signed(span))
        .ok_or_else(|| OpsError::InvalidArgument(format!("days out of range: {days}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_store;

    #[test]
    fn create_agent_rejects_duplicates() {
        let (_dir, store) = test_store();
        store.create_agent("ashish", None, None).unwrap();
        assert!(matches!(
            store.create_agent("ashish", None, None),
            Err(OpsError::AgentExists(_))
        ));
    }

    #[test]
    fn create_agent_writes_no_task_rows_by_default() {
        let (_dir, store) = test_store();
        store.create_agent("ashish", None, None).unwrap();
        assert!(store.tasks_for_agent("ashish").unwrap().is_empty());
        assert_eq!(store.list_agents(100).unwrap().total_agents, 1);
    }

    #[test]
    fn create_agent_with_initial_task() {
        let (_dir, store) = test_store();
        store.create_agent("ramesh", Some(555), Some(2)).unwrap();
        let tasks = store.tasks_for_agent("ramesh").unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].task_id, 555);
        assert_eq!(tasks[0].workbench_id, Some(2));
    }

    #[test]
    fn list_agents_respects_limit() {
        let (_dir, store) = test_store();
        for name in ["c", "a", "b"] {
            store.create_agent(name, None, None).unwrap();
        }
        let list = store.list_agents(2).unwrap();
        assert_eq!(list.agents, vec!["a", "b"]);
        assert_eq!(list.total_agents, 3);
    }

    #[test]
    fn agent_info_counts_statuses() {
        let (_dir, store) = test_store();
        store.assign_task("ashish", 1, None).unwrap();
        store.assign_task("ashish", 2, None).unwrap();
        store.assign_task("ashish", 3, None).unwrap();
        store.update_task_status(1, None, "completed").unwrap();
        store.update_task_status(2, None, "in_progress").unwrap();

        let info = store.get_agent_info("ashish").unwrap();
        assert_eq!(info.total_tasks, 3);
        assert_eq!(info.completed_tasks, 1);
        assert_eq!(info.in_progress_tasks, 1);
        assert_eq!(info.assigned_tasks, 1);
        assert_eq!(info.completion_rate, 33.33);
        assert_eq!(info.most_recent_task.unwrap().task_id, 3);
    }

    #[test]
    fn agent_info_unknown_is_not_found() {
        let (_dir, store) = test_store();
        assert!(store.get_agent_info("nobody").unwrap_err().is_not_found());
    }

    #[test]
    fn stats_summarize_window() {
        let (_dir, store) = test_store();
        store.assign_task("a", 1, None).unwrap();
        store.assign_task("a", 2, None).unwrap();
        store.assign_task("b", 3, None).unwrap();
        store.update_task_status(1, None, "completed").unwrap();

        let report = store.get_agent_stats(7).unwrap();
        assert_eq!(report.total_agents, 2);
        assert_eq!(report.summary.total_tasks_all_agents, 3);
        assert_eq!(report.summary.total_completed_all_agents, 1);
        assert_eq!(report.agents[0].agent, "a");
        assert_eq!(report.agents[0].completion_rate, 50.0);
    }

    #[test]
    fn recent_and_counted_completions() {
        let (_dir, store) = test_store();
        store.assign_task("a", 1, None).unwrap();
        store.assign_task("a", 2, None).unwrap();
        store.update_task_status(1, None, "completed").unwrap();

        assert_eq!(store.get_agent_task_count("a", 3).unwrap(), 1);
        let recent = store.list_recent_tasks("a", 5).unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].task_id, 1);
        assert!(store.average_completion_time("a").unwrap() >= 0.0);
        assert_eq!(store.average_completion_time("nobody").unwrap(), 0.0);
    }

    #[test]
    fn all_agents_and_performance() {
        let (_dir, store) = test_store();
        store.create_agent("idle", None, None).unwrap();
        store.assign_task("busy", 1, None).unwrap();
        store.update_task_status(1, None, "completed").unwrap();

        let all = store.list_all_agents().unwrap();
        assert_eq!(all.len(), 2);
        let busy = all.iter().find(|a| a.agent_name == "busy").unwrap();
        assert_eq!(busy.completion_rate, 100.0);

        let perf = store.completed_by_agent().unwrap();
        assert_eq!(perf, vec![CompletedCount { agent: "busy".into(), completed_tasks: 1 }]);
    }

    #[test]
    fn completion_rate_rounds() {
        assert_eq!(completion_rate(0, 0), 0.0);
        assert_eq!(completion_rate(2, 3), 66.67);
    }

    #[test]
    fn oversized_window_is_rejected() {
        let (_dir, store) = test_store();
        assert!(matches!(
            store.get_agent_task_count("ashish", 1_000_000_000),
            Err(OpsError::InvalidArgument(_))
        ));
        assert!(matches!(
            store.get_agent_stats(i64::MAX),
            Err(OpsError::InvalidArgument(_))
        ));
        assert_eq!(store.get_agent_task_count("ashish", -5).unwrap(), 0);
        assert_eq!(store.get_agent_stats(36_500).unwrap().total_agents, 0);
    }
}
