//! `usertaskinfo` rows: assignment, status transitions, listing.

use chrono::Utc;
use rand::Rng;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{get_opt_ts, get_ts, now_ts, ts, Store};
use crate::error::{OpsError, Result};
use crate::model::{NewHistoryTaskInfo, NewUserTaskInfo, UserTaskInfo};
use crate::types::status;

pub(crate) const TASK_COLUMNS: &str =
    "id, agent, task_id, status, created_at, completed_at, process_instance_id, workbench_id";

pub(crate) fn task_row(row: &Row<'_>) -> rusqlite::Result<UserTaskInfo> {
    Ok(UserTaskInfo {
        id: row.get(0)?,
        agent: row.get(1)?,
        task_id: row.get(2)?,
        status: row.get(3)?,
        created_at: get_ts(row, 4)?,
        completed_at: get_opt_ts(row, 5)?,
        process_instance_id: row.get(6)?,
        workbench_id: row.get(7)?,
    })
}

/// Register `agent` if it is not known yet.
pub(crate) fn ensure_agent(conn: &Connection, agent: &str) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO agent (name, created_at) VALUES (?1, ?2)",
        params![agent, now_ts()],
    )?;
    Ok(())
}

fn fetch_task_row(conn: &Connection, id: i64) -> Result<UserTaskInfo> {
    conn.query_row(
        &format!("SELECT {TASK_COLUMNS} FROM usertaskinfo WHERE id = ?1"),
        params![id],
        task_row,
    )
    .map_err(OpsError::from)
}

fn insert_task(conn: &Connection, new: &NewUserTaskInfo) -> Result<UserTaskInfo> {
    let agent = new.agent.trim();
    if agent.is_empty() {
        return Err(OpsError::InvalidArgument("agent must not be empty".into()));
    }
    ensure_agent(conn, agent)?;
    let created = ts(&new.created_at.unwrap_or_else(Utc::now));
    let completed = new.completed_at.as_ref().map(ts);
    conn.execute(
        "INSERT INTO usertaskinfo
             (agent, task_id, status, created_at, completed_at, process_instance_id, workbench_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            agent,
            new.task_id,
            new.status,
            created,
            completed,
            new.process_instance_id,
            new.workbench_id,
        ],
    )?;
    fetch_task_row(conn, conn.last_insert_rowid())
}

/// Five-digit task id for tasks created without one.
pub fn generate_task_id() -> i64 {
    rand::thread_rng().gen_range(10_000..=99_999)
}

impl Store {
    /// Insert a raw task row. The agent is registered if unknown.
    pub fn create_user_task(&self, new: NewUserTaskInfo) -> Result<UserTaskInfo> {
        let conn = self.conn()?;
        insert_task(&conn, &new)
    }

    pub fn list_user_tasks(&self) -> Result<Vec<UserTaskInfo>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {TASK_COLUMNS} FROM usertaskinfo ORDER BY id"
        ))?;
        let rows = stmt.query_map([], task_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// All task rows for `agent`, oldest first.
    pub fn tasks_for_agent(&self, agent: &str) -> Result<Vec<UserTaskInfo>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {TASK_COLUMNS} FROM usertaskinfo WHERE agent = ?1 ORDER BY id"
        ))?;
        let rows = stmt.query_map(params![agent], task_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Assign `task_id` to `agent` with status `assigned`.
    pub fn assign_task(
        &self,
        agent: &str,
        task_id: i64,
        workbench_id: Option<i64>,
    ) -> Result<UserTaskInfo> {
        let task = self.create_user_task(NewUserTaskInfo {
            agent: agent.to_string(),
            task_id,
            status: status::ASSIGNED.to_string(),
            created_at: None,
            completed_at: None,
            process_instance_id: None,
            workbench_id,
        })?;
        tracing::debug!(agent, task_id, "task assigned");
        Ok(task)
    }

    /// Create a task with a generated id for `agent` and record its
    /// description as a `create` history event.
    pub fn create_task_for_agent(
        &self,
        agent: &str,
        description: &str,
        created_by: &str,
    ) -> Result<UserTaskInfo> {
        let task = self.assign_task(agent, generate_task_id(), None)?;
        self.create_history(NewHistoryTaskInfo {
            task_id: task.task_id,
            event_type: "create".into(),
            timestamp: Some(task.created_at),
            details: Some(serde_json::json!({
                "agent": agent,
                "description": description,
                "created_by": created_by,
            })),
        })?;
        Ok(task)
    }

    /// Update the status of the first row carrying `task_id`.
    ///
    /// `completed` stamps `completed_at`. When `agent` is given the task is
    /// reassigned to it.
    pub fn update_task_status(
        &self,
        task_id: i64,
        agent: Option<&str>,
        new_status: &str,
    ) -> Result<UserTaskInfo> {
        let conn = self.conn()?;
        let row_id: i64 = conn
            .query_row(
                "SELECT id FROM usertaskinfo WHERE task_id = ?1 ORDER BY id LIMIT 1",
                params![task_id],
                |r| r.get(0),
            )
            .optional()?
            .ok_or(OpsError::TaskNotFound(task_id))?;

        if let Some(agent) = agent.map(str::trim).filter(|a| !a.is_empty()) {
            ensure_agent(&conn, agent)?;
            conn.execute(
                "UPDATE usertaskinfo SET agent = ?1 WHERE id = ?2",
                params![agent, row_id],
            )?;
        }

        let completed_at = (new_status == status::COMPLETED).then(now_ts);
        if completed_at.is_some() {
            conn.execute(
                "UPDATE usertaskinfo SET status = ?1, completed_at = ?2 WHERE id = ?3",
                params![new_status, completed_at, row_id],
            )?;
        } else {
            conn.execute(
                "UPDATE usertaskinfo SET status = ?1 WHERE id = ?2",
                params![new_status, row_id],
            )?;
        }
        tracing::debug!(task_id, status = new_status, "task status updated");
        fetch_task_row(&conn, row_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_store;

    #[test]
    fn assign_registers_agent() {
        let (_dir, store) = test_store();
        let task = store.assign_task("ashish", 101, Some(1)).unwrap();
        assert_eq!(task.status, "assigned");
        assert_eq!(task.workbench_id, Some(1));
        assert!(store.agent_exists("ashish").unwrap());
    }

    #[test]
    fn empty_agent_rejected() {
        let (_dir, store) = test_store();
        assert!(matches!(
            store.assign_task("  ", 1, None),
            Err(OpsError::InvalidArgument(_))
        ));
    }

    #[test]
    fn completing_sets_completed_at() {
        let (_dir, store) = test_store();
        store.assign_task("ashish", 7, None).unwrap();
        let done = store.update_task_status(7, None, "completed").unwrap();
        assert_eq!(done.status, "completed");
        assert!(done.completed_at.is_some());
    }

    #[test]
    fn non_terminal_status_leaves_completed_at_empty() {
        let (_dir, store) = test_store();
        store.assign_task("ashish", 8, None).unwrap();
        let t = store.update_task_status(8, None, "in_progress").unwrap();
        assert_eq!(t.status, "in_progress");
        assert!(t.completed_at.is_none());
    }

    #[test]
    fn status_update_can_reassign() {
        let (_dir, store) = test_store();
        store.assign_task("ashish", 9, None).unwrap();
        let t = store
            .update_task_status(9, Some("ramesh"), "in_progress")
            .unwrap();
        assert_eq!(t.agent, "ramesh");
        assert!(store.agent_exists("ramesh").unwrap());
    }

    #[test]
    fn unknown_task_is_not_found() {
        let (_dir, store) = test_store();
        assert!(matches!(
            store.update_task_status(404, None, "completed"),
            Err(OpsError::TaskNotFound(404))
        ));
    }

    #[test]
    fn created_task_records_history() {
        let (_dir, store) = test_store();
        let task = store
            .create_task_for_agent("chitra", "review dispute 42", "chat")
            .unwrap();
        assert!((10_000..=99_999).contains(&task.task_id));
        let history = store.list_history_for_task(task.task_id).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(
            history[0].details.as_ref().unwrap()["description"],
            "review dispute 42"
        );
    }
}
