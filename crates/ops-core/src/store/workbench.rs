use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{get_ts, now_ts, Store};
use crate::error::{OpsError, Result};
use crate::model::{NewWorkbench, Workbench};

const WORKBENCH_COLUMNS: &str = "id, name, description, created_at, updated_at";

fn workbench_row(row: &Row<'_>) -> rusqlite::Result<Workbench> {
    Ok(Workbench {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        created_at: get_ts(row, 3)?,
        updated_at: get_ts(row, 4)?,
    })
}

pub(crate) fn fetch_workbench(conn: &Connection, id: i64) -> Result<Option<Workbench>> {
    Ok(conn
        .query_row(
            &format!("SELECT {WORKBENCH_COLUMNS} FROM workbench WHERE id = ?1"),
            params![id],
            workbench_row,
        )
        .optional()?)
}

impl Store {
    pub fn create_workbench(&self, new: NewWorkbench) -> Result<Workbench> {
        let name = new.name.trim();
        if name.is_empty() {
            return Err(OpsError::InvalidArgument(
                "workbench name must not be empty".into(),
            ));
        }
        let conn = self.conn()?;
        let taken = conn
            .query_row(
                "SELECT 1 FROM workbench WHERE name = ?1",
                params![name],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        if taken {
            return Err(OpsError::WorkbenchExists(name.to_string()));
        }
        let now = now_ts();
        conn.execute(
            "INSERT INTO workbench (name, description, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?3)",
            params![name, new.description, now],
        )?;
        let id = conn.last_insert_rowid();
        tracing::info!(workbench_id = id, name, "workbench created");
        fetch_workbench(&conn, id)?.ok_or(OpsError::WorkbenchNotFound(id))
    }

    pub fn list_workbenches(&self) -> Result<Vec<Workbench>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {WORKBENCH_COLUMNS} FROM workbench ORDER BY id"
        ))?;
        let rows = stmt.query_map([], workbench_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn get_workbench(&self, id: i64) -> Result<Workbench> {
        let conn = self.conn()?;
        fetch_workbench(&conn, id)?.ok_or(OpsError::WorkbenchNotFound(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_store;

    fn wb(name: &str) -> NewWorkbench {
        NewWorkbench {
            name: name.into(),
            description: Some(format!("{name} queue")),
        }
    }

    #[test]
    fn create_and_list() {
        let (_dir, store) = test_store();
        let a = store.create_workbench(wb("Disputes")).unwrap();
        store.create_workbench(wb("Refunds")).unwrap();
        assert_eq!(a.description.as_deref(), Some("Disputes queue"));
        let names: Vec<_> = store
            .list_workbenches()
            .unwrap()
            .into_iter()
            .map(|w| w.name)
            .collect();
        assert_eq!(names, vec!["Disputes", "Refunds"]);
        assert_eq!(store.get_workbench(a.id).unwrap().name, "Disputes");
    }

    #[test]
    fn duplicate_name_conflicts() {
        let (_dir, store) = test_store();
        store.create_workbench(wb("Disputes")).unwrap();
        assert!(matches!(
            store.create_workbench(wb("Disputes")),
            Err(OpsError::WorkbenchExists(_))
        ));
    }

    #[test]
    fn missing_workbench() {
        let (_dir, store) = test_store();
        assert!(matches!(
            store.get_workbench(9),
            Err(OpsError::WorkbenchNotFound(9))
        ));
    }
}
