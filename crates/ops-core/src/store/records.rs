//! Plain CRUD tables: tenants, tags, task-queue mappings, task history.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{get_opt_json, get_ts, json_text, now_ts, ts, Store};
use crate::error::{OpsError, Result};
use crate::model::{
    HistoryTaskInfo, NewHistoryTaskInfo, NewTag, NewTaskQueueMapping, NewTenant, Tag,
    TaskQueueMapping, Tenant,
};

const TENANT_COLUMNS: &str = "id, name, created_at, updated_at";
const TAG_COLUMNS: &str = "id, tenant_id, tag_name, tag_info, created_at, updated_at";
const MAPPING_COLUMNS: &str =
    "id, tenant_id, workbench_id, task_id, queue_id, potential_queue_id, criteria, attributes";
const HISTORY_COLUMNS: &str = "id, task_id, event_type, timestamp, details";

fn tenant_row(row: &Row<'_>) -> rusqlite::Result<Tenant> {
    Ok(Tenant {
        id: row.get(0)?,
        name: row.get(1)?,
        created_at: get_ts(row, 2)?,
        updated_at: get_ts(row, 3)?,
    })
}

fn fetch_tenant(conn: &Connection, id: i64) -> Result<Tenant> {
    conn.query_row(
        &format!("SELECT {TENANT_COLUMNS} FROM tenant WHERE id = ?1"),
        params![id],
        tenant_row,
    )
    .optional()?
    .ok_or(OpsError::TenantNotFound(id))
}

fn tag_row(row: &Row<'_>) -> rusqlite::Result<Tag> {
    Ok(Tag {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        tag_name: row.get(2)?,
        tag_info: get_opt_json(row, 3)?,
        created_at: get_ts(row, 4)?,
        updated_at: get_ts(row, 5)?,
    })
}

fn mapping_row(row: &Row<'_>) -> rusqlite::Result<TaskQueueMapping> {
    Ok(TaskQueueMapping {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        workbench_id: row.get(2)?,
        task_id: row.get(3)?,
        queue_id: row.get(4)?,
        potential_queue_id: row.get(5)?,
        criteria: get_opt_json(row, 6)?,
        attributes: get_opt_json(row, 7)?,
    })
}

fn history_row(row: &Row<'_>) -> rusqlite::Result<HistoryTaskInfo> {
    Ok(HistoryTaskInfo {
        id: row.get(0)?,
        task_id: row.get(1)?,
        event_type: row.get(2)?,
        timestamp: get_ts(row, 3)?,
        details: get_opt_json(row, 4)?,
    })
}

impl Store {
    // -----------------------------------------------------------------------
    // Tenants
    // -----------------------------------------------------------------------

    pub fn create_tenant(&self, new: NewTenant) -> Result<Tenant> {
        let conn = self.conn()?;
        let now = now_ts();
        conn.execute(
            "INSERT INTO tenant (name, created_at, updated_at) VALUES (?1, ?2, ?2)",
            params![new.name, now],
        )?;
        fetch_tenant(&conn, conn.last_insert_rowid())
    }

    pub fn list_tenants(&self) -> Result<Vec<Tenant>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!("SELECT {TENANT_COLUMNS} FROM tenant ORDER BY id"))?;
        let rows = stmt.query_map([], tenant_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn get_tenant(&self, id: i64) -> Result<Tenant> {
        let conn = self.conn()?;
        fetch_tenant(&conn, id)
    }

    // -----------------------------------------------------------------------
    // Tags
    // -----------------------------------------------------------------------

    pub fn create_tag(&self, new: NewTag) -> Result<Tag> {
        let conn = self.conn()?;
        let now = now_ts();
        conn.execute(
            "INSERT INTO tag (tenant_id, tag_name, tag_info, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![new.tenant_id, new.tag_name, json_text(&new.tag_info)?, now],
        )?;
        let id = conn.last_insert_rowid();
        conn.query_row(
            &format!("SELECT {TAG_COLUMNS} FROM tag WHERE id = ?1"),
            params![id],
            tag_row,
        )
        .map_err(OpsError::from)
    }

    pub fn list_tags(&self) -> Result<Vec<Tag>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!("SELECT {TAG_COLUMNS} FROM tag ORDER BY id"))?;
        let rows = stmt.query_map([], tag_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn list_tags_for_tenant(&self, tenant_id: i64) -> Result<Vec<Tag>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {TAG_COLUMNS} FROM tag WHERE tenant_id = ?1 ORDER BY id"
        ))?;
        let rows = stmt.query_map(params![tenant_id], tag_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn get_tag(&self, id: i64) -> Result<Tag> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {TAG_COLUMNS} FROM tag WHERE id = ?1"),
            params![id],
            tag_row,
        )
        .optional()?
        .ok_or(OpsError::TagNotFound(id))
    }

    pub fn delete_tag(&self, id: i64) -> Result<()> {
        let conn = self.conn()?;
        let n = conn.execute("DELETE FROM tag WHERE id = ?1", params![id])?;
        if n == 0 {
            return Err(OpsError::TagNotFound(id));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Task queue mappings
    // -----------------------------------------------------------------------

    pub fn create_mapping(&self, new: NewTaskQueueMapping) -> Result<TaskQueueMapping> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO taskqueuemapping
                 (tenant_id, workbench_id, task_id, queue_id, potential_queue_id, criteria, attributes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                new.tenant_id,
                new.workbench_id,
                new.task_id,
                new.queue_id,
                new.potential_queue_id,
                json_text(&new.criteria)?,
                json_text(&new.attributes)?,
            ],
        )?;
        let id = conn.last_insert_rowid();
        conn.query_row(
            &format!("SELECT {MAPPING_COLUMNS} FROM taskqueuemapping WHERE id = ?1"),
            params![id],
            mapping_row,
        )
        .map_err(OpsError::from)
    }

    pub fn list_mappings(&self) -> Result<Vec<TaskQueueMapping>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {MAPPING_COLUMNS} FROM taskqueuemapping ORDER BY id"
        ))?;
        let rows = stmt.query_map([], mapping_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn get_mapping(&self, id: i64) -> Result<TaskQueueMapping> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {MAPPING_COLUMNS} FROM taskqueuemapping WHERE id = ?1"),
            params![id],
            mapping_row,
        )
        .optional()?
        .ok_or(OpsError::MappingNotFound(id))
    }

    pub fn delete_mapping(&self, id: i64) -> Result<()> {
        let conn = self.conn()?;
        let n = conn.execute("DELETE FROM taskqueuemapping WHERE id = ?1", params![id])?;
        if n == 0 {
            return Err(OpsError::MappingNotFound(id));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // History (append-only)
    // -----------------------------------------------------------------------

    pub fn create_history(&self, new: NewHistoryTaskInfo) -> Result<HistoryTaskInfo> {
        let conn = self.conn()?;
        let at = ts(&new.timestamp.unwrap_or_else(Utc::now));
        conn.execute(
            "INSERT INTO historytaskinfo (task_id, event_type, timestamp, details)
             VALUES (?1, ?2, ?3, ?4)",
            params![new.task_id, new.event_type, at, json_text(&new.details)?],
        )?;
        let id = conn.last_insert_rowid();
        conn.query_row(
            &format!("SELECT {HISTORY_COLUMNS} FROM historytaskinfo WHERE id = ?1"),
            params![id],
            history_row,
        )
        .map_err(OpsError::from)
    }

    pub fn list_history(&self) -> Result<Vec<HistoryTaskInfo>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {HISTORY_COLUMNS} FROM historytaskinfo ORDER BY id"
        ))?;
        let rows = stmt.query_map([], history_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn list_history_for_task(&self, task_id: i64) -> Result<Vec<HistoryTaskInfo>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {HISTORY_COLUMNS} FROM historytaskinfo WHERE task_id = ?1 ORDER BY id"
        ))?;
        let rows = stmt.query_map(params![task_id], history_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

#[cfg(test)]
mod tests {
    use crate::error::OpsError;
    use crate::model::*;
    use crate::store::test_store;

    #[test]
    fn tenant_create_get_list() {
        let (_dir, store) = test_store();
        let t = store
            .create_tenant(NewTenant {
                name: "acme".into(),
            })
            .unwrap();
        assert_eq!(store.get_tenant(t.id).unwrap(), t);
        assert_eq!(store.list_tenants().unwrap().len(), 1);
        assert!(matches!(
            store.get_tenant(999),
            Err(OpsError::TenantNotFound(999))
        ));
    }

    #[test]
    fn tag_json_metadata_survives_storage() {
        let (_dir, store) = test_store();
        let tag = store
            .create_tag(NewTag {
                tenant_id: 7,
                tag_name: "urgent".into(),
                tag_info: Some(serde_json::json!({"color": "red", "weight": 3})),
            })
            .unwrap();
        let fetched = store.get_tag(tag.id).unwrap();
        assert_eq!(fetched.tag_info.unwrap()["color"], "red");
        assert_eq!(store.list_tags_for_tenant(7).unwrap().len(), 1);
        assert!(store.list_tags_for_tenant(8).unwrap().is_empty());
    }

    #[test]
    fn tag_delete_then_missing() {
        let (_dir, store) = test_store();
        let tag = store
            .create_tag(NewTag {
                tenant_id: 1,
                tag_name: "x".into(),
                tag_info: None,
            })
            .unwrap();
        store.delete_tag(tag.id).unwrap();
        assert!(matches!(store.get_tag(tag.id), Err(OpsError::TagNotFound(_))));
        assert!(matches!(
            store.delete_tag(tag.id),
            Err(OpsError::TagNotFound(_))
        ));
    }

    #[test]
    fn mapping_lifecycle() {
        let (_dir, store) = test_store();
        let m = store
            .create_mapping(NewTaskQueueMapping {
                tenant_id: 1,
                workbench_id: 2,
                task_id: 300,
                queue_id: 4,
                potential_queue_id: Some(5),
                criteria: Some(serde_json::json!({"priority": "high"})),
                attributes: None,
            })
            .unwrap();
        assert_eq!(store.get_mapping(m.id).unwrap().potential_queue_id, Some(5));
        assert_eq!(store.list_mappings().unwrap().len(), 1);
        store.delete_mapping(m.id).unwrap();
        assert!(store.list_mappings().unwrap().is_empty());
    }

    #[test]
    fn history_is_filtered_by_task() {
        let (_dir, store) = test_store();
        for (task_id, event) in [(1, "create"), (1, "complete"), (2, "create")] {
            store
                .create_history(NewHistoryTaskInfo {
                    task_id,
                    event_type: event.into(),
                    timestamp: None,
                    details: None,
                })
                .unwrap();
        }
        assert_eq!(store.list_history().unwrap().len(), 3);
        let events: Vec<String> = store
            .list_history_for_task(1)
            .unwrap()
            .into_iter()
            .map(|h| h.event_type)
            .collect();
        assert_eq!(events, vec!["create", "complete"]);
    }
}
