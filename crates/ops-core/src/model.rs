//! Persisted entities and their creation payloads.
//!
//! Every `New*` type is what a caller supplies; the store fills in ids and
//! timestamps and hands back the full row type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Tenant / Tag
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTenant {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub tenant_id: i64,
    pub tag_name: String,
    pub tag_info: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTag {
    pub tenant_id: i64,
    pub tag_name: String,
    #[serde(default)]
    pub tag_info: Option<Value>,
}

// ---------------------------------------------------------------------------
// TaskQueueMapping
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskQueueMapping {
    pub id: i64,
    pub tenant_id: i64,
    pub workbench_id: i64,
    pub task_id: i64,
    pub queue_id: i64,
    pub potential_queue_id: Option<i64>,
    pub criteria: Option<Value>,
    pub attributes: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTaskQueueMapping {
    pub tenant_id: i64,
    pub workbench_id: i64,
    pub task_id: i64,
    pub queue_id: i64,
    #[serde(default)]
    pub potential_queue_id: Option<i64>,
    #[serde(default)]
    pub criteria: Option<Value>,
    #[serde(default)]
    pub attributes: Option<Value>,
}

// ---------------------------------------------------------------------------
// UserTaskInfo / HistoryTaskInfo
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserTaskInfo {
    pub id: i64,
    pub agent: String,
    pub task_id: i64,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub process_instance_id: Option<i64>,
    pub workbench_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUserTaskInfo {
    pub agent: String,
    pub task_id: i64,
    pub status: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub process_instance_id: Option<i64>,
    #[serde(default)]
    pub workbench_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryTaskInfo {
    pub id: i64,
    pub task_id: i64,
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub details: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewHistoryTaskInfo {
    pub task_id: i64,
    pub event_type: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub details: Option<Value>,
}

// ---------------------------------------------------------------------------
// Agent / Workbench
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workbench {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewWorkbench {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}
