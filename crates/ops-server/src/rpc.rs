//! JSON-RPC 2.0 endpoint.
//!
//! `POST /rpc` takes one envelope `{jsonrpc, method, params, id}` and
//! dispatches on the exact method name through [`METHODS`]. The response
//! always carries all four of `jsonrpc`, `result`, `error` and `id`; exactly
//! one of `result`/`error` is non-null. Batches are not supported.

use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use ops_core::{Role, Store};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::state::AppState;

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
/// Any failure raised inside a method, including bad params.
pub const SERVER_ERROR: i64 = -32000;

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
    #[serde(default)]
    pub id: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    pub result: Value,
    pub error: Option<RpcError>,
    pub id: Value,
}

impl RpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            result,
            error: None,
            id,
        }
    }

    pub fn failure(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            result: Value::Null,
            error: Some(RpcError {
                code,
                message: message.into(),
            }),
            id,
        }
    }
}

// ---------------------------------------------------------------------------
// Method table
// ---------------------------------------------------------------------------

type Handler = fn(&Store, Value) -> anyhow::Result<Value>;

/// Every callable method, by exact name.
pub const METHODS: &[(&str, Handler)] = &[
    ("get_agent_task_count", get_agent_task_count),
    ("list_recent_tasks", list_recent_tasks),
    ("average_completion_time", average_completion_time),
    ("list_tags", list_tags),
    ("assign_task", assign_task),
    ("update_task_status", update_task_status),
    ("list_agents", list_agents),
    ("list_all_agents", list_all_agents),
    ("get_agent_info", get_agent_info),
    ("get_agent_stats", get_agent_stats),
    ("create_agent", create_agent),
    ("assign_role", assign_role),
    ("remove_role", remove_role),
    ("get_agent_roles", get_agent_roles),
    ("get_workbench_roles", get_workbench_roles),
    ("get_coverage_report", get_coverage_report),
    ("suggest_roles", suggest_roles),
];

pub fn lookup(method: &str) -> Option<Handler> {
    METHODS
        .iter()
        .find(|(name, _)| *name == method)
        .map(|(_, handler)| *handler)
}

/// Run one parsed request against `store`.
pub fn dispatch(store: &Store, req: RpcRequest) -> RpcResponse {
    let Some(handler) = lookup(&req.method) else {
        tracing::debug!(method = %req.method, "unknown rpc method");
        return RpcResponse::failure(req.id, METHOD_NOT_FOUND, "Method not found");
    };
    tracing::debug!(method = %req.method, "rpc call");
    match handler(store, req.params) {
        Ok(result) => RpcResponse::success(req.id, result),
        Err(e) => RpcResponse::failure(req.id, SERVER_ERROR, format!("{e:#}")),
    }
}

/// Parse a raw body into a request, or the error response to send instead.
pub fn parse_request(body: &[u8]) -> Result<RpcRequest, RpcResponse> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| RpcResponse::failure(Value::Null, PARSE_ERROR, format!("Parse error: {e}")))?;
    let id = value.get("id").cloned().unwrap_or(Value::Null);
    if !value.is_object() {
        return Err(RpcResponse::failure(
            id,
            INVALID_REQUEST,
            "Invalid Request: expected a single JSON object",
        ));
    }
    serde_json::from_value(value)
        .map_err(|e| RpcResponse::failure(id, INVALID_REQUEST, format!("Invalid Request: {e}")))
}

/// POST /rpc
pub async fn rpc_endpoint(State(app): State<AppState>, body: Bytes) -> Json<RpcResponse> {
    let req = match parse_request(&body) {
        Ok(req) => req,
        Err(resp) => return Json(resp),
    };
    if req.jsonrpc.as_deref().is_some_and(|v| v != "2.0") {
        tracing::debug!(version = ?req.jsonrpc, "non-2.0 jsonrpc version");
    }
    let id = req.id.clone();
    let store = app.store.clone();
    match tokio::task::spawn_blocking(move || dispatch(&store, req)).await {
        Ok(resp) => Json(resp),
        Err(e) => Json(RpcResponse::failure(id, SERVER_ERROR, format!("task join error: {e}"))),
    }
}

// ---------------------------------------------------------------------------
// Params
// ---------------------------------------------------------------------------

/// Missing or null params count as `{}`.
fn params<T: DeserializeOwned>(raw: Value) -> anyhow::Result<T> {
    let raw = if raw.is_null() { json!({}) } else { raw };
    serde_json::from_value(raw).map_err(|e| anyhow::anyhow!("invalid params: {e}"))
}

fn role(raw: &str) -> anyhow::Result<Role> {
    Ok(raw.parse::<Role>()?)
}

fn three() -> i64 {
    3
}
fn five() -> usize {
    5
}
fn seven() -> i64 {
    7
}
fn hundred() -> usize {
    100
}
fn completed() -> String {
    ops_core::types::status::COMPLETED.to_string()
}
fn system() -> String {
    "system".to_string()
}

#[derive(Deserialize)]
struct AgentParam {
    agent: String,
}

#[derive(Deserialize)]
struct TaskCountParams {
    agent: String,
    #[serde(default = "three")]
    days: i64,
}

#[derive(Deserialize)]
struct RecentParams {
    agent: String,
    #[serde(default = "five")]
    limit: usize,
}

#[derive(Deserialize)]
struct TenantParam {
    tenant_id: i64,
}

#[derive(Deserialize)]
struct AssignTaskParams {
    agent: String,
    task_id: i64,
    #[serde(default)]
    workbench_id: Option<i64>,
}

#[derive(Deserialize)]
struct UpdateStatusParams {
    task_id: i64,
    #[serde(default)]
    agent: Option<String>,
    #[serde(default = "completed")]
    status: String,
}

#[derive(Deserialize)]
struct LimitParam {
    #[serde(default = "hundred")]
    limit: usize,
}

#[derive(Deserialize)]
struct DaysParam {
    #[serde(default = "seven")]
    days: i64,
}

#[derive(Deserialize)]
struct CreateAgentParams {
    #[serde(alias = "name", alias = "agent")]
    agent_name: String,
    #[serde(default)]
    task_id: Option<i64>,
    #[serde(default)]
    workbench_id: Option<i64>,
}

#[derive(Deserialize)]
struct RoleParams {
    agent: String,
    workbench_id: i64,
    role: String,
    #[serde(default = "system")]
    assigned_by: String,
}

#[derive(Deserialize)]
struct WorkbenchParam {
    workbench_id: i64,
}

#[derive(Deserialize)]
struct NoParams {}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

fn get_agent_task_count(store: &Store, raw: Value) -> anyhow::Result<Value> {
    let p: TaskCountParams = params(raw)?;
    let n = store.get_agent_task_count(&p.agent, p.days)?;
    Ok(json!({ "agent": p.agent, "completed_tasks": n }))
}

fn list_recent_tasks(store: &Store, raw: Value) -> anyhow::Result<Value> {
    let p: RecentParams = params(raw)?;
    Ok(json!(store.list_recent_tasks(&p.agent, p.limit)?))
}

fn average_completion_time(store: &Store, raw: Value) -> anyhow::Result<Value> {
    let p: AgentParam = params(raw)?;
    let secs = store.average_completion_time(&p.agent)?;
    Ok(json!({ "agent": p.agent, "average_completion_time_seconds": secs }))
}

fn list_tags(store: &Store, raw: Value) -> anyhow::Result<Value> {
    let p: TenantParam = params(raw)?;
    Ok(json!(store.list_tags_for_tenant(p.tenant_id)?))
}

fn assign_task(store: &Store, raw: Value) -> anyhow::Result<Value> {
    let p: AssignTaskParams = params(raw)?;
    Ok(json!(store.assign_task(&p.agent, p.task_id, p.workbench_id)?))
}

fn update_task_status(store: &Store, raw: Value) -> anyhow::Result<Value> {
    let p: UpdateStatusParams = params(raw)?;
    Ok(json!(store.update_task_status(
        p.task_id,
        p.agent.as_deref(),
        &p.status
    )?))
}

fn list_agents(store: &Store, raw: Value) -> anyhow::Result<Value> {
    let p: LimitParam = params(raw)?;
    Ok(json!(store.list_agents(p.limit)?))
}

fn list_all_agents(store: &Store, raw: Value) -> anyhow::Result<Value> {
    let _: NoParams = params(raw)?;
    Ok(json!(store.list_all_agents()?))
}

fn get_agent_info(store: &Store, raw: Value) -> anyhow::Result<Value> {
    let p: AgentParam = params(raw)?;
    Ok(json!(store.get_agent_info(&p.agent)?))
}

fn get_agent_stats(store: &Store, raw: Value) -> anyhow::Result<Value> {
    let p: DaysParam = params(raw)?;
    Ok(json!(store.get_agent_stats(p.days)?))
}

fn create_agent(store: &Store, raw: Value) -> anyhow::Result<Value> {
    let p: CreateAgentParams = params(raw)?;
    let agent = store.create_agent(&p.agent_name, p.task_id, p.workbench_id)?;
    Ok(json!({
        "message": format!("Agent '{}' created successfully", agent.name),
        "agent": agent.name,
        "id": agent.id,
        "created_at": agent.created_at,
    }))
}

fn assign_role(store: &Store, raw: Value) -> anyhow::Result<Value> {
    let p: RoleParams = params(raw)?;
    let role = role(&p.role)?;
    let success = store.assign_workbench_role(&p.agent, p.workbench_id, role, &p.assigned_by)?;
    let message = if success {
        format!("Assigned {role} to {} in workbench {}", p.agent, p.workbench_id)
    } else {
        format!(
            "{} already holds {role} in workbench {}",
            p.agent, p.workbench_id
        )
    };
    Ok(json!({ "success": success, "message": message }))
}

fn remove_role(store: &Store, raw: Value) -> anyhow::Result<Value> {
    let p: RoleParams = params(raw)?;
    let role = role(&p.role)?;
    let success = store.remove_workbench_role(&p.agent, p.workbench_id, role)?;
    Ok(json!({ "success": success }))
}

fn get_agent_roles(store: &Store, raw: Value) -> anyhow::Result<Value> {
    let p: AgentParam = params(raw)?;
    let roles = store.get_agent_workbench_roles(&p.agent)?;
    Ok(json!({ "agent": p.agent, "roles": roles }))
}

fn get_workbench_roles(store: &Store, raw: Value) -> anyhow::Result<Value> {
    let p: WorkbenchParam = params(raw)?;
    let roles = store
        .get_workbench_role_assignments(p.workbench_id)?
        .ok_or(ops_core::OpsError::WorkbenchNotFound(p.workbench_id))?;
    Ok(json!(roles))
}

fn get_coverage_report(store: &Store, raw: Value) -> anyhow::Result<Value> {
    let _: NoParams = params(raw)?;
    Ok(json!(store.get_workbench_coverage_report()?))
}

fn suggest_roles(store: &Store, raw: Value) -> anyhow::Result<Value> {
    let _: NoParams = params(raw)?;
    Ok(json!(store.suggest_role_assignments()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ops_core::model::NewWorkbench;
    use tempfile::TempDir;

    fn store() -> (TempDir, Store) {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path().join("rpc.db")).unwrap();
        (dir, store)
    }

    fn call(store: &Store, method: &str, params: Value) -> RpcResponse {
        dispatch(
            store,
            RpcRequest {
                jsonrpc: Some("2.0".into()),
                method: method.into(),
                params,
                id: json!(1),
            },
        )
    }

    #[test]
    fn unknown_method_is_32601_with_null_result() {
        let (_dir, store) = store();
        for method in ["nope", "", "LIST_AGENTS", "list_agents "] {
            let resp = call(&store, method, Value::Null);
            assert_eq!(resp.error.as_ref().unwrap().code, METHOD_NOT_FOUND);
            assert_eq!(resp.error.unwrap().message, "Method not found");
            assert_eq!(resp.result, Value::Null);
            assert_eq!(resp.id, json!(1));
        }
    }

    #[test]
    fn method_names_are_unique() {
        let mut names: Vec<_> = METHODS.iter().map(|(n, _)| *n).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), METHODS.len());
    }

    #[test]
    fn bad_params_are_32000() {
        let (_dir, store) = store();
        let resp = call(&store, "get_agent_info", json!({ "nobody": 1 }));
        let err = resp.error.unwrap();
        assert_eq!(err.code, SERVER_ERROR);
        assert!(err.message.contains("invalid params"));
    }

    #[test]
    fn handler_errors_are_32000() {
        let (_dir, store) = store();
        let resp = call(&store, "update_task_status", json!({ "task_id": 404 }));
        let err = resp.error.unwrap();
        assert_eq!(err.code, SERVER_ERROR);
        assert_eq!(err.message, "Task not found");
    }

    #[test]
    fn task_flow() {
        let (_dir, store) = store();
        let resp = call(&store, "assign_task", json!({ "agent": "ashish", "task_id": 11 }));
        assert_eq!(resp.result["status"], "assigned");

        let resp = call(&store, "update_task_status", json!({ "task_id": 11 }));
        assert_eq!(resp.result["status"], "completed");

        let resp = call(&store, "get_agent_task_count", json!({ "agent": "ashish" }));
        assert_eq!(resp.result, json!({ "agent": "ashish", "completed_tasks": 1 }));

        let resp = call(&store, "list_recent_tasks", json!({ "agent": "ashish" }));
        assert_eq!(resp.result.as_array().unwrap().len(), 1);

        let resp = call(&store, "list_agents", Value::Null);
        assert_eq!(resp.result["agents"], json!(["ashish"]));
        assert_eq!(resp.result["total_agents"], 1);
    }

    #[test]
    fn huge_day_windows_are_errors() {
        let (_dir, store) = store();
        let resp = call(
            &store,
            "get_agent_task_count",
            json!({ "agent": "a", "days": 1_000_000_000 }),
        );
        let err = resp.error.unwrap();
        assert_eq!(err.code, SERVER_ERROR);
        assert_eq!(err.message, "invalid argument: days out of range: 1000000000");

        let resp = call(&store, "get_agent_stats", json!({ "days": i64::MAX }));
        assert_eq!(resp.error.unwrap().code, SERVER_ERROR);
    }

    #[test]
    fn create_agent_accepts_name_aliases() {
        let (_dir, store) = store();
        let resp = call(&store, "create_agent", json!({ "agent_name": "sarah" }));
        assert_eq!(resp.result["agent"], "sarah");
        let resp = call(&store, "create_agent", json!({ "name": "sarah" }));
        assert_eq!(resp.error.unwrap().message, "Agent 'sarah' already exists");
    }

    #[test]
    fn role_methods() {
        let (_dir, store) = store();
        let wb = store
            .create_workbench(NewWorkbench {
                name: "intake".into(),
                description: None,
            })
            .unwrap();
        let p = json!({ "agent": "ashish", "workbench_id": wb.id, "role": "assessor" });

        assert_eq!(call(&store, "assign_role", p.clone()).result["success"], true);
        assert_eq!(call(&store, "assign_role", p.clone()).result["success"], false);

        let roles = call(&store, "get_agent_roles", json!({ "agent": "ashish" })).result;
        assert_eq!(roles["roles"][0]["role"], "Assessor");

        let wb_roles = call(&store, "get_workbench_roles", json!({ "workbench_id": wb.id })).result;
        assert_eq!(wb_roles["roles"]["Assessor"].as_array().unwrap().len(), 1);

        let report = call(&store, "get_coverage_report", Value::Null).result;
        assert_eq!(report["workbenches"][0]["gaps"], 3);

        assert_eq!(call(&store, "remove_role", p).result["success"], true);
        let err = call(
            &store,
            "assign_role",
            json!({ "agent": "a", "workbench_id": wb.id, "role": "Boss" }),
        )
        .error
        .unwrap();
        assert_eq!(err.code, SERVER_ERROR);
    }

    #[test]
    fn envelope_parsing() {
        let err = parse_request(b"{not json").unwrap_err();
        assert_eq!(err.error.unwrap().code, PARSE_ERROR);

        let err = parse_request(b"[1, 2]").unwrap_err();
        assert_eq!(err.error.unwrap().code, INVALID_REQUEST);

        let err = parse_request(br#"{"jsonrpc": "2.0", "id": 9}"#).unwrap_err();
        assert_eq!(err.id, json!(9));
        assert_eq!(err.error.unwrap().code, INVALID_REQUEST);

        let req = parse_request(br#"{"jsonrpc": "2.0", "method": "list_agents", "id": "a"}"#)
            .unwrap();
        assert_eq!(req.method, "list_agents");
        assert!(req.params.is_null());
    }

    #[test]
    fn response_always_has_all_fields() {
        let v = serde_json::to_value(RpcResponse::success(json!(1), json!([]))).unwrap();
        for key in ["jsonrpc", "result", "error", "id"] {
            assert!(v.get(key).is_some(), "missing {key}");
        }
        assert!(v["error"].is_null());
    }
}
