#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use tempfile::TempDir;

fn ops(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("ops").unwrap();
    cmd.current_dir(dir.path())
        .env("DATABASE_URL", dir.path().join("ops.db"))
        .env_remove("MCP_SERVER_URL")
        .env_remove("RUST_LOG");
    cmd
}

fn json_out(dir: &TempDir, args: &[&str]) -> Value {
    let out = ops(dir).arg("--json").args(args).output().unwrap();
    assert!(
        out.status.success(),
        "ops {args:?} failed: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    serde_json::from_slice(&out.stdout).unwrap()
}

fn workbench(dir: &TempDir, name: &str) -> i64 {
    json_out(dir, &["workbench", "create", name])["id"]
        .as_i64()
        .unwrap()
}

// ---------------------------------------------------------------------------
// workbench / agent
// ---------------------------------------------------------------------------

#[test]
fn workbench_create_and_list() {
    let dir = TempDir::new().unwrap();
    ops(&dir)
        .args(["workbench", "create", "Disputes", "--description", "chargebacks"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created workbench 'Disputes'"));

    ops(&dir)
        .args(["workbench", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Disputes").and(predicate::str::contains("chargebacks")));

    ops(&dir)
        .args(["workbench", "create", "Disputes"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn agent_create_info_and_duplicates() {
    let dir = TempDir::new().unwrap();
    ops(&dir)
        .args(["agent", "create", "sarah", "--task-id", "501"])
        .assert()
        .success();

    let info = json_out(&dir, &["agent", "info", "sarah"]);
    assert_eq!(info["assigned_tasks"], 1);
    assert_eq!(info["most_recent_task"]["task_id"], 501);

    ops(&dir)
        .args(["agent", "create", "sarah"])
        .assert()
        .failure()
        .stderr(predicate::str::starts_with("error:"));

    ops(&dir)
        .args(["agent", "info", "ghost"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Agent 'ghost' not found"));

    let list = json_out(&dir, &["agent", "list"]);
    assert_eq!(list[0]["agent_name"], "sarah");
}

// ---------------------------------------------------------------------------
// roles
// ---------------------------------------------------------------------------

#[test]
fn roles_assign_is_idempotent_and_reported() {
    let dir = TempDir::new().unwrap();
    let wb = workbench(&dir, "Intake").to_string();

    ops(&dir)
        .args(["roles", "assign", "ashish", &wb, "team", "lead"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Assigned Team Lead to ashish"));
    ops(&dir)
        .args(["roles", "assign", "ashish", &wb, "Team Lead"])
        .assert()
        .success()
        .stdout(predicate::str::contains("already holds"));

    let roles = json_out(&dir, &["roles", "list", "--agent", "ashish"]);
    assert_eq!(roles.as_array().unwrap().len(), 1);
    assert_eq!(roles[0]["role"], "Team Lead");

    let detail = json_out(&dir, &["roles", "list", "--workbench", &wb]);
    assert_eq!(detail["total_assignments"], 1);

    let report = json_out(&dir, &["roles", "coverage"]);
    assert_eq!(report["workbenches"][0]["coverage_percentage"], 25.0);
    assert_eq!(report["total_role_gaps"], 3);

    let suggestions = json_out(&dir, &["roles", "suggest"]);
    assert_eq!(suggestions.as_array().unwrap().len(), 3);

    let removed = json_out(&dir, &["roles", "remove", "ashish", &wb, "Team Lead"]);
    assert_eq!(removed["success"], true);
    let roles = json_out(&dir, &["roles", "list", "--agent", "ashish"]);
    assert_eq!(roles, Value::Array(vec![]));
}

#[test]
fn roles_reject_bad_input() {
    let dir = TempDir::new().unwrap();
    let wb = workbench(&dir, "Intake").to_string();
    ops(&dir)
        .args(["roles", "assign", "ashish", &wb, "Janitor"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Role must be one of"));
    ops(&dir)
        .args(["roles", "assign", "ashish", "999", "Viewer"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Workbench 999 not found"));
    ops(&dir).args(["roles", "list"]).assert().failure();
}

// ---------------------------------------------------------------------------
// chat
// ---------------------------------------------------------------------------

#[test]
fn chat_runs_rule_based_commands_locally() {
    let dir = TempDir::new().unwrap();
    let wb = workbench(&dir, "Billing");

    let out = json_out(
        &dir,
        &["chat", "make", "ashish", "a", "reviewer", "in", "workbench", &wb.to_string()],
    );
    assert_eq!(out["command"], format!("assign-role ashish {wb} Reviewer"));
    assert_eq!(out["result"]["type"], "role_assignment");

    ops(&dir)
        .args(["chat", "list", "agents"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ashish"));

    ops(&dir)
        .args(["chat", "fly", "me", "to", "the", "moon"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown command"));
}

// ---------------------------------------------------------------------------
// rpc
// ---------------------------------------------------------------------------

#[test]
fn rpc_rejects_bad_params_before_connecting() {
    let dir = TempDir::new().unwrap();
    ops(&dir)
        .args(["rpc", "list_agents", "--params", "[oops"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--params is not valid JSON"));
}

#[test]
fn rpc_reports_unreachable_server() {
    let dir = TempDir::new().unwrap();
    ops(&dir)
        .args(["rpc", "list_agents", "--server", "http://127.0.0.1:9"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("request to http://127.0.0.1:9/rpc failed"));
}
