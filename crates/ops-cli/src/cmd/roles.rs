use crate::cmd::open_store;
use crate::output::{or_dash, print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use ops_core::{Role, Store};
use serde_json::json;

// ---------------------------------------------------------------------------
// Subcommands
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum RolesSubcommand {
    /// Give an agent a role in a workbench
    Assign {
        agent: String,
        workbench_id: i64,
        /// Assessor, Reviewer, Team Lead or Viewer
        #[arg(required = true)]
        role: Vec<String>,
        /// Recorded as the assigner
        #[arg(long, default_value = "cli")]
        by: String,
    },
    /// Deactivate an agent's role in a workbench
    Remove {
        agent: String,
        workbench_id: i64,
        #[arg(required = true)]
        role: Vec<String>,
    },
    /// List active roles for an agent or a workbench
    List {
        #[arg(long, conflicts_with = "workbench", required_unless_present = "workbench")]
        agent: Option<String>,
        #[arg(long)]
        workbench: Option<i64>,
    },
    /// Role coverage of every workbench
    Coverage,
    /// Suggested agents for vacant roles
    Suggest,
}

pub fn run(database_url: &str, subcmd: RolesSubcommand, json: bool) -> anyhow::Result<()> {
    let store = open_store(database_url)?;
    match subcmd {
        RolesSubcommand::Assign {
            agent,
            workbench_id,
            role,
            by,
        } => assign(&store, &agent, workbench_id, &role.join(" "), &by, json),
        RolesSubcommand::Remove {
            agent,
            workbench_id,
            role,
        } => remove(&store, &agent, workbench_id, &role.join(" "), json),
        RolesSubcommand::List { agent, workbench } => match (agent, workbench) {
            (Some(agent), _) => list_for_agent(&store, &agent, json),
            (None, Some(id)) => list_for_workbench(&store, id, json),
            (None, None) => anyhow::bail!("pass --agent or --workbench"),
        },
        RolesSubcommand::Coverage => coverage(&store, json),
        RolesSubcommand::Suggest => suggest(&store, json),
    }
}

fn parse_role(raw: &str) -> anyhow::Result<Role> {
    Ok(raw.parse::<Role>()?)
}

// ---------------------------------------------------------------------------
// assign / remove
// ---------------------------------------------------------------------------

fn assign(
    store: &Store,
    agent: &str,
    workbench_id: i64,
    role: &str,
    by: &str,
    json: bool,
) -> anyhow::Result<()> {
    let role = parse_role(role)?;
    let assigned = store
        .assign_workbench_role(agent, workbench_id, role, by)
        .with_context(|| format!("failed to assign {role} to '{agent}'"))?;

    if json {
        print_json(&json!({
            "success": assigned,
            "agent": agent,
            "workbench_id": workbench_id,
            "role": role,
        }))?;
    } else if assigned {
        println!("Assigned {role} to {agent} in workbench {workbench_id}");
    } else {
        println!("{agent} already holds {role} in workbench {workbench_id}");
    }
    Ok(())
}

fn remove(store: &Store, agent: &str, workbench_id: i64, role: &str, json: bool) -> anyhow::Result<()> {
    let role = parse_role(role)?;
    let removed = store.remove_workbench_role(agent, workbench_id, role)?;

    if json {
        print_json(&json!({
            "success": removed,
            "agent": agent,
            "workbench_id": workbench_id,
            "role": role,
        }))?;
    } else if removed {
        println!("Removed {role} from {agent} in workbench {workbench_id}");
    } else {
        println!("{agent} has no active {role} role in workbench {workbench_id}");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// list
// ---------------------------------------------------------------------------

fn list_for_agent(store: &Store, agent: &str, json: bool) -> anyhow::Result<()> {
    let roles = store.get_agent_workbench_roles(agent)?;
    if json {
        return print_json(&roles);
    }
    let rows = roles
        .iter()
        .map(|r| {
            vec![
                r.workbench_id.to_string(),
                r.workbench_name.clone(),
                r.role.to_string(),
                r.assigned_at.format("%Y-%m-%d %H:%M").to_string(),
            ]
        })
        .collect();
    print_table(&["WORKBENCH", "NAME", "ROLE", "ASSIGNED"], rows);
    Ok(())
}

fn list_for_workbench(store: &Store, workbench_id: i64, json: bool) -> anyhow::Result<()> {
    let detail = store
        .get_workbench_role_assignments(workbench_id)?
        .with_context(|| format!("workbench {workbench_id} not found"))?;
    if json {
        return print_json(&detail);
    }
    println!("{} (#{})", detail.workbench_name, detail.workbench_id);
    let rows = detail
        .roles
        .iter()
        .flat_map(|(role, holders)| {
            if holders.is_empty() {
                vec![vec![role.to_string(), "-".into(), "-".into()]]
            } else {
                holders
                    .iter()
                    .map(|h| vec![role.to_string(), h.agent.clone(), h.assigned_by.clone()])
                    .collect()
            }
        })
        .collect();
    print_table(&["ROLE", "AGENT", "ASSIGNED BY"], rows);
    Ok(())
}

// ---------------------------------------------------------------------------
// coverage / suggest
// ---------------------------------------------------------------------------

fn coverage(store: &Store, json: bool) -> anyhow::Result<()> {
    let report = store.get_workbench_coverage_report()?;
    if json {
        return print_json(&report);
    }
    let rows = report
        .workbenches
        .iter()
        .map(|w| {
            vec![
                w.workbench_id.to_string(),
                w.workbench_name.clone(),
                format!("{:.0}%", w.coverage_percentage),
                w.gaps.to_string(),
            ]
        })
        .collect();
    print_table(&["ID", "WORKBENCH", "COVERAGE", "GAPS"], rows);
    println!(
        "\n{} workbenches, {} fully covered, {} role gaps",
        report.total_workbenches, report.fully_covered_workbenches, report.total_role_gaps
    );
    Ok(())
}

fn suggest(store: &Store, json: bool) -> anyhow::Result<()> {
    let suggestions = store.suggest_role_assignments()?;
    if json {
        return print_json(&suggestions);
    }
    let rows = suggestions
        .into_iter()
        .map(|s| {
            vec![
                s.workbench_name,
                s.role.to_string(),
                or_dash(s.suggested_agent),
                s.reason,
            ]
        })
        .collect();
    print_table(&["WORKBENCH", "ROLE", "AGENT", "REASON"], rows);
    Ok(())
}
