use crate::cmd::open_store;
use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use ops_core::Store;

#[derive(Subcommand)]
pub enum AgentSubcommand {
    /// List agents with lifetime task totals
    List,
    /// Register a new agent
    Create {
        name: String,
        /// Give the agent this task straight away
        #[arg(long)]
        task_id: Option<i64>,
        /// Workbench for the initial task (a task id is generated if none given)
        #[arg(long)]
        workbench_id: Option<i64>,
    },
    /// Task counts and most recent task for one agent
    Info { name: String },
}

pub fn run(database_url: &str, subcmd: AgentSubcommand, json: bool) -> anyhow::Result<()> {
    let store = open_store(database_url)?;
    match subcmd {
        AgentSubcommand::List => list(&store, json),
        AgentSubcommand::Create {
            name,
            task_id,
            workbench_id,
        } => create(&store, &name, task_id, workbench_id, json),
        AgentSubcommand::Info { name } => info(&store, &name, json),
    }
}

fn list(store: &Store, json: bool) -> anyhow::Result<()> {
    let agents = store.list_all_agents()?;
    if json {
        return print_json(&agents);
    }
    let rows = agents
        .into_iter()
        .map(|a| {
            vec![
                a.agent_name,
                a.total_tasks.to_string(),
                a.completed_tasks.to_string(),
                format!("{:.1}%", a.completion_rate),
            ]
        })
        .collect();
    print_table(&["AGENT", "TASKS", "COMPLETED", "RATE"], rows);
    Ok(())
}

fn create(
    store: &Store,
    name: &str,
    task_id: Option<i64>,
    workbench_id: Option<i64>,
    json: bool,
) -> anyhow::Result<()> {
    let agent = store
        .create_agent(name, task_id, workbench_id)
        .with_context(|| format!("failed to create agent '{name}'"))?;
    if json {
        print_json(&agent)?;
    } else {
        println!("Created agent '{}'", agent.name);
    }
    Ok(())
}

fn info(store: &Store, name: &str, json: bool) -> anyhow::Result<()> {
    let info = store.get_agent_info(name)?;
    if json {
        return print_json(&info);
    }
    println!("Agent:       {}", info.agent);
    println!("Tasks:       {}", info.total_tasks);
    println!("Completed:   {}", info.completed_tasks);
    println!("In progress: {}", info.in_progress_tasks);
    println!("Assigned:    {}", info.assigned_tasks);
    println!("Completion:  {:.1}%", info.completion_rate);
    if let Some(task) = info.most_recent_task {
        println!("Latest:      task {} ({})", task.task_id, task.status);
    }
    Ok(())
}
