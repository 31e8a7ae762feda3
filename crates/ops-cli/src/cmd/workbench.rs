use crate::cmd::open_store;
use crate::output::{or_dash, print_json, print_table};
use clap::Subcommand;
use ops_core::model::NewWorkbench;

#[derive(Subcommand)]
pub enum WorkbenchSubcommand {
    /// List workbenches
    List,
    /// Create a workbench (names are unique)
    Create {
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
}

pub fn run(database_url: &str, subcmd: WorkbenchSubcommand, json: bool) -> anyhow::Result<()> {
    let store = open_store(database_url)?;
    match subcmd {
        WorkbenchSubcommand::List => {
            let workbenches = store.list_workbenches()?;
            if json {
                return print_json(&workbenches);
            }
            let rows = workbenches
                .into_iter()
                .map(|w| vec![w.id.to_string(), w.name, or_dash(w.description)])
                .collect();
            print_table(&["ID", "NAME", "DESCRIPTION"], rows);
        }
        WorkbenchSubcommand::Create { name, description } => {
            let wb = store.create_workbench(NewWorkbench { name, description })?;
            if json {
                print_json(&wb)?;
            } else {
                println!("Created workbench '{}' (id {})", wb.name, wb.id);
            }
        }
    }
    Ok(())
}
