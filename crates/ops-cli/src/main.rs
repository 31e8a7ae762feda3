mod cmd;
mod output;

use clap::{Parser, Subcommand};
use cmd::{
    agent::AgentSubcommand, roles::RolesSubcommand, workbench::WorkbenchSubcommand,
};
use ops_core::config::{DEFAULT_DATABASE_URL, DEFAULT_MCP_SERVER_URL};

#[derive(Parser)]
#[command(
    name = "ops",
    about = "OPS Center: agents, workbenches, role coverage and chat commands",
    version,
    propagate_version = true
)]
struct Cli {
    /// Database location (`sqlite:///path.db` or a plain file path)
    #[arg(long, global = true, env = "DATABASE_URL", default_value = DEFAULT_DATABASE_URL)]
    database_url: String,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP, JSON-RPC and WebSocket server
    Serve {
        /// Interface to bind (default: HOST or 0.0.0.0)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (default: PORT or 8080)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Assign, remove and report workbench roles
    Roles {
        #[command(subcommand)]
        subcommand: RolesSubcommand,
    },

    /// Manage workbenches
    Workbench {
        #[command(subcommand)]
        subcommand: WorkbenchSubcommand,
    },

    /// Manage agents
    Agent {
        #[command(subcommand)]
        subcommand: AgentSubcommand,
    },

    /// Run a chat command against the local database
    Chat {
        /// Acting user recorded on created tasks
        #[arg(long, default_value = "cli")]
        user: String,

        #[arg(required = true)]
        text: Vec<String>,
    },

    /// Call a JSON-RPC method on a running server
    Rpc {
        method: String,

        /// Parameters as a JSON object or array
        #[arg(long)]
        params: Option<String>,

        /// Server base URL
        #[arg(long, env = "MCP_SERVER_URL", default_value = DEFAULT_MCP_SERVER_URL)]
        server: String,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .init();

    let db = cli.database_url.as_str();
    let result = match cli.command {
        Commands::Serve { host, port } => cmd::serve::run(db, host, port),
        Commands::Roles { subcommand } => cmd::roles::run(db, subcommand, cli.json),
        Commands::Workbench { subcommand } => cmd::workbench::run(db, subcommand, cli.json),
        Commands::Agent { subcommand } => cmd::agent::run(db, subcommand, cli.json),
        Commands::Chat { user, text } => cmd::chat::run(db, &user, &text.join(" "), cli.json),
        Commands::Rpc {
            method,
            params,
            server,
        } => cmd::rpc::run(&server, &method, params.as_deref(), cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
