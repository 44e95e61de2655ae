use std::path::PathBuf;

use clap::{Parser, Subcommand};
use podgrid_resources::ResourceOptions;

mod commands;

#[derive(Parser)]
#[command(
    name = "podgrid",
    about = "podgrid — CPU and memory reservation for cluster nodes",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Path to podgrid.toml (defaults apply if it does not exist)
    #[arg(short, long, global = true, default_value = "podgrid.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the node registry
    Node {
        #[command(subcommand)]
        action: NodeAction,
    },
    /// Reserve resources for a number of identical instances.
    ///
    /// Prints one allocation per instance: node, slot index, and the
    /// CPU/memory bound to it.
    Schedule {
        /// CPU cores requested (fractions allowed)
        #[arg(long, default_value = "0")]
        cpu: f64,
        /// CPU limit; defaults to the request
        #[arg(long)]
        cpu_limit: Option<f64>,
        /// Memory requested in bytes
        #[arg(long, default_value = "0")]
        memory: i64,
        /// Memory limit in bytes; defaults to the request
        #[arg(long)]
        memory_limit: Option<i64>,
        /// Pin instances to dedicated cores
        #[arg(long)]
        bind: bool,
        /// Number of instances
        #[arg(short = 'n', long, default_value = "1")]
        count: usize,
    },
}

#[derive(Subcommand)]
enum NodeAction {
    /// Register or replace a node from a TOML node file
    Add {
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Print all registered nodes as JSON
    List,
    /// Remove a node from the registry
    Remove { name: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("podgrid=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config = commands::load_config(&cli.config)?;
    let store = commands::open_store(&config)?;

    match cli.command {
        Commands::Node { action } => match action {
            NodeAction::Add { file } => commands::node::add(&store, &file),
            NodeAction::List => commands::node::list(&store),
            NodeAction::Remove { name } => commands::node::remove(&store, &name),
        },
        Commands::Schedule {
            cpu,
            cpu_limit,
            memory,
            memory_limit,
            bind,
            count,
        } => {
            let options = ResourceOptions {
                cpu_quota_request: cpu,
                cpu_quota_limit: cpu_limit.unwrap_or(cpu),
                cpu_bind: bind,
                memory_request: memory,
                memory_limit: memory_limit.unwrap_or(memory),
            };
            commands::schedule::schedule(&config, store, options, count).await
        }
    }
}
