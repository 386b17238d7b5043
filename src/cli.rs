use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "appflow")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Create cluster resources in dependency order and wait for them to become ready", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (default: ~/.config/appflow/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Cluster API server URL
    #[arg(long, global = true, env = "APPFLOW_SERVER", value_name = "URL")]
    pub server: Option<String>,

    /// Default namespace
    #[arg(short, long, global = true, env = "APPFLOW_NAMESPACE", value_name = "NS")]
    pub namespace: Option<String>,

    /// Bearer token for the API server
    #[arg(long, global = true, env = "APPFLOW_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create every declared resource in dependency order
    Run(RunArgs),

    /// Validate the dependency graph without contacting the cluster
    Check(GraphArgs),

    /// Show the current status of every declared resource
    Status(GraphArgs),

    /// Delete managed resources in reverse dependency order
    Delete(DeleteArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Options shared by commands that read a declaration file
#[derive(Args)]
pub struct GraphArgs {
    /// Declaration file (YAML or JSON)
    pub file: PathBuf,

    /// Only use explicit dependencies, do not infer them from selectors
    #[arg(long)]
    pub no_infer: bool,
}

#[derive(Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub graph: GraphArgs,

    /// Number of parallel workers (0 = one per resource)
    #[arg(short, long)]
    pub jobs: Option<usize>,
}

#[derive(Args)]
pub struct DeleteArgs {
    #[command(flatten)]
    pub graph: GraphArgs,

    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}
