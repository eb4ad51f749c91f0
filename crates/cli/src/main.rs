//! pfw - project file watch build daemon

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod cmd;

/// Builds and restarts project containers as their files change
#[derive(Parser)]
#[command(name = "pfw")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (default: <config dir>/pfw/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log debug output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve JSON-lines requests from stdin, one response line each on stdout
    Serve,
    /// Show the resolved ports of a project's container
    Ports {
        /// Container name
        container: String,
        /// Project ID
        project_id: String,
    },
    /// List the project types detected at a path
    Detect {
        /// Project directory
        path: PathBuf,
    },
    /// Show the effective configuration
    Config {
        /// Print a commented example config file instead
        #[arg(long)]
        example: bool,
    },
}

/// Logs go to stderr; stdout carries responses. RUST_LOG overrides the flags.
fn init_tracing(verbose: bool, quiet: bool) {
    let default_level = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Serve => cmd::serve::run(config_path).await,
        Commands::Ports { container, project_id } => cmd::ports::run(config_path, &container, &project_id).await,
        Commands::Detect { path } => cmd::detect::run(config_path, &path).await,
        Commands::Config { example } => cmd::config::run(config_path, example),
    }
}
