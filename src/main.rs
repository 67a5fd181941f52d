use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use vivo_site::logging::{LogFormat, init_logging};

mod cmd;

#[derive(Parser)]
#[command(name = "vivo-site")]
#[command(version, about = "Vivo Muebles site back end with simulated PatPass enrollment")]
pub struct Cli {
    /// Path to site.toml (defaults are used when the file does not exist)
    #[arg(long, global = true, default_value = "site.toml")]
    pub config: PathBuf,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP server
    Serve {
        /// Port to serve on (overrides [server].port)
        #[arg(short, long)]
        port: Option<u16>,

        /// Enable dev mode (bind 0.0.0.0, permissive CORS)
        #[arg(long)]
        dev: bool,

        /// Open the services page in a browser once the server is up
        #[arg(long)]
        open: bool,
    },
    /// Print the plan catalog
    Plans {
        /// Print as JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Create the site database and run migrations
    InitDb {
        /// Database path (overrides [server].db_path)
        #[arg(long)]
        db_path: Option<PathBuf>,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,
    /// Validate configuration and list any problems
    Validate,
    /// Write a default site.toml
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(LogFormat::from_flag(cli.log_json));

    match &cli.command {
        Commands::Serve { port, dev, open } => {
            cmd::cmd_serve(&cli.config, *port, *dev, *open).await?;
        }
        Commands::Plans { json } => cmd::cmd_plans(*json)?,
        Commands::InitDb { db_path } => cmd::cmd_init_db(&cli.config, db_path.clone())?,
        Commands::Config { command } => cmd::cmd_config(&cli.config, command.clone())?,
    }

    Ok(())
}
