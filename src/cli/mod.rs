pub mod config;
pub mod scan;
pub mod status;
pub mod watch;

use clap::{Parser, Subcommand};
use tokio::runtime::Runtime;

use crate::models::ToolTag;

#[derive(Parser)]
#[command(name = "chatvault")]
#[command(about = "Collect AI coding assistant chat history from local tools")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Extract every conversation once and print them as JSON lines
    Scan {
        /// Only extract from these tools (repeatable)
        #[arg(short, long, value_enum)]
        tool: Vec<ToolTag>,
    },
    /// Print new and changed conversations as JSON lines until interrupted
    Watch {
        /// Only watch these tools (repeatable)
        #[arg(short, long, value_enum)]
        tool: Vec<ToolTag>,
    },
    /// Show which tool storage locations are present
    Status,
    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Get a configuration value
    Get {
        /// Configuration key to get
        key: String,
    },
    /// Set a configuration value
    Set {
        /// Configuration key to set
        key: String,
        /// Value to set
        value: String,
    },
    /// Reset a configuration value to its default
    Unset {
        /// Configuration key to reset
        key: String,
    },
    /// List all configuration values
    List,
    /// Show the path to the config file
    Path,
}

impl Cli {
    pub fn run(self) -> anyhow::Result<()> {
        let rt = Runtime::new()?;

        rt.block_on(async {
            match self.command {
                Commands::Scan { tool } => scan::handle_scan_command(tool).await,
                Commands::Watch { tool } => watch::handle_watch_command(tool).await,
                Commands::Status => status::handle_status_command().await,
                Commands::Config { command } => match command {
                    ConfigCommands::Get { key } => config::handle_config_get(key).await,
                    ConfigCommands::Set { key, value } => config::handle_config_set(key, value).await,
                    ConfigCommands::Unset { key } => config::handle_config_unset(key).await,
                    ConfigCommands::List => config::handle_config_list().await,
                    ConfigCommands::Path => config::handle_config_path().await,
                },
            }
        })
    }
}

/// The requested tools, or every tool with an extractor when none are given.
pub(crate) fn selected_tools(tools: Vec<ToolTag>) -> Vec<ToolTag> {
    if tools.is_empty() {
        ToolTag::with_extractors()
    } else {
        tools
    }
}
