use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Switches the desktop between light and dark themes.
#[derive(Debug, Parser)]
#[command(name = "umbra", version, about)]
pub struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Overrides `[logging] level`
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Option<CliCommand>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Subcommand)]
pub enum CliCommand {
    /// Run the service until interrupted
    #[default]
    Run,
    /// Validate the configuration and exit
    Check,
    /// Reconcile once, print the engine status and exit
    Once,
}

impl Cli {
    pub fn subcommand(&self) -> CliCommand {
        self.command.unwrap_or_default()
    }
}
