use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Find rules in data that satisfy your goals.
///
/// Experiments are descriptor files (YAML or JSON) in the experiments
/// directory. Reports and progress are written under the build directory.
#[derive(Parser, Debug)]
#[command(name = "rulehunter", about = "Find rules in data that satisfy your goals")]
pub struct CliArgs {
    /// Path to a TOML config file (defaults apply when omitted)
    #[arg(long, global = true, env = "RULEHUNTER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Process only this experiment descriptor
    #[arg(long, global = true)]
    pub file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Process the experiments once and exit
    Run,
    /// Watch the experiments directory until interrupted (default)
    Serve,
    /// Print the version and exit
    Version,
}

impl CliArgs {
    pub fn action(&self) -> Command {
        self.command.unwrap_or(Command::Serve)
    }
}
