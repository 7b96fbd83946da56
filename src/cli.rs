use std::path::PathBuf;

use clap::Parser;

use crate::cmd::Commands;

/// Bulk-create Jira epics, tasks and sub-tasks from a text template.
/// Settings come from --config (JSON), environment variables and flags, in that order.
#[derive(Parser)]
#[command(name = "jbl", version, about = "Jira bulk loader")]
pub struct Cli {
    /// Path to a JSON configuration file.
    #[arg(long, global = true, env = "JBL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Verbose logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}
