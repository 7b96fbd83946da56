//! # JBL - Jira Bulk Loader
//!
//! Creates a whole hierarchy of Jira issues from a short text template.
//!
//! ## Template Format
//!
//! ```text
//! [sprint=Sprint 12]
//! {"project":{"key":"PRJ"}, "labels":["bulk"]}
//!
//! h4. Release 2.0 *alice*
//! h5. Payment page for $sprint *bob* %2024-03-01% {"priority":{"name":"High"}}
//! =Covers card and invoice payments.
//! # Card form *carol*
//! # Invoice form *carol*
//! Design notes live on the wiki.
//! h5. Release notes *dave*
//! ```
//!
//! - `h4.` an epic, created last and linked to every task
//! - `h5.` a task
//! - `#` / `##` a sub-task of the task above it
//! - `=text` one more description line for the task above
//! - `[name=value]` a template variable, used later as `$name`
//! - `{...}` JSON merged into the fields of every following issue
//! - `*user*` the assignee, `%YYYY-MM-DD%` the due date, a trailing `{...}` extra fields
//!
//! Any other line is folded into the description of the open task, together with the
//! captions of its sub-tasks.
//!
//! ## Key Commands
//!
//! - `jbl create <template>` - Validate, then create all issues and print a summary
//! - `jbl check <template>` - Validate assignees and project keys only
//! - `jbl parse <template>` - Show the parsed records (offline)
//! - `jbl completions <shell>` - Shell completion script
//!
//! Add `--dry-run` to `create` to walk the whole template without touching Jira.

use clap::Parser;
use tracing_subscriber::EnvFilter;

pub mod assembler;
pub mod cli;
pub mod cmd;
pub mod config;
pub mod error;
pub mod fields;
pub mod jira;
pub mod parser;
pub mod task;
pub mod tracker;
pub mod validate;

use cli::Cli;
use cmd::*;

fn main() {
    let cli = Cli::parse();

    // Logs go to stderr so the summary on stdout can be piped.
    let default_filter = if cli.verbose { "jbl=debug,info" } else { "jbl=info,warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Completions { shell } => {
            cmd_completions(shell);
            Ok(())
        }
        Commands::Parse { template, json } => cmd_parse(&template, json),
        Commands::Create { template, jira } => build_config(cli.config.as_deref(), jira)
            .map_err(anyhow::Error::from)
            .and_then(|config| cmd_create(&config, &template)),
        Commands::Check { template, jira } => build_config(cli.config.as_deref(), jira)
            .map_err(anyhow::Error::from)
            .and_then(|config| cmd_check(&config, &template)),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        // Template mistakes exit with 2, everything else with 1.
        let code = match e.downcast_ref::<error::LoaderError>() {
            Some(err) if err.is_template_error() => 2,
            _ => 1,
        };
        std::process::exit(code);
    }
}
