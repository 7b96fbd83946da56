//! Command implementations for the CLI interface.
//!
//! Each subcommand reads a template, runs it through the parser and, depending on the
//! command, validation and issue creation.

use std::fs;
use std::io::{self, Read};
use std::path::Path;

use anyhow::Context;
use clap::{Args, Subcommand};
use clap_complete::{generate, Shell};

use crate::assembler::{create_tasks, IssueSettings};
use crate::config::{Config, ConfigOverrides};
use crate::error::Result;
use crate::fields::{format_level, Level};
use crate::jira::JiraClient;
use crate::parser::parse;
use crate::task::Record;
use crate::validate::validate;

#[derive(Subcommand)]
pub enum Commands {
    /// Create every issue described by a template.
    Create {
        /// Template file, or "-" for stdin.
        template: String,
        #[command(flatten)]
        jira: JiraArgs,
    },

    /// Parse and validate a template without creating anything.
    Check {
        /// Template file, or "-" for stdin.
        template: String,
        #[command(flatten)]
        jira: JiraArgs,
    },

    /// Show how a template is parsed (offline).
    Parse {
        /// Template file, or "-" for stdin.
        template: String,
        /// Print records as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts.
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Jira connection settings shared by the commands that talk to Jira.
#[derive(Args, Debug, Clone, Default)]
pub struct JiraArgs {
    /// Jira base URL.
    #[arg(long, env = "JIRA_URL")]
    pub host: Option<String>,
    /// Jira username.
    #[arg(short = 'U', long, env = "JIRA_USER")]
    pub user: Option<String>,
    /// Jira password.
    #[arg(short = 'P', long, env = "JIRA_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
    /// Default issue fields as a JSON object, e.g. '{"project":{"key":"PRJ"}}'.
    #[arg(long)]
    pub params: Option<String>,
    /// Do not touch Jira; issues get placeholder keys.
    #[arg(long)]
    pub dry_run: bool,
}

impl From<JiraArgs> for ConfigOverrides {
    fn from(args: JiraArgs) -> Self {
        ConfigOverrides {
            jira_url: args.host,
            username: args.user,
            password: args.password,
            params: args.params,
            dry_run: args.dry_run,
        }
    }
}

/// Resolve the effective configuration for a Jira command.
pub fn build_config(path: Option<&Path>, jira: JiraArgs) -> Result<Config> {
    let mut config = Config::load_or_default(path)?;
    config.apply(jira.into())?;
    config.validate()?;
    Ok(config)
}

/// Read a template from a file, or from stdin when `source` is "-".
pub fn read_template(source: &str) -> Result<String> {
    if source == "-" {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        Ok(buf)
    } else {
        Ok(fs::read_to_string(source)?)
    }
}

/// Parse, validate and create all issues, then print the summary.
pub fn cmd_create(config: &Config, template: &str) -> anyhow::Result<()> {
    let text = read_template(template)
        .with_context(|| format!("Failed to read template '{template}'"))?;
    let records = parse(&text)?;
    let mut jira = JiraClient::from_config(config)?;

    validate(&records, &config.default_params, &mut jira)?;
    let summary = create_tasks(records, &mut jira, &IssueSettings::from_config(config))?;

    if jira.is_dry_run() {
        tracing::info!("dry run: nothing was created in Jira");
    }
    println!("{summary}");
    Ok(())
}

/// Parse and validate a template, then print how many issues it describes.
pub fn cmd_check(config: &Config, template: &str) -> anyhow::Result<()> {
    let text = read_template(template)
        .with_context(|| format!("Failed to read template '{template}'"))?;
    let records = parse(&text)?;
    let mut jira = JiraClient::from_config(config)?;
    validate(&records, &config.default_params, &mut jira)?;

    println!("Template is valid: {}", count_summary(&records));
    Ok(())
}

/// Print the parsed records without contacting Jira.
pub fn cmd_parse(template: &str, json: bool) -> anyhow::Result<()> {
    let text = read_template(template)
        .with_context(|| format!("Failed to read template '{template}'"))?;
    let records = parse(&text)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
    } else {
        print_records(&records);
    }
    Ok(())
}

/// Generate shell completions for the `jbl` binary.
pub fn cmd_completions(shell: Shell) {
    use clap::CommandFactory;
    use crate::cli::Cli;

    let mut app = Cli::command();
    let app_name = app.get_name().to_string();
    generate(shell, &mut app, app_name, &mut std::io::stdout());
}

/// "1 Epic, 2 Task, 1 Sub-task" style issue counts.
pub fn count_summary(records: &[Record]) -> String {
    [Level::Epic, Level::Task, Level::Subtask]
        .into_iter()
        .map(|level| {
            let n = records
                .iter()
                .filter_map(Record::as_task)
                .filter(|t| t.level == level)
                .count();
            format!("{n} {}", format_level(level))
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Print records in a table, sub-tasks indented under their task.
pub fn print_records(records: &[Record]) {
    println!("{:<9} {:<12} {:<11} {}", "Level", "Assignee", "Due", "Summary");
    for record in records {
        println!("{}", render_record(record));
    }
}

/// One table row for a record.
pub fn render_record(record: &Record) -> String {
    match record {
        Record::Task(task) => {
            let indent = if task.level == Level::Subtask { "  " } else { "" };
            let due = task
                .due_date
                .map(|d| d.to_string())
                .unwrap_or_else(|| "-".into());
            let mut row = format!(
                "{:<9} {:<12} {:<11} {}{}",
                format_level(task.level),
                truncate(&task.assignee, 12),
                due,
                indent,
                task.summary
            );
            if !task.metadata.is_empty() {
                let keys: Vec<&str> = task.metadata.keys().map(String::as_str).collect();
                row.push_str(&format!(" [{}]", keys.join(",")));
            }
            row
        }
        Record::Text { text } => format!("{:<9} {:<12} {:<11} {}", "text", "-", "-", text),
    }
}

/// Truncate a string to a maximum width, adding ellipsis if needed.
pub fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let mut out = String::new();
        for (i, ch) in s.chars().enumerate() {
            if i + 1 >= width {
                out.push('…');
                break;
            }
            out.push(ch);
        }
        out
    }
}
