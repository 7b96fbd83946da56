//! Error types for the loader.
//!
//! Every failure the parser, validation and tracker client can produce is a variant of
//! [`LoaderError`]. All of them are fatal to the current run.

use thiserror::Error;

/// Main error type for loader operations
#[derive(Error, Debug)]
pub enum LoaderError {
    // =========================================================================
    // Template Errors
    // =========================================================================
    /// No project key in the task metadata nor in the default parameters
    #[error("Missing project key in line: {summary}")]
    TemplateProject { summary: String },

    /// A JSON-shaped line or inline JSON that does not parse
    #[error("Malformed JSON in line: {line}")]
    TemplateJson {
        line: String,
        #[source]
        source: serde_json::Error,
    },

    /// Due date with the right shape but no such calendar day
    #[error("Invalid due date '{value}' in line: {line}")]
    TemplateDate { line: String, value: String },

    /// Sub-task bullet with no task header before it
    #[error("Sub-task '{summary}' has no parent task (add an h5. header above it)")]
    OrphanSubtask { summary: String },

    // =========================================================================
    // Tracker Errors
    // =========================================================================
    /// Credentials rejected (401/403)
    #[error("Your username and password are not accepted by Jira (status {status}).")]
    TrackerAuth { status: u16 },

    /// Assignee and project combination rejected
    #[error("{}", validation_message(.user, .project, .status, .body))]
    TrackerValidation {
        user: String,
        project: String,
        status: Option<u16>,
        body: String,
    },

    /// Issue creation rejected for a non-auth reason
    #[error("The task cannot be created: {summary}\nJira response: Error {status}, {body}")]
    TrackerCreation {
        summary: String,
        status: u16,
        body: String,
    },

    /// Link or description update rejected
    #[error("Jira {operation} failed: Error {status}, {body}")]
    TrackerRequest {
        operation: &'static str,
        status: u16,
        body: String,
    },

    /// No HTTP response at all (connect, timeout, decode)
    #[error("Jira {operation} failed: {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid or incomplete configuration
    #[error("Configuration error: {message}")]
    Config { message: String },

    // =========================================================================
    // Wrapped Errors
    // =========================================================================
    /// IO error wrapper
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn validation_message(user: &str, project: &str, status: &Option<u16>, body: &str) -> String {
    match status {
        Some(code) => format!(
            "The username '{user}' and the project '{project}' can not be validated.\nJira response: Error {code}, {body}"
        ),
        None => format!("The username '{user}' specified in template can not be validated."),
    }
}

impl LoaderError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a template JSON error for the given line
    pub fn template_json(line: impl Into<String>, source: serde_json::Error) -> Self {
        Self::TemplateJson {
            line: line.into(),
            source,
        }
    }

    /// Whether the error was caused by the template text rather than by Jira
    pub fn is_template_error(&self) -> bool {
        matches!(
            self,
            Self::TemplateProject { .. }
                | Self::TemplateJson { .. }
                | Self::TemplateDate { .. }
                | Self::OrphanSubtask { .. }
        )
    }
}

/// Convenience alias for loader results
pub type Result<T> = std::result::Result<T, LoaderError>;
