//! Loader configuration.
//!
//! Settings come from an optional JSON file, then command-line flags and environment
//! variables on top. The file uses the same JSON the templates use for metadata:
//!
//! ```json
//! {
//!   "jira_url": "https://jira.example.com",
//!   "username": "alice",
//!   "default_params": {"project": {"key": "PRJ"}, "priority": {"name": "Major"}},
//!   "issue_types": {"epic": "Epic"}
//! }
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{LoaderError, Result};
use crate::fields::IssueTypes;
use crate::task::project_key_of;
use crate::tracker::DEFAULT_LINK_TYPE;

/// Everything the loader needs to talk to Jira.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub jira_url: Option<String>,
    pub username: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    /// Default issue fields; task metadata overrides them key by key.
    pub default_params: Map<String, Value>,
    pub dry_run: bool,
    pub link_type: String,
    pub issue_types: IssueTypes,
    pub timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            jira_url: None,
            username: None,
            password: None,
            default_params: Map::new(),
            dry_run: false,
            link_type: DEFAULT_LINK_TYPE.to_string(),
            issue_types: IssueTypes::default(),
            timeout_secs: 30,
        }
    }
}

/// Values supplied on the command line or through the environment.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub jira_url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Raw JSON object merged over `default_params`.
    pub params: Option<String>,
    pub dry_run: bool,
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let buf = fs::read_to_string(path).map_err(|e| {
            LoaderError::config(format!("cannot read {}: {e}", path.display()))
        })?;
        serde_json::from_str(&buf)
            .map_err(|e| LoaderError::config(format!("cannot parse {}: {e}", path.display())))
    }

    /// Load from `path` when given, otherwise start from defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Config::default()),
        }
    }

    /// Apply command-line and environment values on top of the file values.
    pub fn apply(&mut self, overrides: ConfigOverrides) -> Result<()> {
        if overrides.jira_url.is_some() {
            self.jira_url = overrides.jira_url;
        }
        if overrides.username.is_some() {
            self.username = overrides.username;
        }
        if overrides.password.is_some() {
            self.password = overrides.password;
        }
        if let Some(raw) = overrides.params {
            let params: Map<String, Value> = serde_json::from_str(&raw).map_err(|e| {
                LoaderError::config(format!("--params must be a JSON object: {e}"))
            })?;
            self.default_params.extend(params);
        }
        self.dry_run |= overrides.dry_run;
        Ok(())
    }

    /// Check that a live run has a URL and credentials.
    pub fn validate(&self) -> Result<()> {
        if self.link_type.trim().is_empty() {
            return Err(LoaderError::config("link_type cannot be empty"));
        }
        if self.dry_run {
            return Ok(());
        }
        let missing: Vec<&str> = [
            ("jira_url", self.jira_url.is_none()),
            ("username", self.username.is_none()),
            ("password", self.password.is_none()),
        ]
        .into_iter()
        .filter_map(|(name, absent)| absent.then_some(name))
        .collect();
        if !missing.is_empty() {
            return Err(LoaderError::config(format!(
                "missing {} (required unless --dry-run)",
                missing.join(", ")
            )));
        }
        Ok(())
    }

    /// Project key from `default_params.project.key`.
    pub fn default_project(&self) -> Option<&str> {
        project_key_of(&self.default_params)
    }
}
