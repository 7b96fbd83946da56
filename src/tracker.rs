//! The issue tracker seam.
//!
//! Validation and the assembler only talk to Jira through [`Tracker`], so tests can
//! substitute a recording double and dry runs can skip the network entirely.

use serde_json::{Map, Value};

use crate::error::Result;

/// Key returned for every issue "created" during a dry run.
pub const DRY_RUN_KEY: &str = "DRY-RUN-XXXX";

/// Link type used between the epic and its tasks unless configured otherwise.
pub const DEFAULT_LINK_TYPE: &str = "Inclusion";

/// Operations the loader needs from an issue tracker.
///
/// Calls are made strictly in sequence and any error aborts the run.
pub trait Tracker {
    /// Create an issue from a Jira `fields` object and return its key.
    fn create_issue(&mut self, fields: &Map<String, Value>) -> Result<String>;

    /// Link `inward` to `outward` with the given link type name.
    fn create_link(&mut self, inward: &str, outward: &str, link_type: &str) -> Result<()>;

    /// Replace the description of an existing issue.
    fn update_issue_description(&mut self, issue_key: &str, description: &str) -> Result<()>;

    /// Users that may be assigned issues in `project`; empty means "not assignable".
    fn find_assignable_users(&mut self, username: &str, project: &str) -> Result<Vec<Value>>;
}
