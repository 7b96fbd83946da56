//! Pre-flight validation of parsed records.
//!
//! Runs before anything is created so that a template mistake never leaves a half
//! created hierarchy behind in Jira.

use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::error::{LoaderError, Result};
use crate::fields::Level;
use crate::task::{project_key_of, Record, TaskRecord};
use crate::tracker::Tracker;

/// Resolve the project key for a task: its own `project.key`, then the default one.
pub fn project_for<'a>(task: &'a TaskRecord, defaults: &'a Map<String, Value>) -> Result<&'a str> {
    task.project_key()
        .or_else(|| project_key_of(defaults))
        .ok_or_else(|| LoaderError::TemplateProject {
            summary: task.summary.clone(),
        })
}

/// Reject sub-tasks that have no task header to hang from.
///
/// An epic header closes the open task, so a bullet right after an epic is orphaned too.
pub fn check_structure(records: &[Record]) -> Result<()> {
    let mut task_open = false;
    for task in records.iter().filter_map(Record::as_task) {
        match task.level {
            Level::Task => task_open = true,
            Level::Epic => task_open = false,
            Level::Subtask if !task_open => {
                return Err(LoaderError::OrphanSubtask {
                    summary: task.summary.clone(),
                })
            }
            Level::Subtask => {}
        }
    }
    Ok(())
}

/// Validate records against the tracker before creating anything.
///
/// Every task must resolve a project key. Each distinct assignee is checked once, in
/// order of first appearance, against the project of the task it first appears on.
pub fn validate(
    records: &[Record],
    defaults: &Map<String, Value>,
    tracker: &mut dyn Tracker,
) -> Result<()> {
    check_structure(records)?;

    let mut checked: HashSet<&str> = HashSet::new();
    for task in records.iter().filter_map(Record::as_task) {
        let project = project_for(task, defaults)?;
        if !checked.insert(task.assignee.as_str()) {
            continue;
        }

        tracing::debug!(assignee = %task.assignee, project, "validating assignee");
        let users = tracker.find_assignable_users(&task.assignee, project)?;
        if users.is_empty() {
            return Err(LoaderError::TrackerValidation {
                user: task.assignee.clone(),
                project: project.to_string(),
                status: None,
                body: String::new(),
            });
        }
    }
    Ok(())
}
