//! Enumerations and field types for the task markup.
//!
//! This module defines the hierarchy levels a task header can carry and the issue type
//! names each level is created with in Jira.

use serde::{Deserialize, Serialize};

/// Hierarchy level of a task header, derived from its markup token.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Level {
    /// `h4.` header, created last and linked to every task.
    Epic,
    /// `h5.` header, owns the sub-tasks that follow it.
    Task,
    /// `#`, `##` or `#*` bullet, child of the open task.
    Subtask,
}

impl Level {
    /// Map a markup token to its level.
    pub fn from_markup(markup: &str) -> Option<Level> {
        match markup {
            "h4." => Some(Level::Epic),
            "h5." => Some(Level::Task),
            m if m.starts_with('#') => Some(Level::Subtask),
            _ => None,
        }
    }
}

/// Format a level for display.
pub fn format_level(level: Level) -> &'static str {
    match level {
        Level::Epic => "Epic",
        Level::Task => "Task",
        Level::Subtask => "Sub-task",
    }
}

/// Jira issue type names used for each level.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct IssueTypes {
    pub epic: String,
    pub task: String,
    pub subtask: String,
}

impl Default for IssueTypes {
    fn default() -> Self {
        // Epics are plain tasks that other tasks link into.
        IssueTypes {
            epic: "Task".into(),
            task: "Task".into(),
            subtask: "Sub-task".into(),
        }
    }
}

impl IssueTypes {
    /// Issue type name for the given level.
    pub fn for_level(&self, level: Level) -> &str {
        match level {
            Level::Epic => &self.epic,
            Level::Task => &self.task,
            Level::Subtask => &self.subtask,
        }
    }
}
