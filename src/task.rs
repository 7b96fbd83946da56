//! Parsed record data structures.
//!
//! This module defines the `Record` sequence produced by the parser, the `TaskRecord`
//! carried by every task header, and the conversion of a task into Jira issue fields.

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::fields::Level;

/// Issue fields set by the loader, never taken from defaults or metadata.
pub const CORE_FIELDS: [&str; 6] = [
    "duedate",
    "summary",
    "description",
    "issuetype",
    "assignee",
    "parent",
];

/// One parsed line of the template.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Record {
    /// A task header (`h4.`, `h5.` or a `#` bullet).
    Task(TaskRecord),
    /// A free-standing line, folded into the open task's description.
    Text { text: String },
}

impl Record {
    /// The task record, if this is a task header.
    pub fn as_task(&self) -> Option<&TaskRecord> {
        match self {
            Record::Task(task) => Some(task),
            Record::Text { .. } => None,
        }
    }
}

/// A task header with everything needed to create its issue.
///
/// `metadata` holds the standalone JSON in effect when the header was read, overlaid by
/// the header's own inline JSON.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskRecord {
    pub level: Level,
    pub markup: String,
    pub summary: String,
    pub assignee: String,
    pub due_date: Option<NaiveDate>,
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl TaskRecord {
    /// Append a description line, joining with a newline.
    pub fn push_description(&mut self, line: &str) {
        match self.description.as_mut() {
            Some(desc) => {
                desc.push('\n');
                desc.push_str(line);
            }
            None => self.description = Some(line.to_string()),
        }
    }

    /// Project key from the task's own metadata (`project.key`).
    pub fn project_key(&self) -> Option<&str> {
        project_key_of(&self.metadata)
    }

    /// One-line caption used in the summary report: `<markup> <summary> (<key>)`.
    pub fn caption(&self, issue_key: &str) -> String {
        format!("{} {} ({})", self.markup, self.summary, issue_key)
    }

    /// Build the Jira `fields` object for this task.
    ///
    /// Defaults come first and metadata overrides them key by key. The fields owned by
    /// the loader ([`CORE_FIELDS`]) are then cleared and written only from the record
    /// itself, so metadata never reaches them.
    pub fn issue_fields(
        &self,
        defaults: &Map<String, Value>,
        issue_type: &str,
        parent: Option<&str>,
    ) -> Map<String, Value> {
        let mut fields = defaults.clone();
        fields.extend(self.metadata.iter().map(|(k, v)| (k.clone(), v.clone())));
        fields.retain(|key, _| !CORE_FIELDS.contains(&key.as_str()));
        if let Some(due) = self.due_date {
            fields.insert("duedate".into(), json!(due.format("%Y-%m-%d").to_string()));
        }
        fields.insert("summary".into(), json!(self.summary));
        if let Some(desc) = &self.description {
            fields.insert("description".into(), json!(desc));
        }
        fields.insert("issuetype".into(), json!({ "name": issue_type }));
        fields.insert("assignee".into(), json!({ "name": self.assignee }));
        if let Some(key) = parent {
            fields.insert("parent".into(), json!({ "key": key }));
        }
        fields
    }
}

/// Read `project.key` out of a JSON object.
pub fn project_key_of(object: &Map<String, Value>) -> Option<&str> {
    object.get("project")?.get("key")?.as_str()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> TaskRecord {
        TaskRecord {
            level: Level::Task,
            markup: "h5.".into(),
            summary: "Write docs".into(),
            assignee: "bob".into(),
            due_date: NaiveDate::from_ymd_opt(2024, 5, 1),
            description: None,
            metadata: Map::new(),
        }
    }

    #[test]
    fn test_push_description() {
        let mut task = sample();
        task.push_description("first");
        task.push_description("second");
        assert_eq!(task.description.as_deref(), Some("first\nsecond"));
    }

    #[test]
    fn test_caption() {
        assert_eq!(sample().caption("PRJ-7"), "h5. Write docs (PRJ-7)");
    }

    #[test]
    fn test_issue_fields_precedence() {
        let mut task = sample();
        task.metadata = json!({
            "priority": {"name": "High"},
            "summary": "overridden?",
            "project": {"key": "META"}
        })
        .as_object()
        .cloned()
        .unwrap();
        let defaults = json!({"project": {"key": "DEF"}, "labels": ["bulk"]})
            .as_object()
            .cloned()
            .unwrap();

        let fields = task.issue_fields(&defaults, "Sub-task", Some("PRJ-1"));
        assert_eq!(
            Value::Object(fields),
            json!({
                "project": {"key": "META"},
                "labels": ["bulk"],
                "priority": {"name": "High"},
                "duedate": "2024-05-01",
                "summary": "Write docs",
                "issuetype": {"name": "Sub-task"},
                "assignee": {"name": "bob"},
                "parent": {"key": "PRJ-1"}
            })
        );
    }

    #[test]
    fn test_metadata_cannot_set_core_fields() {
        let mut task = sample();
        task.due_date = None;
        task.metadata = json!({
            "parent": {"key": "OLD-9"},
            "duedate": "1999-01-01",
            "description": "from metadata",
            "labels": ["x"]
        })
        .as_object()
        .cloned()
        .unwrap();
        let defaults = json!({"project": {"key": "DEF"}, "parent": {"key": "DEF-1"}})
            .as_object()
            .cloned()
            .unwrap();

        let fields = task.issue_fields(&defaults, "Task", None);
        assert_eq!(
            Value::Object(fields),
            json!({
                "project": {"key": "DEF"},
                "labels": ["x"],
                "summary": "Write docs",
                "issuetype": {"name": "Task"},
                "assignee": {"name": "bob"}
            })
        );
    }

    #[test]
    fn test_project_key_lookup() {
        let mut task = sample();
        assert_eq!(task.project_key(), None);
        task.metadata.insert("project".into(), json!({"key": "ABC"}));
        assert_eq!(task.project_key(), Some("ABC"));
        task.metadata.insert("project".into(), json!("ABC"));
        assert_eq!(task.project_key(), None);
    }
}
