//! Issue creation from parsed records.
//!
//! The assembler walks the records once. Tasks are created as soon as their header is
//! seen so their sub-tasks can point at the parent key; the epic is held back until the
//! end so every task key is known when the links are made. Sub-task captions and loose
//! text lines are folded into the open task's description, which is pushed back to Jira
//! when the task is completed.

use serde_json::{Map, Value};

use crate::config::Config;
use crate::error::{LoaderError, Result};
use crate::fields::{IssueTypes, Level};
use crate::task::{Record, TaskRecord};
use crate::tracker::{Tracker, DEFAULT_LINK_TYPE};

/// Issue defaults shared by every created issue.
#[derive(Debug, Clone)]
pub struct IssueSettings {
    pub default_params: Map<String, Value>,
    pub issue_types: IssueTypes,
    pub link_type: String,
}

impl Default for IssueSettings {
    fn default() -> Self {
        IssueSettings {
            default_params: Map::new(),
            issue_types: IssueTypes::default(),
            link_type: DEFAULT_LINK_TYPE.to_string(),
        }
    }
}

impl IssueSettings {
    pub fn from_config(config: &Config) -> Self {
        IssueSettings {
            default_params: config.default_params.clone(),
            issue_types: config.issue_types.clone(),
            link_type: config.link_type.clone(),
        }
    }
}

/// The task currently collecting sub-tasks and text.
#[derive(Debug)]
struct TaskContext {
    key: String,
    caption: String,
    description: Option<String>,
    extension: String,
}

impl TaskContext {
    fn extend(&mut self, line: &str) {
        if self.extension.is_empty() {
            self.extension = line.to_string();
        } else {
            self.extension.push('\n');
            self.extension.push_str(line);
        }
    }
}

pub struct Assembler<'a> {
    tracker: &'a mut dyn Tracker,
    settings: &'a IssueSettings,
    current_task: Option<TaskContext>,
    pending_epic: Option<TaskRecord>,
    task_keys: Vec<String>,
    report: Vec<String>,
}

impl<'a> Assembler<'a> {
    pub fn new(tracker: &'a mut dyn Tracker, settings: &'a IssueSettings) -> Self {
        Assembler {
            tracker,
            settings,
            current_task: None,
            pending_epic: None,
            task_keys: Vec::new(),
            report: Vec::new(),
        }
    }

    /// Create every issue and return the summary report.
    pub fn run(mut self, records: Vec<Record>) -> Result<String> {
        for record in records {
            match record {
                Record::Task(task) => match task.level {
                    Level::Task => {
                        self.complete_task()?;
                        self.open_task(task)?;
                    }
                    Level::Subtask => self.create_subtask(task)?,
                    Level::Epic => {
                        self.complete_task()?;
                        if let Some(previous) = self.pending_epic.replace(task) {
                            tracing::warn!(replaced = %previous.summary, "second epic header replaces the first");
                        }
                    }
                },
                Record::Text { text } => match self.current_task.as_mut() {
                    Some(ctx) => ctx.extend(&text),
                    None => tracing::debug!(text = %text, "text before any task header dropped"),
                },
            }
        }

        self.complete_task()?;
        self.finish_epic()?;
        Ok(self.report.join("\n"))
    }

    fn create(&mut self, task: &TaskRecord, parent: Option<&str>) -> Result<String> {
        let issue_type = self.settings.issue_types.for_level(task.level);
        let fields = task.issue_fields(&self.settings.default_params, issue_type, parent);
        let key = self.tracker.create_issue(&fields)?;
        tracing::info!(key = %key, issue_type, summary = %task.summary, "created issue");
        Ok(key)
    }

    fn open_task(&mut self, task: TaskRecord) -> Result<()> {
        let key = self.create(&task, None)?;
        self.task_keys.push(key.clone());
        self.current_task = Some(TaskContext {
            caption: task.caption(&key),
            description: task.description,
            key,
            extension: String::new(),
        });
        Ok(())
    }

    fn create_subtask(&mut self, task: TaskRecord) -> Result<()> {
        let Some(parent) = self.current_task.as_ref().map(|ctx| ctx.key.clone()) else {
            return Err(LoaderError::OrphanSubtask {
                summary: task.summary,
            });
        };
        let key = self.create(&task, Some(&parent))?;
        if let Some(ctx) = self.current_task.as_mut() {
            ctx.extend(&task.caption(&key));
        }
        Ok(())
    }

    /// Close the open task: push the merged description and add its report block.
    fn complete_task(&mut self) -> Result<()> {
        let Some(ctx) = self.current_task.take() else {
            return Ok(());
        };

        let mut description = ctx.description.filter(|d| !d.is_empty());
        if !ctx.extension.is_empty() {
            let merged = match description {
                Some(desc) => format!("{desc}\n{}", ctx.extension),
                None => ctx.extension,
            };
            self.tracker.update_issue_description(&ctx.key, &merged)?;
            description = Some(merged);
        }

        let mut block = ctx.caption;
        if let Some(desc) = description {
            block.push('\n');
            block.push_str(&desc);
        }
        self.report.push(block);
        Ok(())
    }

    fn finish_epic(&mut self) -> Result<()> {
        let Some(epic) = self.pending_epic.take() else {
            return Ok(());
        };

        let key = self.create(&epic, None)?;
        for task_key in &self.task_keys {
            self.tracker
                .create_link(&key, task_key, &self.settings.link_type)?;
        }
        tracing::info!(key = %key, links = self.task_keys.len(), "linked tasks to epic");
        self.report.insert(0, epic.caption(&key));
        Ok(())
    }
}

/// Create the issues for `records` through `tracker` and return the summary report.
pub fn create_tasks(
    records: Vec<Record>,
    tracker: &mut dyn Tracker,
    settings: &IssueSettings,
) -> Result<String> {
    Assembler::new(tracker, settings).run(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jira::JiraClient;
    use crate::parser::parse;
    use crate::tracker::testing::{Call, RecordingTracker};
    use crate::tracker::DRY_RUN_KEY;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::time::Duration;

    const EXAMPLE: &str = "h4. Epic Summary *alice*\n\
                           h5. Task One *bob* {\"priority\":\"High\"}\n\
                           = First line of description\n\
                           # Sub task A *carol*\n\
                           h5. Task Two *bob*\n";

    fn settings() -> IssueSettings {
        IssueSettings {
            default_params: json!({"project": {"key": "PRJ"}}).as_object().cloned().unwrap(),
            ..IssueSettings::default()
        }
    }

    fn summaries(tracker: &RecordingTracker) -> Vec<String> {
        tracker
            .created()
            .iter()
            .map(|f| f["summary"].as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_example_call_sequence_and_report() {
        let mut tracker = RecordingTracker::default();
        let report = create_tasks(parse(EXAMPLE).unwrap(), &mut tracker, &settings()).unwrap();

        assert_eq!(
            summaries(&tracker),
            vec!["Task One", "Sub task A", "Task Two", "Epic Summary"]
        );
        let created = tracker.created();
        assert_eq!(created[1]["parent"], json!({"key": "PRJ-1"}));
        assert_eq!(created[1]["issuetype"], json!({"name": "Sub-task"}));
        assert_eq!(created[0]["priority"], json!("High"));
        assert_eq!(created[0]["project"], json!({"key": "PRJ"}));
        assert_eq!(created[0]["description"], json!(" First line of description"));

        let rest: Vec<&Call> = tracker
            .calls
            .iter()
            .filter(|c| !matches!(c, Call::Create(_)))
            .collect();
        assert_eq!(
            rest,
            vec![
                &Call::Update {
                    key: "PRJ-1".into(),
                    description: " First line of description\n# Sub task A (PRJ-2)".into()
                },
                &Call::Link {
                    inward: "PRJ-4".into(),
                    outward: "PRJ-1".into(),
                    link_type: "Inclusion".into()
                },
                &Call::Link {
                    inward: "PRJ-4".into(),
                    outward: "PRJ-3".into(),
                    link_type: "Inclusion".into()
                },
            ]
        );

        assert_eq!(
            report,
            "h4. Epic Summary (PRJ-4)\n\
             h5. Task One (PRJ-1)\n First line of description\n# Sub task A (PRJ-2)\n\
             h5. Task Two (PRJ-3)"
        );
    }

    #[test]
    fn test_update_happens_before_next_task_is_created() {
        let mut tracker = RecordingTracker::default();
        create_tasks(parse(EXAMPLE).unwrap(), &mut tracker, &settings()).unwrap();
        let update_at = tracker
            .calls
            .iter()
            .position(|c| matches!(c, Call::Update { .. }))
            .unwrap();
        assert!(matches!(&tracker.calls[update_at + 1], Call::Create(f) if f["summary"] == "Task Two"));
    }

    #[test]
    fn test_example_dry_run() {
        let mut jira = JiraClient::new("http://127.0.0.1:9", "u", "p", Duration::from_secs(1))
            .unwrap()
            .with_dry_run(true);
        let report = create_tasks(parse(EXAMPLE).unwrap(), &mut jira, &settings()).unwrap();
        let lines: Vec<&str> = report.lines().collect();
        assert_eq!(lines[0], format!("h4. Epic Summary ({DRY_RUN_KEY})"));
        assert_eq!(lines[1], format!("h5. Task One ({DRY_RUN_KEY})"));
        assert_eq!(lines[2], " First line of description");
        assert_eq!(lines[3], format!("# Sub task A ({DRY_RUN_KEY})"));
        assert_eq!(lines[4], format!("h5. Task Two ({DRY_RUN_KEY})"));
        assert_eq!(lines.len(), 5);
    }

    #[test]
    fn test_text_lines_join_task_description() {
        let input = "stray before\nh5. Task *bob*\n=Intro\nfree text\n# Sub *carol*\nmore text";
        let mut tracker = RecordingTracker::default();
        let report = create_tasks(parse(input).unwrap(), &mut tracker, &settings()).unwrap();
        assert_eq!(
            report,
            "h5. Task (PRJ-1)\nIntro\nfree text\n# Sub (PRJ-2)\nmore text"
        );
        assert_eq!(
            tracker.calls.last(),
            Some(&Call::Update {
                key: "PRJ-1".into(),
                description: "Intro\nfree text\n# Sub (PRJ-2)\nmore text".into()
            })
        );
    }

    #[test]
    fn test_task_without_extension_sends_no_update() {
        let input = "h5. Only *bob*\n=Already described";
        let mut tracker = RecordingTracker::default();
        let report = create_tasks(parse(input).unwrap(), &mut tracker, &settings()).unwrap();
        assert_eq!(report, "h5. Only (PRJ-1)\nAlready described");
        assert!(!tracker.calls.iter().any(|c| matches!(c, Call::Update { .. })));
        assert!(!tracker.calls.iter().any(|c| matches!(c, Call::Link { .. })));
    }

    #[test]
    fn test_second_epic_replaces_first() {
        let input = "h4. First epic *alice*\nh5. Task *bob*\nh4. Second epic *alice*";
        let mut tracker = RecordingTracker::default();
        let report = create_tasks(parse(input).unwrap(), &mut tracker, &settings()).unwrap();
        assert_eq!(summaries(&tracker), vec!["Task", "Second epic"]);
        assert_eq!(report, "h4. Second epic (PRJ-2)\nh5. Task (PRJ-1)");
    }

    #[test]
    fn test_epic_only() {
        let mut tracker = RecordingTracker::default();
        let report = create_tasks(
            parse("h4. Lone epic *alice* %2024-06-30%").unwrap(),
            &mut tracker,
            &settings(),
        )
        .unwrap();
        assert_eq!(report, "h4. Lone epic (PRJ-1)");
        assert_eq!(tracker.created()[0]["duedate"], json!("2024-06-30"));
        assert_eq!(tracker.calls.len(), 1);
    }

    #[test]
    fn test_configured_issue_types_and_link_type() {
        let settings = IssueSettings {
            issue_types: IssueTypes {
                epic: "Epic".into(),
                task: "Story".into(),
                subtask: "Sub-task".into(),
            },
            link_type: "Relates".into(),
            ..settings()
        };
        let mut tracker = RecordingTracker::default();
        create_tasks(parse(EXAMPLE).unwrap(), &mut tracker, &settings).unwrap();
        let types: Vec<Value> = tracker
            .created()
            .iter()
            .map(|f| f["issuetype"]["name"].clone())
            .collect();
        assert_eq!(types, vec![json!("Story"), json!("Sub-task"), json!("Story"), json!("Epic")]);
        assert!(tracker
            .calls
            .iter()
            .any(|c| matches!(c, Call::Link { link_type, .. } if link_type == "Relates")));
    }

    #[test]
    fn test_orphan_subtask_is_fatal() {
        let mut tracker = RecordingTracker::default();
        let err = create_tasks(parse("# Sub *bob*").unwrap(), &mut tracker, &settings())
            .unwrap_err();
        assert!(matches!(err, LoaderError::OrphanSubtask { .. }));
        assert!(tracker.calls.is_empty());
    }

    #[test]
    fn test_tracker_failure_aborts_run() {
        let mut tracker = RecordingTracker {
            reject_summary: Some("Sub task A".into()),
            ..RecordingTracker::default()
        };
        let err = create_tasks(parse(EXAMPLE).unwrap(), &mut tracker, &settings()).unwrap_err();
        assert!(matches!(err, LoaderError::TrackerCreation { .. }));
        assert_eq!(summaries(&tracker), vec!["Task One"]);
        assert_eq!(tracker.calls.len(), 1);
    }

    #[test]
    fn test_failed_update_stops_before_next_task() {
        let mut tracker = RecordingTracker {
            reject_update: Some("PRJ-1".into()),
            ..RecordingTracker::default()
        };
        let err = create_tasks(parse(EXAMPLE).unwrap(), &mut tracker, &settings()).unwrap_err();
        assert!(matches!(
            err,
            LoaderError::TrackerRequest { operation: "description update", .. }
        ));
        assert_eq!(summaries(&tracker), vec!["Task One", "Sub task A"]);
        assert!(!tracker.calls.iter().any(|c| matches!(c, Call::Update { .. })));
    }

    #[test]
    fn test_failed_link_stops_remaining_links() {
        let mut tracker = RecordingTracker {
            reject_link: Some("PRJ-1".into()),
            ..RecordingTracker::default()
        };
        let err = create_tasks(parse(EXAMPLE).unwrap(), &mut tracker, &settings()).unwrap_err();
        assert!(matches!(
            err,
            LoaderError::TrackerRequest { operation: "issue link", .. }
        ));
        assert_eq!(
            summaries(&tracker),
            vec!["Task One", "Sub task A", "Task Two", "Epic Summary"]
        );
        assert!(!tracker.calls.iter().any(|c| matches!(c, Call::Link { .. })));
    }

    #[test]
    fn test_template_json_cannot_reparent_issues() {
        let template = "{\"parent\":{\"key\":\"OLD-9\"},\"duedate\":\"1999-01-01\"}\n\
                        h5. Task *bob*\n\
                        h4. Epic *alice*";
        let mut tracker = RecordingTracker::default();
        create_tasks(parse(template).unwrap(), &mut tracker, &settings()).unwrap();
        for fields in tracker.created() {
            assert!(!fields.contains_key("parent"));
            assert!(!fields.contains_key("duedate"));
        }
    }
}
