//! Template parsing.
//!
//! This module turns template text into an ordered list of [`Record`]s. Each line is
//! first run through template variable substitution, then classified by [`classify`]
//! into one of five shapes:
//!
//! - `h4. Summary *user* %2024-01-31% {"json":1}`: task header (epic, task or sub-task)
//! - `=more text`: description continuation for the last task header
//! - `[name=value]`: template variable, used later as `$name`
//! - `{"project":{"key":"PRJ"}}`: standalone JSON merged into later task metadata
//! - anything else: plain text
//!
//! Parse state lives in a [`ParseState`] owned by a single [`parse`] call.

use std::borrow::Cow;

use chrono::NaiveDate;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use crate::error::{LoaderError, Result};
use crate::fields::Level;
use crate::task::{Record, TaskRecord};

static TASK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(h5\.|h4\.|#[*#]?)\s+(.+)\s+\*(\w+)\*(?:\s+%([0-9]{4}-[0-9]{2}-[0-9]{2})%)?(?:\s+(\{.+\}))?$",
    )
    .expect("task header regex")
});

static VAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\[(\w+)=(.+)\]$").expect("variable regex"));

static JSON_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\{.+\}$").expect("json line regex"));

// ============================================================================
// Line Classification
// ============================================================================

/// A task header as read from a single line, before template JSON is applied.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskHeader {
    pub level: Level,
    pub markup: String,
    pub summary: String,
    pub assignee: String,
    pub due_date: Option<NaiveDate>,
    pub inline_json: Map<String, Value>,
}

/// The shape of one (already substituted) template line.
#[derive(Debug, Clone, PartialEq)]
pub enum Line<'a> {
    TaskHeader(TaskHeader),
    /// Text after the leading `=`.
    Description(&'a str),
    VarAssign { name: &'a str, value: &'a str },
    JsonLine(Map<String, Value>),
    PlainText(&'a str),
}

/// Classify a single line.
///
/// Shapes are tried in priority order: task header, description, variable
/// assignment, standalone JSON, plain text. Fails only when a JSON-shaped part does
/// not parse or a due date names a day that does not exist.
pub fn classify(line: &str) -> Result<Line<'_>> {
    if let Some(caps) = TASK_RE.captures(line) {
        let markup = &caps[1];
        let Some(level) = Level::from_markup(markup) else {
            return Ok(Line::PlainText(line));
        };
        let due_date = match caps.get(4) {
            Some(m) => Some(NaiveDate::parse_from_str(m.as_str(), "%Y-%m-%d").map_err(|_| {
                LoaderError::TemplateDate {
                    line: line.to_string(),
                    value: m.as_str().to_string(),
                }
            })?),
            None => None,
        };
        let inline_json = match caps.get(5) {
            Some(m) => parse_json_object(m.as_str(), line)?,
            None => Map::new(),
        };
        return Ok(Line::TaskHeader(TaskHeader {
            level,
            markup: markup.to_string(),
            summary: caps[2].to_string(),
            assignee: caps[3].to_string(),
            due_date,
            inline_json,
        }));
    }

    if let Some(rest) = line.strip_prefix('=') {
        return Ok(Line::Description(rest));
    }

    if let Some(caps) = VAR_RE.captures(line) {
        let (Some(name), Some(value)) = (caps.get(1), caps.get(2)) else {
            return Ok(Line::PlainText(line));
        };
        return Ok(Line::VarAssign {
            name: name.as_str(),
            value: value.as_str(),
        });
    }

    if JSON_RE.is_match(line) {
        return Ok(Line::JsonLine(parse_json_object(line, line)?));
    }

    Ok(Line::PlainText(line))
}

fn parse_json_object(text: &str, line: &str) -> Result<Map<String, Value>> {
    serde_json::from_str(text).map_err(|e| LoaderError::template_json(line, e))
}

// ============================================================================
// Parse State
// ============================================================================

/// Template variables and JSON accumulated while reading one template.
#[derive(Debug, Default)]
pub struct ParseState {
    vars: IndexMap<String, String>,
    json: Map<String, Value>,
}

impl ParseState {
    /// Replace every `$name` with its value, variables applied in definition order.
    pub fn substitute<'a>(&self, line: &'a str) -> Cow<'a, str> {
        if self.vars.is_empty() {
            return Cow::Borrowed(line);
        }
        let mut out = line.to_string();
        for (name, value) in &self.vars {
            out = out.replace(&format!("${name}"), value);
        }
        Cow::Owned(out)
    }

    /// Build a task record, binding the template JSON in effect right now.
    fn task_record(&self, header: TaskHeader) -> TaskRecord {
        let mut metadata = self.json.clone();
        metadata.extend(header.inline_json);
        TaskRecord {
            level: header.level,
            markup: header.markup,
            summary: header.summary,
            assignee: header.assignee,
            due_date: header.due_date,
            description: None,
            metadata,
        }
    }
}

// ============================================================================
// Parsing
// ============================================================================

/// Parse template text into records.
///
/// Leading blank lines are skipped and trailing whitespace is trimmed from every line
/// after substitution.
///
/// # Example
///
/// ```ignore
/// let records = parse("h5. Write docs *bob*\n=In English please")?;
/// assert_eq!(records.len(), 1);
/// ```
pub fn parse(input: &str) -> Result<Vec<Record>> {
    let mut state = ParseState::default();
    let mut records: Vec<Record> = Vec::new();

    for (idx, raw) in input
        .lines()
        .enumerate()
        .skip_while(|(_, l)| l.trim().is_empty())
    {
        let substituted = state.substitute(raw);
        let line = substituted.trim_end();

        match classify(line)? {
            Line::TaskHeader(header) => {
                tracing::debug!(line = idx + 1, level = ?header.level, summary = %header.summary, "task header");
                records.push(Record::Task(state.task_record(header)));
            }
            Line::Description(text) => match last_task_mut(&mut records) {
                Some(task) => task.push_description(text),
                None => {
                    tracing::debug!(line = idx + 1, "description before any task header, kept as text");
                    records.push(Record::Text {
                        text: line.to_string(),
                    });
                }
            },
            Line::VarAssign { name, value } => {
                tracing::debug!(line = idx + 1, name, value, "template variable");
                state.vars.insert(name.to_string(), value.to_string());
            }
            Line::JsonLine(object) => {
                tracing::debug!(line = idx + 1, keys = object.len(), "template json");
                state.json.extend(object);
            }
            Line::PlainText(text) => records.push(Record::Text {
                text: text.to_string(),
            }),
        }
    }

    Ok(records)
}

fn last_task_mut(records: &mut [Record]) -> Option<&mut TaskRecord> {
    records.iter_mut().rev().find_map(|r| match r {
        Record::Task(task) => Some(task),
        Record::Text { .. } => None,
    })
}
