//! Jira REST v2 client.
//!
//! Implements [`Tracker`] over `reqwest`'s blocking client with HTTP basic auth. In dry
//! run mode no request is ever sent: creations return [`DRY_RUN_KEY`] and every
//! assignee is reported as assignable.

use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::config::Config;
use crate::error::{LoaderError, Result};
use crate::tracker::{Tracker, DRY_RUN_KEY};

const BODY_PREVIEW_LIMIT: usize = 512;

#[derive(Debug, Deserialize)]
struct CreatedIssue {
    key: String,
}

fn preview_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "<empty body>".to_string();
    }
    let mut out: String = trimmed.chars().take(BODY_PREVIEW_LIMIT).collect();
    if trimmed.chars().count() > BODY_PREVIEW_LIMIT {
        out.push_str("...");
    }
    out
}

fn is_auth_failure(status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN
}

/// Read the status and a short body preview from a failed response.
fn failure(resp: Response) -> (u16, String) {
    let status = resp.status().as_u16();
    let body = resp.text().unwrap_or_default();
    (status, preview_body(&body))
}

pub struct JiraClient {
    http: Client,
    username: String,
    password: String,
    dry_run: bool,
    url_issue: String,
    url_link: String,
    url_assignable: String,
}

impl JiraClient {
    pub fn new(
        base_url: &str,
        username: impl Into<String>,
        password: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| LoaderError::Transport {
                operation: "client setup",
                source,
            })?;
        let normalized = base_url.trim_end_matches('/');
        Ok(Self {
            http,
            username: username.into(),
            password: password.into(),
            dry_run: false,
            url_issue: format!("{normalized}/rest/api/2/issue"),
            url_link: format!("{normalized}/rest/api/2/issueLink"),
            url_assignable: format!("{normalized}/rest/api/2/user/assignable/search"),
        })
    }

    /// Build a client from validated configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = Self::new(
            config.jira_url.as_deref().unwrap_or_default(),
            config.username.clone().unwrap_or_default(),
            config.password.clone().unwrap_or_default(),
            Duration::from_secs(config.timeout_secs),
        )?;
        Ok(client.with_dry_run(config.dry_run))
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    fn send(&self, req: RequestBuilder, operation: &'static str) -> Result<Response> {
        req.basic_auth(&self.username, Some(&self.password))
            .send()
            .map_err(|source| LoaderError::Transport { operation, source })
    }

    /// Map a non-success response from a link or update call.
    fn request_failure(resp: Response, operation: &'static str) -> LoaderError {
        if is_auth_failure(resp.status()) {
            return LoaderError::TrackerAuth {
                status: resp.status().as_u16(),
            };
        }
        let (status, body) = failure(resp);
        LoaderError::TrackerRequest {
            operation,
            status,
            body,
        }
    }
}

impl Tracker for JiraClient {
    fn create_issue(&mut self, fields: &Map<String, Value>) -> Result<String> {
        let summary = fields
            .get("summary")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        if self.dry_run {
            tracing::debug!(summary = %summary, "dry run: skipping issue creation");
            return Ok(DRY_RUN_KEY.to_string());
        }

        tracing::debug!(url = %self.url_issue, summary = %summary, "creating issue");
        let req = self.http.post(&self.url_issue).json(&json!({ "fields": fields }));
        let resp = self.send(req, "issue creation")?;
        let status = resp.status();
        if is_auth_failure(status) {
            return Err(LoaderError::TrackerAuth {
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            let (status, body) = failure(resp);
            return Err(LoaderError::TrackerCreation {
                summary,
                status,
                body,
            });
        }
        let created: CreatedIssue = resp.json().map_err(|source| LoaderError::Transport {
            operation: "issue creation",
            source,
        })?;
        Ok(created.key)
    }

    fn create_link(&mut self, inward: &str, outward: &str, link_type: &str) -> Result<()> {
        if self.dry_run {
            tracing::debug!(inward, outward, link_type, "dry run: skipping issue link");
            return Ok(());
        }

        let body = json!({
            "type": { "name": link_type },
            "inwardIssue": { "key": inward },
            "outwardIssue": { "key": outward },
        });
        let resp = self.send(self.http.post(&self.url_link).json(&body), "issue link")?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(Self::request_failure(resp, "issue link"))
        }
    }

    fn update_issue_description(&mut self, issue_key: &str, description: &str) -> Result<()> {
        if self.dry_run {
            tracing::debug!(issue_key, "dry run: skipping description update");
            return Ok(());
        }

        let url = format!("{}/{}", self.url_issue, issue_key);
        let body = json!({ "update": { "description": [{ "set": description }] } });
        let resp = self.send(self.http.put(&url).json(&body), "description update")?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(Self::request_failure(resp, "description update"))
        }
    }

    fn find_assignable_users(&mut self, username: &str, project: &str) -> Result<Vec<Value>> {
        if self.dry_run {
            tracing::debug!(username, project, "dry run: assuming assignee is valid");
            return Ok(vec![json!({ "name": username })]);
        }

        let req = self
            .http
            .get(&self.url_assignable)
            .query(&[("username", username), ("project", project)]);
        let resp = self.send(req, "assignee validation")?;
        let status = resp.status();
        if is_auth_failure(status) {
            return Err(LoaderError::TrackerAuth {
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            let (status, body) = failure(resp);
            return Err(LoaderError::TrackerValidation {
                user: username.to_string(),
                project: project.to_string(),
                status: Some(status),
                body,
            });
        }
        resp.json().map_err(|source| LoaderError::Transport {
            operation: "assignee validation",
            source,
        })
    }
}
