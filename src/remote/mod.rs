//! Remote issue tracker access.
//!
//! The sync engine sees the tracker through [`RemoteSource`]: a blocking,
//! page-oriented view over boards, sprints, epics, projects and issues.
//! [`JiraRemote`] implements it on top of the async [`JiraClient`].
//!
//! # Submodules
//!
//! - [`client`] - Async Jira REST client
//! - [`blocking`] - `RemoteSource` adapter driving the client on a private runtime

pub mod blocking;
pub mod client;

pub use blocking::JiraRemote;
pub use client::JiraClient;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One page of a listing.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Total number of items, when the remote reports it.
    pub total: Option<usize>,
}

impl<T> Page<T> {
    #[must_use]
    pub fn new(items: Vec<T>, total: Option<usize>) -> Self {
        Self { items, total }
    }
}

/// Read access to a remote tracker.
///
/// Paged methods take the offset of the first item and the page size.
pub trait RemoteSource {
    /// Field definitions, used to pick custom fields worth mirroring.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote request fails.
    fn fields(&self) -> Result<Vec<FieldDef>>;

    /// # Errors
    ///
    /// Returns an error if the remote request fails.
    fn boards(&self, start_at: usize, max_results: usize) -> Result<Page<Board>>;

    /// # Errors
    ///
    /// Returns an error if the remote request fails.
    fn sprints(&self, board: u64, start_at: usize, max_results: usize) -> Result<Page<Sprint>>;

    /// # Errors
    ///
    /// Returns an error if the remote request fails.
    fn sprint_issues(
        &self,
        board: u64,
        sprint: u64,
        start_at: usize,
        max_results: usize,
    ) -> Result<Page<Issue>>;

    /// # Errors
    ///
    /// Returns an error if the remote request fails.
    fn epics(&self, board: u64, start_at: usize, max_results: usize) -> Result<Page<Epic>>;

    /// # Errors
    ///
    /// Returns an error if the remote request fails.
    fn epic_issues(
        &self,
        board: u64,
        epic: u64,
        start_at: usize,
        max_results: usize,
    ) -> Result<Page<Issue>>;

    /// # Errors
    ///
    /// Returns an error if the remote request fails.
    fn backlog_issues(&self, board: u64, start_at: usize, max_results: usize)
    -> Result<Page<Issue>>;

    /// Every visible project.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote request fails.
    fn projects(&self) -> Result<Vec<Project>>;

    /// Full project description.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote request fails.
    fn project(&self, key: &str) -> Result<Project>;

    /// # Errors
    ///
    /// Returns an error if the remote request fails.
    fn search_issues(&self, jql: &str, start_at: usize, max_results: usize) -> Result<Page<Issue>>;

    /// Look up a user by login name. Unknown users are `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote request fails.
    fn user(&self, name: &str) -> Result<Option<User>>;
}

// ── Entities ──────────────────────────────────────────────────

/// Entity with just a name (priority, status, component, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Named {
    #[serde(default)]
    pub name: String,
}

impl Named {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct User {
    pub name: String,
    pub display_name: String,
    pub email_address: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FieldSchema {
    #[serde(rename = "type")]
    pub kind: String,
}

/// Field definition from `/rest/api/2/field`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FieldDef {
    pub id: String,
    pub name: String,
    pub custom: bool,
    pub navigable: bool,
    pub schema: Option<FieldSchema>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Board {
    pub id: u64,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Sprint {
    pub id: u64,
    pub name: String,
    pub state: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub complete_date: Option<String>,
    pub origin_board_id: Option<u64>,
}

impl Sprint {
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state.eq_ignore_ascii_case("active")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Epic {
    pub id: u64,
    pub key: String,
    pub name: String,
    pub summary: String,
    pub done: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Project {
    pub id: String,
    pub key: String,
    pub name: String,
    pub description: Option<String>,
    pub lead: Option<User>,
    pub project_category: Option<Named>,
    pub components: Vec<Named>,
    pub issue_types: Vec<Named>,
    pub email: Option<String>,
    pub url: Option<String>,
}

/// Project reference embedded in issue fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectRef {
    pub id: String,
    pub key: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IssueType {
    pub name: String,
    pub subtask: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Comment {
    pub id: String,
    pub author: Option<User>,
    pub body: String,
    pub created: String,
    pub updated: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Comments {
    pub comments: Vec<Comment>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Watches {
    pub watchers: Vec<User>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IssueFields {
    pub summary: String,
    pub description: Option<String>,
    #[serde(rename = "issuetype")]
    pub issue_type: IssueType,
    pub project: Option<ProjectRef>,
    pub components: Vec<Named>,
    pub labels: Vec<String>,
    pub priority: Option<Named>,
    pub resolution: Option<Named>,
    pub status: Option<Named>,
    pub assignee: Option<User>,
    pub creator: Option<User>,
    pub reporter: Option<User>,
    pub created: Option<String>,
    pub watches: Option<Watches>,
    pub comment: Option<Comments>,
    pub subtasks: Vec<Issue>,
    /// Everything else, custom fields included, keyed by field id.
    #[serde(flatten)]
    pub unknowns: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Issue {
    pub id: String,
    pub key: String,
    pub fields: Option<IssueFields>,
}

impl Issue {
    /// Whether the issue is a subtask; those are synchronized with their parent.
    #[must_use]
    pub fn is_subtask(&self) -> bool {
        self.fields.as_ref().is_some_and(|f| f.issue_type.subtask)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_deserializes_custom_fields() {
        let json = r#"{
            "id": "10001",
            "key": "PRJ-1",
            "fields": {
                "summary": "Login fails",
                "issuetype": {"name": "Bug", "subtask": false},
                "status": {"name": "Open"},
                "labels": ["ui"],
                "customfield_10010": 3,
                "subtasks": [{"id": "10002", "key": "PRJ-2", "fields": {"summary": "Fix"}}]
            }
        }"#;
        let issue: Issue = serde_json::from_str(json).unwrap();
        let fields = issue.fields.as_ref().unwrap();

        assert_eq!(fields.issue_type.name, "Bug");
        assert_eq!(fields.status.as_ref().unwrap().name, "Open");
        assert_eq!(fields.unknowns["customfield_10010"], 3);
        assert!(!fields.unknowns.contains_key("summary"));
        assert_eq!(fields.subtasks[0].key, "PRJ-2");
        assert!(!issue.is_subtask());
    }

    #[test]
    fn test_sprint_state() {
        let sprint: Sprint =
            serde_json::from_str(r#"{"id": 7, "name": "S1", "state": "ACTIVE", "originBoardId": 3}"#)
                .unwrap();
        assert!(sprint.is_active());
        assert_eq!(sprint.origin_board_id, Some(3));
    }
}
