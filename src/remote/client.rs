//! Async Jira REST client.
//!
//! Covers the small part of the Jira API the synchronizer reads: the
//! core API (`/rest/api/2`) for fields, projects, users and JQL search,
//! and the agile API (`/rest/agile/1.0`) for boards, sprints, epics and
//! the backlog.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::{Board, Epic, FieldDef, Issue, Page, Project, Sprint, User};
use crate::error::{Error, Result};

const API: &str = "rest/api/2";
const AGILE: &str = "rest/agile/1.0";

/// Issue listings request every field so custom fields come along.
const ALL_FIELDS: &str = "*all";

/// Credentials and location of one remote.
#[derive(Debug, Clone)]
pub struct JiraClient {
    client: reqwest::Client,
    remote: String,
    base_url: String,
    username: String,
    password: String,
}

/// Agile API listing (`values` + `isLast`).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ValuesPage<T> {
    #[serde(default = "Vec::new")]
    values: Vec<T>,
    total: Option<usize>,
    is_last: Option<bool>,
}

/// Issue listing (`issues` + `total`).
#[derive(Debug, Deserialize)]
struct IssuesPage {
    #[serde(default)]
    issues: Vec<Issue>,
    total: Option<usize>,
}

impl JiraClient {
    /// Create a client for the remote named `remote`.
    #[must_use]
    pub fn new(remote: &str, base_url: &str, username: &str, password: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            remote: remote.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    #[must_use]
    pub fn remote(&self) -> &str {
        &self.remote
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        self.get_opt(path, query).await?.ok_or_else(|| Error::Remote {
            remote: self.remote.clone(),
            message: format!("{} not found", self.url(path)),
        })
    }

    /// GET `path`; a 404 is `Ok(None)`.
    async fn get_opt<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Option<T>> {
        let url = self.url(path);
        debug!(remote = %self.remote, url = %url, "GET");

        let mut request = self.client.get(&url).query(query);
        if !self.username.is_empty() {
            request = request.basic_auth(&self.username, Some(&self.password));
        }

        let response = request.send().await.map_err(|e| Error::Remote {
            remote: self.remote.clone(),
            message: format!("request to {url} failed: {e}"),
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(Error::Unauthorized {
                remote: self.remote.clone(),
            });
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let error = response.text().await.unwrap_or_default();
            return Err(Error::Remote {
                remote: self.remote.clone(),
                message: format!("{url} ({status}): {}", error.trim()),
            });
        }

        response.json().await.map(Some).map_err(|e| Error::Remote {
            remote: self.remote.clone(),
            message: format!("failed to parse response of {url}: {e}"),
        })
    }

    async fn values<T: DeserializeOwned>(
        &self,
        path: &str,
        start_at: usize,
        max_results: usize,
    ) -> Result<Page<T>> {
        let page: ValuesPage<T> = self.get(path, &paging(start_at, max_results)).await?;
        // Agile listings may only say whether more pages follow.
        let seen = start_at + page.values.len();
        let total = page.total.or(match page.is_last {
            Some(true) => Some(seen),
            Some(false) => Some(seen + 1),
            None => None,
        });
        Ok(Page::new(page.values, total))
    }

    async fn issues(
        &self,
        path: &str,
        mut query: Vec<(&str, String)>,
        start_at: usize,
        max_results: usize,
    ) -> Result<Page<Issue>> {
        query.extend(paging(start_at, max_results));
        query.push(("fields", ALL_FIELDS.to_string()));
        let page: IssuesPage = self.get(path, &query).await?;
        Ok(Page::new(page.issues, page.total))
    }

    /// Check the credentials.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unauthorized`] if the remote rejects them.
    pub async fn myself(&self) -> Result<User> {
        self.get(&format!("{API}/myself"), &[]).await
    }

    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn fields(&self) -> Result<Vec<FieldDef>> {
        self.get(&format!("{API}/field"), &[]).await
    }

    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn boards(&self, start_at: usize, max_results: usize) -> Result<Page<Board>> {
        self.values(&format!("{AGILE}/board"), start_at, max_results)
            .await
    }

    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn sprints(
        &self,
        board: u64,
        start_at: usize,
        max_results: usize,
    ) -> Result<Page<Sprint>> {
        self.values(&format!("{AGILE}/board/{board}/sprint"), start_at, max_results)
            .await
    }

    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn sprint_issues(
        &self,
        board: u64,
        sprint: u64,
        start_at: usize,
        max_results: usize,
    ) -> Result<Page<Issue>> {
        let path = format!("{AGILE}/board/{board}/sprint/{sprint}/issue");
        self.issues(&path, Vec::new(), start_at, max_results).await
    }

    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn epics(&self, board: u64, start_at: usize, max_results: usize) -> Result<Page<Epic>> {
        self.values(&format!("{AGILE}/board/{board}/epic"), start_at, max_results)
            .await
    }

    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn epic_issues(
        &self,
        board: u64,
        epic: u64,
        start_at: usize,
        max_results: usize,
    ) -> Result<Page<Issue>> {
        let path = format!("{AGILE}/board/{board}/epic/{epic}/issue");
        self.issues(&path, Vec::new(), start_at, max_results).await
    }

    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn backlog_issues(
        &self,
        board: u64,
        start_at: usize,
        max_results: usize,
    ) -> Result<Page<Issue>> {
        let path = format!("{AGILE}/board/{board}/backlog");
        self.issues(&path, Vec::new(), start_at, max_results).await
    }

    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn projects(&self) -> Result<Vec<Project>> {
        let query = [("expand", "description,lead".to_string())];
        self.get(&format!("{API}/project"), &query).await
    }

    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn project(&self, key: &str) -> Result<Project> {
        self.get(&format!("{API}/project/{key}"), &[]).await
    }

    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn search_issues(
        &self,
        jql: &str,
        start_at: usize,
        max_results: usize,
    ) -> Result<Page<Issue>> {
        let query = vec![("jql", jql.to_string())];
        self.issues(&format!("{API}/search"), query, start_at, max_results)
            .await
    }

    /// Look up a user; a missing user is `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails for another reason.
    pub async fn user(&self, name: &str) -> Result<Option<User>> {
        let query = [("username", name.to_string())];
        self.get_opt(&format!("{API}/user"), &query).await
    }
}

fn paging(start_at: usize, max_results: usize) -> Vec<(&'static str, String)> {
    vec![
        ("startAt", start_at.to_string()),
        ("maxResults", max_results.to_string()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joins_base() {
        let client = JiraClient::new("work", "https://jira.example.com/", "u", "p");
        assert_eq!(
            client.url("rest/api/2/field"),
            "https://jira.example.com/rest/api/2/field"
        );
        assert_eq!(client.remote(), "work");
    }

    #[test]
    fn test_values_page_parses_agile_listing() {
        let json = r#"{"maxResults": 2, "startAt": 0, "isLast": true,
                       "values": [{"id": 1, "name": "Team", "type": "scrum"}]}"#;
        let page: ValuesPage<Board> = serde_json::from_str(json).unwrap();
        assert_eq!(page.values[0].kind, "scrum");
        assert_eq!(page.is_last, Some(true));
        assert_eq!(page.total, None);
    }
}
