//! Blocking [`RemoteSource`] over [`JiraClient`].

use tokio::runtime::Runtime;
use tracing::info;

use super::{Board, Epic, FieldDef, Issue, JiraClient, Page, Project, RemoteSource, Sprint, User};
use crate::error::{Error, Result};

/// Jira remote driven on a private tokio runtime.
pub struct JiraRemote {
    runtime: Runtime,
    client: JiraClient,
}

impl JiraRemote {
    /// Wrap `client`.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime cannot be created.
    pub fn new(client: JiraClient) -> Result<Self> {
        let runtime = Runtime::new()
            .map_err(|e| Error::Other(format!("Failed to create async runtime: {e}")))?;
        Ok(Self { runtime, client })
    }

    /// Wrap `client` after checking its credentials.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unauthorized`] if the remote rejects the credentials.
    pub fn connect(client: JiraClient) -> Result<Self> {
        let remote = Self::new(client)?;
        let me = remote.runtime.block_on(remote.client.myself())?;
        info!(remote = %remote.client.remote(), user = %me.name, "connected");
        Ok(remote)
    }
}

impl RemoteSource for JiraRemote {
    fn fields(&self) -> Result<Vec<FieldDef>> {
        self.runtime.block_on(self.client.fields())
    }

    fn boards(&self, start_at: usize, max_results: usize) -> Result<Page<Board>> {
        self.runtime.block_on(self.client.boards(start_at, max_results))
    }

    fn sprints(&self, board: u64, start_at: usize, max_results: usize) -> Result<Page<Sprint>> {
        self.runtime
            .block_on(self.client.sprints(board, start_at, max_results))
    }

    fn sprint_issues(
        &self,
        board: u64,
        sprint: u64,
        start_at: usize,
        max_results: usize,
    ) -> Result<Page<Issue>> {
        self.runtime
            .block_on(self.client.sprint_issues(board, sprint, start_at, max_results))
    }

    fn epics(&self, board: u64, start_at: usize, max_results: usize) -> Result<Page<Epic>> {
        self.runtime
            .block_on(self.client.epics(board, start_at, max_results))
    }

    fn epic_issues(
        &self,
        board: u64,
        epic: u64,
        start_at: usize,
        max_results: usize,
    ) -> Result<Page<Issue>> {
        self.runtime
            .block_on(self.client.epic_issues(board, epic, start_at, max_results))
    }

    fn backlog_issues(
        &self,
        board: u64,
        start_at: usize,
        max_results: usize,
    ) -> Result<Page<Issue>> {
        self.runtime
            .block_on(self.client.backlog_issues(board, start_at, max_results))
    }

    fn projects(&self) -> Result<Vec<Project>> {
        self.runtime.block_on(self.client.projects())
    }

    fn project(&self, key: &str) -> Result<Project> {
        self.runtime.block_on(self.client.project(key))
    }

    fn search_issues(&self, jql: &str, start_at: usize, max_results: usize) -> Result<Page<Issue>> {
        self.runtime
            .block_on(self.client.search_issues(jql, start_at, max_results))
    }

    fn user(&self, name: &str) -> Result<Option<User>> {
        self.runtime.block_on(self.client.user(name))
    }
}
