//! Synchronization of one remote into its maildirs.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::PathBuf;

use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::context::{PathContext, sanitize};
use super::diff::apply_history;
use super::gc;
use super::paging::{DEFAULT_PAGE_SIZE, paged};
use crate::config::{Configuration, MailConfig, PathTemplates, RemoteConfig};
use crate::convert::Converter;
use crate::error::{Error, Result};
use crate::message::{HEADER_CHECKSUM, Layout, Mail, checksum, has_changed, id, stored_checksum, write_mail};
use crate::remote::{Board, Issue, Project, RemoteSource, Sprint};
use crate::storage::Maildir;

/// Counters of one remote pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    /// Entities listed by the remote (boards, sprints, epics, projects, issues).
    pub found: usize,
    /// Entities that passed the filters and were processed.
    pub handled: usize,
    pub written: usize,
    pub unchanged: usize,
    pub removed: usize,
    pub tagged: usize,
}

/// Result of [`Syncer::write_record`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    Unchanged,
}

/// Mirrors one remote into maildirs.
pub struct Syncer<'a, R: RemoteSource + ?Sized> {
    remote: &'a R,
    name: String,
    config: &'a RemoteConfig,
    paths: &'a PathTemplates,
    layout: Layout,
    board_filter: Option<Regex>,
    project_filter: Option<Regex>,
    converter: Converter,
    root: PathContext,
    /// Identities written or confirmed during this pass, per maildir.
    seen: HashMap<PathBuf, HashSet<String>>,
    /// Projects whose issues showed up on a board.
    referenced: BTreeSet<String>,
    page_size: usize,
    stats: SyncStats,
}

impl<'a, R: RemoteSource + ?Sized> Syncer<'a, R> {
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a filter regex is invalid.
    pub fn new(remote: &'a R, name: &str, config: &'a RemoteConfig, mail: &'a MailConfig) -> Result<Self> {
        Ok(Self {
            remote,
            name: name.to_string(),
            config,
            paths: &mail.path,
            layout: mail.layout(),
            board_filter: config.board_filter()?,
            project_filter: config.project_filter()?,
            converter: Converter::new(name, &config.base_url),
            root: PathContext::new(name, &config.dest_dir.to_string_lossy()),
            seen: HashMap::new(),
            referenced: BTreeSet::new(),
            page_size: DEFAULT_PAGE_SIZE,
            stats: SyncStats::default(),
        })
    }

    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Counters so far; still meaningful after a failed [`run`](Self::run).
    #[must_use]
    pub fn stats(&self) -> SyncStats {
        self.stats
    }

    /// Run the whole traversal: globals, boards, then projects.
    ///
    /// # Errors
    ///
    /// Returns the first remote, storage or record error.
    pub fn run(&mut self) -> Result<()> {
        self.converter.set_fields(self.remote.fields()?);

        let root = self.root.clone();
        self.globals(&root)?;
        self.boards(&root)?;
        self.projects(&root)?;

        info!(
            remote = %self.name,
            written = self.stats.written,
            unchanged = self.stats.unchanged,
            removed = self.stats.removed,
            tagged = self.stats.tagged,
            "synchronization completed"
        );
        Ok(())
    }

    /// Store `mail` in `mailbox` unless the stored copy is identical.
    ///
    /// Records with a table get one level of history from the stored copy
    /// first. A failed write removes the temporary delivery.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingIdentity`] for a record without `Message-Id`,
    /// [`Error::AmbiguousRecord`] if the identity is stored more than once,
    /// or any storage error.
    pub fn write_record(&mut self, mailbox: &Maildir, mut mail: Mail) -> Result<WriteOutcome> {
        let key = mail.id()?.to_string();

        let stored = match mailbox.lookup(&key)? {
            Some(path) if mail.table.is_some() => {
                let previous = self.layout.read_file(&path)?;
                apply_history(&mut mail, &previous);
                previous.checksum_header().map(str::to_string)
            }
            Some(path) => stored_checksum(&path)?,
            None => None,
        };

        let sum = checksum(&mail);
        if !has_changed(&sum, stored.as_deref()) {
            self.mark_seen(mailbox, key);
            self.stats.unchanged += 1;
            return Ok(WriteOutcome::Unchanged);
        }

        mail.headers.set(HEADER_CHECKSUM, sum);

        let mut delivery = mailbox.deliver(&key)?;
        if let Err(e) = write_mail(&mut delivery, &mail, self.layout.column_width) {
            if let Err(abort) = delivery.abort() {
                warn!(key = %key, "unable to abort delivery: {abort}");
            }
            return Err(e.into());
        }
        let path = mailbox.publish(delivery)?;

        debug!(remote = %self.name, path = %path.display(), "record written");
        self.mark_seen(mailbox, key);
        self.stats.written += 1;
        Ok(WriteOutcome::Written)
    }

    fn mark_seen(&mut self, mailbox: &Maildir, key: String) {
        self.seen
            .entry(mailbox.path().to_path_buf())
            .or_default()
            .insert(key);
    }

    fn collect_garbage(&mut self, mailbox: &Maildir) -> Result<()> {
        let empty = HashSet::new();
        let seen = self.seen.get(mailbox.path()).unwrap_or(&empty);
        let gc = gc::collect(mailbox, seen, self.config.delete, &self.layout)?;

        if gc.removed + gc.tagged + gc.cleaned > 0 {
            info!(
                remote = %self.name,
                mailbox = %mailbox.path().display(),
                removed = gc.removed,
                tagged = gc.tagged,
                cleaned = gc.cleaned,
                "garbage collected"
            );
        }
        self.stats.removed += gc.removed;
        self.stats.tagged += gc.tagged;
        Ok(())
    }

    fn open(ctx: &PathContext, template: &str) -> Result<Maildir> {
        Maildir::open_or_create(&ctx.expand(template)?)
    }

    fn remote_refs(&self) -> Vec<String> {
        vec![id::remote_id(&self.name)]
    }

    fn globals(&mut self, ctx: &PathContext) -> Result<()> {
        if self.paths.globals.is_empty() {
            return Ok(());
        }
        let mailbox = Self::open(ctx, &self.paths.globals)?;
        let mail = self.converter.remote();
        self.write_record(&mailbox, mail)?;
        self.collect_garbage(&mailbox)
    }

    fn boards(&mut self, ctx: &PathContext) -> Result<()> {
        if self.paths.board.is_empty() {
            return Ok(());
        }

        let refs = self.remote_refs();
        let remote = self.remote;
        let (mut found, mut handled) = (0, 0);

        for board in paged(self.page_size, |start, max| remote.boards(start, max)) {
            let board = board?;
            found += 1;
            self.stats.found += 1;

            if board.kind != "scrum" {
                debug!(remote = %self.name, board = %board.name, kind = %board.kind, "skipping board");
                continue;
            }
            if self.board_filter.as_ref().is_some_and(|re| !re.is_match(&board.name)) {
                continue;
            }

            let ctx = ctx
                .with("BoardName", sanitize(&board.name))
                .with("BoardID", board.id.to_string());
            fs::create_dir_all(ctx.expand(&self.paths.board)?)?;

            self.sprints(&ctx, &board, &refs)?;
            self.epics(&ctx, &board, &refs)?;
            self.backlog(&ctx, &board, &refs)?;

            handled += 1;
            self.stats.handled += 1;
        }

        info!(remote = %self.name, found, handled, "boards processed");
        Ok(())
    }

    fn sprints(&mut self, ctx: &PathContext, board: &Board, refs: &[String]) -> Result<()> {
        if self.paths.sprint.is_empty() {
            return Ok(());
        }

        let remote = self.remote;
        for sprint in paged(self.page_size, |start, max| remote.sprints(board.id, start, max)) {
            let sprint = sprint?;
            self.stats.found += 1;

            let ctx = ctx
                .with("SprintName", sanitize(&sprint.name))
                .with("SprintID", sprint.id.to_string());
            self.sprint(&ctx, board, &sprint, refs)?;
            self.stats.handled += 1;
        }
        Ok(())
    }

    fn sprint(&mut self, ctx: &PathContext, board: &Board, sprint: &Sprint, refs: &[String]) -> Result<()> {
        info!(remote = %self.name, board = %board.name, sprint = %sprint.name, "processing sprint");

        let mailbox = Self::open(ctx, &self.paths.sprint)?;
        let mut refs = refs.to_vec();
        let board_record = self.converter.board(board, &refs);

        refs.push(id::board_id(board.id));
        let sprint_record = self.converter.sprint(sprint, &refs);
        self.write_record(&mailbox, sprint_record)?;
        self.write_record(&mailbox, board_record)?;

        if !sprint.is_active() {
            info!(
                remote = %self.name,
                board = %board.name,
                sprint = %sprint.name,
                state = %sprint.state,
                "sprint is not active, issues are not handled"
            );
            return Ok(());
        }

        refs.push(id::sprint_id(sprint.id));
        let board_id = sprint.origin_board_id.unwrap_or(board.id);
        let remote = self.remote;
        let count = self.issues(
            &mailbox,
            paged(self.page_size, |start, max| remote.sprint_issues(board_id, sprint.id, start, max)),
            &refs,
            true,
        )?;
        info!(remote = %self.name, board = %board.name, sprint = %sprint.name, issues = count, "sprint processed");

        self.collect_garbage(&mailbox)
    }

    fn epics(&mut self, ctx: &PathContext, board: &Board, refs: &[String]) -> Result<()> {
        if self.paths.epic.is_empty() {
            return Ok(());
        }

        let remote = self.remote;
        for epic in paged(self.page_size, |start, max| remote.epics(board.id, start, max)) {
            let epic = epic?;
            self.stats.found += 1;

            let ctx = ctx
                .with("EpicName", sanitize(&epic.name))
                .with("EpicID", epic.id.to_string());
            let mailbox = Self::open(&ctx, &self.paths.epic)?;

            let mut refs = refs.to_vec();
            let board_record = self.converter.board(board, &refs);
            refs.push(id::board_id(board.id));
            let epic_record = self.converter.epic(&epic, &refs);
            self.write_record(&mailbox, epic_record)?;
            self.write_record(&mailbox, board_record)?;

            refs.push(id::epic_id(epic.id, &epic.key));
            let count = self.issues(
                &mailbox,
                paged(self.page_size, |start, max| remote.epic_issues(board.id, epic.id, start, max)),
                &refs,
                true,
            )?;
            info!(remote = %self.name, board = %board.name, epic = %epic.key, issues = count, "epic processed");

            self.collect_garbage(&mailbox)?;
            self.stats.handled += 1;
        }
        Ok(())
    }

    fn backlog(&mut self, ctx: &PathContext, board: &Board, refs: &[String]) -> Result<()> {
        if self.paths.backlog.is_empty() {
            return Ok(());
        }

        let mailbox = Self::open(ctx, &self.paths.backlog)?;
        let mut refs = refs.to_vec();
        let board_record = self.converter.board(board, &refs);
        self.write_record(&mailbox, board_record)?;

        refs.push(id::board_id(board.id));
        let remote = self.remote;
        let count = self.issues(
            &mailbox,
            paged(self.page_size, |start, max| remote.backlog_issues(board.id, start, max)),
            &refs,
            true,
        )?;
        info!(remote = %self.name, board = %board.name, issues = count, "backlog processed");

        self.collect_garbage(&mailbox)
    }

    fn projects(&mut self, ctx: &PathContext) -> Result<()> {
        if self.paths.project.is_empty() {
            return Ok(());
        }

        let projects = self.remote.projects()?;
        let mut handled = 0;

        for project in &projects {
            self.stats.found += 1;
            let wanted = self.referenced.contains(&project.key)
                || self.project_filter.as_ref().is_none_or(|re| re.is_match(&project.key));
            if !wanted {
                continue;
            }

            let ctx = project_context(ctx, &project.id, &project.key);
            let mailbox = Self::open(&ctx, &self.paths.project)?;
            self.project(&mailbox, project)?;
            self.collect_garbage(&mailbox)?;

            handled += 1;
            self.stats.handled += 1;
        }

        info!(remote = %self.name, found = projects.len(), handled, "projects processed");
        Ok(())
    }

    fn project(&mut self, mailbox: &Maildir, listed: &Project) -> Result<()> {
        info!(remote = %self.name, project = %listed.key, "processing project");

        let remote = self.remote;
        let project = remote.project(&listed.key)?;
        let mut refs = self.remote_refs();
        let record = self.converter.project(remote, &project, &refs)?;
        self.write_record(mailbox, record)?;

        refs.push(id::project_id(&project.id, &project.key));
        let jql = format!("project = {}", project.key);
        let count = self.issues(
            mailbox,
            paged(self.page_size, |start, max| remote.search_issues(&jql, start, max)),
            &refs,
            false,
        )?;
        info!(remote = %self.name, project = %project.key, issues = count, "project processed");
        Ok(())
    }

    /// Write every top-level issue of `listing` to `mailbox`; with `mirror`
    /// they are also written to their project's maildir. Returns the number
    /// of issues handled.
    fn issues<I>(&mut self, mailbox: &Maildir, listing: I, refs: &[String], mirror: bool) -> Result<usize>
    where
        I: Iterator<Item = Result<Issue>>,
    {
        let mut count = 0;
        for issue in listing {
            let issue = issue?;
            self.stats.found += 1;
            if issue.fields.is_none() || issue.is_subtask() {
                continue;
            }

            self.issue(mailbox, &issue, refs)?;
            if mirror {
                self.project_issue(&issue)?;
            }
            count += 1;
            self.stats.handled += 1;
        }
        Ok(count)
    }

    fn issue(&mut self, mailbox: &Maildir, issue: &Issue, refs: &[String]) -> Result<()> {
        let remote = self.remote;
        for mail in self.converter.issue(remote, issue, refs)? {
            self.write_record(mailbox, mail)?;
        }
        Ok(())
    }

    /// Copy of a board issue in its project's maildir.
    fn project_issue(&mut self, issue: &Issue) -> Result<()> {
        if self.paths.project.is_empty() {
            return Ok(());
        }
        let Some(project) = issue.fields.as_ref().and_then(|f| f.project.as_ref()) else {
            return Ok(());
        };

        let ctx = project_context(&self.root, &project.id, &project.key);
        let mailbox = Self::open(&ctx, &self.paths.project)?;
        self.referenced.insert(project.key.clone());

        let refs = vec![
            id::remote_id(&self.name),
            id::project_id(&project.id, &project.key),
        ];
        self.issue(&mailbox, issue, &refs)
    }
}

fn project_context(ctx: &PathContext, id: &str, key: &str) -> PathContext {
    ctx.with("ProjectName", sanitize(key)).with("ProjectID", id)
}

/// Outcome of one remote in [`sync_all`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteReport {
    pub remote: String,
    pub stats: SyncStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of [`sync_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub remotes: Vec<RemoteReport>,
}

impl SyncReport {
    #[must_use]
    pub fn failed(&self) -> usize {
        self.remotes.iter().filter(|r| r.error.is_some()).count()
    }

    /// # Errors
    ///
    /// Returns [`Error::SyncFailed`] if any remote failed.
    pub fn check(&self) -> Result<()> {
        match self.failed() {
            0 => Ok(()),
            failed => Err(Error::SyncFailed {
                failed,
                total: self.remotes.len(),
            }),
        }
    }
}

/// Synchronize the remotes named in `names` (all of them when empty).
///
/// `connect` opens the remote source of each. A failed remote is reported
/// and the next one runs; a fatal error stops everything.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] for an unknown remote name, or the
/// first fatal error.
pub fn sync_all<S, F>(config: &Configuration, names: &[String], mut connect: F) -> Result<SyncReport>
where
    S: RemoteSource,
    F: FnMut(&str, &RemoteConfig) -> Result<S>,
{
    let selected: Vec<(&str, &RemoteConfig)> = if names.is_empty() {
        config.remotes.iter().map(|(n, r)| (n.as_str(), r)).collect()
    } else {
        names
            .iter()
            .map(|n| config.remote(n).map(|r| (n.as_str(), r)))
            .collect::<Result<_>>()?
    };

    let mut report = SyncReport::default();
    for (name, remote_config) in selected {
        info!(remote = %name, "synchronization started");

        let mut stats = SyncStats::default();
        let result = connect(name, remote_config).and_then(|source| {
            let mut syncer = Syncer::new(&source, name, remote_config, &config.mail)?;
            let result = syncer.run();
            stats = syncer.stats();
            result
        });

        let error = match result {
            Ok(()) => None,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!(
                    remote = %name,
                    found = stats.found,
                    handled = stats.handled,
                    "synchronization failed: {e}"
                );
                Some(e.to_string())
            }
        };

        report.remotes.push(RemoteReport {
            remote: name.to_string(),
            stats,
            error,
        });
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeletePolicy;
    use crate::message::{CURRENT_COLUMN, DIFF_COLUMN, DIFF_MARK, PREVIOUS_COLUMN};
    use crate::remote::{
        Comment, Comments, Epic, FieldDef, IssueFields, IssueType, Named, Page, ProjectRef, User,
    };
    use std::path::Path;
    use tempfile::TempDir;

    /// In-memory Jira.
    #[derive(Default)]
    struct FakeJira {
        boards: Vec<Board>,
        sprints: HashMap<u64, Vec<Sprint>>,
        sprint_issues: HashMap<u64, Vec<Issue>>,
        epics: HashMap<u64, Vec<Epic>>,
        epic_issues: HashMap<u64, Vec<Issue>>,
        backlog: HashMap<u64, Vec<Issue>>,
        projects: Vec<Project>,
        project_issues: HashMap<String, Vec<Issue>>,
    }

    fn page<T: Clone>(items: &[T], start: usize, max: usize) -> Result<Page<T>> {
        Ok(Page::new(
            items.iter().skip(start).take(max).cloned().collect(),
            Some(items.len()),
        ))
    }

    fn page_of<K: std::hash::Hash + Eq, T: Clone>(
        map: &HashMap<K, Vec<T>>,
        key: &K,
        start: usize,
        max: usize,
    ) -> Result<Page<T>> {
        page(map.get(key).map_or(&[][..], Vec::as_slice), start, max)
    }

    impl RemoteSource for FakeJira {
        fn fields(&self) -> Result<Vec<FieldDef>> {
            Ok(Vec::new())
        }
        fn boards(&self, start: usize, max: usize) -> Result<Page<Board>> {
            page(&self.boards, start, max)
        }
        fn sprints(&self, board: u64, start: usize, max: usize) -> Result<Page<Sprint>> {
            page_of(&self.sprints, &board, start, max)
        }
        fn sprint_issues(&self, _: u64, sprint: u64, start: usize, max: usize) -> Result<Page<Issue>> {
            page_of(&self.sprint_issues, &sprint, start, max)
        }
        fn epics(&self, board: u64, start: usize, max: usize) -> Result<Page<Epic>> {
            page_of(&self.epics, &board, start, max)
        }
        fn epic_issues(&self, _: u64, epic: u64, start: usize, max: usize) -> Result<Page<Issue>> {
            page_of(&self.epic_issues, &epic, start, max)
        }
        fn backlog_issues(&self, board: u64, start: usize, max: usize) -> Result<Page<Issue>> {
            page_of(&self.backlog, &board, start, max)
        }
        fn projects(&self) -> Result<Vec<Project>> {
            Ok(self.projects.clone())
        }
        fn project(&self, key: &str) -> Result<Project> {
            self.projects
                .iter()
                .find(|p| p.key == key)
                .cloned()
                .ok_or_else(|| Error::Remote {
                    remote: "fake".into(),
                    message: format!("no project {key}"),
                })
        }
        fn search_issues(&self, jql: &str, start: usize, max: usize) -> Result<Page<Issue>> {
            let key = jql.trim_start_matches("project = ").to_string();
            page_of(&self.project_issues, &key, start, max)
        }
        fn user(&self, _: &str) -> Result<Option<User>> {
            Ok(None)
        }
    }

    fn issue(id: &str, key: &str, status: &str) -> Issue {
        let project = key.split('-').next().unwrap_or_default();
        Issue {
            id: id.into(),
            key: key.into(),
            fields: Some(IssueFields {
                summary: format!("Summary of {key}"),
                issue_type: IssueType {
                    name: "Task".into(),
                    subtask: false,
                },
                project: Some(ProjectRef {
                    id: format!("{project}-id"),
                    key: project.into(),
                }),
                status: Some(Named::new(status)),
                created: Some("2024-03-01T10:00:00.000+0000".into()),
                comment: Some(Comments {
                    comments: vec![Comment {
                        id: format!("c{id}"),
                        body: "A comment".into(),
                        created: "2024-03-02T10:00:00.000+0000".into(),
                        ..Comment::default()
                    }],
                }),
                ..IssueFields::default()
            }),
        }
    }

    fn project(key: &str) -> Project {
        Project {
            id: format!("{key}-id"),
            key: key.into(),
            name: format!("Project {key}"),
            ..Project::default()
        }
    }

    fn project_only() -> FakeJira {
        FakeJira {
            projects: vec![project("PRJ")],
            project_issues: HashMap::from([("PRJ".to_string(), vec![issue("1", "PRJ-1", "Open")])]),
            ..FakeJira::default()
        }
    }

    fn remote_config(dir: &Path) -> RemoteConfig {
        RemoteConfig {
            dest_dir: dir.to_path_buf(),
            base_url: "https://jira.example.com".into(),
            ..RemoteConfig::default()
        }
    }

    fn pass(jira: &FakeJira, config: &RemoteConfig) -> SyncStats {
        let mail = MailConfig::default();
        let mut syncer = Syncer::new(jira, "work", config, &mail)
            .unwrap()
            .with_page_size(2);
        syncer.run().unwrap();
        syncer.stats()
    }

    fn key(message_id: &str) -> String {
        message_id.trim_matches(['<', '>']).to_string()
    }

    fn read(mailbox: &Path, message_id: &str) -> Mail {
        let mdir = Maildir::open_or_create(mailbox).unwrap();
        let path = mdir.lookup(&key(message_id)).unwrap().unwrap();
        Layout::default().read_file(&path).unwrap()
    }

    #[test]
    fn test_second_pass_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let config = remote_config(dir.path());
        let jira = project_only();

        let first = pass(&jira, &config);
        // remote record, project record, issue, comment
        assert_eq!(first.written, 4);

        let second = pass(&jira, &config);
        assert_eq!(second.written, 0);
        assert_eq!(second.unchanged, 4);
        assert_eq!(second.removed + second.tagged, 0);
    }

    #[test]
    fn test_changed_issue_gets_history() {
        let dir = TempDir::new().unwrap();
        let config = remote_config(dir.path());
        let mut jira = project_only();
        pass(&jira, &config);

        jira.project_issues
            .insert("PRJ".into(), vec![issue("1", "PRJ-1", "Closed")]);
        let stats = pass(&jira, &config);
        assert_eq!(stats.written, 1);

        let mail = read(&dir.path().join("projects/PRJ"), &id::issue_id("1", "PRJ-1", false));
        let table = mail.table.unwrap();
        assert_eq!(table.get("Status", PREVIOUS_COLUMN), "Open");
        assert_eq!(table.get("Status", DIFF_COLUMN), DIFF_MARK);
        assert_eq!(table.get("Status", CURRENT_COLUMN), "Closed");
        assert_eq!(table.get("Type", DIFF_COLUMN), "");
    }

    #[test]
    fn test_vanished_issue_is_removed() {
        let dir = TempDir::new().unwrap();
        let config = remote_config(dir.path());
        let mut jira = project_only();
        pass(&jira, &config);

        jira.project_issues.clear();
        let stats = pass(&jira, &config);
        assert_eq!(stats.removed, 2);

        let mdir = Maildir::open_or_create(&dir.path().join("projects/PRJ")).unwrap();
        assert_eq!(
            mdir.identities().unwrap(),
            [key(&id::project_id("PRJ-id", "PRJ"))]
        );
    }

    #[test]
    fn test_vanished_issue_is_tagged_once() {
        let dir = TempDir::new().unwrap();
        let config = RemoteConfig {
            delete: DeletePolicy::Tag,
            ..remote_config(dir.path())
        };
        let mut jira = project_only();
        pass(&jira, &config);

        jira.project_issues.clear();
        assert_eq!(pass(&jira, &config).tagged, 2);
        assert_eq!(pass(&jira, &config).tagged, 0);

        let mail = read(&dir.path().join("projects/PRJ"), &id::issue_id("1", "PRJ-1", false));
        assert_eq!(mail.subject(), "[DELETED] [PRJ-1] Summary of PRJ-1");

        // reappearing rewrites the record without the tag
        jira.project_issues
            .insert("PRJ".into(), vec![issue("1", "PRJ-1", "Open")]);
        pass(&jira, &config);
        let mail = read(&dir.path().join("projects/PRJ"), &id::issue_id("1", "PRJ-1", false));
        assert_eq!(mail.subject(), "[PRJ-1] Summary of PRJ-1");
    }

    fn board_jira(state: &str) -> FakeJira {
        FakeJira {
            boards: vec![
                Board {
                    id: 1,
                    name: "Team".into(),
                    kind: "scrum".into(),
                },
                Board {
                    id: 2,
                    name: "Flow".into(),
                    kind: "kanban".into(),
                },
                Board {
                    id: 3,
                    name: "Other".into(),
                    kind: "scrum".into(),
                },
            ],
            sprints: HashMap::from([(
                1,
                vec![Sprint {
                    id: 10,
                    name: "Sprint 1".into(),
                    state: state.into(),
                    ..Sprint::default()
                }],
            )]),
            sprint_issues: HashMap::from([(10, vec![issue("5", "ABC-5", "Open")])]),
            projects: vec![project("ABC"), project("PRJ")],
            ..FakeJira::default()
        }
    }

    #[test]
    fn test_active_sprint_issues_reach_project() {
        let dir = TempDir::new().unwrap();
        let config = RemoteConfig {
            project_match: "^PRJ$".into(),
            board_match: "^Team$".into(),
            ..remote_config(dir.path())
        };
        pass(&board_jira("active"), &config);

        let sprint_dir = dir.path().join("boards/Team (1)/sprints/Sprint 1 (10)");
        let sprint = Maildir::open_or_create(&sprint_dir).unwrap();
        // sprint record, board record, issue, comment
        assert_eq!(sprint.identities().unwrap().len(), 4);

        // ABC does not match project_match but is referenced by the sprint
        let abc = Maildir::open_or_create(&dir.path().join("projects/ABC")).unwrap();
        assert!(abc
            .lookup(&key(&id::issue_id("5", "ABC-5", false)))
            .unwrap()
            .is_some());
        assert!(abc.lookup(&key(&id::project_id("ABC-id", "ABC"))).unwrap().is_some());

        assert!(dir.path().join("projects/PRJ").is_dir());
        assert!(!dir.path().join("boards/Flow (2)").exists());
        assert!(!dir.path().join("boards/Other (3)").exists());
    }

    #[test]
    fn test_inactive_sprint_skips_issues() {
        let dir = TempDir::new().unwrap();
        let config = RemoteConfig {
            project_match: "^PRJ$".into(),
            ..remote_config(dir.path())
        };
        let jira = board_jira("closed");
        pass(&jira, &config);

        let sprint_dir = dir.path().join("boards/Team (1)/sprints/Sprint 1 (10)");
        let sprint = Maildir::open_or_create(&sprint_dir).unwrap();
        assert_eq!(
            sprint.identities().unwrap(),
            {
                let mut ids = vec![key(&id::sprint_id(10)), key(&id::board_id(1))];
                ids.sort();
                ids
            }
        );
        assert!(!dir.path().join("projects/ABC").exists());

        let second = pass(&jira, &config);
        assert_eq!(second.written, 0);
    }

    #[test]
    fn test_disabled_templates_skip_stages() {
        let dir = TempDir::new().unwrap();
        let config = remote_config(dir.path());
        let mut mail = MailConfig::default();
        mail.path.board = String::new();
        mail.path.globals = String::new();

        let jira = board_jira("active");
        let mut syncer = Syncer::new(&jira, "work", &config, &mail).unwrap();
        syncer.run().unwrap();

        assert!(!dir.path().join("boards").exists());
        assert!(!dir.path().join("globals").exists());
        assert!(dir.path().join("projects/PRJ").is_dir());
    }

    #[test]
    fn test_record_without_identity_is_fatal() {
        let dir = TempDir::new().unwrap();
        let config = remote_config(dir.path());
        let mail_config = MailConfig::default();
        let jira = FakeJira::default();
        let mut syncer = Syncer::new(&jira, "work", &config, &mail_config).unwrap();
        let mdir = Maildir::open_or_create(dir.path()).unwrap();

        let err = syncer.write_record(&mdir, Mail::with_table()).unwrap_err();
        assert!(matches!(err, Error::MissingIdentity));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_sync_all_continues_after_failure() {
        let dir = TempDir::new().unwrap();
        let mut config = Configuration::default();
        config
            .remotes
            .insert("broken".into(), remote_config(&dir.path().join("broken")));
        config
            .remotes
            .insert("work".into(), remote_config(&dir.path().join("work")));

        let report = sync_all(&config, &[], |name, _| {
            if name == "broken" {
                Err(Error::Unauthorized {
                    remote: name.to_string(),
                })
            } else {
                Ok(project_only())
            }
        })
        .unwrap();

        assert_eq!(report.remotes.len(), 2);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.remotes[1].stats.written, 4);
        assert!(matches!(
            report.check(),
            Err(Error::SyncFailed { failed: 1, total: 2 })
        ));

        let unknown = sync_all(&config, &["nope".to_string()], |_, _| Ok(project_only()));
        assert!(matches!(unknown, Err(Error::InvalidArgument(_))));
    }
}
