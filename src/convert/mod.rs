//! Conversion of remote entities into records.
//!
//! Every entity becomes a [`Mail`] whose headers thread it under its
//! parents (`In-Reply-To` / `References`), whose table carries the
//! attributes worth diffing, and whose body is the free text.

use std::collections::HashMap;

use chrono::{DateTime, FixedOffset};
use tracing::warn;

use crate::error::Result;
use crate::message::{HEADER_MESSAGE_ID, HEADER_SUBJECT, Mail, id};
use crate::remote::{Board, Epic, FieldDef, Issue, IssueFields, Project, RemoteSource, Sprint, User};

/// Sender of records without a human author.
pub const NOBODY: &str = "Nobody <nobody@jira>";

const REPLY_TO: &str = "reply@jira";
const NOBODY_REPLY_TO: &str = "nobody@jira";

/// `Date` header format (RFC 1123 with numeric zone).
const DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %z";

/// Turns remote entities into records.
#[derive(Debug, Default)]
pub struct Converter {
    remote: String,
    base_url: String,
    fields: Vec<FieldDef>,
    users: HashMap<String, Option<User>>,
}

impl Converter {
    #[must_use]
    pub fn new(remote: &str, base_url: &str) -> Self {
        Self {
            remote: remote.to_string(),
            base_url: base_url.to_string(),
            ..Self::default()
        }
    }

    /// Field definitions; navigable string and number custom fields are
    /// mirrored into issue tables.
    pub fn set_fields(&mut self, fields: Vec<FieldDef>) {
        self.fields = fields;
    }

    /// Record describing the remote itself; every other record threads
    /// under it.
    #[must_use]
    pub fn remote(&self) -> Mail {
        let mut mail = Mail::with_table();
        let headers = &mut mail.headers;
        headers.set(HEADER_MESSAGE_ID, id::remote_id(&self.remote));
        headers.set("Reply-To", NOBODY_REPLY_TO);
        headers.set("Date", format_date(&epoch()));
        headers.set("From", NOBODY);
        headers.set(HEADER_SUBJECT, format!("[REMOTE] {}", self.remote));

        mail.set_current("URL", &self.base_url);
        mail
    }

    #[must_use]
    pub fn board(&self, board: &Board, refs: &[String]) -> Mail {
        let mut mail = Mail::with_table();
        set_common(
            &mut mail,
            id::board_id(board.id),
            NOBODY_REPLY_TO,
            &epoch(),
            NOBODY,
            format!("[BOARD] {}", board.name),
            refs,
        );
        mail.set_current("Type", &board.kind);
        mail
    }

    #[must_use]
    pub fn sprint(&self, sprint: &Sprint, refs: &[String]) -> Mail {
        let start = sprint.start_date.as_deref().and_then(parse_date);

        let mut mail = Mail::with_table();
        set_common(
            &mut mail,
            id::sprint_id(sprint.id),
            NOBODY_REPLY_TO,
            &start.unwrap_or_else(epoch),
            NOBODY,
            format!("[{}] {}", sprint.state.to_uppercase(), sprint.name),
            refs,
        );

        for (name, date) in [
            ("Date start", &sprint.start_date),
            ("Date end", &sprint.end_date),
            ("Date complete", &sprint.complete_date),
        ] {
            if let Some(date) = date.as_deref().and_then(parse_date) {
                mail.set_current(name, format_date(&date));
            }
        }
        mail
    }

    #[must_use]
    pub fn epic(&self, epic: &Epic, refs: &[String]) -> Mail {
        let mut mail = Mail::with_table();
        set_common(
            &mut mail,
            id::epic_id(epic.id, &epic.key),
            NOBODY_REPLY_TO,
            &epoch(),
            NOBODY,
            format!("[{}] {}", epic.key, epic.name),
            refs,
        );
        mail.set_current("Status", if epic.done { "Done" } else { "Open" });
        if !epic.summary.is_empty() {
            mail.set_current("Summary", &epic.summary);
        }
        mail
    }

    /// Project record. The project lead is resolved through the user cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the lead cannot be looked up.
    pub fn project<R: RemoteSource + ?Sized>(
        &mut self,
        remote: &R,
        project: &Project,
        refs: &[String],
    ) -> Result<Mail> {
        let lead = match project.lead.as_ref() {
            Some(lead) => self.user(remote, lead)?,
            None => None,
        };

        let mut mail = Mail::with_table();
        set_common(
            &mut mail,
            id::project_id(&project.id, &project.key),
            REPLY_TO,
            &epoch(),
            &address(lead.as_ref()),
            format!("[{}] {}", project.key, project.name),
            refs,
        );

        if let Some(category) = project.project_category.as_ref().filter(|c| !c.name.is_empty()) {
            mail.set_current("Category", &category.name);
        }
        if !project.components.is_empty() {
            mail.set_current("Components", quoted_list(project.components.iter().map(|c| &c.name)));
        }
        if !project.issue_types.is_empty() {
            mail.set_current("Issue types", quoted_list(project.issue_types.iter().map(|t| &t.name)));
        }
        if let Some(email) = project.email.as_deref().filter(|e| !e.is_empty()) {
            mail.set_current("Email", email);
        }
        if let Some(url) = project.url.as_deref().filter(|u| !u.is_empty()) {
            mail.set_current("URL", url);
        }

        mail.body = text_lines(project.description.as_deref().unwrap_or_default());
        Ok(mail)
    }

    /// Records of an issue: the issue itself, one per comment, then its
    /// subtasks (recursively), all threaded under the issue.
    ///
    /// # Errors
    ///
    /// Returns an error if a watcher cannot be looked up.
    pub fn issue<R: RemoteSource + ?Sized>(
        &mut self,
        remote: &R,
        issue: &Issue,
        refs: &[String],
    ) -> Result<Vec<Mail>> {
        let mut out = Vec::new();
        self.process_issue(remote, issue, issue.is_subtask(), refs, &mut out)?;
        Ok(out)
    }

    fn process_issue<R: RemoteSource + ?Sized>(
        &mut self,
        remote: &R,
        issue: &Issue,
        subtask: bool,
        refs: &[String],
        out: &mut Vec<Mail>,
    ) -> Result<()> {
        let empty = IssueFields::default();
        let fields = issue.fields.as_ref().unwrap_or(&empty);

        for user in [&fields.assignee, &fields.creator, &fields.reporter]
            .into_iter()
            .flatten()
        {
            self.cache(user);
        }

        let assignee = address(fields.assignee.as_ref());
        let created = fields.created.as_deref().and_then(parse_date);
        let message_id = id::issue_id(&issue.id, &issue.key, subtask);
        let subject = format!("[{}] {}", issue.key, fields.summary);

        let mut mail = Mail::with_table();
        set_common(
            &mut mail,
            message_id.clone(),
            REPLY_TO,
            &created.unwrap_or_else(epoch),
            &address(fields.creator.as_ref()),
            subject.clone(),
            refs,
        );
        mail.headers.set("To", &assignee);

        if let Some(watches) = &fields.watches {
            for watcher in &watches.watchers {
                let user = self.user(remote, watcher)?;
                mail.headers
                    .add("Cc", address(Some(user.as_ref().unwrap_or(watcher))));
            }
        }

        self.issue_table(&mut mail, fields);
        mail.body = text_lines(fields.description.as_deref().unwrap_or_default());
        out.push(mail);

        let mut refs = refs.to_vec();
        refs.push(message_id);

        for comment in fields.comment.iter().flat_map(|c| &c.comments) {
            let stamp = if comment.updated.is_empty() {
                &comment.created
            } else {
                &comment.updated
            };
            let date = parse_date(stamp).unwrap_or_else(|| {
                warn!(remote = %self.remote, issue = %issue.key, comment = %comment.id,
                      "unable to parse comment date {stamp:?}");
                epoch()
            });

            let mut cmail = Mail::new();
            set_common(
                &mut cmail,
                id::comment_id(&comment.id),
                REPLY_TO,
                &date,
                &address(comment.author.as_ref()),
                subject.clone(),
                &refs,
            );
            cmail.headers.set("To", &assignee);
            cmail.body = text_lines(&comment.body);
            out.push(cmail);
        }

        for sub in &fields.subtasks {
            self.process_issue(remote, sub, true, &refs, out)?;
        }
        Ok(())
    }

    fn issue_table(&self, mail: &mut Mail, fields: &IssueFields) {
        mail.set_current("Type", &fields.issue_type.name);
        if !fields.components.is_empty() {
            let names: Vec<&str> = fields.components.iter().map(|c| c.name.as_str()).collect();
            mail.set_current("Component", names.join(", "));
        }
        if !fields.labels.is_empty() {
            mail.set_current("Labels", fields.labels.join(", "));
        }
        for (name, value) in [
            ("Priority", &fields.priority),
            ("Resolution", &fields.resolution),
            ("Status", &fields.status),
        ] {
            if let Some(value) = value {
                mail.set_current(name, &value.name);
            }
        }

        for def in &self.fields {
            if !def.custom || !def.navigable {
                continue;
            }
            let kind = def.schema.as_ref().map(|s| s.kind.as_str());
            if !matches!(kind, Some("string" | "number")) {
                continue;
            }
            let value = match fields.unknowns.get(&def.id) {
                None | Some(serde_json::Value::Null) => continue,
                Some(serde_json::Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
            };
            mail.set_current(&def.name, value);
        }
    }

    fn cache(&mut self, user: &User) {
        if !user.name.is_empty() {
            self.users
                .entry(user.name.clone())
                .or_insert_with(|| Some(user.clone()));
        }
    }

    /// Full record of `user`, from the cache or the remote.
    fn user<R: RemoteSource + ?Sized>(&mut self, remote: &R, user: &User) -> Result<Option<User>> {
        if user.name.is_empty() {
            return Ok(None);
        }
        if let Some(cached) = self.users.get(&user.name) {
            return Ok(cached.clone());
        }
        let fetched = remote.user(&user.name)?;
        self.users.insert(user.name.clone(), fetched.clone());
        Ok(fetched)
    }
}

fn set_common(
    mail: &mut Mail,
    message_id: String,
    reply_to: &str,
    date: &DateTime<FixedOffset>,
    from: &str,
    subject: String,
    refs: &[String],
) {
    let headers = &mut mail.headers;
    headers.set(HEADER_MESSAGE_ID, message_id);
    headers.set("Reply-To", reply_to);
    headers.set("Date", format_date(date));
    headers.set("From", from);
    headers.set(HEADER_SUBJECT, subject);
    if let Some(parent) = refs.last() {
        headers.set("In-Reply-To", parent);
        headers.set("References", refs.join(" "));
    }
}

/// `Display Name <email>`; users without a name are [`NOBODY`].
#[must_use]
pub fn address(user: Option<&User>) -> String {
    let Some(user) = user.filter(|u| !u.name.is_empty()) else {
        return NOBODY.to_string();
    };
    let name = if user.display_name.is_empty() {
        &user.name
    } else {
        &user.display_name
    };
    if user.email_address.is_empty() {
        format!("{name} <{}@jira>", user.name)
    } else {
        format!("{name} <{}>", user.email_address)
    }
}

/// Parse a remote timestamp (RFC 3339 or Jira's `+0000` offsets).
#[must_use]
pub fn parse_date(s: &str) -> Option<DateTime<FixedOffset>> {
    let s = s.trim();
    DateTime::parse_from_rfc3339(s)
        .or_else(|_| DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f%z"))
        .ok()
}

#[must_use]
pub fn format_date(date: &DateTime<FixedOffset>) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn epoch() -> DateTime<FixedOffset> {
    DateTime::UNIX_EPOCH.fixed_offset()
}

/// `"a", "b"` sorted.
fn quoted_list<'a>(names: impl Iterator<Item = &'a String>) -> String {
    let mut names: Vec<String> = names.map(|n| format!("\"{n}\"")).collect();
    names.sort();
    names.join(", ")
}

fn text_lines(text: &str) -> Vec<String> {
    let lines: Vec<String> = text.lines().map(|l| l.trim_end().to_string()).collect();
    let start = lines.iter().position(|l| !l.is_empty()).unwrap_or(lines.len());
    let end = lines.iter().rposition(|l| !l.is_empty()).map_or(start, |i| i + 1);
    lines[start..end].to_vec()
}
