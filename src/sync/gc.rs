//! Collection of records that disappeared remotely.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::config::DeletePolicy;
use crate::error::Result;
use crate::message::{HEADER_CHECKSUM, HEADER_SUBJECT, Layout, id};
use crate::storage::Maildir;

/// Subject prefix of tagged records.
pub const DELETED_TAG: &str = "[DELETED]";

/// What one collection did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GcStats {
    pub removed: usize,
    pub tagged: usize,
    /// Stale temporary deliveries removed.
    pub cleaned: usize,
}

/// Remove or tag every record of `mailbox` whose identity is not in `seen`,
/// then clean stale temporary deliveries.
///
/// Tagging prefixes the subject with [`DELETED_TAG`] and drops the stored
/// checksum, so a record that reappears remotely is written again. Records
/// already tagged are left alone.
///
/// # Errors
///
/// Returns an error if the maildir cannot be read or a record cannot be
/// rewritten or removed.
pub fn collect(
    mailbox: &Maildir,
    seen: &HashSet<String>,
    policy: DeletePolicy,
    layout: &Layout,
) -> Result<GcStats> {
    let mut stats = GcStats::default();

    for key in mailbox.identities()? {
        if seen.contains(&key) {
            continue;
        }

        match id::decode(&key) {
            Ok(decoded) => debug!(key = %key, kind = %decoded.kind, ?policy, "stale record"),
            Err(e) => warn!(key = %key, "{e}"),
        }

        match policy {
            DeletePolicy::Remove => {
                if mailbox.purge(&key)? {
                    stats.removed += 1;
                }
            }
            DeletePolicy::Tag => {
                if tag(mailbox, &key, layout)? {
                    stats.tagged += 1;
                }
            }
        }
    }

    stats.cleaned = mailbox.clean()?;
    Ok(stats)
}

/// Tag the record `key`. Returns `false` if it already carries the tag.
fn tag(mailbox: &Maildir, key: &str, layout: &Layout) -> Result<bool> {
    let Some(path) = mailbox.lookup(key)? else {
        return Ok(false);
    };

    let mut mail = layout.read_file(&path)?;
    let subject = mail.subject().to_string();
    if subject.starts_with(DELETED_TAG) {
        return Ok(false);
    }

    mail.headers
        .set(HEADER_SUBJECT, format!("{DELETED_TAG} {subject}"));
    mail.headers.remove(HEADER_CHECKSUM);

    mailbox.rewrite(key, &layout.render(&mail))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Mail, checksum, write_mail};
    use tempfile::TempDir;

    fn record(key: &str, subject: &str) -> Mail {
        let mut mail = Mail::with_table();
        mail.headers.set("Message-Id", format!("<{key}>"));
        mail.headers.set("Subject", subject);
        mail.set_current("Status", "Open");
        mail.body = vec!["text".into()];
        let sum = checksum(&mail);
        mail.headers.set(HEADER_CHECKSUM, sum);
        mail
    }

    fn store(mdir: &Maildir, mail: &Mail) {
        let mut d = mdir.deliver(mail.id().unwrap()).unwrap();
        write_mail(&mut d, mail, 55).unwrap();
        mdir.publish(d).unwrap();
    }

    fn setup() -> (TempDir, Maildir, String, String) {
        let dir = TempDir::new().unwrap();
        let mdir = Maildir::open_or_create(dir.path()).unwrap();
        let keep = id::issue_id("1", "PRJ-1", false);
        let gone = id::issue_id("2", "PRJ-2", false);
        store(&mdir, &record(keep.trim_matches(['<', '>']), "[PRJ-1] kept"));
        store(&mdir, &record(gone.trim_matches(['<', '>']), "[PRJ-2] gone"));
        (
            dir,
            mdir,
            keep.trim_matches(['<', '>']).to_string(),
            gone.trim_matches(['<', '>']).to_string(),
        )
    }

    #[test]
    fn test_remove_unseen() {
        let (_dir, mdir, keep, gone) = setup();
        let seen = HashSet::from([keep.clone()]);

        let stats = collect(&mdir, &seen, DeletePolicy::Remove, &Layout::default()).unwrap();
        assert_eq!(stats.removed, 1);
        assert_eq!(mdir.identities().unwrap(), [keep]);
        assert_eq!(mdir.lookup(&gone).unwrap(), None);
    }

    #[test]
    fn test_tag_unseen_once() {
        let (_dir, mdir, keep, gone) = setup();
        let seen = HashSet::from([keep.clone()]);
        let layout = Layout::default();

        let stats = collect(&mdir, &seen, DeletePolicy::Tag, &layout).unwrap();
        assert_eq!(stats.tagged, 1);

        let path = mdir.lookup(&gone).unwrap().unwrap();
        let tagged = layout.read_file(&path).unwrap();
        assert_eq!(tagged.subject(), "[DELETED] [PRJ-2] gone");
        assert_eq!(tagged.checksum_header(), None);
        assert_eq!(
            tagged.table.unwrap().get("Status", "Current"),
            "Open"
        );

        // a second pass does not stack the prefix
        let stats = collect(&mdir, &seen, DeletePolicy::Tag, &layout).unwrap();
        assert_eq!(stats.tagged, 0);
        let again = layout.read_file(&path).unwrap();
        assert_eq!(again.subject(), "[DELETED] [PRJ-2] gone");

        let kept = layout
            .read_file(&mdir.lookup(&keep).unwrap().unwrap())
            .unwrap();
        assert_eq!(kept.subject(), "[PRJ-1] kept");
    }

    #[test]
    fn test_undecodable_identity_is_not_fatal() {
        let dir = TempDir::new().unwrap();
        let mdir = Maildir::open_or_create(dir.path()).unwrap();
        store(&mdir, &record("garbage@nowhere", "x"));

        let stats =
            collect(&mdir, &HashSet::new(), DeletePolicy::Remove, &Layout::default()).unwrap();
        assert_eq!(stats.removed, 1);
    }
}
