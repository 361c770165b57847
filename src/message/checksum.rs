//! Content hashing for change detection.
//!
//! The checksum covers what a record *means*, not how it was last laid out:
//! the stored `X-Checksum` header is left out, and the attribute table is
//! reduced to its current column and rendered without wrapping. Previous
//! values, diff markers and the configured column width therefore never
//! change the hash.

use sha2::{Digest, Sha256};

use super::write::render_parts;
use super::{CURRENT_COLUMN, HEADER_CHECKSUM, Mail};

/// Algorithm tag prepended to every checksum.
pub const CHECKSUM_ALGORITHM: &str = "sha256";

/// Wrap width used while hashing; large enough that nothing wraps.
const CANONICAL_COLUMN_WIDTH: usize = 4096;

/// Compute the tagged SHA256 checksum of a record (`sha256:<hex>`).
#[must_use]
pub fn checksum(mail: &Mail) -> String {
    let mut headers = mail.headers.clone();
    headers.remove(HEADER_CHECKSUM);

    let table = mail.table.as_ref().map(|t| {
        t.with_display_columns([CURRENT_COLUMN])
            .with_column_width(CANONICAL_COLUMN_WIDTH)
    });

    let canonical = render_parts(&headers, table.as_ref(), &mail.body);

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    format!("{CHECKSUM_ALGORITHM}:{:x}", hasher.finalize())
}

/// Check if a record has changed since it was stored.
///
/// Returns `true` if there is no stored checksum or it differs from
/// `current`.
#[must_use]
pub fn has_changed(current: &str, stored: Option<&str>) -> bool {
    stored.is_none_or(|h| h != current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{DIFF_COLUMN, PREVIOUS_COLUMN};

    fn record() -> Mail {
        let mut mail = Mail::with_table();
        mail.headers.set("Message-Id", "<1@issue.jira>");
        mail.headers.set("Subject", "[PRJ-1] Something");
        mail.set_current("Status", "Open");
        mail.set_current("Summary", "a rather long summary that would wrap at narrow widths");
        mail.body = vec!["Body".into()];
        mail
    }

    #[test]
    fn test_checksum_format() {
        let sum = checksum(&record());
        let hex = sum.strip_prefix("sha256:").unwrap();
        assert_eq!(hex.len(), 64);
        assert_eq!(sum, checksum(&record()));
    }

    #[test]
    fn test_checksum_ignores_stored_checksum_header() {
        let mail = record();
        let mut stamped = mail.clone();
        stamped.headers.set(HEADER_CHECKSUM, "sha256:deadbeef");
        assert_eq!(checksum(&mail), checksum(&stamped));
    }

    #[test]
    fn test_checksum_ignores_width_and_history() {
        let mail = record();
        let mut other = mail.clone();
        let table = other.table.as_mut().unwrap();
        table.set_column_width(8);
        table.set("Status", PREVIOUS_COLUMN, "New");
        table.set("Status", DIFF_COLUMN, "!");
        table.set_display_columns([PREVIOUS_COLUMN, DIFF_COLUMN]);

        assert_eq!(checksum(&mail), checksum(&other));
    }

    #[test]
    fn test_checksum_changes_with_content() {
        let base = checksum(&record());

        let mut current = record();
        current.set_current("Status", "Closed");
        assert_ne!(base, checksum(&current));

        let mut body = record();
        body.body.push("more".into());
        assert_ne!(base, checksum(&body));

        let mut header = record();
        header.headers.set("Subject", "[PRJ-1] Renamed");
        assert_ne!(base, checksum(&header));
    }

    #[test]
    fn test_has_changed() {
        assert!(has_changed("abc123", None));
        assert!(has_changed("abc123", Some("xyz789")));
        assert!(!has_changed("abc123", Some("abc123")));
    }
}
