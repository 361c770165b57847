//! Records ("mails") and their text format.
//!
//! Every synchronized entity becomes one record: a header block, an
//! embedded attribute table and a body.
//!
//! ```text
//! Message-Id: <eyJJRCI6IjEwMDAxIiwiS2V5IjoiUFJKLTEifQ@issue.jira>
//! Subject: [PRJ-1] Login fails
//! X-Checksum: sha256:5f0c...
//!
//! {{{ jira
//! # This block will be automatically deleted from the text.
//! #
//! # Name   | Previous | Diff | Current
//! # ...
//! #
//! }}}
//!
//! Steps to reproduce...
//! ```
//!
//! # Submodules
//!
//! - [`checksum`] - Content hashing used to skip unchanged records
//! - [`id`] - Message-Id encoding of remote identities

pub mod checksum;
pub mod id;
mod read;
mod write;

pub use checksum::{checksum, has_changed};
pub use read::{read_mail, read_mail_file, stored_checksum};
pub use write::{render_mail, write_mail};

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::table::AttributeTable;

/// Opening marker of the embedded table block.
pub const TABLE_START: &str = "{{{ jira";
/// Closing marker of the embedded table block.
pub const TABLE_END: &str = "}}}";

pub const CURRENT_COLUMN: &str = "Current";
pub const PREVIOUS_COLUMN: &str = "Previous";
pub const DIFF_COLUMN: &str = "Diff";
/// Marker stored in [`DIFF_COLUMN`] when a value changed.
pub const DIFF_MARK: &str = "!";

/// Columns rendered when a record is written to storage.
pub const FINAL_COLUMNS: [&str; 3] = [PREVIOUS_COLUMN, DIFF_COLUMN, CURRENT_COLUMN];

pub const HEADER_MESSAGE_ID: &str = "Message-Id";
pub const HEADER_CHECKSUM: &str = "X-Checksum";
pub const HEADER_SUBJECT: &str = "Subject";

/// Default quote markers stripped from table lines of quoted replies.
pub const DEFAULT_QUOTE: &str = "> ";
/// Default wrap width of stored tables.
pub const DEFAULT_TABLE_WIDTH: usize = 55;

/// How records are laid out on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    /// Quote prefixes stripped while reading the table block.
    pub quotes: Vec<String>,
    /// Wrap width of the stored table.
    pub column_width: usize,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            quotes: vec![DEFAULT_QUOTE.to_string()],
            column_width: DEFAULT_TABLE_WIDTH,
        }
    }
}

impl Layout {
    /// Read the record stored at `path`.
    ///
    /// # Errors
    ///
    /// See [`read_mail`].
    pub fn read_file(&self, path: &std::path::Path) -> Result<Mail> {
        read_mail_file(path, &self.quotes, self.column_width)
    }

    /// Stored form of `mail`.
    #[must_use]
    pub fn render(&self, mail: &Mail) -> String {
        render_mail(mail, self.column_width)
    }
}

/// Multi-valued header map.
///
/// Names are stored in canonical MIME form (`message-id` → `Message-Id`)
/// and iterate in sorted order, which keeps rendered records stable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers(BTreeMap<String, Vec<String>>);

impl Headers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// First value of `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .get(&canonical_name(name))
            .and_then(|v| v.first())
            .map(String::as_str)
    }

    /// All values of `name`.
    #[must_use]
    pub fn get_all(&self, name: &str) -> &[String] {
        self.0.get(&canonical_name(name)).map_or(&[], Vec::as_slice)
    }

    /// Replace all values of `name` with `value`.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.0
            .insert(canonical_name(name), vec![header_value(value.into())]);
    }

    /// Add another value to `name`.
    pub fn add(&mut self, name: &str, value: impl Into<String>) {
        self.0
            .entry(canonical_name(name))
            .or_default()
            .push(header_value(value.into()));
    }

    pub fn remove(&mut self, name: &str) -> Option<Vec<String>> {
        self.0.remove(&canonical_name(name))
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(&canonical_name(name))
    }

    /// `(name, value)` pairs, sorted by name, one per value.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .iter()
            .flat_map(|(name, values)| values.iter().map(move |v| (name.as_str(), v.as_str())))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A header value occupies one line and reads back trimmed.
fn header_value(value: String) -> String {
    if value.contains(['\n', '\r']) {
        value.split_whitespace().collect::<Vec<_>>().join(" ")
    } else if value.starts_with(char::is_whitespace) || value.ends_with(char::is_whitespace) {
        value.trim().to_string()
    } else {
        value
    }
}

/// Canonical MIME form of a header name.
#[must_use]
pub fn canonical_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = true;
    for c in name.trim().chars() {
        if upper {
            out.extend(c.to_uppercase());
        } else {
            out.extend(c.to_lowercase());
        }
        upper = c == '-';
    }
    out
}

/// One synchronized record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mail {
    pub headers: Headers,
    pub table: Option<AttributeTable>,
    pub body: Vec<String>,
}

impl Mail {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record with an empty attribute table ready to be filled.
    #[must_use]
    pub fn with_table() -> Self {
        Self {
            table: Some(AttributeTable::new()),
            ..Self::default()
        }
    }

    /// Identity of the record: the `Message-Id` value without angle brackets.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingIdentity`] when the header is absent or empty.
    pub fn id(&self) -> Result<&str> {
        let raw = self
            .headers
            .get(HEADER_MESSAGE_ID)
            .map(str::trim)
            .unwrap_or_default();
        let id = raw
            .strip_prefix('<')
            .and_then(|s| s.strip_suffix('>'))
            .unwrap_or(raw);
        if id.is_empty() {
            return Err(Error::MissingIdentity);
        }
        Ok(id)
    }

    /// Checksum stored when the record was last written.
    #[must_use]
    pub fn checksum_header(&self) -> Option<&str> {
        self.headers.get(HEADER_CHECKSUM)
    }

    #[must_use]
    pub fn subject(&self) -> &str {
        self.headers.get(HEADER_SUBJECT).unwrap_or_default()
    }

    /// Table entry helper: store `value` in the current column of `field`.
    pub fn set_current(&mut self, field: &str, value: impl AsRef<str>) {
        self.table
            .get_or_insert_with(AttributeTable::new)
            .set(field, CURRENT_COLUMN, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_name() {
        assert_eq!(canonical_name("message-ID"), "Message-Id");
        assert_eq!(canonical_name("x-checksum"), "X-Checksum");
        assert_eq!(canonical_name("cc"), "Cc");
        assert_eq!(canonical_name("In-Reply-To"), "In-Reply-To");
    }

    #[test]
    fn test_header_values_stay_on_one_line() {
        let mut headers = Headers::new();
        headers.set("Subject", "[PRJ-1] Login fails\r\n  on Safari ");
        headers.add("Cc", " a@example.com");
        assert_eq!(headers.get("Subject"), Some("[PRJ-1] Login fails on Safari"));
        assert_eq!(headers.get("Cc"), Some("a@example.com"));
    }

    #[test]
    fn test_headers_multi_value() {
        let mut headers = Headers::new();
        headers.add("Cc", "a@example.com");
        headers.add("cc", "b@example.com");
        headers.set("Subject", "one");
        headers.set("subject", "two");

        assert_eq!(headers.get_all("CC"), ["a@example.com", "b@example.com"]);
        assert_eq!(headers.get("Subject"), Some("two"));

        let pairs: Vec<_> = headers.iter().collect();
        assert_eq!(
            pairs,
            [
                ("Cc", "a@example.com"),
                ("Cc", "b@example.com"),
                ("Subject", "two")
            ]
        );
    }

    #[test]
    fn test_mail_id_strips_brackets() {
        let mut mail = Mail::new();
        mail.headers.set("Message-ID", "<abc@issue.jira>");
        assert_eq!(mail.id().unwrap(), "abc@issue.jira");
    }

    #[test]
    fn test_mail_without_id_is_an_error() {
        let mail = Mail::new();
        assert!(matches!(mail.id(), Err(Error::MissingIdentity)));

        let mut mail = Mail::new();
        mail.headers.set(HEADER_MESSAGE_ID, "<>");
        assert!(matches!(mail.id(), Err(Error::MissingIdentity)));
    }
}
