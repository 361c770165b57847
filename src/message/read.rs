//! Record parsing.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use super::{Headers, Mail, TABLE_END, TABLE_START};
use crate::error::{Error, Result};
use crate::table::TableParser;

/// Read a stored record.
///
/// `quotes` are prefixes stripped from lines of the table block, so a
/// record quoted in a reply (`> # Name | ...`) still parses. The recovered
/// table gets `column_width` as its wrap width.
///
/// # Errors
///
/// Returns an error if reading fails, a header line is malformed, or the
/// embedded table is malformed.
pub fn read_mail<R: BufRead>(reader: R, quotes: &[String], column_width: usize) -> Result<Mail> {
    let mut lines = reader.lines();
    let mut mail = Mail::new();

    read_headers(&mut lines, &mut mail.headers)?;

    let mut parser = TableParser::new();
    let mut in_table = false;

    for line in lines {
        let line = line?;
        let marker = line.trim();

        if is_marker(marker, TABLE_START) {
            in_table = true;
            continue;
        }
        if is_marker(marker, TABLE_END) {
            in_table = false;
            continue;
        }

        if in_table {
            let text = strip_quotes(marker, quotes);
            let Some(text) = text.strip_prefix('#') else {
                continue;
            };
            if !parser.scan(text) {
                if let Some(err) = parser.error() {
                    return Err(err.clone().into());
                }
            }
        } else {
            mail.body.push(line.trim_end().to_string());
        }
    }

    let first = mail.body.iter().position(|l| !l.is_empty()).unwrap_or(mail.body.len());
    mail.body.drain(..first);
    while mail.body.last().is_some_and(String::is_empty) {
        mail.body.pop();
    }

    mail.table = parser.finish().map(|mut table| {
        table.set_column_width(column_width);
        table
    });

    Ok(mail)
}

/// Read a stored record from `path`.
///
/// # Errors
///
/// See [`read_mail`].
pub fn read_mail_file(path: &Path, quotes: &[String], column_width: usize) -> Result<Mail> {
    let file = File::open(path)?;
    read_mail(BufReader::new(file), quotes, column_width)
}

/// Checksum header of the record at `path`, reading only the header block.
///
/// # Errors
///
/// Returns an error if the file cannot be read or its headers are malformed.
pub fn stored_checksum(path: &Path) -> Result<Option<String>> {
    let file = File::open(path)?;
    let mut headers = Headers::new();
    read_headers(&mut BufReader::new(file).lines(), &mut headers)?;
    Ok(headers.get(super::HEADER_CHECKSUM).map(str::to_string))
}

fn read_headers<I>(lines: &mut I, headers: &mut Headers) -> Result<()>
where
    I: Iterator<Item = std::io::Result<String>>,
{
    let mut current: Option<(String, String)> = None;

    for (n, line) in lines.enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            break;
        }

        if line.starts_with([' ', '\t']) {
            let Some((_, value)) = current.as_mut() else {
                return Err(Error::MailFormat(format!(
                    "continuation without header at line {}",
                    n + 1
                )));
            };
            value.push(' ');
            value.push_str(line.trim());
            continue;
        }

        let Some((name, value)) = line.split_once(':') else {
            return Err(Error::MailFormat(format!(
                "malformed header at line {}: {line:?}",
                n + 1
            )));
        };

        if let Some((name, value)) = current.take() {
            headers.add(&name, value);
        }
        current = Some((name.trim().to_string(), value.trim().to_string()));
    }

    if let Some((name, value)) = current {
        headers.add(&name, value);
    }
    Ok(())
}

fn is_marker(line: &str, marker: &str) -> bool {
    line == marker
        || line
            .strip_suffix(marker)
            .is_some_and(|head| head.ends_with(' '))
}

fn strip_quotes<'a>(mut line: &'a str, quotes: &[String]) -> &'a str {
    loop {
        let before = line.len();
        for quote in quotes.iter().filter(|q| !q.is_empty()) {
            line = line.strip_prefix(quote.as_str()).unwrap_or(line);
            line = line
                .strip_prefix(quote.trim_end())
                .filter(|_| !quote.trim_end().is_empty())
                .unwrap_or(line);
        }
        if line.len() == before {
            return line;
        }
        line = line.trim_start();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{HEADER_CHECKSUM, render_mail};

    fn quotes() -> Vec<String> {
        vec!["> ".to_string()]
    }

    fn sample() -> Mail {
        let mut mail = Mail::with_table();
        mail.headers.set("Message-Id", "<1@issue.jira>");
        mail.headers.set("Subject", "[PRJ-1] Login fails");
        mail.headers.add("Cc", "a");
        mail.headers.add("Cc", "b");
        mail.set_current("Status", "Open");
        mail.set_current("Summary", "x".repeat(70));
        mail.body = vec!["line one".into(), String::new(), "line three".into()];
        mail
    }

    #[test]
    fn test_read_back_rendered_mail() {
        let mail = sample();
        let text = render_mail(&mail, 55);
        let read = read_mail(text.as_bytes(), &quotes(), 55).unwrap();

        assert_eq!(read.headers, mail.headers);
        assert_eq!(read.body, mail.body);
        let table = read.table.unwrap();
        assert_eq!(table.get("Status", "Current"), "Open");
        assert_eq!(table.get("Summary", "Current"), "x".repeat(70));
        assert_eq!(table.column_width(), 55);
    }

    #[test]
    fn test_read_quoted_table() {
        let text = "Subject: Re: x\n\n\
                    > {{{ jira\n\
                    > #\n\
                    > # Name   | Current\n\
                    > # ----------------\n\
                    > # Status | Open\n\
                    > # ----------------\n\
                    > }}}\n\
                    reply text\n";
        let read = read_mail(text.as_bytes(), &quotes(), 55).unwrap();
        assert_eq!(read.table.unwrap().get("Status", "Current"), "Open");
        assert_eq!(read.body, ["reply text"]);
    }

    #[test]
    fn test_read_without_table() {
        let text = "Subject: plain\n\nhello\n";
        let read = read_mail(text.as_bytes(), &quotes(), 55).unwrap();
        assert!(read.table.is_none());
        assert_eq!(read.body, ["hello"]);
    }

    #[test]
    fn test_read_folded_header() {
        let text = "Subject: first\n  second\nTo: x\n\n";
        let read = read_mail(text.as_bytes(), &quotes(), 55).unwrap();
        assert_eq!(read.subject(), "first second");
        assert_eq!(read.headers.get("to"), Some("x"));
    }

    #[test]
    fn test_malformed_table_fails() {
        let text = "Subject: x\n\n{{{ jira\n# Name | Current\n# Status | Open\n}}}\n";
        let err = read_mail(text.as_bytes(), &quotes(), 55).unwrap_err();
        assert!(matches!(err, Error::TableFormat(_)));
    }

    #[test]
    fn test_malformed_header_fails() {
        let text = "not a header\n\nbody\n";
        assert!(matches!(
            read_mail(text.as_bytes(), &quotes(), 55),
            Err(Error::MailFormat(_))
        ));
    }

    #[test]
    fn test_stored_checksum() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("record");

        let mut mail = sample();
        std::fs::write(&path, render_mail(&mail, 55)).unwrap();
        assert_eq!(stored_checksum(&path).unwrap(), None);

        mail.headers.set(HEADER_CHECKSUM, "sha256:abc");
        std::fs::write(&path, render_mail(&mail, 55)).unwrap();
        assert_eq!(stored_checksum(&path).unwrap().as_deref(), Some("sha256:abc"));
    }

    #[test]
    fn test_strip_quotes() {
        let q = quotes();
        assert_eq!(strip_quotes("> > # x", &q), "# x");
        assert_eq!(strip_quotes(">> # x", &q), "# x");
        assert_eq!(strip_quotes("# x", &q), "# x");
    }
}
