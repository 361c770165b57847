//! Checksum command implementation.
//!
//! Recomputes the checksum of stored records and compares it with their
//! `X-Checksum` header. A difference means the file was edited after the
//! last sync; the next sync overwrites such records.

use crate::error::{Error, Result};
use crate::message::{Layout, checksum};
use colored::Colorize;
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
enum Status {
    /// Stored and computed checksums agree.
    Ok,
    /// The record changed since it was written.
    Changed,
    /// No checksum stored.
    Missing,
}

impl Status {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Changed => "changed",
            Self::Missing => "missing",
        }
    }
}

#[derive(Debug, Serialize)]
struct FileReport {
    path: PathBuf,
    status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    stored: Option<String>,
    computed: String,
}

fn check(path: &Path, layout: &Layout) -> Result<FileReport> {
    let mail = layout.read_file(path)?;
    let computed = checksum(&mail);
    let stored = mail.checksum_header().map(str::to_string);

    let status = match stored.as_deref() {
        None => Status::Missing,
        Some(s) if s == computed => Status::Ok,
        Some(_) => Status::Changed,
    };

    Ok(FileReport {
        path: path.to_path_buf(),
        status,
        stored,
        computed,
    })
}

/// Execute the checksum command.
///
/// # Errors
///
/// Returns an error if a file cannot be read or parsed, or if any record
/// no longer matches its stored checksum.
pub fn execute(files: &[PathBuf], config_path: Option<&Path>, json: bool) -> Result<()> {
    let layout = super::load_layout(config_path)?;
    let reports = files
        .iter()
        .map(|f| check(f, &layout))
        .collect::<Result<Vec<_>>>()?;

    if json {
        println!("{}", serde_json::to_string(&reports)?);
    } else {
        for report in &reports {
            let label = format!("{:<8}", report.status.as_str());
            let status = match report.status {
                Status::Ok => label.green(),
                Status::Changed => label.red().bold(),
                Status::Missing => label.yellow(),
            };
            println!("{status} {}", report.path.display());
        }
    }

    let changed = reports
        .iter()
        .filter(|r| r.status == Status::Changed)
        .count();
    if changed > 0 {
        return Err(Error::Other(format!(
            "{changed} of {} records changed since they were written",
            reports.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{HEADER_CHECKSUM, Mail};
    use std::fs;
    use tempfile::TempDir;

    fn record() -> Mail {
        let mut mail = Mail::with_table();
        mail.headers.set("Message-Id", "<a@issue.jira>");
        mail.headers.set("Subject", "[PRJ-1] Title");
        mail.set_current("Status", "Open");
        mail
    }

    #[test]
    fn test_check_statuses() {
        let dir = TempDir::new().unwrap();
        let layout = Layout::default();

        let mut mail = record();
        let path = dir.path().join("missing");
        fs::write(&path, layout.render(&mail)).unwrap();
        assert_eq!(check(&path, &layout).unwrap().status, Status::Missing);

        mail.headers.set(HEADER_CHECKSUM, checksum(&mail));
        let path = dir.path().join("ok");
        fs::write(&path, layout.render(&mail)).unwrap();
        assert_eq!(check(&path, &layout).unwrap().status, Status::Ok);

        mail.set_current("Status", "Closed");
        let path = dir.path().join("changed");
        fs::write(&path, layout.render(&mail)).unwrap();
        let report = check(&path, &layout).unwrap();
        assert_eq!(report.status, Status::Changed);
        assert_ne!(report.stored.as_deref(), Some(report.computed.as_str()));
    }
}
