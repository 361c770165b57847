//! Error types for jiramail.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (2=storage, 3=identity, 4=format, etc.)
//! - A fatal flag for data-integrity faults that must stop the whole run
//! - Context-aware recovery hints
//! - Structured JSON output for piped / non-TTY consumers

use std::path::PathBuf;
use thiserror::Error;

use crate::table::TableError;

/// Result type alias for jiramail operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
///
/// Each code maps to a SCREAMING_SNAKE string and a category-based
/// exit code. Scripts match on the string or on the exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Storage (exit 2)
    MaildirError,

    // Identity (exit 3)
    AmbiguousRecord,
    InvalidIdentity,
    MissingIdentity,

    // Format (exit 4)
    TableFormat,
    MailFormat,
    InvalidArgument,

    // Remote (exit 5)
    RemoteError,
    Unauthorized,

    // Sync (exit 6)
    SyncError,

    // Config (exit 7)
    ConfigError,

    // I/O (exit 8)
    IoError,
    JsonError,

    // Internal (exit 1)
    InternalError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::MaildirError => "MAILDIR_ERROR",
            Self::AmbiguousRecord => "AMBIGUOUS_RECORD",
            Self::InvalidIdentity => "INVALID_IDENTITY",
            Self::MissingIdentity => "MISSING_IDENTITY",
            Self::TableFormat => "TABLE_FORMAT",
            Self::MailFormat => "MAIL_FORMAT",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::RemoteError => "REMOTE_ERROR",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::SyncError => "SYNC_ERROR",
            Self::ConfigError => "CONFIG_ERROR",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Category-based exit code (1-8).
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InternalError => 1,
            Self::MaildirError => 2,
            Self::AmbiguousRecord | Self::InvalidIdentity | Self::MissingIdentity => 3,
            Self::TableFormat | Self::MailFormat | Self::InvalidArgument => 4,
            Self::RemoteError | Self::Unauthorized => 5,
            Self::SyncError => 6,
            Self::ConfigError => 7,
            Self::IoError | Self::JsonError => 8,
        }
    }

    /// Whether a later run may succeed without any change on our side.
    ///
    /// True for network failures. False for format, identity and
    /// configuration problems.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::RemoteError | Self::IoError)
    }

    /// Whether the fault means local data can no longer be trusted.
    ///
    /// A record without identity cannot be matched, diffed or collected,
    /// so the caller should stop the whole run instead of moving on to
    /// the next remote.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::MissingIdentity)
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur in jiramail operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Record has no Message-Id header")]
    MissingIdentity,

    #[error("Ambiguous record {id}: {count} copies in {}", path.display())]
    AmbiguousRecord {
        id: String,
        count: usize,
        path: PathBuf,
    },

    #[error("Unable to decode Message-Id {id:?}: {reason}")]
    InvalidIdentity { id: String, reason: String },

    #[error("Malformed attribute table: {0}")]
    TableFormat(#[from] TableError),

    #[error("Malformed record: {0}")]
    MailFormat(String),

    #[error("Not a maildir: {}", path.display())]
    NotMaildir { path: PathBuf },

    #[error("Remote {remote:?}: {message}")]
    Remote { remote: String, message: String },

    #[error("Remote {remote:?}: authentication credentials are incorrect or missing")]
    Unauthorized { remote: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Synchronization failed for {failed} of {total} remote(s)")]
    SyncFailed { failed: usize, total: usize },

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::MissingIdentity => ErrorCode::MissingIdentity,
            Self::AmbiguousRecord { .. } => ErrorCode::AmbiguousRecord,
            Self::InvalidIdentity { .. } => ErrorCode::InvalidIdentity,
            Self::TableFormat(_) => ErrorCode::TableFormat,
            Self::MailFormat(_) => ErrorCode::MailFormat,
            Self::NotMaildir { .. } => ErrorCode::MaildirError,
            Self::Remote { .. } | Self::Http(_) => ErrorCode::RemoteError,
            Self::Unauthorized { .. } => ErrorCode::Unauthorized,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::Config(_) => ErrorCode::ConfigError,
            Self::SyncFailed { .. } => ErrorCode::SyncError,
            Self::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// Shorthand for [`ErrorCode::is_fatal`].
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        self.error_code().is_fatal()
    }

    /// Context-aware recovery hint.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::AmbiguousRecord { id, path, .. } => Some(format!(
                "Remove the duplicate copies of '{id}' from {} and run sync again.",
                path.display()
            )),

            Self::Unauthorized { remote } => Some(format!(
                "Check the username and password of remote '{remote}', \
                 or set JIRAMAIL_PASSWORD_{}.",
                remote.to_uppercase()
            )),

            Self::NotMaildir { path } => Some(format!(
                "{} exists but is not a directory. Move it away or change the path templates.",
                path.display()
            )),

            Self::Config(msg) => {
                if msg.contains("delete") {
                    Some("Valid delete policies: remove, tag".to_string())
                } else if msg.contains("regex") {
                    Some("project_match and board_match are regular expressions".to_string())
                } else {
                    Some("Use `jiramail config` to see the resolved configuration".to_string())
                }
            }

            Self::MissingIdentity
            | Self::InvalidIdentity { .. }
            | Self::TableFormat(_)
            | Self::MailFormat(_)
            | Self::Remote { .. }
            | Self::Http(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::InvalidArgument(_)
            | Self::SyncFailed { .. }
            | Self::Other(_) => None,
        }
    }

    /// Structured JSON representation for machine consumption.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "retryable": code.is_retryable(),
                "exit_code": code.exit_code(),
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}
