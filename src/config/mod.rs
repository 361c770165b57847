//! Configuration management.
//!
//! jiramail reads a single JSON file, `~/.jiramail/config.json` by default
//! (override with `--config` or `JIRAMAIL_CONFIG`). Missing sections fall
//! back to defaults:
//!
//! ```json
//! {
//!   "core": { "log_level": "info" },
//!   "mail": {
//!     "mail_quote": ["> "],
//!     "table_column_width": 55,
//!     "path": { "board": "{DestDir}/boards/{BoardName} ({BoardID})" }
//!   },
//!   "remotes": {
//!     "work": {
//!       "dest_dir": "~/Mail/jira",
//!       "base_url": "https://jira.example.com",
//!       "username": "me",
//!       "delete": "tag"
//!     }
//!   }
//! }
//! ```
//!
//! Path templates use `{Var}` placeholders filled from the sync context
//! (`Remote`, `DestDir`, `BoardName`, `BoardID`, `SprintName`, `SprintID`,
//! `EpicName`, `EpicID`, `ProjectName`, `ProjectID`). An empty template
//! switches that part of the synchronization off.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::message::{DEFAULT_QUOTE, DEFAULT_TABLE_WIDTH, Layout};

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "JIRAMAIL_CONFIG";

/// Prefix of the per-remote password variables (`JIRAMAIL_PASSWORD_WORK`).
pub const PASSWORD_ENV_PREFIX: &str = "JIRAMAIL_PASSWORD_";

/// Default config file location.
///
/// # Errors
///
/// Returns [`Error::Config`] if the home directory cannot be determined.
pub fn default_config_path() -> Result<PathBuf> {
    directories::BaseDirs::new()
        .map(|b| b.home_dir().join(".jiramail").join("config.json"))
        .ok_or(Error::Config("Could not determine home directory".into()))
}

/// Config file to use: the explicit path, else the default location.
///
/// # Errors
///
/// See [`default_config_path`].
pub fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => default_config_path(),
    }
}

/// What happens to records that disappeared remotely.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DeletePolicy {
    /// Delete the record.
    #[default]
    Remove,
    /// Keep the record with a `[DELETED]` subject prefix.
    Tag,
}

impl DeletePolicy {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Remove => "remove",
            Self::Tag => "tag",
        }
    }
}

impl fmt::Display for DeletePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeletePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "" | "remove" => Ok(Self::Remove),
            "tag" => Ok(Self::Tag),
            other => Err(Error::Config(format!(
                "invalid delete policy {other:?} (expected remove or tag)"
            ))),
        }
    }
}

impl TryFrom<String> for DeletePolicy {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<DeletePolicy> for String {
    fn from(policy: DeletePolicy) -> Self {
        policy.as_str().to_string()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Log filter used when neither `RUST_LOG` nor `-v` is given.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

/// Maildir path templates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathTemplates {
    pub globals: String,
    pub board: String,
    pub sprint: String,
    pub epic: String,
    pub backlog: String,
    pub project: String,
}

impl Default for PathTemplates {
    fn default() -> Self {
        Self {
            globals: "{DestDir}/globals".to_string(),
            board: "{DestDir}/boards/{BoardName} ({BoardID})".to_string(),
            sprint: "{DestDir}/boards/{BoardName} ({BoardID})/sprints/{SprintName} ({SprintID})"
                .to_string(),
            epic: "{DestDir}/boards/{BoardName} ({BoardID})/epics/{EpicName} ({EpicID})"
                .to_string(),
            backlog: "{DestDir}/boards/{BoardName} ({BoardID})/backlog".to_string(),
            project: "{DestDir}/projects/{ProjectName}".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    pub mail_quote: Vec<String>,
    pub table_column_width: usize,
    pub path: PathTemplates,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            mail_quote: vec![DEFAULT_QUOTE.to_string()],
            table_column_width: DEFAULT_TABLE_WIDTH,
            path: PathTemplates::default(),
        }
    }
}

impl MailConfig {
    /// Record layout for reading and writing.
    #[must_use]
    pub fn layout(&self) -> Layout {
        Layout {
            quotes: self.mail_quote.clone(),
            column_width: self.table_column_width,
        }
    }
}

/// One Jira instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub dest_dir: PathBuf,
    pub base_url: String,
    pub username: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub password: String,
    pub project_match: String,
    pub board_match: String,
    pub delete: DeletePolicy,
}

impl RemoteConfig {
    /// Compiled `project_match`; `None` matches everything.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an invalid regex.
    pub fn project_filter(&self) -> Result<Option<Regex>> {
        compile("project_match", &self.project_match)
    }

    /// Compiled `board_match`; `None` matches everything.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an invalid regex.
    pub fn board_filter(&self) -> Result<Option<Regex>> {
        compile("board_match", &self.board_match)
    }
}

fn compile(name: &str, pattern: &str) -> Result<Option<Regex>> {
    if pattern.is_empty() {
        return Ok(None);
    }
    Regex::new(pattern)
        .map(Some)
        .map_err(|e| Error::Config(format!("invalid regex in {name}: {e}")))
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    pub core: CoreConfig,
    pub mail: MailConfig,
    pub remotes: BTreeMap<String, RemoteConfig>,
}

impl Configuration {
    /// Load and validate the config file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file cannot be read, parsed or
    /// validated.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file {}: {e}", path.display()))
        })?;
        let mut config = Self::parse(&content)?;
        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Parse and validate config text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] on malformed JSON or invalid settings.
    pub fn parse(content: &str) -> Result<Self> {
        let mut config: Self = serde_json::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse config file: {e}")))?;
        config.normalize(home_dir().as_deref());
        config.validate()?;
        Ok(config)
    }

    /// Expand `~/` in destination directories.
    fn normalize(&mut self, home: Option<&Path>) {
        for remote in self.remotes.values_mut() {
            if let (Some(home), Ok(rest)) = (home, remote.dest_dir.strip_prefix("~")) {
                remote.dest_dir = home.join(rest);
            }
        }
    }

    /// Take passwords from `JIRAMAIL_PASSWORD_<REMOTE>` where set.
    fn apply_env<F: Fn(&str) -> Option<String>>(&mut self, lookup: F) {
        for (name, remote) in &mut self.remotes {
            let var = format!("{PASSWORD_ENV_PREFIX}{}", env_suffix(name));
            if let Some(password) = lookup(&var).filter(|p| !p.is_empty()) {
                remote.password = password;
            }
        }
    }

    /// Check settings that deserialization cannot.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.mail.table_column_width == 0 {
            return Err(Error::Config(
                "mail.table_column_width must be positive".to_string(),
            ));
        }
        for (name, remote) in &self.remotes {
            if remote.base_url.is_empty() {
                return Err(Error::Config(format!("remote {name:?}: base_url is empty")));
            }
            if remote.dest_dir.as_os_str().is_empty() {
                return Err(Error::Config(format!("remote {name:?}: dest_dir is empty")));
            }
            remote.project_filter()?;
            remote.board_filter()?;
        }
        Ok(())
    }

    /// Settings of remote `name`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for an unknown remote.
    pub fn remote(&self, name: &str) -> Result<&RemoteConfig> {
        self.remotes
            .get(name)
            .ok_or_else(|| Error::InvalidArgument(format!("unknown remote {name:?}")))
    }
}

fn home_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().to_path_buf())
}

/// `my-remote` → `MY_REMOTE`.
fn env_suffix(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}
