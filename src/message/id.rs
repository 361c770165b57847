//! Message-Id encoding of remote identities.
//!
//! An identity is the natural key of a remote entity (`{"ID": "10001",
//! "Key": "PRJ-1"}`) serialized as JSON with sorted keys, encoded as
//! URL-safe base64 without padding and qualified by the entity kind:
//!
//! ```text
//! <eyJJRCI6IjEwMDAxIiwiS2V5IjoiUFJKLTEifQ@issue.jira>
//! ```
//!
//! Identities are stable across runs, so a record written twice lands on
//! the same maildir key.

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

use crate::error::{Error, Result};

/// Domain appended to every entity kind.
const DOMAIN: &str = "jira";

/// Decoded identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedId {
    /// Qualified kind, e.g. `issue.jira`.
    pub kind: String,
    pub fields: BTreeMap<String, String>,
}

/// Encode `fields` under `kind` (already qualified, e.g. `issue.jira`).
#[must_use]
pub fn encode<'a, I>(kind: &str, fields: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let map: serde_json::Map<String, serde_json::Value> = fields
        .into_iter()
        .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.to_string())))
        .collect();
    // serde_json::Map is ordered by key unless preserve_order is enabled.
    let json = serde_json::Value::Object(map).to_string();
    format!("<{}@{kind}>", URL_SAFE_NO_PAD.encode(json))
}

/// Decode a Message-Id, with or without angle brackets.
///
/// # Errors
///
/// Returns [`Error::InvalidIdentity`] when the value is not an encoded
/// identity.
pub fn decode(id: &str) -> Result<DecodedId> {
    let invalid = |reason: String| Error::InvalidIdentity {
        id: id.to_string(),
        reason,
    };

    let raw = id.trim();
    let raw = raw
        .strip_prefix('<')
        .and_then(|s| s.strip_suffix('>'))
        .unwrap_or(raw);

    let (payload, kind) = raw
        .split_once('@')
        .ok_or_else(|| invalid("missing '@'".to_string()))?;

    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| invalid(e.to_string()))?;
    let fields: BTreeMap<String, String> =
        serde_json::from_slice(&bytes).map_err(|e| invalid(e.to_string()))?;

    Ok(DecodedId {
        kind: kind.to_string(),
        fields,
    })
}

fn kind(name: &str) -> String {
    format!("{name}.{DOMAIN}")
}

/// Identity of the per-remote record.
#[must_use]
pub fn remote_id(remote: &str) -> String {
    encode(&kind("remote"), [("Remote", remote)])
}

#[must_use]
pub fn board_id(id: u64) -> String {
    encode(&kind("board"), [("ID", id.to_string().as_str())])
}

#[must_use]
pub fn sprint_id(id: u64) -> String {
    encode(&kind("sprint"), [("ID", id.to_string().as_str())])
}

#[must_use]
pub fn epic_id(id: u64, key: &str) -> String {
    encode(&kind("epic"), [("ID", id.to_string().as_str()), ("Key", key)])
}

#[must_use]
pub fn project_id(id: &str, key: &str) -> String {
    encode(&kind("project"), [("ID", id), ("Key", key)])
}

/// Identity of an issue; subtasks get their own kind.
#[must_use]
pub fn issue_id(id: &str, key: &str, subtask: bool) -> String {
    let name = if subtask { "subtask" } else { "issue" };
    encode(&kind(name), [("ID", id), ("Key", key)])
}

#[must_use]
pub fn comment_id(id: &str) -> String {
    encode(&kind("comment"), [("ID", id)])
}
